//! Readers for CalculiX result files.
//!
//! This crate provides:
//! - **DAT (print file)** reader for `*NODE PRINT`, `*EL PRINT` and
//!   `*CONTACT PRINT` output, including eigenvalue and buckling factor tables
//! - **FRD (result file)** reader for ASCII `*NODE FILE`, `*EL FILE` and
//!   `*CONTACT FILE` output
//! - **Result queries** by entity, step, increment, set name and nearest time
//! - **Stress tools** (von Mises, principal and principal shear stresses)
//! - **JSON export** of parsed results
//!
//! Both readers produce a [`ResultFile`] of [`ResultSet`]s; only the `.dat`
//! reader attaches [`StepInfo`] metadata to frequency and buckling steps.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ccx_results::{DatEntity, DatResult, StepInfo};
//!
//! let dat = DatResult::from_file("modal.dat")?;
//! if let Some(info) = dat.get_step_info(1).and_then(StepInfo::as_frequency) {
//!     for mode in info.increments() {
//!         println!("mode {}: {} Hz", mode.mode_no, mode.frequency);
//!     }
//! }
//! for rs in dat.get_result_sets_by_entity(DatEntity::U) {
//!     println!("mode {} has {} nodes", rs.step_increment_no, rs.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod dat_reader;
pub mod entities;
pub mod error;
mod export;
pub mod frd_reader;
pub mod result;
pub mod step_info;
pub mod stress_tools;

pub use dat_reader::parse_print_file;
pub use entities::{AnalysisType, DatEntity, FrdEntity, MissingIds, ResultEntity, ResultLocation};
pub use error::{Result, ResultError};
pub use frd_reader::parse_nodal_file;
pub use result::{
    DatResult, FrdResult, ResultFile, ResultQuery, ResultSet, ResultValues, StackedValues,
};
pub use step_info::{
    BucklingIncrementInfo, BucklingStepInfo, FrequencyIncrementInfo, FrequencyStepInfo,
    IncrementInfo, StepInfo, TurningDirection,
};
pub use stress_tools::TensorComponents;
