//! CalculiX `.frd` (nodal result file) reader
//!
//! Reads the ASCII result blocks written by `*NODE FILE`, `*EL FILE` and
//! `*CONTACT FILE`. Layout after the cgx manual, § 11.
//!
//! ## Format Overview
//!
//! FRD files use fixed-width fields, so every field is cut out at its
//! absolute column instead of splitting at whitespace:
//! - Metadata records: `1PSTEP`, `1PMODE`, `1PGM`, ... in front of a block
//! - Block header: `100C` with set name, step time, analysis type and the
//!   total increment number at fixed columns
//! - Block records: `-4` entity name, `-5` component name, `-1` id with
//!   components, `-2` continuation of the previous id, `-3` end of block
//!
//! ```text
//!     1PSTEP                        3           1           2
//!   100CL  101 1.000000000         467                     0    3           1
//!  -4  DISP        4    1
//!  -5  D1          1    2    1    0
//!  -1         1 1.23456E-03 0.00000E+00-4.56789E-04
//!  -3
//! ```
//!
//! Node and element definition blocks (`2C`, `3C`) are skipped. Binary
//! output (`*NODE FILE, OUTPUT=BINARY`) is rejected.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ccx_results::{FrdEntity, FrdResult};
//!
//! let frd = FrdResult::from_file("job.frd")?;
//! println!("Time steps: {:?}", frd.get_available_times());
//! if let Some(disp) = frd.get_result_set_by_entity_and_index(FrdEntity::DISP, -1, None) {
//!     println!("last DISP set has {} nodes", disp.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::Range;
use std::path::Path;

use tracing::{debug, info, trace, warn};

use crate::entities::{AnalysisType, FrdEntity, ResultLocation};
use crate::error::{Result, ResultError};
use crate::result::{FrdResult, ResultFile, ResultSet, ValuesBuilder};

/// Width of one component field
const COMPONENT_WIDTH: usize = 12;

/// Parses a `.frd` file. See [`FrdResult::from_file`].
pub fn parse_nodal_file<P: AsRef<Path>>(path: P) -> Result<FrdResult> {
    FrdResult::from_file(path)
}

impl ResultFile<FrdEntity> {
    /// Read an ASCII `.frd` file from path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let result = Self::from_reader(BufReader::new(file))?;
        info!(
            path = %path.display(),
            result_sets = result.result_sets().len(),
            times = result.get_available_times().len(),
            "parsed .frd file"
        );
        Ok(result)
    }

    /// Read `.frd` content from a buffered reader
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        FrdParser::default().run(reader)
    }
}

/// Record format of the data lines of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordFormat {
    /// 5 character ids
    Short,
    /// 10 character ids
    Long,
}

impl RecordFormat {
    fn from_flag(flag: i32) -> Result<Self> {
        match flag {
            0 => Ok(RecordFormat::Short),
            1 => Ok(RecordFormat::Long),
            other => Err(ResultError::UnsupportedFrdFormat(other)),
        }
    }

    fn id_columns(self) -> Range<usize> {
        match self {
            RecordFormat::Short => 3..8,
            RecordFormat::Long => 3..13,
        }
    }
}

/// Metadata of the `1P` records in front of a block.
#[derive(Debug, Clone, Default)]
struct StepParams {
    /// Sticky over blocks: CalculiX only repeats it when it writes it at all
    step_no: Option<u32>,
    mode_no: Option<u32>,
    generalized_mass: Option<f64>,
    generalized_stiffness: Option<f64>,
}

/// Fields of a `100C` line
#[derive(Debug, Clone, PartialEq)]
struct BlockHeader {
    set_name: String,
    step_time: f64,
    analysis_type: AnalysisType,
    /// Increment counter over all steps of the analysis
    total_increment_no: u32,
    format: RecordFormat,
}

/// A block between its `100C` line and the closing `-3`
struct OpenBlock {
    line_no: usize,
    header: BlockHeader,
    step_no: u32,
    entity: Option<FrdEntity>,
    component_names: Vec<String>,
    builder: ValuesBuilder,
}

#[derive(Default)]
struct FrdParser {
    params: StepParams,
    block: Option<OpenBlock>,
    /// Finished sets with their total increment number, renumbered at the end
    result_sets: Vec<(ResultSet<FrdEntity>, u32)>,
}

impl FrdParser {
    fn run<R: BufRead>(mut self, mut reader: R) -> Result<FrdResult> {
        let mut line = String::new();
        let mut line_no = 0;

        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            line_no += 1;

            let record = line.trim_end_matches(['\n', '\r']);
            let trimmed = record.trim_start();
            if trimmed.is_empty() {
                continue;
            }

            if self.block.is_some() {
                self.read_block_record(record, trimmed, line_no)?;
            } else if trimmed.starts_with("1P") {
                self.read_param(trimmed, line_no)?;
            } else if trimmed.starts_with("100C") {
                self.open_block(record, line_no)?;
            } else {
                trace!(line = line_no, "ignored");
            }
        }

        if let Some(block) = &self.block {
            warn!(line = block.line_no, "result block not closed before end of file, dropped");
        }

        Ok(ResultFile::new(renumber_increments(self.result_sets), BTreeMap::new()))
    }

    fn read_param(&mut self, trimmed: &str, line_no: usize) -> Result<()> {
        let mut tokens = trimmed.split_whitespace();
        let key = tokens
            .next()
            .and_then(|t| t.strip_prefix("1P"))
            .unwrap_or_default();
        let values: Vec<&str> = tokens.collect();

        match key {
            // three integers, the last one is the step number
            "STEP" => self.params.step_no = Some(parse_param(&values, 2, line_no, key)?),
            "MODE" => self.params.mode_no = Some(parse_param(&values, 0, line_no, key)?),
            "GM" => self.params.generalized_mass = Some(parse_param(&values, 0, line_no, key)?),
            "GK" => {
                self.params.generalized_stiffness = Some(parse_param(&values, 0, line_no, key)?)
            }
            "HID" | "SUBC" => {
                let value: i64 = parse_param(&values, 0, line_no, key)?;
                trace!(line = line_no, key, value, "metadata");
            }
            _ => trace!(line = line_no, key, "unknown metadata record"),
        }
        Ok(())
    }

    fn open_block(&mut self, record: &str, line_no: usize) -> Result<()> {
        let header = parse_block_header(record, line_no)?;
        self.block = Some(OpenBlock {
            line_no,
            header,
            step_no: self.params.step_no.unwrap_or(1),
            entity: None,
            component_names: Vec::new(),
            builder: ValuesBuilder::new(ResultLocation::Nodal),
        });
        Ok(())
    }

    fn read_block_record(&mut self, record: &str, trimmed: &str, line_no: usize) -> Result<()> {
        if trimmed.starts_with("-3") {
            return self.close_block(line_no);
        }
        let Some(block) = self.block.as_mut() else {
            return Ok(());
        };
        let format = block.header.format;

        match trimmed.get(..2).unwrap_or(trimmed) {
            "-1" => {
                let id = parse_field::<u32>(record, format.id_columns(), line_no, "id")?;
                let components = parse_components(record, format.id_columns().end, line_no)?;
                block.builder.push_row(id, components);
            }
            "-2" => {
                let components = parse_components(record, format.id_columns().end, line_no)?;
                if !block.builder.extend_last(&components) {
                    return Err(ResultError::parse(line_no, "continuation record without a preceding id"));
                }
            }
            "-4" => {
                let name = trimmed.split_whitespace().nth(1).unwrap_or_default();
                block.entity = Some(name.parse()?);
            }
            "-5" => {
                if let Some(name) = trimmed.split_whitespace().nth(1) {
                    block.component_names.push(name.to_string());
                }
            }
            _ => trace!(line = line_no, "ignored inside result block"),
        }
        Ok(())
    }

    fn close_block(&mut self, line_no: usize) -> Result<()> {
        let Some(block) = self.block.take() else {
            return Ok(());
        };
        let params = std::mem::take(&mut self.params);
        self.params.step_no = params.step_no;

        let Some(entity) = block.entity else {
            return Err(ResultError::parse(block.line_no, "result block without entity record (-4)"));
        };
        if block.builder.is_empty() {
            warn!(line = block.line_no, %entity, "result block without values, dropped");
            return Ok(());
        }

        let (values, no_components) = block
            .builder
            .finish()
            .map_err(|message| ResultError::parse(line_no, message))?;

        let mut component_names = block.component_names;
        component_names.truncate(no_components);

        let header = block.header;
        debug!(
            %entity,
            step_no = block.step_no,
            total_increment = header.total_increment_no,
            step_time = header.step_time,
            mode_no = ?params.mode_no,
            generalized_mass = ?params.generalized_mass,
            generalized_stiffness = ?params.generalized_stiffness,
            ids = values.len(),
            "result set"
        );

        let result_set = ResultSet::new(
            entity,
            header.step_time,
            block.step_no,
            header.total_increment_no,
            header.analysis_type,
            header.set_name,
            component_names,
            values,
            no_components,
        );
        self.result_sets.push((result_set, header.total_increment_no));
        Ok(())
    }
}

/// Turns the total increment numbers into increment numbers counted from 1
/// within each step. The first block of a step is its increment 1.
fn renumber_increments(result_sets: Vec<(ResultSet<FrdEntity>, u32)>) -> Vec<ResultSet<FrdEntity>> {
    let mut first_of_step: BTreeMap<u32, u32> = BTreeMap::new();
    for (rs, total) in &result_sets {
        first_of_step.entry(rs.step_no).or_insert(*total);
    }

    result_sets
        .into_iter()
        .map(|(mut rs, total)| {
            let first = first_of_step.get(&rs.step_no).copied().unwrap_or(total);
            rs.step_increment_no = (total + 1).saturating_sub(first);
            rs
        })
        .collect()
}

/// Columns of `record` in `range`, clamped to the end of the line. `None` if
/// the line ends before the field starts.
fn field(record: &str, range: Range<usize>) -> Option<&str> {
    record.get(range.start..range.end.min(record.len()))
}

fn parse_field<T: std::str::FromStr>(
    record: &str,
    range: Range<usize>,
    line_no: usize,
    name: &str,
) -> Result<T> {
    let text = field(record, range.clone())
        .map(str::trim)
        .ok_or_else(|| ResultError::parse(line_no, format!("missing {name} in columns {range:?}")))?;
    text.parse()
        .map_err(|_| ResultError::parse(line_no, format!("invalid {name} {text:?}")))
}

fn parse_param<T: std::str::FromStr>(values: &[&str], index: usize, line_no: usize, key: &str) -> Result<T> {
    values
        .get(index)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| ResultError::parse(line_no, format!("invalid 1P{key} record")))
}

fn parse_block_header(record: &str, line_no: usize) -> Result<BlockHeader> {
    let set_name = field(record, 6..12).map(str::trim).unwrap_or_default().to_string();
    let step_time = parse_field::<f64>(record, 12..24, line_no, "step time")?;
    let code = field(record, 56..58).unwrap_or_default();
    let analysis_type = AnalysisType::from_frd_code(code)?;
    let total_increment_no = parse_field::<u32>(record, 58..63, line_no, "increment number")?;

    // a missing flag means the long format of current CalculiX versions
    let flag = match field(record, 73..75).map(str::trim) {
        Some(text) if !text.is_empty() => text
            .parse::<i32>()
            .map_err(|_| ResultError::parse(line_no, format!("invalid format flag {text:?}")))?,
        _ => 1,
    };

    Ok(BlockHeader {
        set_name,
        step_time,
        analysis_type,
        total_increment_no,
        format: RecordFormat::from_flag(flag)?,
    })
}

/// Fixed-width component fields from column `start` to the end of the line.
fn parse_components(record: &str, start: usize, line_no: usize) -> Result<Vec<f64>> {
    let data = record.get(start..).unwrap_or_default().trim_end();
    let mut components = Vec::with_capacity(data.len() / COMPONENT_WIDTH + 1);
    let mut pos = 0;
    while pos < data.len() {
        let end = (pos + COMPONENT_WIDTH).min(data.len());
        let text = data
            .get(pos..end)
            .ok_or_else(|| ResultError::parse(line_no, "non-ASCII data in component field"))?
            .trim();
        let value = text
            .parse::<f64>()
            .map_err(|_| ResultError::parse(line_no, format!("invalid component {text:?}")))?;
        components.push(value);
        pos = end;
    }
    Ok(components)
}
