//! CalculiX `.dat` (print file) reader.
//!
//! Reads the tabulated output of `*NODE PRINT`, `*EL PRINT` and
//! `*CONTACT PRINT` together with the eigenvalue and buckling factor tables
//! of frequency and buckling steps.
//!
//! ## Format Overview
//!
//! ```text
//!                         S T E P       1
//!
//!                                 INCREMENT     1
//!
//!  displacements (vx,vy,vz) for set NALL and time  0.1000000E+01
//!
//!          1  0.000000E+00  0.000000E+00  0.000000E+00
//!          2  1.234560E-03  0.000000E+00  0.000000E+00
//! ```
//!
//! The reader is a small state machine. Outside a block it looks for
//! markers and result-set headers; inside a block it consumes rows until a
//! line fails to parse as a row, then hands that line back so the outer
//! state can inspect it again.
//!
//! Totals (`*NODE PRINT, TOTALS=YES`) are not read. Sum the per-id values
//! of the same result instead.

mod eigen;
mod lines;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, info, trace, warn};

use crate::entities::{AnalysisType, DatEntity, ResultEntity};
use crate::error::{Result, ResultError};
use crate::result::{DatResult, ResultFile, ResultSet, ValuesBuilder};
use crate::step_info::{BucklingStepInfo, FrequencyStepInfo, StepInfo};

use lines::{Header, LineCursor, Marker, marker, parse_data_row, parse_header};

/// Parses a `.dat` file. See [`DatResult::from_file`].
pub fn parse_print_file<P: AsRef<Path>>(path: P) -> Result<DatResult> {
    DatResult::from_file(path)
}

impl ResultFile<DatEntity> {
    /// Reads a CalculiX `.dat` file.
    ///
    /// Fails with [`ResultError::UnsupportedFormatVersion`] if a result block
    /// appears before the first `S T E P` marker, which is the layout of
    /// files written by older CalculiX releases.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let result = Self::from_reader(BufReader::new(file))?;
        info!(
            path = %path.display(),
            result_sets = result.result_sets().len(),
            times = result.get_available_times().len(),
            "parsed .dat file"
        );
        Ok(result)
    }

    /// Reads `.dat` content from a buffered reader.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        DatParser::new(reader).run()
    }
}

struct DatParser<R> {
    lines: LineCursor<R>,
    /// `None` until the first step marker
    step_no: Option<u32>,
    increment_no: u32,
    analysis_type: AnalysisType,
    result_sets: Vec<ResultSet<DatEntity>>,
    step_infos: BTreeMap<u32, StepInfo>,
}

impl<R: BufRead> DatParser<R> {
    fn new(reader: R) -> Self {
        Self {
            lines: LineCursor::new(reader),
            step_no: None,
            increment_no: 0,
            analysis_type: AnalysisType::Static,
            result_sets: Vec::new(),
            step_infos: BTreeMap::new(),
        }
    }

    fn run(mut self) -> Result<DatResult> {
        while let Some(line) = self.lines.next_line()? {
            if let Some(m) = marker(&line) {
                self.on_marker(m)?;
                continue;
            }

            if let Some(header) = parse_header(&line.tokens) {
                let Some(step_no) = self.step_no else {
                    return Err(ResultError::UnsupportedFormatVersion { line: line.line_no });
                };
                self.read_result_block(header, step_no, line.line_no)?;
                continue;
            }

            trace!(line = line.line_no, "ignored");
        }

        Ok(ResultFile::new(self.result_sets, self.step_infos))
    }

    fn on_marker(&mut self, m: Marker) -> Result<()> {
        match m {
            Marker::Step(step_no) => {
                trace!(step_no, "step");
                self.step_no = Some(step_no);
                self.increment_no = 0;
                self.analysis_type = AnalysisType::Static;
            }
            Marker::Increment | Marker::EigenvalueNumber => self.increment_no += 1,
            Marker::EigenvalueOutput => {
                self.analysis_type = AnalysisType::Frequency;
                let step_no = self.current_step();
                let info = frequency_info(&mut self.step_infos, step_no);
                eigen::read_frequency_block(&mut self.lines, info)?;
                debug!(step_no, "read eigenvalue output");
            }
            Marker::BucklingFactorOutput => {
                self.analysis_type = AnalysisType::Buckling;
                let step_no = self.current_step();
                let info = buckling_info(&mut self.step_infos, step_no);
                eigen::read_buckling_block(&mut self.lines, info)?;
                debug!(step_no, "read buckling factor output");
            }
        }
        Ok(())
    }

    fn current_step(&self) -> u32 {
        self.step_no.unwrap_or(1)
    }

    fn read_result_block(&mut self, header: Header, step_no: u32, header_line: usize) -> Result<()> {
        let location = header.entity.location();
        let mut builder = ValuesBuilder::new(location);

        while let Some(line) = self.lines.next_line()? {
            match parse_data_row(&line.tokens, location) {
                Some((id, values)) => builder.push_row(id, values),
                None => {
                    self.lines.unread(line);
                    break;
                }
            }
        }

        if builder.is_empty() {
            trace!(line = header_line, entity = %header.entity, "result block without rows");
            return Ok(());
        }

        let (values, no_components) = builder
            .finish()
            .map_err(|message| ResultError::parse(header_line, message))?;

        let mut component_names = header.component_names;
        if component_names.len() > no_components {
            component_names.drain(..component_names.len() - no_components);
        }

        debug!(
            entity = %header.entity,
            step_no,
            increment = self.increment_no,
            step_time = header.step_time,
            ids = values.len(),
            "result set"
        );

        self.result_sets.push(ResultSet::new(
            header.entity,
            header.step_time,
            step_no,
            self.increment_no,
            self.analysis_type,
            header.set_name,
            component_names,
            values,
            no_components,
        ));
        Ok(())
    }
}

/// Frequency info of `step_no`, created on first use.
fn frequency_info(step_infos: &mut BTreeMap<u32, StepInfo>, step_no: u32) -> &mut FrequencyStepInfo {
    let entry = step_infos
        .entry(step_no)
        .or_insert_with(|| StepInfo::Frequency(FrequencyStepInfo::new(step_no)));
    if !matches!(entry, StepInfo::Frequency(_)) {
        warn!(step_no, "eigenvalue output replaces buckling output of the same step");
        *entry = StepInfo::Frequency(FrequencyStepInfo::new(step_no));
    }
    match entry {
        StepInfo::Frequency(info) => info,
        StepInfo::Buckling(_) => unreachable!("entry was just set to a frequency step"),
    }
}

fn buckling_info(step_infos: &mut BTreeMap<u32, StepInfo>, step_no: u32) -> &mut BucklingStepInfo {
    let entry = step_infos
        .entry(step_no)
        .or_insert_with(|| StepInfo::Buckling(BucklingStepInfo::new(step_no)));
    if !matches!(entry, StepInfo::Buckling(_)) {
        warn!(step_no, "buckling output replaces eigenvalue output of the same step");
        *entry = StepInfo::Buckling(BucklingStepInfo::new(step_no));
    }
    match entry {
        StepInfo::Buckling(info) => info,
        StepInfo::Frequency(_) => unreachable!("entry was just set to a buckling step"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ResultLocation;
    use crate::result::ResultQuery;

    fn parse(src: &str) -> Result<DatResult> {
        DatResult::from_reader(src.as_bytes())
    }

    #[test]
    fn single_displacement_block() {
        let src = "
                        S T E P       1

                                INCREMENT     1

 displacements (vx,vy,vz) for set N1 and    1.000000E+00

   1  1.0  2.0  3.0

";
        let dat = parse(src).unwrap();
        assert_eq!(dat.result_sets().len(), 1);
        let rs = &dat.result_sets()[0];
        assert_eq!(rs.entity, DatEntity::U);
        assert_eq!(rs.component_names, vec!["vx", "vy", "vz"]);
        assert_eq!(rs.set_name, "N1");
        assert_eq!(rs.step_time, 1.0);
        assert_eq!(rs.step_no, 1);
        assert_eq!(rs.step_increment_no, 1);
        assert_eq!(rs.analysis_type, AnalysisType::Static);
        assert_eq!(rs.vector(1).unwrap().as_slice(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn block_before_step_marker_is_an_old_format() {
        let src = "
 displacements (vx,vy,vz) for set N1 and time  1.000000E+00

   1  1.0  2.0  3.0
";
        let err = parse(src).unwrap_err();
        assert!(matches!(err, ResultError::UnsupportedFormatVersion { line: 2 }));
    }

    #[test]
    fn integration_point_rows_are_grouped_by_element() {
        let src = "
                        S T E P       1

                                INCREMENT     1

 stresses (elem, integ.pnt.,sxx,syy,szz,sxy,sxz,syz) for set EALL and time  0.1000000E+01

         1   1  1.0 2.0 3.0 4.0 5.0 6.0
         1   2  1.1 2.1 3.1 4.1 5.1 6.1
         2   1  7.0 8.0 9.0 1.0 2.0 3.0
 volume (element, volume) for set EALL and time  0.1000000E+01

         1  0.5000000E+00
         2  0.2500000E+00
";
        let dat = parse(src).unwrap();
        assert_eq!(dat.result_sets().len(), 2);

        let s = &dat.result_sets()[0];
        assert_eq!(s.entity_location, ResultLocation::IntegrationPoint);
        assert_eq!(s.no_components, 6);
        assert_eq!(s.component_names, vec!["sxx", "syy", "szz", "sxy", "sxz", "syz"]);
        assert_eq!(s.matrix(1).unwrap().shape(), (2, 6));
        assert_eq!(s.matrix(1).unwrap()[(1, 0)], 1.1);

        let v = &dat.result_sets()[1];
        assert_eq!(v.entity, DatEntity::EVOL);
        assert_eq!(v.entity_location, ResultLocation::Element);
        assert_eq!(v.component_names, vec!["volume"]);
        assert_eq!(v.vector(2).unwrap()[0], 0.25);
    }

    #[test]
    fn totals_are_never_read() {
        let src = "
                        S T E P       1

                                INCREMENT     1

 forces (fx,fy,fz) for set FIX and time  0.1000000E+01

         1 -1.0  0.0  0.0
         2 -2.0  0.0  0.0

 total force (fx,fy,fz) for set FIX and time  0.1000000E+01

        -3.0  0.0  0.0
";
        let dat = parse(src).unwrap();
        assert_eq!(dat.result_sets().len(), 1);
        assert_eq!(dat.result_sets()[0].ids(), vec![1, 2]);
    }

    #[test]
    fn increments_and_steps_are_counted() {
        let src = "
                        S T E P       1

                                INCREMENT     1

 displacements (vx,vy,vz) for set N1 and time  0.5000000E+00

   1  1.0  2.0  3.0

                                INCREMENT     2

 displacements (vx,vy,vz) for set N1 and time  0.1000000E+01

   1  2.0  4.0  6.0

                        S T E P       2

                                INCREMENT     1

 displacements (vx,vy,vz) for set N1 and time  0.2000000E+01

   1  3.0  6.0  9.0
";
        let dat = parse(src).unwrap();
        let keys: Vec<(u32, u32)> = dat
            .result_sets()
            .iter()
            .map(|rs| (rs.step_no, rs.step_increment_no))
            .collect();
        assert_eq!(keys, vec![(1, 1), (1, 2), (2, 1)]);
        assert_eq!(dat.get_available_times(), &[0.5, 1.0, 2.0]);
        let step2 = dat.get_result_sets_by(&ResultQuery::new().step_no(2));
        assert_eq!(step2.len(), 1);
        assert!(dat.get_step_info(1).is_none());
    }

    #[test]
    fn buckling_step_records_factors_and_modes() {
        let src = "
                        S T E P       1


     B U C K L I N G   F A C T O R   O U T P U T

 MODE NO       BUCKLING
                FACTOR

      1   0.1250000E+02
      2   0.3000000E+02

  E I G E N V A L U E   N U M B E R     1

 displacements (vx,vy,vz) for set NALL and time  0.1250000E+02

   1  0.0  1.0  0.0

  E I G E N V A L U E   N U M B E R     2

 displacements (vx,vy,vz) for set NALL and time  0.3000000E+02

   1  0.0  0.0  1.0
";
        let dat = parse(src).unwrap();
        let info = dat.get_step_info(1).and_then(StepInfo::as_buckling).unwrap();
        assert_eq!(info.get(2).unwrap().buckling_factor, 30.0);

        let modes: Vec<u32> = dat.result_sets().iter().map(|rs| rs.step_increment_no).collect();
        assert_eq!(modes, vec![1, 2]);
        assert!(dat
            .result_sets()
            .iter()
            .all(|rs| rs.analysis_type == AnalysisType::Buckling));
    }
}
