//! Eigenvalue and buckling factor blocks of frequency and buckling steps.
//!
//! A frequency block looks like
//!
//! ```text
//!      E I G E N V A L U E   O U T P U T
//!
//!  MODE NO    EIGENVALUE                       FREQUENCY
//!                                      REAL PART            IMAGINARY PART
//!                            (RAD/TIME)      (CYCLES/TIME     (RAD/TIME)
//!
//!       1   0.1234567E+08   0.3513642E+04   0.5592101E+03   0.0000000E+00
//!
//!      P A R T I C I P A T I O N   F A C T O R S
//!  ...
//!      E F F E C T I V E   M O D A L   M A S S
//!  ...
//! ```
//!
//! Each sub-block skips its column headers, then reads rows until the first
//! line that is not a row of the expected shape. Cyclic symmetric steps add
//! a nodal diameter column (announced by a `DIAMETER` header) and an
//! optional eigenmode turning direction sub-block.

use std::io::BufRead;

use tracing::trace;

use super::lines::{DatLine, LineCursor, marker, parse_floats, parse_header};
use crate::error::Result;
use crate::step_info::{
    BucklingIncrementInfo, BucklingStepInfo, FrequencyIncrementInfo, FrequencyStepInfo,
    TurningDirection,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Eigenvalues,
    ParticipationFactors,
    EffectiveModalMass,
    TotalEffectiveMass,
    TurningDirection,
}

fn section_header(condensed: &str) -> Option<Section> {
    if condensed.starts_with("PARTICIPATIONFACTORS") {
        Some(Section::ParticipationFactors)
    } else if condensed.starts_with("EFFECTIVEMODALMASS") {
        Some(Section::EffectiveModalMass)
    } else if condensed.starts_with("TOTALEFFECTIVEMASS") {
        Some(Section::TotalEffectiveMass)
    } else if condensed.starts_with("EIGENMODETURNINGDIRECTION") {
        Some(Section::TurningDirection)
    } else {
        None
    }
}

/// Lines the metadata parsers must never swallow: markers and result-set
/// headers belong to the enclosing state.
fn is_boundary(line: &DatLine) -> bool {
    marker(line).is_some() || parse_header(&line.tokens).is_some()
}

/// Reads a buckling factor block into `info`. Stops at the first non-row
/// line after the rows started, which is handed back to `lines`.
pub(crate) fn read_buckling_block<R: BufRead>(
    lines: &mut LineCursor<R>,
    info: &mut BucklingStepInfo,
) -> Result<()> {
    let mut started = false;
    while let Some(line) = lines.next_line()? {
        if is_boundary(&line) {
            lines.unread(line);
            break;
        }
        match parse_buckling_row(&line.tokens) {
            Some(row) => {
                info.insert(row);
                started = true;
            }
            None if started => {
                lines.unread(line);
                break;
            }
            None => trace!(line = line.line_no, "skipping buckling header line"),
        }
    }
    Ok(())
}

fn parse_buckling_row(tokens: &[String]) -> Option<BucklingIncrementInfo> {
    let mode_no = tokens.first()?.parse().ok()?;
    let [buckling_factor] = parse_floats::<1>(tokens, 1)?;
    Some(BucklingIncrementInfo {
        mode_no,
        buckling_factor,
    })
}

/// Reads an eigenvalue output block (with its participation factor, modal
/// mass and turning direction sub-blocks) into `info`, joining all rows by
/// mode number.
pub(crate) fn read_frequency_block<R: BufRead>(
    lines: &mut LineCursor<R>,
    info: &mut FrequencyStepInfo,
) -> Result<()> {
    let mut section = Section::Eigenvalues;
    let mut started = false;

    while let Some(line) = lines.next_line()? {
        if is_boundary(&line) {
            lines.unread(line);
            break;
        }

        let condensed = line.condensed();
        if let Some(next) = section_header(&condensed) {
            trace!(line = line.line_no, section = ?next, "frequency sub-block");
            section = next;
            started = false;
            continue;
        }
        if condensed.starts_with("AXISREFERENCEDIRECTION") {
            let n = line.tokens.len();
            info.axis_reference_direction = n
                .checked_sub(3)
                .and_then(|start| parse_floats::<3>(&line.tokens, start));
            continue;
        }
        if section == Section::Eigenvalues && !started && line.tokens.iter().any(|t| t == "DIAMETER") {
            info.cyclic_symmetric = true;
            continue;
        }

        if apply_row(section, &line.tokens, info) {
            started = true;
        } else if started {
            lines.unread(line);
            break;
        } else {
            trace!(line = line.line_no, "skipping frequency header line");
        }
    }
    Ok(())
}

/// Applies one row of `section` to `info`. Returns false if the tokens are
/// not a row of that section.
fn apply_row(section: Section, tokens: &[String], info: &mut FrequencyStepInfo) -> bool {
    match section {
        Section::Eigenvalues => match parse_eigenvalue_row(tokens, info.cyclic_symmetric) {
            Some(row) => {
                info.increments_mut().insert(row.mode_no, row);
                true
            }
            None => false,
        },
        Section::ParticipationFactors => match parse_mode_vector(tokens) {
            Some((mode_no, factors)) => {
                update_mode(info, mode_no, |inc| inc.participation_factors = Some(factors));
                true
            }
            None => false,
        },
        Section::EffectiveModalMass => {
            if let Some((mode_no, mass)) = parse_mode_vector(tokens) {
                update_mode(info, mode_no, |inc| inc.effective_modal_mass = Some(mass));
                return true;
            }
            // some releases close the modal mass table with a TOTAL row
            match tokens.first() {
                Some(first) if first == "TOTAL" => match parse_floats::<6>(tokens, 1) {
                    Some(total) => {
                        info.total_effective_mass = Some(total);
                        true
                    }
                    None => false,
                },
                _ => false,
            }
        }
        Section::TotalEffectiveMass => match parse_floats::<6>(tokens, 0) {
            Some(total) => {
                info.total_effective_mass = Some(total);
                true
            }
            None => false,
        },
        Section::TurningDirection => match parse_turning_row(tokens) {
            Some((mode_no, direction)) => {
                update_mode(info, mode_no, |inc| {
                    inc.eigenmode_turning_direction = Some(direction)
                });
                true
            }
            None => false,
        },
    }
}

fn update_mode(
    info: &mut FrequencyStepInfo,
    mode_no: u32,
    apply: impl FnOnce(&mut FrequencyIncrementInfo),
) {
    match info.increments_mut().get_mut(&mode_no) {
        Some(inc) => apply(inc),
        None => trace!(mode_no, "row for a mode without eigenvalue ignored"),
    }
}

fn parse_eigenvalue_row(tokens: &[String], cyclic: bool) -> Option<FrequencyIncrementInfo> {
    let (nodal_diameter, mode_idx) = if cyclic {
        (Some(tokens.first()?.parse().ok()?), 1)
    } else {
        (None, 0)
    };
    let mode_no = tokens.get(mode_idx)?.parse().ok()?;
    let [eigenvalue, angular_frequency, frequency] = parse_floats::<3>(tokens, mode_idx + 1)?;
    let imaginary_frequency = match tokens.get(mode_idx + 4) {
        Some(t) => t.parse().ok()?,
        None => 0.0,
    };

    Some(FrequencyIncrementInfo {
        mode_no,
        eigenvalue,
        angular_frequency,
        frequency,
        imaginary_frequency,
        nodal_diameter,
        participation_factors: None,
        effective_modal_mass: None,
        eigenmode_turning_direction: None,
    })
}

fn parse_mode_vector(tokens: &[String]) -> Option<(u32, [f64; 6])> {
    let mode_no = tokens.first()?.parse().ok()?;
    Some((mode_no, parse_floats::<6>(tokens, 1)?))
}

/// `<nodal diameter> <mode> <F|B>`
fn parse_turning_row(tokens: &[String]) -> Option<(u32, TurningDirection)> {
    let (code, rest) = tokens.split_last()?;
    let direction = TurningDirection::from_code(code)?;
    let mode_no = rest.last()?.parse().ok()?;
    Some((mode_no, direction))
}
