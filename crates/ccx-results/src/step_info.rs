//! Per-step metadata of frequency and buckling steps.
//!
//! Only the `.dat` reader produces these. A frequency step carries
//! eigenvalues, participation factors and effective modal masses per mode;
//! a buckling step carries one buckling factor per mode. Both are keyed by
//! mode number, which is also the `step_increment_no` of the result sets
//! written for that mode.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{Result, ResultError};

/// Sense of rotation of an eigenmode in a cyclic symmetric frequency step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TurningDirection {
    Forward,
    Backward,
}

impl TurningDirection {
    pub(crate) fn from_code(code: &str) -> Option<Self> {
        match code {
            "F" => Some(TurningDirection::Forward),
            "B" => Some(TurningDirection::Backward),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyIncrementInfo {
    pub mode_no: u32,
    pub eigenvalue: f64,
    /// Real part of the eigenfrequency in rad/time
    pub angular_frequency: f64,
    /// Real part of the eigenfrequency in cycles/time
    pub frequency: f64,
    /// Imaginary part of the eigenfrequency in rad/time
    pub imaginary_frequency: f64,
    /// Only set in cyclic symmetric steps
    pub nodal_diameter: Option<u32>,
    /// X, Y, Z components followed by X, Y, Z rotations
    pub participation_factors: Option<[f64; 6]>,
    /// X, Y, Z components followed by X, Y, Z rotations
    pub effective_modal_mass: Option<[f64; 6]>,
    pub eigenmode_turning_direction: Option<TurningDirection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucklingIncrementInfo {
    pub mode_no: u32,
    pub buckling_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyStepInfo {
    pub step_no: u32,
    pub cyclic_symmetric: bool,
    pub total_effective_mass: Option<[f64; 6]>,
    pub axis_reference_direction: Option<[f64; 3]>,
    increments: BTreeMap<u32, FrequencyIncrementInfo>,
}

impl FrequencyStepInfo {
    pub(crate) fn new(step_no: u32) -> Self {
        Self {
            step_no,
            cyclic_symmetric: false,
            total_effective_mass: None,
            axis_reference_direction: None,
            increments: BTreeMap::new(),
        }
    }

    pub(crate) fn increments_mut(&mut self) -> &mut BTreeMap<u32, FrequencyIncrementInfo> {
        &mut self.increments
    }

    pub fn increments(&self) -> impl Iterator<Item = &FrequencyIncrementInfo> {
        self.increments.values()
    }

    pub fn get(&self, mode_no: u32) -> Option<&FrequencyIncrementInfo> {
        self.increments.get(&mode_no)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucklingStepInfo {
    pub step_no: u32,
    increments: BTreeMap<u32, BucklingIncrementInfo>,
}

impl BucklingStepInfo {
    pub(crate) fn new(step_no: u32) -> Self {
        Self {
            step_no,
            increments: BTreeMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, info: BucklingIncrementInfo) {
        self.increments.insert(info.mode_no, info);
    }

    pub fn increments(&self) -> impl Iterator<Item = &BucklingIncrementInfo> {
        self.increments.values()
    }

    pub fn get(&self, mode_no: u32) -> Option<&BucklingIncrementInfo> {
        self.increments.get(&mode_no)
    }
}

/// Metadata of one frequency or buckling step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StepInfo {
    Frequency(FrequencyStepInfo),
    Buckling(BucklingStepInfo),
}

/// Borrowed view of one mode of a [`StepInfo`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IncrementInfo<'a> {
    Frequency(&'a FrequencyIncrementInfo),
    Buckling(&'a BucklingIncrementInfo),
}

impl IncrementInfo<'_> {
    pub fn mode_no(&self) -> u32 {
        match self {
            IncrementInfo::Frequency(info) => info.mode_no,
            IncrementInfo::Buckling(info) => info.mode_no,
        }
    }
}

impl<'a> IncrementInfo<'a> {
    pub fn as_frequency(&self) -> Option<&'a FrequencyIncrementInfo> {
        match *self {
            IncrementInfo::Frequency(info) => Some(info),
            IncrementInfo::Buckling(_) => None,
        }
    }

    pub fn as_buckling(&self) -> Option<&'a BucklingIncrementInfo> {
        match *self {
            IncrementInfo::Buckling(info) => Some(info),
            IncrementInfo::Frequency(_) => None,
        }
    }
}

impl StepInfo {
    pub fn step_no(&self) -> u32 {
        match self {
            StepInfo::Frequency(info) => info.step_no,
            StepInfo::Buckling(info) => info.step_no,
        }
    }

    /// Mode numbers present in this step, ascending.
    pub fn increment_nos(&self) -> Vec<u32> {
        match self {
            StepInfo::Frequency(info) => info.increments.keys().copied().collect(),
            StepInfo::Buckling(info) => info.increments.keys().copied().collect(),
        }
    }

    pub fn get_increment_info(&self, increment_no: u32) -> Option<IncrementInfo<'_>> {
        match self {
            StepInfo::Frequency(info) => info.get(increment_no).map(IncrementInfo::Frequency),
            StepInfo::Buckling(info) => info.get(increment_no).map(IncrementInfo::Buckling),
        }
    }

    /// Returns the infos for `increment_nos` in the given order. Fails on the
    /// first mode number this step has no info for.
    pub fn get_increment_infos(&self, increment_nos: &[u32]) -> Result<Vec<IncrementInfo<'_>>> {
        increment_nos
            .iter()
            .map(|&no| {
                self.get_increment_info(no)
                    .ok_or_else(|| ResultError::MissingIncrement {
                        step_no: self.step_no(),
                        increment_no: no,
                    })
            })
            .collect()
    }

    pub fn as_frequency(&self) -> Option<&FrequencyStepInfo> {
        match self {
            StepInfo::Frequency(info) => Some(info),
            StepInfo::Buckling(_) => None,
        }
    }

    pub fn as_buckling(&self) -> Option<&BucklingStepInfo> {
        match self {
            StepInfo::Buckling(info) => Some(info),
            StepInfo::Frequency(_) => None,
        }
    }
}
