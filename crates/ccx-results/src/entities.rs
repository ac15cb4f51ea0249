//! Closed vocabularies of the CalculiX result files.
//!
//! Both readers map the names found in a file onto one of the enums below and
//! fail on anything outside the vocabulary: the location of a result set
//! (nodal, element, integration point) is looked up from the entity, so an
//! unknown name cannot be given a meaningful shape.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ResultError;

/// Where the values of a result entity live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResultLocation {
    Nodal,
    Element,
    IntegrationPoint,
}

/// Analysis procedure a result set belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AnalysisType {
    Static,
    Frequency,
    Buckling,
    Dynamic,
    /// User named or otherwise unclassified analysis
    Other,
}

impl AnalysisType {
    /// Maps the two character `ICTYPE` field of a `.frd` `100C` record.
    pub fn from_frd_code(code: &str) -> Result<Self, ResultError> {
        match code.trim() {
            "0" => Ok(AnalysisType::Static),
            "1" => Ok(AnalysisType::Dynamic),
            "2" => Ok(AnalysisType::Frequency),
            "3" => Ok(AnalysisType::Buckling),
            "4" => Ok(AnalysisType::Other),
            _ => Err(ResultError::UnsupportedAnalysisType(code.to_string())),
        }
    }
}

/// What `get_values_by_ids` does with an id that has no values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingIds {
    /// Fail with [`ResultError::MissingId`]
    Error,
    /// Substitute a zero block of the set's shape
    Zeros,
}

/// Entity vocabulary of one result file format.
pub trait ResultEntity:
    Copy + Eq + std::hash::Hash + fmt::Debug + Serialize + FromStr<Err = ResultError>
{
    /// Lookup policy shared by every result set of this format.
    const MISSING_IDS: MissingIds;

    /// Name of the entity as written in the result file.
    fn name(&self) -> &'static str;

    fn location(&self) -> ResultLocation;
}

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => ($text:literal, $loc:ident),)+
        }
    ) => {
        $(#[$meta])*
        #[allow(non_camel_case_types)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            fn lookup_location(&self) -> ResultLocation {
                match self {
                    $($name::$variant => ResultLocation::$loc,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = ResultError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ResultError::UnsupportedEntity(s.to_string())),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

vocabulary! {
    /// Entities written to the `.dat` file by `*NODE PRINT`, `*EL PRINT` and
    /// `*CONTACT PRINT`, keyed by their header text.
    pub enum DatEntity {
        /// Displacements
        U => ("displacements", Nodal),
        /// Total force
        RF => ("forces", Nodal),
        /// Temperatures
        NT => ("temperatures", Nodal),
        /// Velocities
        V => ("velocities", Nodal),
        /// Cauchy stress (structure)
        S => ("stresses", IntegrationPoint),
        /// Lagrange strain
        E => ("strains", IntegrationPoint),
        /// Mechanical strain
        ME => ("mechanical strains", IntegrationPoint),
        /// Equivalent plastic strain
        PEEQ => ("equivalent plastic strain", IntegrationPoint),
        /// Heat flux
        HFL => ("heat flux", IntegrationPoint),
        /// Volume
        EVOL => ("volume", Element),
        /// Global coordinates of the integration points
        COORD => ("global coordinates", IntegrationPoint),
        /// Internal energy density
        ENER => ("internal energy density", IntegrationPoint),
        /// Kinetic energy
        ELKE => ("kinetic energy", Element),
        /// Internal energy
        ELSE => ("internal energy", Element),
        /// Mass and mass moments of inertia
        EMAS => ("mass", Element),
        /// Contact energy
        CELS => ("contact print energy", Nodal),
        /// Contact stress
        CSTR => ("contact stress", Nodal),
        /// Relative contact displacement
        CDIS => ("relative contact displacement", Nodal),
    }
}

impl ResultEntity for DatEntity {
    const MISSING_IDS: MissingIds = MissingIds::Error;

    fn name(&self) -> &'static str {
        self.as_str()
    }

    fn location(&self) -> ResultLocation {
        self.lookup_location()
    }
}

vocabulary! {
    /// Entities written to the `.frd` file by `*NODE FILE`, `*EL FILE` and
    /// `*CONTACT FILE`, keyed by their `-4` record name. CalculiX
    /// extrapolates all of them to the nodes.
    pub enum FrdEntity {
        /// Stress intensity factor
        CT3D_MIS => ("CT3D-MIS", Nodal),
        /// Worst displacement orthogonal to a given vector in cyclic symmetric frequency calculations
        MDISP => ("MDISP", Nodal),
        /// Structural temperature; total temperature in a network
        NDTEMP => ("NDTEMP", Nodal),
        /// Magnitude and phase of temperature
        PNDTEMP => ("PNDTEMP", Nodal),
        /// Magnitude and phase of external forces
        PFORC => ("PFORC", Nodal),
        /// Magnitude and phase of displacement
        PDISP => ("PDISP", Nodal),
        /// Real part of total force
        FORC => ("FORC", Nodal),
        /// Imaginary part of total force
        FORCI => ("FORCI", Nodal),
        /// Sensitivity
        SEN => ("SEN", Nodal),
        /// Real part of displacement
        DISP => ("DISP", Nodal),
        /// Imaginary part of displacement
        DISPI => ("DISPI", Nodal),
        /// Velocity
        VELO => ("VELO", Nodal),
        /// Real part of Lagrange strain
        TOSTRAIN => ("TOSTRAIN", Nodal),
        /// Imaginary part of Lagrange strain
        TOSTRAII => ("TOSTRAII", Nodal),
        /// Internal energy density
        ENER => ("ENER", Nodal),
        /// Real part of error estimator for the worst principal stress
        ERROR => ("ERROR", Nodal),
        /// Imaginary part of error estimator for the worst principal stress
        ERRORI => ("ERRORI", Nodal),
        /// Real part of error estimator for the temperature
        HERROR => ("HERROR", Nodal),
        /// Imaginary part of error estimator for the temperature
        HERRORI => ("HERRORI", Nodal),
        /// Heat flux in a structure
        FLUX => ("FLUX", Nodal),
        /// Worst principal strain in cyclic symmetric frequency calculations
        MSTRAIN => ("MSTRAIN", Nodal),
        /// Worst principal stress in cyclic symmetric frequency calculations
        MSTRESS => ("MSTRESS", Nodal),
        /// Real part of mechanical strain
        MESTRAIN => ("MESTRAIN", Nodal),
        /// Imaginary part of mechanical strain
        MESTRAII => ("MESTRAII", Nodal),
        /// Equivalent plastic strain
        PE => ("PE", Nodal),
        /// Real part of Cauchy stress (structure)
        STRESS => ("STRESS", Nodal),
        /// Imaginary part of Cauchy stress (structure)
        STRESSI => ("STRESSI", Nodal),
        /// Thermal strain
        THSTRAIN => ("THSTRAIN", Nodal),
        /// Real part of Zienkiewicz-Zhu stress
        ZZSTR => ("ZZSTR", Nodal),
        /// Imaginary part of Zienkiewicz-Zhu stress
        ZZSTRI => ("ZZSTRI", Nodal),
        /// Real part of relative contact displacements
        CONTACT => ("CONTACT", Nodal),
        /// Imaginary part of relative contact displacements
        CONTACTI => ("CONTACTI", Nodal),
        /// Contact energy
        CELS => ("CELS", Nodal),
        /// Amplitude and phase of the relative contact displacements and contact stresses
        PCONTAC => ("PCONTAC", Nodal),
    }
}

impl ResultEntity for FrdEntity {
    const MISSING_IDS: MissingIds = MissingIds::Zeros;

    fn name(&self) -> &'static str {
        self.as_str()
    }

    fn location(&self) -> ResultLocation {
        self.lookup_location()
    }
}
