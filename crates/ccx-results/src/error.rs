//! Error types for ccx-results

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResultError>;

#[derive(Error, Debug)]
pub enum ResultError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A `.dat` data block appeared before any `S T E P` marker. Files written
    /// by older CalculiX releases look like this.
    #[error("unsupported .dat format version: result block at line {line} precedes the first STEP marker")]
    UnsupportedFormatVersion { line: usize },

    #[error("unsupported result entity: {0:?}")]
    UnsupportedEntity(String),

    #[error("unsupported analysis type code: {0:?}")]
    UnsupportedAnalysisType(String),

    #[error("unsupported .frd format flag {0} (only ASCII short/long format can be read)")]
    UnsupportedFrdFormat(i32),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("id {0} not found in result set")]
    MissingId(u32),

    #[error("step {step_no} has no info for increment {increment_no}")]
    MissingIncrement { step_no: u32, increment_no: u32 },

    #[error("expected 6 tensor components per row, got {0}")]
    InvalidTensorWidth(usize),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ResultError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        ResultError::Parse {
            line,
            message: message.into(),
        }
    }
}
