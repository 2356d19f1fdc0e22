//! Error types shared by the conversion pipeline
//!
//! Every failure aborts the whole conversion. The variants carry the
//! offending parameter, path or address so the operator can fix the input.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    /// Calibration or option value missing, malformed or out of range
    #[error("invalid configuration `{field}`: {reason}")]
    Config { field: String, reason: String },

    /// A source image could not be read or decoded
    #[error("source unavailable {path:?}: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    /// Declared tile/frame geometry does not fit the source data
    #[error("layout mismatch: {0}")]
    LayoutMismatch(String),

    /// The finished image could not be encoded or moved into place
    #[error("cannot write output {path:?}: {reason}")]
    Output { path: PathBuf, reason: String },
}

impl ConvertError {
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
