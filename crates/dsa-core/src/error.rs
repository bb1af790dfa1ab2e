//! Error types for the spectrum allocation core.

use thiserror::Error;

/// Result type for fallible core operations.
pub type DsaResult<T> = Result<T, DsaError>;

/// Configuration and input errors.
///
/// These are raised while building entities or parsing inputs and are meant
/// to stop the worker that hit them. Propagation faults have their own type,
/// see [`crate::propagation::PropagationError`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DsaError {
    #[error("beta must be non-zero for the BETA interference method")]
    InvalidBeta,

    #[error("PUR minimum distance {min} is larger than maximum distance {max}")]
    InvalidPurDistance { min: f64, max: f64 },

    #[error("weight table is {rows}x{cols} but the shape needs {expected_rows}x{expected_cols}")]
    WeightTableMismatch {
        rows: usize,
        cols: usize,
        expected_rows: usize,
        expected_cols: usize,
    },

    #[error("shape has no probability weight table attached")]
    MissingWeightTable,

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("i/o error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl DsaError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        DsaError::Parse {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        DsaError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}
