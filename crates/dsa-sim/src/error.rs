//! Errors surfaced by a generation or replay run.

use crate::config::ConfigError;
use dsa_core::{DsaError, PropagationError};

/// Result type for simulator operations.
pub type SimResult<T> = Result<T, SimError>;

/// Errors that stop a run.
///
/// Per-sample propagation faults never reach this type; the driver logs and
/// discards those samples.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Core(#[from] DsaError),

    #[error("propagation model: {0}")]
    Propagation(#[from] PropagationError),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("summary serialization: {0}")]
    Json(#[from] serde_json::Error),

    #[error("worker {worker} failed: {source}")]
    Worker {
        worker: usize,
        #[source]
        source: Box<SimError>,
    },
}

impl SimError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        SimError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn in_worker(self, worker: usize) -> Self {
        SimError::Worker {
            worker,
            source: Box::new(self),
        }
    }
}
