//! Error types for the shepherd client seams

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur talking to the grid, the replica catalog, or the
/// transfer tool.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Local I/O failed (spawning a tool, touching the output directory)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The identifier store a submission was supposed to write is missing
    /// or unparsable
    #[error("identifier store {path} unusable: {reason}")]
    IdStore {
        /// Path the store was expected at
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// A submission command finished without creating jobs
    #[error("submission failed: {0}")]
    Submission(String),

    /// The grid rejected or failed an operation
    #[error("grid error: {0}")]
    Grid(String),

    /// The replica catalog rejected or failed a listing
    #[error("catalog error: {0}")]
    Catalog(String),
}

impl ClientError {
    /// Create an identifier-store error for `path`
    pub fn id_store(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::IdStore {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
