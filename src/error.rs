//! Error types for the board and its command-line surface.

use std::path::PathBuf;

use thiserror::Error;

/// Failures from persistence and import.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Import data has no `taskGroups` field")]
    MissingTaskGroups,

    #[error("Import data has an invalid shape: {0}")]
    InvalidShape(String),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io { path: path.into(), source }
    }
}

/// Result type used by the store and persistence layers.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Failures surfaced by command handlers.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("No {kind} found matching '{reference}'")]
    NotFound { kind: &'static str, reference: String },

    #[error("Multiple {kind}s match '{reference}':\n{candidates}\nPlease use the id instead.")]
    Ambiguous {
        kind: &'static str,
        reference: String,
        candidates: String,
    },

    #[error("Could not understand due date '{0}'. Try YYYY-MM-DD, 'today', 'tomorrow' or 'in 3d'.")]
    InvalidDate(String),

    #[error("{0} cannot be empty")]
    Empty(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}
