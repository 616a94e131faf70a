//! Error types shared by every engine operation.
//!
//! The `Display` text of each variant is what the CLI prints on stderr, and
//! desktop front-ends match on some of those strings, so wording changes
//! should be made with care.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort an engine operation.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Missing or rejected credentials, or no way to prompt for them.
    #[error("{0}")]
    Auth(String),

    /// Local configuration problem (missing project id, refusing to overwrite, ...).
    #[error("{0}")]
    Config(String),

    /// Non-success HTTP status or malformed remote response.
    #[error("{0}")]
    Network(String),

    /// Root folder id could not be resolved by any strategy.
    #[error("{0}")]
    Resolution(String),

    /// The external archive tool failed.
    #[error("{0}")]
    Extraction(String),

    /// Filesystem error for a specific path.
    #[error("I/O error for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A local JSON file could not be parsed or written.
    #[error("Invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SyncError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        SyncError::Json {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
