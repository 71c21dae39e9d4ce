//! Error types for the knowledge graph kit.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared by the store and the CLI.
#[derive(Error, Debug)]
pub enum KgkitError {
    /// The caller named a category the schema does not declare.
    #[error("Unknown entity category: {0}")]
    UnknownCategory(String),

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The graph document is not valid JSON or lacks a required top-level key.
    #[error("Malformed graph document {}: {source}", .path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl KgkitError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn format(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Format {
            path: path.into(),
            source,
        }
    }
}


pub type Result<T> = std::result::Result<T, KgkitError>;
