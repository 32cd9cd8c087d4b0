//! Error taxonomy for the surrogate pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, PreceptError>;

/// Errors raised by training, metadata handling and inference
#[derive(Debug, Error)]
pub enum PreceptError {
    /// Column specification or training configuration is inconsistent
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A table is missing columns, is ragged, or holds non-numeric values
    #[error("data shape error: {0}")]
    DataShape(String),

    /// Sidecar document is incomplete or does not match its declared arity
    #[error("metadata error: {0}")]
    MetadataCodec(String),

    /// Model artifact is absent, unreadable or incompatible with the metadata
    #[error("model load error: {0}")]
    ModelLoad(String),

    /// Model execution failed or produced unusable output
    #[error("inference error: {0}")]
    Inference(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl PreceptError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors caused by the caller's data rather than the system
    pub fn is_data_error(&self) -> bool {
        matches!(self, PreceptError::DataShape(_))
    }
}
