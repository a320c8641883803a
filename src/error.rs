//! Error types for trueno-train
//!
//! Every failure is surfaced to the caller; nothing is retried. [`Error::kind`]
//! collapses the variants into the three classes a caller acts on.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error class, used for reporting and exit handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid parameters.
    Config,
    /// Missing or malformed dataset.
    Data,
    /// Filesystem or tracking-store failure.
    Io,
    /// Model fitting rejected its input.
    Model,
}

/// trueno-train error types
#[derive(Error, Debug)]
pub enum Error {
    /// Parameter file missing, malformed, or holding an out-of-range value
    #[error("Configuration error in {path}: {message}")]
    Config {
        /// File the parameters came from (or `<inline>`)
        path: PathBuf,
        /// What is wrong with it
        message: String,
    },

    /// Invalid value detected after the file was parsed
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Dataset missing, malformed, or lacking the label column
    #[error("Data error: {0}")]
    Data(String),

    /// Model fitting or prediction failed
    #[error("Model error: {0}")]
    Model(String),

    /// Tracking store rejected an operation (closed run, conflicting param, unknown id)
    #[error("Tracking error: {0}")]
    Tracking(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// JSON (de)serialization of tracking records or model files
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a [`Error::Config`] for the given file.
    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Map this error onto its class.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } | Self::InvalidParameter(_) => ErrorKind::Config,
            Self::Data(_) | Self::Arrow(_) | Self::Parquet(_) => ErrorKind::Data,
            Self::Model(_) => ErrorKind::Model,
            Self::Tracking(_) | Self::Io(_) | Self::Json(_) => ErrorKind::Io,
        }
    }
}
