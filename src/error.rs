//! Error types for datamine
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)
//!
//! Nothing in the core is fatal to the process: every variant describes a
//! failed operation that is reported to the caller.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Datamine error types
#[derive(Error, Debug)]
pub enum Error {
    /// Lookup or removal of an absent registry entry (non-fatal, no state change)
    #[error("{kind} not found: '{name}'")]
    NotFound {
        /// Entry kind ("dataset" or "model")
        kind: &'static str,
        /// Requested name
        name: String,
    },

    /// Training precondition: fewer than 2 numeric columns
    #[error("Insufficient features: dataset needs at least 2 numeric columns, found {found}")]
    InsufficientFeatures {
        /// Number of numeric columns present
        found: usize,
    },

    /// Training precondition: no usable rows once missing targets are dropped
    #[error("Empty training set: no usable rows after dropping missing target values")]
    EmptyTrainingSet,

    /// Failure inside the fit step
    #[error("Training failed: {0}")]
    TrainingFailed(String),

    /// One item of a multi-item save failed
    #[error("Serialization of '{item}' failed: {cause}")]
    Serialization {
        /// Dataset or model name
        item: String,
        /// Underlying cause
        cause: String,
    },

    /// Loader does not handle this file type
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Loader could not decode a supported file
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Dataset lookup miss
    #[must_use]
    pub fn dataset_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "dataset",
            name: name.into(),
        }
    }

    /// Model lookup miss
    #[must_use]
    pub fn model_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "model",
            name: name.into(),
        }
    }

    /// Whether the error is a precondition or lookup miss that the caller
    /// should surface as a message rather than a failure.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::InsufficientFeatures { .. } | Self::EmptyTrainingSet
        )
    }
}
