//! Error types for model construction.

use thiserror::Error;

/// Errors raised while configuring or building a model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Quantiles must be empty or three increasing values in (0, 1).
    #[error("Invalid quantiles {0:?}: expected none or three increasing values in (0, 1)")]
    InvalidQuantiles(Vec<f32>),

    /// A dimension is zero or inconsistent.
    #[error("Invalid dimensions: {0}")]
    InvalidDims(String),

    /// A hyperparameter is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Checkpoint failure.
    #[error(transparent)]
    Checkpoint(#[from] crate::checkpoint::CheckpointError),
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
