//! Error types for tsf_core.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur in tsf_core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Shape mismatch between tensors of one batch.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Target index pointing outside the past channels.
    #[error("Target index {index} out of range for {channels} past channels")]
    TargetIndex {
        /// The offending index.
        index: usize,
        /// Number of past numerical channels.
        channels: usize,
    },

    /// Unknown split name.
    #[error("Unknown split '{0}', expected train, validation or test")]
    UnknownSplit(String),

    /// Tensor data could not be read back.
    #[error("Tensor data error: {0}")]
    TensorData(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}
