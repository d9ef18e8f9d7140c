//! Error types for training.

use thiserror::Error;

/// Result type alias for training operations.
pub type Result<T> = std::result::Result<T, TrainError>;

/// Errors that can occur during training and prediction.
#[derive(Error, Debug)]
pub enum TrainError {
    /// A batch without targets reached the loss.
    #[error("Batch has no targets")]
    MissingTarget,

    /// The loss became NaN or infinite.
    #[error("Non-finite loss at epoch {epoch}")]
    NonFiniteLoss {
        /// Epoch of the failing batch.
        epoch: usize,
    },

    /// Invalid trainer, optimizer or loss configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Tensor data could not be read back or reshaped.
    #[error("Tensor error: {0}")]
    Tensor(String),

    /// Data error.
    #[error("Data error: {0}")]
    DataError(#[from] tsf_data::DataError),

    /// Core error.
    #[error("Core error: {0}")]
    CoreError(#[from] tsf_core::CoreError),

    /// Model error.
    #[error("Model error: {0}")]
    ModelError(#[from] tsf_models::ModelError),

    /// Checkpoint error.
    #[error("Checkpoint error: {0}")]
    CheckpointError(#[from] tsf_models::CheckpointError),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
