//! Error types for the `TimeSeries` object.

use thiserror::Error;

/// Result type alias using [`TsfError`].
pub type Result<T> = std::result::Result<T, TsfError>;

/// Errors raised by [`crate::TimeSeries`].
#[derive(Error, Debug)]
pub enum TsfError {
    /// No signal loaded yet.
    #[error("No signal loaded, call load_signal or generate_signal first")]
    NoSignal,

    /// No model described yet.
    #[error("No model set, call set_model first")]
    NoModel,

    /// No trained or loaded model.
    #[error("No trained model, call train_model or load first")]
    NotTrained,

    /// Split parameters are missing.
    #[error("No split parameters, call split_for_train or train_model first")]
    NoSplit,

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Data error.
    #[error("Data error: {0}")]
    Data(#[from] tsf_data::DataError),

    /// Core error.
    #[error("Core error: {0}")]
    Core(#[from] tsf_core::CoreError),

    /// Model error.
    #[error("Model error: {0}")]
    Model(#[from] tsf_models::ModelError),

    /// Checkpoint error.
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] tsf_models::CheckpointError),

    /// Training error.
    #[error("Training error: {0}")]
    Train(#[from] tsf_train::TrainError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
