//! Model checkpoints.
//!
//! Weights are stored with Burn's named MessagePack recorder in full
//! precision. The recorder appends the `.mpk` extension, so a checkpoint
//! saved as `dir/best` lives in `dir/best.mpk`. A small JSON file with
//! [`CheckpointMetadata`] can sit next to it.
//!
//! # Example
//!
//! ```rust,ignore
//! use tsf_models::ModelCheckpoint;
//!
//! model.save_checkpoint(dir.join("best"))?;
//! let fresh = config.init::<NdArray>(&dims, &device)?;
//! let restored = fresh.load_checkpoint(dir.join("best"), &device)?;
//! ```

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use serde::{Deserialize, Serialize};

/// Extension added by the recorder.
pub const CHECKPOINT_EXTENSION: &str = "mpk";

/// Path of the weights file written for `path`.
#[must_use]
pub fn checkpoint_file(path: impl AsRef<Path>) -> PathBuf {
    path.as_ref().with_extension(CHECKPOINT_EXTENSION)
}

/// Save the weights of a model.
///
/// # Errors
///
/// [`CheckpointError::Save`] when the recorder fails.
pub fn save_model<B, M>(model: &M, path: impl AsRef<Path>) -> Result<()>
where
    B: Backend,
    M: Module<B>,
{
    let path = path.as_ref();
    let record = model.clone().into_record();
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    recorder
        .record(record, path.to_path_buf())
        .map_err(|e| CheckpointError::Save(e.to_string()))?;
    tracing::debug!(path = %checkpoint_file(path).display(), "saved checkpoint");
    Ok(())
}

/// Load saved weights into a freshly built model of the same shape.
///
/// # Errors
///
/// [`CheckpointError::NotFound`] when the weights file is missing,
/// [`CheckpointError::Load`] when it cannot be decoded.
pub fn load_model<B, M>(model: M, path: impl AsRef<Path>, device: &B::Device) -> Result<M>
where
    B: Backend,
    M: Module<B>,
{
    let path = path.as_ref();
    let file = checkpoint_file(path);
    if !file.is_file() {
        return Err(CheckpointError::NotFound(file));
    }
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    let record = recorder
        .load(path.to_path_buf(), device)
        .map_err(|e| CheckpointError::Load(e.to_string()))?;
    Ok(model.load_record(record))
}

/// Metadata stored next to a checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Checkpoint name.
    pub name: String,
    /// Epoch the weights come from.
    pub epoch: Option<usize>,
    /// Validation loss at that epoch.
    pub val_loss: Option<f32>,
}

impl CheckpointMetadata {
    /// Create metadata for the checkpoint `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            epoch: None,
            val_loss: None,
        }
    }

    /// Set the epoch.
    #[must_use]
    pub fn with_epoch(mut self, epoch: usize) -> Self {
        self.epoch = Some(epoch);
        self
    }

    /// Set the validation loss.
    #[must_use]
    pub fn with_val_loss(mut self, loss: f32) -> Self {
        self.val_loss = Some(loss);
        self
    }

    /// Save as pretty JSON.
    ///
    /// # Errors
    ///
    /// [`CheckpointError::Save`] on I/O or encoding failures.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| CheckpointError::Save(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| CheckpointError::Save(e.to_string()))?;
        Ok(())
    }

    /// Load from JSON.
    ///
    /// # Errors
    ///
    /// [`CheckpointError::Load`] on I/O or decoding failures.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| CheckpointError::Load(e.to_string()))?;
        serde_json::from_str(&json).map_err(|e| CheckpointError::Load(e.to_string()))
    }
}

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Checkpoint errors.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Error saving a checkpoint.
    #[error("Failed to save checkpoint: {0}")]
    Save(String),

    /// Error loading a checkpoint.
    #[error("Failed to load checkpoint: {0}")]
    Load(String),

    /// The weights file does not exist.
    #[error("Checkpoint not found: {}", .0.display())]
    NotFound(PathBuf),
}

/// Checkpoint methods on every module.
pub trait ModelCheckpoint<B: Backend>: Module<B> {
    /// Save the weights to `path` (`.mpk` is appended).
    ///
    /// # Errors
    ///
    /// See [`save_model`].
    fn save_checkpoint(&self, path: impl AsRef<Path>) -> Result<()> {
        save_model::<B, Self>(self, path)
    }

    /// Return a copy of this model with the weights saved at `path`.
    ///
    /// # Errors
    ///
    /// See [`load_model`].
    fn load_checkpoint(&self, path: impl AsRef<Path>, device: &B::Device) -> Result<Self>
    where
        Self: Sized,
    {
        load_model::<B, Self>(self.clone(), path, device)
    }
}

impl<B: Backend, M: Module<B>> ModelCheckpoint<B> for M {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear::LinearTSConfig;
    use crate::spec::ForecastDims;
    use burn_ndarray::NdArray;
    use tsf_core::{ForecastBatch, ForecastModel};

    type TestBackend = NdArray;

    #[test]
    fn test_metadata_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("best.json");
        let meta = CheckpointMetadata::new("best").with_epoch(7).with_val_loss(0.25);
        meta.save(&path).unwrap();

        let loaded = CheckpointMetadata::load(&path).unwrap();
        assert_eq!(loaded, meta);
        assert_eq!(loaded.epoch, Some(7));
    }

    #[test]
    fn test_save_and_load_weights() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let dims = ForecastDims::new(8, 2, 1, 0, 1);
        let config = LinearTSConfig {
            dropout: 0.0,
            ..Default::default()
        };
        let model = config.init::<TestBackend>(&dims, &device).unwrap();
        model.save_checkpoint(dir.path().join("last")).unwrap();
        assert!(checkpoint_file(dir.path().join("last")).is_file());

        let fresh = config.init::<TestBackend>(&dims, &device).unwrap();
        let restored = fresh.load_checkpoint(dir.path().join("last"), &device).unwrap();

        let x = Tensor::<TestBackend, 3>::ones([1, 8, 1], &device);
        let batch = ForecastBatch::new(x, vec![0]).unwrap();
        let a = model.forward(&batch).into_data().to_vec::<f32>().unwrap();
        let b = restored.forward(&batch).into_data().to_vec::<f32>().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_checkpoint() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let dims = ForecastDims::new(8, 2, 1, 0, 1);
        let model = LinearTSConfig::default().init::<TestBackend>(&dims, &device).unwrap();
        let err = model.load_checkpoint(dir.path().join("nope"), &device).unwrap_err();
        assert!(matches!(err, CheckpointError::NotFound(_)));
    }
}
