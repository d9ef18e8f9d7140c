//! Backends and the trained model held by a [`crate::TimeSeries`].

use std::path::Path;

use burn::module::AutodiffModule;
use burn_autodiff::Autodiff;
use burn_ndarray::{NdArray, NdArrayDevice};
use tsf_core::ForecastModel;
use tsf_data::ForecastDataLoader;
use tsf_models::{AnyModel, Attention, ForecastDims, LinearTS, ModelCheckpoint, ModelSpec, Persistent, RNN};
use tsf_train::{predict, ForecastTrainer, LossHistory, Predictions, TrainingOutput};

use crate::error::Result;

/// Backend used for training (CPU with autodiff).
pub type TrainBackend = Autodiff<NdArray>;

/// Backend used for inference (CPU only).
pub type InferBackend = NdArray;

/// An inference-ready model, one variant per architecture.
#[derive(Debug)]
pub enum TrainedModel {
    /// Linear, DLinear or NLinear.
    Linear(LinearTS<InferBackend>),
    /// LSTM/GRU encoder-decoder.
    Rnn(RNN<InferBackend>),
    /// Transformer encoder-decoder.
    Attention(Attention<InferBackend>),
    /// Persistence baseline.
    Persistent(Persistent<InferBackend>),
}

impl TrainedModel {
    /// Build the model described by `spec` and load the weights saved at `path`.
    ///
    /// # Errors
    ///
    /// Fails when the model cannot be built or the checkpoint is missing or
    /// does not match the architecture.
    pub fn load(spec: &ModelSpec, dims: &ForecastDims, path: impl AsRef<Path>, device: &NdArrayDevice) -> Result<Self> {
        let path = path.as_ref();
        Ok(match spec.build::<InferBackend>(dims, device)? {
            AnyModel::Linear(m) => Self::Linear(m.load_checkpoint(path, device)?),
            AnyModel::Rnn(m) => Self::Rnn(m.load_checkpoint(path, device)?),
            AnyModel::Attention(m) => Self::Attention(m.load_checkpoint(path, device)?),
            AnyModel::Persistent(m) => Self::Persistent(m.load_checkpoint(path, device)?),
        })
    }

    /// Forecast every window of `loader`.
    pub fn predict(&self, loader: &ForecastDataLoader, device: &NdArrayDevice) -> Result<Predictions> {
        Ok(match self {
            Self::Linear(m) => predict::<InferBackend, _>(m, loader, device)?,
            Self::Rnn(m) => predict::<InferBackend, _>(m, loader, device)?,
            Self::Attention(m) => predict::<InferBackend, _>(m, loader, device)?,
            Self::Persistent(m) => predict::<InferBackend, _>(m, loader, device)?,
        })
    }

    /// Predicted quantiles, empty for point forecasts.
    #[must_use]
    pub fn quantiles(&self) -> &[f32] {
        match self {
            Self::Linear(m) => ForecastModel::<InferBackend>::quantiles(m),
            Self::Rnn(m) => ForecastModel::<InferBackend>::quantiles(m),
            Self::Attention(m) => ForecastModel::<InferBackend>::quantiles(m),
            Self::Persistent(m) => ForecastModel::<InferBackend>::quantiles(m),
        }
    }
}

/// Outcome of a training run; the last model stays in its checkpoint.
pub(crate) struct FittedModels {
    pub best: TrainedModel,
    pub losses: LossHistory,
    pub best_epoch: usize,
    pub best_val_loss: f32,
}

impl FittedModels {
    fn from_output<M>(output: TrainingOutput<M>, wrap: impl Fn(M::InnerModule) -> TrainedModel) -> Self
    where
        M: AutodiffModule<TrainBackend>,
    {
        Self {
            best: wrap(output.model.valid()),
            losses: output.losses,
            best_epoch: output.best_epoch,
            best_val_loss: output.best_val_loss,
        }
    }
}

/// Train whichever architecture `model` holds.
pub(crate) fn fit_any(
    model: AnyModel<TrainBackend>,
    trainer: &ForecastTrainer<TrainBackend>,
    train: &ForecastDataLoader,
    valid: Option<&ForecastDataLoader>,
) -> Result<FittedModels> {
    Ok(match model {
        AnyModel::Linear(m) => FittedModels::from_output(trainer.fit(m, train, valid)?, TrainedModel::Linear),
        AnyModel::Rnn(m) => FittedModels::from_output(trainer.fit(m, train, valid)?, TrainedModel::Rnn),
        AnyModel::Attention(m) => FittedModels::from_output(trainer.fit(m, train, valid)?, TrainedModel::Attention),
        AnyModel::Persistent(m) => {
            FittedModels::from_output(trainer.fit(m, train, valid)?, TrainedModel::Persistent)
        }
    })
}
