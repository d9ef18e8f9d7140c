//! Model traits for forecasting.
//!
//! Defines the trait every forecasting model implements so the trainer, the
//! predictor and the `TimeSeries` object can drive it without knowing its
//! architecture.

use burn::prelude::*;

use crate::batch::{BatchLayout, ForecastBatch};
use crate::error::Result;

/// Trait for multi-step, multi-output forecasting models.
pub trait ForecastModel<B: Backend>: Module<B> {
    /// Forward pass used for training.
    ///
    /// # Returns
    ///
    /// Forecasts of shape `(batch, future_steps, out_channels, mul)` where
    /// `mul` is 1, or 3 when the model predicts quantiles.
    ///
    /// # Panics
    ///
    /// When `batch` does not match [`ForecastModel::layout`]. Callers
    /// holding untrusted batches run [`ForecastModel::check_batch`] first.
    fn forward(&self, batch: &ForecastBatch<B>) -> Tensor<B, 4>;

    /// Forward pass used at prediction time.
    ///
    /// Models that consume the targets during training (teacher forcing)
    /// override this to decode from their own outputs.
    fn inference(&self, batch: &ForecastBatch<B>) -> Tensor<B, 4> {
        self.forward(batch)
    }

    /// Block shapes this model was built for.
    fn layout(&self) -> BatchLayout;

    /// Check that `batch` matches [`ForecastModel::layout`].
    ///
    /// # Errors
    ///
    /// [`CoreError::ShapeMismatch`](crate::CoreError::ShapeMismatch) on a
    /// missing or mis-shaped block.
    fn check_batch(&self, batch: &ForecastBatch<B>) -> Result<()> {
        batch.check_layout(&self.layout())
    }

    /// Forecast horizon.
    fn future_steps(&self) -> usize;

    /// Number of forecast targets.
    fn out_channels(&self) -> usize;

    /// Predicted quantiles, empty for point forecasts.
    fn quantiles(&self) -> &[f32];

    /// Number of outputs per target.
    fn mul(&self) -> usize {
        if self.quantiles().is_empty() {
            1
        } else {
            self.quantiles().len()
        }
    }
}
