//! Forecasting batch layout.

use burn::prelude::*;
use burn::tensor::TensorData;

use crate::error::{CoreError, Result};

/// A batch of forecasting windows.
///
/// This is the primary data structure yielded by dataloaders and consumed by
/// every [`ForecastModel`](crate::ForecastModel). All tensors are time-major:
///
/// | field | shape |
/// |---|---|
/// | `x_num_past` | `(B, past_steps, past_channels)` |
/// | `x_cat_past` | `(B, past_steps, n_cat)` |
/// | `x_num_future` | `(B, future_steps, future_channels)` |
/// | `x_cat_future` | `(B, future_steps, n_cat)` |
/// | `y` | `(B, future_steps, out_channels)` |
#[derive(Debug, Clone)]
pub struct ForecastBatch<B: Backend> {
    /// Past numerical variables, always present.
    pub x_num_past: Tensor<B, 3>,
    /// Past categorical variables as class indices.
    pub x_cat_past: Option<Tensor<B, 3, Int>>,
    /// Known future numerical covariates.
    pub x_num_future: Option<Tensor<B, 3>>,
    /// Known future categorical variables as class indices.
    pub x_cat_future: Option<Tensor<B, 3, Int>>,
    /// Targets over the horizon; absent at pure inference time.
    pub y: Option<Tensor<B, 3>>,
    /// Position of each target inside the past numerical channels.
    pub idx_target: Vec<usize>,
}

/// Block shapes a model expects from its batches.
///
/// Future numericals are required when `future_channels > 0` and both
/// categorical blocks when `n_cat > 0`. Undeclared blocks are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchLayout {
    /// Length of the input context.
    pub past_steps: usize,
    /// Number of past numerical channels.
    pub past_channels: usize,
    /// Forecast horizon.
    pub future_steps: usize,
    /// Number of future numerical channels.
    pub future_channels: usize,
    /// Number of categorical variables.
    pub n_cat: usize,
}

fn expect_block(what: &str, dims: [usize; 3], steps: usize, channels: usize) -> Result<()> {
    let [_, s, c] = dims;
    if (s, c) != (steps, channels) {
        return Err(CoreError::ShapeMismatch(format!(
            "{what} has {s} steps and {c} channels, expected {steps} and {channels}"
        )));
    }
    Ok(())
}

fn missing(what: &str) -> CoreError {
    CoreError::ShapeMismatch(format!("{what} is required by the model but absent from the batch"))
}

impl<B: Backend> ForecastBatch<B> {
    /// Create a batch from its past numerical block.
    ///
    /// # Errors
    ///
    /// Returns an error if a target index is out of range or no target is given.
    pub fn new(x_num_past: Tensor<B, 3>, idx_target: Vec<usize>) -> Result<Self> {
        let channels = x_num_past.dims()[2];
        if idx_target.is_empty() {
            return Err(CoreError::ShapeMismatch(
                "a forecasting batch needs at least one target".to_string(),
            ));
        }
        if let Some(&index) = idx_target.iter().find(|&&i| i >= channels) {
            return Err(CoreError::TargetIndex { index, channels });
        }
        Ok(Self {
            x_num_past,
            x_cat_past: None,
            x_num_future: None,
            x_cat_future: None,
            y: None,
            idx_target,
        })
    }

    /// Attach the target block.
    pub fn with_target(mut self, y: Tensor<B, 3>) -> Result<Self> {
        let [b, _, c] = y.dims();
        self.check_batch("y", b)?;
        if c != self.idx_target.len() {
            return Err(CoreError::ShapeMismatch(format!(
                "y has {c} channels but {} targets are indexed",
                self.idx_target.len()
            )));
        }
        self.y = Some(y);
        Ok(self)
    }

    /// Attach the known future numerical covariates.
    pub fn with_num_future(mut self, x: Tensor<B, 3>) -> Result<Self> {
        self.check_batch("x_num_future", x.dims()[0])?;
        self.x_num_future = Some(x);
        Ok(self)
    }

    /// Attach past and future categorical blocks.
    pub fn with_categoricals(mut self, past: Tensor<B, 3, Int>, future: Tensor<B, 3, Int>) -> Result<Self> {
        self.check_batch("x_cat_past", past.dims()[0])?;
        self.check_batch("x_cat_future", future.dims()[0])?;
        if past.dims()[2] != future.dims()[2] {
            return Err(CoreError::ShapeMismatch(format!(
                "past has {} categorical channels, future has {}",
                past.dims()[2],
                future.dims()[2]
            )));
        }
        self.x_cat_past = Some(past);
        self.x_cat_future = Some(future);
        Ok(self)
    }

    /// Check the blocks of this batch against `layout`.
    ///
    /// # Errors
    ///
    /// [`CoreError::ShapeMismatch`] when a required block is absent or any
    /// block has the wrong number of steps or channels.
    pub fn check_layout(&self, layout: &BatchLayout) -> Result<()> {
        expect_block("x_num_past", self.x_num_past.dims(), layout.past_steps, layout.past_channels)?;
        if layout.future_channels > 0 {
            let future = self.x_num_future.as_ref().ok_or_else(|| missing("x_num_future"))?;
            expect_block("x_num_future", future.dims(), layout.future_steps, layout.future_channels)?;
        }
        if layout.n_cat > 0 {
            let past = self.x_cat_past.as_ref().ok_or_else(|| missing("x_cat_past"))?;
            expect_block("x_cat_past", past.dims(), layout.past_steps, layout.n_cat)?;
            let future = self.x_cat_future.as_ref().ok_or_else(|| missing("x_cat_future"))?;
            expect_block("x_cat_future", future.dims(), layout.future_steps, layout.n_cat)?;
        }
        if let Some(y) = &self.y {
            let steps = y.dims()[1];
            if steps != layout.future_steps {
                return Err(CoreError::ShapeMismatch(format!(
                    "y has {steps} steps, expected {}",
                    layout.future_steps
                )));
            }
        }
        Ok(())
    }

    fn check_batch(&self, what: &str, b: usize) -> Result<()> {
        let expected = self.batch_size();
        if b != expected {
            return Err(CoreError::ShapeMismatch(format!(
                "{what} has batch size {b}, expected {expected}"
            )));
        }
        Ok(())
    }

    /// Number of windows in the batch.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.x_num_past.dims()[0]
    }

    /// Number of past steps.
    #[must_use]
    pub fn past_steps(&self) -> usize {
        self.x_num_past.dims()[1]
    }

    /// Device of the batch tensors.
    pub fn device(&self) -> B::Device {
        self.x_num_past.device()
    }

    /// The target channels of the past block, `(B, past_steps, out_channels)`.
    pub fn past_target(&self) -> Tensor<B, 3> {
        let device = self.device();
        let indices: Vec<i64> = self.idx_target.iter().map(|&i| i as i64).collect();
        let indices = Tensor::<B, 1, Int>::from_data(
            TensorData::new(indices, [self.idx_target.len()]),
            &device,
        );
        self.x_num_past.clone().select(2, indices)
    }

    /// The last observed value of each target, `(B, 1, out_channels)`.
    pub fn last_target(&self) -> Tensor<B, 3> {
        let [b, l, _] = self.x_num_past.dims();
        let c = self.idx_target.len();
        self.past_target().slice([0..b, l - 1..l, 0..c])
    }

    /// The naive forecast repeating the last observed value over `future_steps`.
    pub fn persistence(&self, future_steps: usize) -> Tensor<B, 3> {
        let last = self.last_target();
        last.repeat_dim(1, future_steps)
    }

    /// Move every tensor to another device.
    pub fn to_device(self, device: &B::Device) -> Self {
        Self {
            x_num_past: self.x_num_past.to_device(device),
            x_cat_past: self.x_cat_past.map(|t| t.to_device(device)),
            x_num_future: self.x_num_future.map(|t| t.to_device(device)),
            x_cat_future: self.x_cat_future.map(|t| t.to_device(device)),
            y: self.y.map(|t| t.to_device(device)),
            idx_target: self.idx_target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    fn past(device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 3> {
        // two windows, three steps, two channels: channel 1 is the target
        let values: Vec<f32> = vec![
            0.0, 10.0, 1.0, 11.0, 2.0, 12.0, //
            3.0, 13.0, 4.0, 14.0, 5.0, 15.0,
        ];
        Tensor::from_data(TensorData::new(values, [2, 3, 2]), device)
    }

    #[test]
    fn test_check_layout() {
        let device = Default::default();
        let layout = BatchLayout {
            past_steps: 3,
            past_channels: 2,
            future_steps: 2,
            future_channels: 0,
            n_cat: 0,
        };
        let batch = ForecastBatch::new(past(&device), vec![1]).unwrap();
        batch.check_layout(&layout).unwrap();

        let wider = BatchLayout { past_channels: 3, ..layout };
        assert!(matches!(batch.check_layout(&wider), Err(CoreError::ShapeMismatch(_))));

        // declared covariates must be present
        let with_future = BatchLayout { future_channels: 1, ..layout };
        assert!(batch.check_layout(&with_future).is_err());
        let with_cats = BatchLayout { n_cat: 1, ..layout };
        assert!(batch.check_layout(&with_cats).is_err());

        let batch = batch
            .with_num_future(Tensor::zeros([2, 2, 1], &device))
            .unwrap()
            .with_categoricals(Tensor::zeros([2, 3, 1], &device), Tensor::zeros([2, 2, 1], &device))
            .unwrap();
        batch.check_layout(&BatchLayout { future_channels: 1, n_cat: 1, ..layout }).unwrap();
        // extra blocks are ignored
        batch.check_layout(&layout).unwrap();

        let short_target = batch.with_target(Tensor::zeros([2, 1, 1], &device)).unwrap();
        assert!(short_target.check_layout(&layout).is_err());
    }

    #[test]
    fn test_past_target_selects_channels() {
        let device = Default::default();
        let batch = ForecastBatch::new(past(&device), vec![1]).unwrap();
        let target = batch.past_target();
        assert_eq!(target.dims(), [2, 3, 1]);
        let values = target.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
    }

    #[test]
    fn test_persistence_repeats_last_value() {
        let device = Default::default();
        let batch = ForecastBatch::new(past(&device), vec![1]).unwrap();
        let persistence = batch.persistence(4);
        assert_eq!(persistence.dims(), [2, 4, 1]);
        let values = persistence.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![12.0, 12.0, 12.0, 12.0, 15.0, 15.0, 15.0, 15.0]);
    }

    #[test]
    fn test_target_index_out_of_range() {
        let device = Default::default();
        let err = ForecastBatch::new(past(&device), vec![2]).unwrap_err();
        assert!(matches!(err, CoreError::TargetIndex { index: 2, channels: 2 }));
    }

    #[test]
    fn test_with_target_checks_shape() {
        let device = Default::default();
        let batch = ForecastBatch::new(past(&device), vec![1]).unwrap();
        let wrong = Tensor::<TestBackend, 3>::zeros([3, 4, 1], &device);
        assert!(batch.clone().with_target(wrong).is_err());

        let y = Tensor::<TestBackend, 3>::zeros([2, 4, 1], &device);
        let batch = batch.with_target(y).unwrap();
        assert!(batch.y.is_some());
        assert_eq!(batch.batch_size(), 2);
        assert_eq!(batch.past_steps(), 3);
    }
}
