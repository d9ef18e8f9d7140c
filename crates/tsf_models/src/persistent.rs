//! Persistence baseline.

use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::module::Ignored;
use tsf_core::{BatchLayout, ForecastBatch, ForecastModel};

use crate::error::Result;
use crate::spec::ForecastDims;

/// Repeats the last observed target over the horizon.
///
/// Holds a single dummy linear layer so that it can go through the same
/// training loop as the learned models; its output is multiplied by zero.
/// Always predicts a single value per target, even when quantiles are
/// requested.
#[derive(Module, Debug)]
pub struct Persistent<B: Backend> {
    dummy: Linear<B>,
    #[module(skip)]
    future_steps: usize,
    #[module(skip)]
    out_channels: usize,
    #[module(skip)]
    layout: Ignored<BatchLayout>,
}

impl<B: Backend> Persistent<B> {
    /// Create a persistence model.
    ///
    /// # Errors
    ///
    /// Fails on invalid dimensions.
    pub fn new(dims: &ForecastDims, device: &B::Device) -> Result<Self> {
        dims.validate()?;
        Ok(Self {
            dummy: LinearConfig::new(1, 1).init(device),
            future_steps: dims.future_steps,
            out_channels: dims.out_channels,
            // only the past targets are read
            layout: Ignored(BatchLayout {
                future_channels: 0,
                n_cat: 0,
                ..dims.layout()
            }),
        })
    }
}

impl<B: Backend> ForecastModel<B> for Persistent<B> {
    fn forward(&self, batch: &ForecastBatch<B>) -> Tensor<B, 4> {
        let persistence = batch.persistence(self.future_steps).unsqueeze_dim::<4>(3);
        let zero = self
            .dummy
            .forward(Tensor::zeros(persistence.dims(), &persistence.device()))
            .mul_scalar(0.0);
        persistence + zero
    }

    fn layout(&self) -> BatchLayout {
        *self.layout
    }

    fn future_steps(&self) -> usize {
        self.future_steps
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }

    fn quantiles(&self) -> &[f32] {
        &[]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_repeats_last_value() {
        let device = Default::default();
        // two channels, target is channel 1
        let x = Tensor::<TestBackend, 1>::from_floats([0.0, 1.0, 0.0, 2.0, 0.0, 3.0], &device).reshape([1, 3, 2]);
        let batch = ForecastBatch::new(x, vec![1]).unwrap();
        let dims = ForecastDims::new(3, 4, 2, 0, 1).with_quantiles(vec![0.1, 0.5, 0.9]);
        let model = Persistent::<TestBackend>::new(&dims, &device).unwrap();

        let out = model.forward(&batch);
        assert_eq!(out.dims(), [1, 4, 1, 1]);
        assert_eq!(model.mul(), 1);
        assert_eq!(out.into_data().to_vec::<f32>().unwrap(), vec![3.0; 4]);
    }
}
