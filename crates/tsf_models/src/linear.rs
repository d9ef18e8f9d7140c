//! Linear forecasters: plain, DLinear and NLinear.
//!
//! The past targets are mapped to the horizon by a linear layer shared by
//! all channels. DLinear first splits the context into a trend (moving
//! average) and a seasonal residual, each with its own layer. NLinear
//! removes the last observed value before the layer and adds it back
//! after. The result is then mixed with the future covariates by a small
//! MLP head.

use burn::nn::pool::{AvgPool1d, AvgPool1dConfig};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig1d, Relu};
use burn::prelude::*;
use serde::{Deserialize, Serialize};
use burn::module::Ignored;
use tsf_core::{BatchLayout, ForecastBatch, ForecastModel};

use crate::embedding::CategoricalEmbedding;
use crate::error::{ModelError, Result};
use crate::spec::ForecastDims;
use crate::utils::Permute;

/// Variant of the linear forecaster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinearKind {
    /// Single linear map.
    #[default]
    Linear,
    /// Trend/seasonal decomposition, one map each.
    DLinear,
    /// Last value normalization.
    NLinear,
}

/// Configuration for [`LinearTS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearTSConfig {
    /// Variant.
    pub kind: LinearKind,
    /// Moving average window of the DLinear decomposition.
    pub kernel_size: usize,
    /// Width of the output head.
    pub hidden_size: usize,
    /// Embedding size of each categorical variable.
    pub cat_emb_dim: usize,
    /// Sum the categorical embeddings instead of concatenating them.
    pub sum_emb: bool,
    /// Dropout rate of the head.
    pub dropout: f64,
}

impl Default for LinearTSConfig {
    fn default() -> Self {
        Self {
            kind: LinearKind::Linear,
            kernel_size: 25,
            hidden_size: 64,
            cat_emb_dim: 8,
            sum_emb: true,
            dropout: 0.1,
        }
    }
}

impl LinearTSConfig {
    /// Create a config for the given variant.
    #[must_use]
    pub fn new(kind: LinearKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// Initialize a model.
    ///
    /// # Errors
    ///
    /// See [`LinearTS::new`].
    pub fn init<B: Backend>(&self, dims: &ForecastDims, device: &B::Device) -> Result<LinearTS<B>> {
        LinearTS::new(dims, self, device)
    }
}

/// Moving average over time that keeps the sequence length.
///
/// Both ends are padded by repeating the edge values before average
/// pooling with stride 1.
#[derive(Module, Clone, Debug)]
pub struct MovingAvg {
    pool: AvgPool1d,
    permute: Permute,
    #[module(skip)]
    kernel_size: usize,
}

impl MovingAvg {
    /// Create a moving average over `kernel_size` steps.
    #[must_use]
    pub fn new(kernel_size: usize) -> Self {
        let kernel_size = kernel_size.max(1);
        let pool = AvgPool1dConfig::new(kernel_size)
            .with_stride(1)
            .with_padding(PaddingConfig1d::Valid)
            .init();
        Self {
            pool,
            permute: Permute::new(),
            kernel_size,
        }
    }

    /// Smooth `(batch, steps, channels)`.
    pub fn forward<B: Backend>(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, steps, channels] = x.dims();
        let front = (self.kernel_size - 1) / 2;
        let end = self.kernel_size - 1 - front;

        let mut parts = Vec::with_capacity(3);
        if front > 0 {
            parts.push(x.clone().slice([0..batch, 0..1, 0..channels]).repeat_dim(1, front));
        }
        parts.push(x.clone());
        if end > 0 {
            parts.push(
                x.slice([0..batch, steps - 1..steps, 0..channels])
                    .repeat_dim(1, end),
            );
        }
        let padded = Tensor::cat(parts, 1);
        self.permute.forward(self.pool.forward(self.permute.forward(padded)))
    }
}

/// Split a sequence into seasonal residual and trend.
#[derive(Module, Clone, Debug)]
pub struct SeriesDecomp {
    moving_avg: MovingAvg,
}

impl SeriesDecomp {
    /// Create a decomposition with a moving average of `kernel_size` steps.
    #[must_use]
    pub fn new(kernel_size: usize) -> Self {
        Self {
            moving_avg: MovingAvg::new(kernel_size),
        }
    }

    /// Returns `(residual, trend)`, both shaped like `x`.
    pub fn forward<B: Backend>(&self, x: Tensor<B, 3>) -> (Tensor<B, 3>, Tensor<B, 3>) {
        let trend = self.moving_avg.forward(x.clone());
        (x - trend.clone(), trend)
    }
}

/// Linear forecaster with a covariate head.
#[derive(Module, Debug)]
pub struct LinearTS<B: Backend> {
    linear: Linear<B>,
    linear_trend: Option<Linear<B>>,
    decomposition: Option<SeriesDecomp>,
    embedding: CategoricalEmbedding<B>,
    head_in: Linear<B>,
    head_out: Linear<B>,
    activation: Relu,
    dropout: Dropout,
    #[module(skip)]
    kind: Ignored<LinearKind>,
    #[module(skip)]
    future_steps: usize,
    #[module(skip)]
    out_channels: usize,
    #[module(skip)]
    future_channels: usize,
    #[module(skip)]
    quantiles: Vec<f32>,
    #[module(skip)]
    layout: Ignored<BatchLayout>,
}

impl<B: Backend> LinearTS<B> {
    /// Create a new model.
    ///
    /// # Errors
    ///
    /// Fails on invalid dimensions, a zero kernel or hidden size, or a
    /// dropout outside `[0, 1)`.
    pub fn new(dims: &ForecastDims, config: &LinearTSConfig, device: &B::Device) -> Result<Self> {
        dims.validate()?;
        if config.kernel_size == 0 || config.hidden_size == 0 {
            return Err(ModelError::InvalidConfig(
                "kernel_size and hidden_size must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&config.dropout) {
            return Err(ModelError::InvalidConfig(format!("dropout {} not in [0, 1)", config.dropout)));
        }

        let linear = LinearConfig::new(dims.past_steps, dims.future_steps).init(device);
        let (linear_trend, decomposition) = match config.kind {
            LinearKind::DLinear => (
                Some(LinearConfig::new(dims.past_steps, dims.future_steps).init(device)),
                Some(SeriesDecomp::new(config.kernel_size)),
            ),
            LinearKind::Linear | LinearKind::NLinear => (None, None),
        };

        let embedding = CategoricalEmbedding::new(&dims.embs, config.cat_emb_dim, config.sum_emb, device);
        let head_dim = dims.out_channels + dims.future_channels + embedding.output_dim();
        let head_in = LinearConfig::new(head_dim, config.hidden_size).init(device);
        let head_out = LinearConfig::new(config.hidden_size, dims.out_channels * dims.mul()).init(device);

        Ok(Self {
            linear,
            linear_trend,
            decomposition,
            embedding,
            head_in,
            head_out,
            activation: Relu::new(),
            dropout: DropoutConfig::new(config.dropout).init(),
            kind: Ignored(config.kind),
            future_steps: dims.future_steps,
            out_channels: dims.out_channels,
            future_channels: dims.future_channels,
            quantiles: dims.quantiles.clone(),
            layout: Ignored(dims.layout()),
        })
    }

    /// Map `(batch, past_steps, channels)` to `(batch, future_steps, channels)`
    /// along time.
    fn project(linear: &Linear<B>, x: Tensor<B, 3>) -> Tensor<B, 3> {
        linear.forward(x.swap_dims(1, 2)).swap_dims(1, 2)
    }

    /// Forecast the targets from their own past only.
    fn backbone(&self, past: Tensor<B, 3>) -> Tensor<B, 3> {
        match (*self.kind, &self.decomposition, &self.linear_trend) {
            (LinearKind::DLinear, Some(decomposition), Some(linear_trend)) => {
                let (seasonal, trend) = decomposition.forward(past);
                Self::project(&self.linear, seasonal) + Self::project(linear_trend, trend)
            }
            (LinearKind::NLinear, _, _) => {
                let [batch, steps, channels] = past.dims();
                let last = past.clone().slice([0..batch, steps - 1..steps, 0..channels]);
                let projected = Self::project(&self.linear, past - last.clone());
                projected + last.repeat_dim(1, self.future_steps)
            }
            _ => Self::project(&self.linear, past),
        }
    }
}

impl<B: Backend> ForecastModel<B> for LinearTS<B> {
    fn forward(&self, batch: &ForecastBatch<B>) -> Tensor<B, 4> {
        let batch_size = batch.batch_size();
        let mut features = vec![self.backbone(batch.past_target())];
        if self.future_channels > 0 {
            if let Some(future) = &batch.x_num_future {
                features.push(future.clone());
            }
        }
        if let Some(emb) = batch.x_cat_future.clone().and_then(|x| self.embedding.forward(x)) {
            features.push(emb);
        }

        let x = Tensor::cat(features, 2);
        let x = self.dropout.forward(self.activation.forward(self.head_in.forward(x)));
        self.head_out
            .forward(x)
            .reshape([batch_size, self.future_steps, self.out_channels, self.mul()])
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
        &self.quantiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    fn batch(device: &<TestBackend as Backend>::Device) -> ForecastBatch<TestBackend> {
        let x = Tensor::<TestBackend, 1>::from_floats(
            (0..2 * 12 * 2).map(|v| v as f32 / 10.0).collect::<Vec<_>>().as_slice(),
            device,
        )
        .reshape([2, 12, 2]);
        ForecastBatch::new(x, vec![0]).unwrap()
    }

    #[test]
    fn test_moving_avg_keeps_length() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 1>::from_floats([1.0, 2.0, 3.0, 4.0, 5.0], &device).reshape([1, 5, 1]);
        let smooth = MovingAvg::new(3).forward(x);
        assert_eq!(smooth.dims(), [1, 5, 1]);
        let values = smooth.into_data().to_vec::<f32>().unwrap();
        let expected = [4.0 / 3.0, 2.0, 3.0, 4.0, 14.0 / 3.0];
        for (v, e) in values.iter().zip(expected) {
            assert!((v - e).abs() < 1e-5, "{values:?}");
        }
    }

    #[test]
    fn test_moving_avg_even_kernel() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 3>::ones([2, 7, 3], &device);
        assert_eq!(MovingAvg::new(4).forward(x).dims(), [2, 7, 3]);
    }

    #[test]
    fn test_series_decomp_sums_back() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 1>::from_floats([1.0, 3.0, 2.0, 5.0, 4.0, 6.0], &device).reshape([1, 6, 1]);
        let (residual, trend) = SeriesDecomp::new(3).forward(x.clone());
        let back = (residual + trend).into_data().to_vec::<f32>().unwrap();
        let orig = x.into_data().to_vec::<f32>().unwrap();
        for (a, b) in back.iter().zip(&orig) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_linear_kinds_shapes() {
        let device = Default::default();
        let dims = ForecastDims::new(12, 4, 2, 0, 1);
        for kind in [LinearKind::Linear, LinearKind::DLinear, LinearKind::NLinear] {
            let config = LinearTSConfig {
                kernel_size: 5,
                ..LinearTSConfig::new(kind)
            };
            let model = config.init::<TestBackend>(&dims, &device).unwrap();
            let out = model.forward(&batch(&device));
            assert_eq!(out.dims(), [2, 4, 1, 1], "{kind:?}");
        }
    }

    #[test]
    fn test_linear_with_covariates_and_quantiles() {
        let device = Default::default();
        let dims = ForecastDims::new(12, 4, 2, 1, 1)
            .with_embs(vec![7])
            .with_quantiles(vec![0.1, 0.5, 0.9]);
        let model = LinearTSConfig::default().init::<TestBackend>(&dims, &device).unwrap();
        let future = Tensor::<TestBackend, 3>::ones([2, 4, 1], &device);
        let cat_past = Tensor::<TestBackend, 3, Int>::zeros([2, 12, 1], &device);
        let cat_future = Tensor::<TestBackend, 3, Int>::ones([2, 4, 1], &device);
        let batch = batch(&device)
            .with_num_future(future)
            .unwrap()
            .with_categoricals(cat_past, cat_future)
            .unwrap();
        assert_eq!(model.forward(&batch).dims(), [2, 4, 1, 3]);
        assert_eq!(model.mul(), 3);
    }

    #[test]
    fn test_invalid_config() {
        let device = Default::default();
        let dims = ForecastDims::new(12, 4, 2, 0, 1);
        let config = LinearTSConfig {
            dropout: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            LinearTS::<TestBackend>::new(&dims, &config, &device),
            Err(ModelError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_serde_defaults() {
        let config: LinearTSConfig = serde_json::from_str(r#"{"kind": "dlinear"}"#).unwrap();
        assert_eq!(config.kind, LinearKind::DLinear);
        assert_eq!(config.kernel_size, 25);
    }
}
