//! Forecasting losses.
//!
//! [`compute_loss`] starts from an L1, MSE or quantile loss on the model
//! output and optionally adds a term that pushes the forecast away from the
//! persistence forecast (the last observed value repeated) or towards the
//! variability of the target.

use burn::prelude::*;
use serde::{Deserialize, Serialize};
use tsf_core::ForecastBatch;

use crate::error::{Result, TrainError};

/// Base point loss.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseLoss {
    /// Mean absolute error.
    #[default]
    L1,
    /// Mean squared error.
    Mse,
}

/// Additional loss term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossType {
    /// Base loss only.
    #[default]
    Default,
    /// Weight the error by how close the forecast is to persistence, linearly.
    LinearPenalization,
    /// Weight the error by how close the forecast is to persistence, exponentially.
    ExponentialPenalization,
    /// Error plus the gap between per-series standard deviations.
    AdditiveIv,
    /// Error times the gap between per-series standard deviations.
    MultiplicativeIv,
    /// Base loss plus the gap between per-channel standard deviations.
    GlobalIv,
    /// Symmetric mean absolute percentage error.
    Smape,
    /// Base loss plus a triplet margin against persistence.
    Triplet,
    /// Base loss plus the gap between central moments of order 2 to 4.
    HighOrder,
}

/// Loss configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossConfig {
    /// Base point loss.
    pub loss: BaseLoss,
    /// Additional term.
    pub loss_type: LossType,
    /// Weight of the additional term.
    pub persistence_weight: f32,
}

impl Default for LossConfig {
    fn default() -> Self {
        Self {
            loss: BaseLoss::L1,
            loss_type: LossType::Default,
            persistence_weight: 0.0,
        }
    }
}

impl LossConfig {
    /// Create a config with the given base loss.
    #[must_use]
    pub fn new(loss: BaseLoss) -> Self {
        Self {
            loss,
            ..Default::default()
        }
    }

    /// Set the additional term and its weight.
    #[must_use]
    pub fn with_loss_type(mut self, loss_type: LossType, persistence_weight: f32) -> Self {
        self.loss_type = loss_type;
        self.persistence_weight = persistence_weight;
        self
    }
}

/// Multi-output quantile (pinball) loss.
///
/// Mean over all elements of `sum_q max((q - 1) e, q e)` with
/// `e = y - y_hat_q`.
#[derive(Debug, Clone)]
pub struct QuantileLossMO {
    quantiles: Vec<f32>,
}

impl QuantileLossMO {
    /// Create a loss for the given quantiles.
    #[must_use]
    pub fn new(quantiles: Vec<f32>) -> Self {
        Self { quantiles }
    }

    /// `y_hat` is `(batch, steps, channels, n_quantiles)`, `y` is
    /// `(batch, steps, channels)`.
    pub fn forward<B: Backend>(&self, y_hat: Tensor<B, 4>, y: Tensor<B, 3>) -> Tensor<B, 1> {
        self.quantiles
            .iter()
            .enumerate()
            .map(|(i, &q)| {
                let e = y.clone() - output(&y_hat, i);
                e.clone().mul_scalar(q - 1.0).max_pair(e.mul_scalar(q))
            })
            .reduce(|acc, l| acc + l)
            .map_or_else(|| Tensor::zeros([1], &y.device()), |l| l.mean())
    }
}

/// Output `k` of a `(batch, steps, channels, mul)` forecast.
fn output<B: Backend>(y_hat: &Tensor<B, 4>, k: usize) -> Tensor<B, 3> {
    let [b, f, c, _] = y_hat.dims();
    y_hat.clone().slice([0..b, 0..f, 0..c, k..k + 1]).reshape([b, f, c])
}

/// Mean over time, `(batch, channels)`.
fn mean_time<B: Backend>(x: Tensor<B, 3>) -> Tensor<B, 2> {
    let [b, _, c] = x.dims();
    x.mean_dim(1).reshape([b, c])
}

/// Standard deviation over time, `(batch, channels)`.
fn std_time<B: Backend>(x: Tensor<B, 3>) -> Tensor<B, 2> {
    let [b, f, c] = x.dims();
    let var = if f > 1 { x.var(1) } else { x.var_bias(1) };
    var.add_scalar(1e-8).sqrt().reshape([b, c])
}

/// Standard deviation over batch and time, `(1, channels)`.
fn std_global<B: Backend>(x: Tensor<B, 3>) -> Tensor<B, 2> {
    let [b, f, c] = x.dims();
    let flat = x.reshape([b * f, c]);
    let var = if b * f > 1 { flat.var(0) } else { flat.var_bias(0) };
    var.add_scalar(1e-8).sqrt()
}

/// Central moment of order `k` over time, `(batch, channels)`.
fn central_moment<B: Backend>(z: Tensor<B, 3>, k: i32) -> Tensor<B, 2> {
    let mean = z.clone().mean_dim(1);
    mean_time((z - mean).powi_scalar(k))
}

/// Base loss on the point forecast, or the quantile loss.
fn initial_loss<B: Backend>(config: &LossConfig, y_hat: &Tensor<B, 4>, y: &Tensor<B, 3>, quantiles: &[f32]) -> Tensor<B, 1> {
    if !quantiles.is_empty() {
        return QuantileLossMO::new(quantiles.to_vec()).forward(y_hat.clone(), y.clone());
    }
    let diff = output(y_hat, 0) - y.clone();
    match config.loss {
        BaseLoss::L1 => diff.abs().mean(),
        BaseLoss::Mse => diff.powi_scalar(2).mean(),
    }
}

/// Loss of a forecast `y_hat` of shape `(batch, steps, channels, mul)`
/// against the targets of `batch`.
///
/// With quantiles the base loss is [`QuantileLossMO`] and the additional
/// terms use the median output.
///
/// # Errors
///
/// [`TrainError::MissingTarget`] when the batch has no targets.
pub fn compute_loss<B: Backend>(
    config: &LossConfig,
    y_hat: Tensor<B, 4>,
    batch: &ForecastBatch<B>,
    quantiles: &[f32],
) -> Result<Tensor<B, 1>> {
    let y = batch.y.clone().ok_or(TrainError::MissingTarget)?;
    let initial = initial_loss(config, &y_hat, &y, quantiles);
    let w = config.persistence_weight;
    let [_, future_steps, _] = y.dims();
    let x = output(&y_hat, if quantiles.is_empty() { 0 } else { 1 });
    let persistence = || batch.persistence(future_steps);

    let loss = match config.loss_type {
        LossType::Default => initial,
        LossType::LinearPenalization => {
            let p = persistence();
            let relative = (p.clone() - x.clone()) / p.abs().add_scalar(0.001);
            let weight = relative.abs().clamp(0.0, 0.1).mul_scalar(-10.0).add_scalar(2.0).mul_scalar(w);
            ((x - y).abs() * weight).mean()
        }
        LossType::ExponentialPenalization => {
            let weight = (persistence() - x.clone()).abs().neg().exp().mul_scalar(w).add_scalar(1.0);
            ((x - y).abs() * weight).mean()
        }
        LossType::AdditiveIv => {
            let error = mean_time((x.clone() - y.clone()).abs());
            let gap = (std_time(x) - std_time(y)).abs();
            (error + gap.mul_scalar(w)).mean()
        }
        LossType::MultiplicativeIv => {
            let error = mean_time((x.clone() - y.clone()).abs());
            let gap = (std_time(x) - std_time(y)).abs();
            (error * gap).mean()
        }
        LossType::GlobalIv => initial + (std_global(y) - std_global(x)).abs().mean().mul_scalar(w),
        LossType::Smape => {
            let num = (x.clone() - y.clone()).abs().mul_scalar(2.0);
            (num / (x.abs() + y.abs()).add_scalar(1e-8)).mean()
        }
        LossType::Triplet => {
            let positive = (x.clone() - y).abs().sum_dim(2);
            let negative = (x - persistence()).abs().sum_dim(2);
            let margin = (positive - negative).add_scalar(0.1).clamp_min(0.0).mean();
            initial + margin.mul_scalar(w)
        }
        LossType::HighOrder => (2..=4).fold(initial, |loss, k| {
            let gap = (central_moment(y.clone(), k) - central_moment(x.clone(), k)).abs().mean();
            loss + gap.mul_scalar(w)
        }),
    };
    Ok(loss)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    fn scalar(t: Tensor<TestBackend, 1>) -> f32 {
        t.into_scalar().elem::<f32>()
    }

    /// One target, past ends at 1.0, targets [2, 4], forecast [1, 2].
    fn setup() -> (Tensor<TestBackend, 4>, ForecastBatch<TestBackend>) {
        let device = Default::default();
        let x = Tensor::<TestBackend, 1>::from_floats([0.0, 1.0], &device).reshape([1, 2, 1]);
        let y = Tensor::<TestBackend, 1>::from_floats([2.0, 4.0], &device).reshape([1, 2, 1]);
        let y_hat = Tensor::<TestBackend, 1>::from_floats([1.0, 2.0], &device).reshape([1, 2, 1, 1]);
        let batch = ForecastBatch::new(x, vec![0]).unwrap().with_target(y).unwrap();
        (y_hat, batch)
    }

    #[test]
    fn test_l1_and_mse() {
        let (y_hat, batch) = setup();
        let l1 = compute_loss(&LossConfig::default(), y_hat.clone(), &batch, &[]).unwrap();
        assert!((scalar(l1) - 1.5).abs() < 1e-6);
        let mse = compute_loss(&LossConfig::new(BaseLoss::Mse), y_hat, &batch, &[]).unwrap();
        assert!((scalar(mse) - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_quantile_loss() {
        let device = Default::default();
        let y = Tensor::<TestBackend, 1>::from_floats([1.0], &device).reshape([1, 1, 1]);
        let y_hat = Tensor::<TestBackend, 1>::from_floats([0.0, 1.0, 2.0], &device).reshape([1, 1, 1, 3]);
        let loss = QuantileLossMO::new(vec![0.1, 0.5, 0.9]).forward(y_hat, y);
        // e = [1, 0, -1]: 0.1 + 0 + 0.1
        assert!((scalar(loss) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_missing_target() {
        let device = Default::default();
        let batch = ForecastBatch::new(Tensor::<TestBackend, 3>::zeros([1, 2, 1], &device), vec![0]).unwrap();
        let y_hat = Tensor::<TestBackend, 4>::zeros([1, 2, 1, 1], &device);
        assert!(matches!(
            compute_loss(&LossConfig::default(), y_hat, &batch, &[]),
            Err(TrainError::MissingTarget)
        ));
    }

    #[test]
    fn test_linear_penalization() {
        let (y_hat, batch) = setup();
        let config = LossConfig::default().with_loss_type(LossType::LinearPenalization, 1.0);
        // persistence is 1: step 1 equals it (weight 2), step 2 is far (weight 1)
        let loss = compute_loss(&config, y_hat, &batch, &[]).unwrap();
        assert!((scalar(loss) - (1.0 * 2.0 + 2.0 * 1.0) / 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_exponential_penalization() {
        let (y_hat, batch) = setup();
        let config = LossConfig::default().with_loss_type(LossType::ExponentialPenalization, 1.0);
        let loss = compute_loss(&config, y_hat, &batch, &[]).unwrap();
        let expected = (1.0 * 2.0 + 2.0 * (1.0 + (-1.0f32).exp())) / 2.0;
        assert!((scalar(loss) - expected).abs() < 1e-5);
    }

    #[test]
    fn test_smape() {
        let (y_hat, batch) = setup();
        let config = LossConfig::default().with_loss_type(LossType::Smape, 0.0);
        let loss = compute_loss(&config, y_hat, &batch, &[]).unwrap();
        let expected = (2.0 / 3.0 + 4.0 / 6.0) / 2.0;
        assert!((scalar(loss) - expected).abs() < 1e-5);
    }

    #[test]
    fn test_additive_iv() {
        let (y_hat, batch) = setup();
        let config = LossConfig::default().with_loss_type(LossType::AdditiveIv, 1.0);
        let loss = compute_loss(&config, y_hat, &batch, &[]).unwrap();
        // std of [2, 4] is sqrt(2), of [1, 2] is sqrt(0.5)
        let expected = 1.5 + (2.0f32.sqrt() - 0.5f32.sqrt());
        assert!((scalar(loss) - expected).abs() < 1e-4);
    }

    /// Two windows: targets [2, 4] and [1, 1], forecasts [1, 2] and [3, 1].
    fn two_windows() -> (Tensor<TestBackend, 4>, ForecastBatch<TestBackend>) {
        let device = Default::default();
        let x = Tensor::<TestBackend, 1>::from_floats([0.0, 1.0, 0.0, 1.0], &device).reshape([2, 2, 1]);
        let y = Tensor::<TestBackend, 1>::from_floats([2.0, 4.0, 1.0, 1.0], &device).reshape([2, 2, 1]);
        let y_hat = Tensor::<TestBackend, 1>::from_floats([1.0, 2.0, 3.0, 1.0], &device).reshape([2, 2, 1, 1]);
        let batch = ForecastBatch::new(x, vec![0]).unwrap().with_target(y).unwrap();
        (y_hat, batch)
    }

    #[test]
    fn test_multiplicative_iv() {
        let (y_hat, batch) = two_windows();
        let config = LossConfig::default().with_loss_type(LossType::MultiplicativeIv, 0.7);
        let loss = compute_loss(&config, y_hat, &batch, &[]).unwrap();
        // window 0: mean error 1.5, std sqrt(2) vs sqrt(0.5)
        let first = 1.5 * (2.0f32.sqrt() - 0.5f32.sqrt());
        // window 1: mean error 1, std 0 (plus eps) vs sqrt(2)
        let second = 1.0 * (2.0f32.sqrt() - 1e-4);
        // the weight does not enter the product
        assert!((scalar(loss) - (first + second) / 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_global_iv() {
        let (y_hat, batch) = two_windows();
        let config = LossConfig::default().with_loss_type(LossType::GlobalIv, 0.5);
        let loss = compute_loss(&config, y_hat, &batch, &[]).unwrap();
        let initial = (1.0 + 2.0 + 2.0 + 0.0) / 4.0;
        // std over windows and steps: y = [2, 4, 1, 1], x = [1, 2, 3, 1]
        let std_y = (6.0f32 / 3.0).sqrt();
        let std_x = (2.75f32 / 3.0).sqrt();
        let expected = initial + 0.5 * (std_y - std_x).abs();
        assert!((scalar(loss) - expected).abs() < 1e-4);
    }

    #[test]
    fn test_triplet_zero_weight_is_initial() {
        let (y_hat, batch) = setup();
        let config = LossConfig::default().with_loss_type(LossType::Triplet, 0.0);
        let loss = compute_loss(&config, y_hat, &batch, &[]).unwrap();
        assert!((scalar(loss) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_high_order() {
        let (y_hat, batch) = setup();
        let config = LossConfig::default().with_loss_type(LossType::HighOrder, 1.0);
        let loss = compute_loss(&config, y_hat, &batch, &[]).unwrap();
        // deviations are +-1 for y and +-0.5 for x
        let expected = 1.5 + (1.0 - 0.25) + 0.0 + (1.0 - 0.0625);
        assert!((scalar(loss) - expected).abs() < 1e-5);
    }

    #[test]
    fn test_loss_type_serde() {
        let config: LossConfig =
            serde_json::from_str(r#"{"loss": "mse", "loss_type": "exponential_penalization", "persistence_weight": 0.5}"#)
                .unwrap();
        assert_eq!(config.loss, BaseLoss::Mse);
        assert_eq!(config.loss_type, LossType::ExponentialPenalization);
    }
}
