//! Optimizer configuration.

use burn::grad_clipping::GradientClippingConfig;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::momentum::MomentumConfig;
use burn::optim::{AdamConfig, AdamWConfig, SgdConfig};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainError};

/// Learning rate used when none is given.
pub const DEFAULT_LR: f64 = 5e-5;

/// Optimizer algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    /// Adam.
    #[default]
    Adam,
    /// Adam with decoupled weight decay.
    AdamW,
    /// Stochastic gradient descent, optionally with momentum.
    Sgd,
}

/// Optimizer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimConfig {
    /// Algorithm.
    pub optimizer: OptimizerKind,
    /// Initial learning rate.
    pub lr: f64,
    /// Weight decay (0 disables it).
    pub weight_decay: f32,
    /// Clip the gradient norm to this value.
    pub gradient_clip: Option<f32>,
    /// SGD momentum (0 disables it).
    pub momentum: f64,
}

impl Default for OptimConfig {
    fn default() -> Self {
        Self {
            optimizer: OptimizerKind::Adam,
            lr: DEFAULT_LR,
            weight_decay: 0.0,
            gradient_clip: None,
            momentum: 0.0,
        }
    }
}

impl OptimConfig {
    /// Create a config for the given algorithm and learning rate.
    #[must_use]
    pub fn new(optimizer: OptimizerKind, lr: f64) -> Self {
        Self {
            optimizer,
            lr,
            ..Default::default()
        }
    }

    /// Check the values.
    ///
    /// # Errors
    ///
    /// [`TrainError::InvalidConfig`] for a non-positive learning rate or
    /// clip value, or a negative weight decay or momentum.
    pub fn validate(&self) -> Result<()> {
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return Err(TrainError::InvalidConfig(format!("learning rate must be positive, got {}", self.lr)));
        }
        if self.weight_decay < 0.0 || self.momentum < 0.0 {
            return Err(TrainError::InvalidConfig(
                "weight_decay and momentum must not be negative".to_string(),
            ));
        }
        if self.gradient_clip.is_some_and(|c| c <= 0.0) {
            return Err(TrainError::InvalidConfig("gradient_clip must be positive".to_string()));
        }
        Ok(())
    }

    fn clipping(&self) -> Option<GradientClippingConfig> {
        self.gradient_clip.map(GradientClippingConfig::Norm)
    }

    fn decay(&self) -> Option<WeightDecayConfig> {
        (self.weight_decay > 0.0).then(|| WeightDecayConfig::new(self.weight_decay))
    }

    /// Burn config for Adam.
    #[must_use]
    pub fn adam(&self) -> AdamConfig {
        AdamConfig::new()
            .with_weight_decay(self.decay())
            .with_grad_clipping(self.clipping())
    }

    /// Burn config for AdamW.
    #[must_use]
    pub fn adamw(&self) -> AdamWConfig {
        AdamWConfig::new()
            .with_weight_decay(self.weight_decay)
            .with_grad_clipping(self.clipping())
    }

    /// Burn config for SGD.
    #[must_use]
    pub fn sgd(&self) -> SgdConfig {
        let momentum = (self.momentum > 0.0).then(|| MomentumConfig::new().with_momentum(self.momentum));
        SgdConfig::new()
            .with_weight_decay(self.decay())
            .with_momentum(momentum)
            .with_gradient_clipping(self.clipping())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OptimConfig::default();
        assert_eq!(config.optimizer, OptimizerKind::Adam);
        assert_eq!(config.lr, DEFAULT_LR);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        assert!(OptimConfig::new(OptimizerKind::Sgd, 0.0).validate().is_err());
        let config = OptimConfig {
            gradient_clip: Some(-1.0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serde() {
        let config: OptimConfig = serde_json::from_str(r#"{"optimizer": "adamw", "lr": 0.001}"#).unwrap();
        assert_eq!(config.optimizer, OptimizerKind::AdamW);
        assert_eq!(config.lr, 0.001);
        assert_eq!(config.weight_decay, 0.0);
    }
}
