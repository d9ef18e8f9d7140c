//! Learning rate schedulers.
//!
//! Schedules are evaluated once per epoch.

use serde::{Deserialize, Serialize};

/// Learning rate schedule.
pub trait Scheduler: Send + Sync {
    /// Get the learning rate for an epoch (0-based).
    fn get_lr(&self, epoch: usize) -> f64;

    /// Get the scheduler name.
    fn name(&self) -> &str;
}

/// Decay the learning rate by `gamma` every `step_size` epochs.
#[derive(Debug, Clone)]
pub struct StepLR {
    initial_lr: f64,
    step_size: usize,
    gamma: f64,
}

impl StepLR {
    /// Create a new step decay scheduler.
    pub fn new(initial_lr: f64, step_size: usize, gamma: f64) -> Self {
        Self {
            initial_lr,
            step_size: step_size.max(1),
            gamma,
        }
    }
}

impl Scheduler for StepLR {
    fn get_lr(&self, epoch: usize) -> f64 {
        let n_decays = i32::try_from(epoch / self.step_size).unwrap_or(i32::MAX);
        self.initial_lr * self.gamma.powi(n_decays)
    }

    fn name(&self) -> &str {
        "StepLR"
    }
}

/// Constant learning rate (no scheduling).
#[derive(Debug, Clone)]
pub struct ConstantLR {
    lr: f64,
}

impl ConstantLR {
    /// Create a new constant LR scheduler.
    pub fn new(lr: f64) -> Self {
        Self { lr }
    }
}

impl Scheduler for ConstantLR {
    fn get_lr(&self, _epoch: usize) -> f64 {
        self.lr
    }

    fn name(&self) -> &str {
        "ConstantLR"
    }
}

/// Serializable scheduler choice.
///
/// ```toml
/// [scheduler]
/// type = "step"
/// step_size = 10
/// gamma = 0.1
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SchedulerConfig {
    /// Keep the optimizer learning rate.
    #[default]
    Constant,
    /// See [`StepLR`].
    Step {
        /// Epochs between decays.
        step_size: usize,
        /// Multiplicative decay.
        #[serde(default = "default_gamma")]
        gamma: f64,
    },
}

fn default_gamma() -> f64 {
    0.1
}

impl SchedulerConfig {
    /// Build the schedule starting at `lr`.
    #[must_use]
    pub fn build(&self, lr: f64) -> Box<dyn Scheduler> {
        match self {
            Self::Constant => Box::new(ConstantLR::new(lr)),
            Self::Step { step_size, gamma } => Box::new(StepLR::new(lr, *step_size, *gamma)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_lr() {
        let scheduler = StepLR::new(1.0, 2, 0.5);
        assert_eq!(scheduler.get_lr(0), 1.0);
        assert_eq!(scheduler.get_lr(1), 1.0);
        assert_eq!(scheduler.get_lr(2), 0.5);
        assert_eq!(scheduler.get_lr(5), 0.25);
    }

    #[test]
    fn test_constant_lr() {
        let scheduler = ConstantLR::new(5e-5);
        assert_eq!(scheduler.get_lr(100), 5e-5);
        assert_eq!(scheduler.name(), "ConstantLR");
    }

    #[test]
    fn test_config() {
        let config: SchedulerConfig = serde_json::from_str(r#"{"type": "step", "step_size": 3}"#).unwrap();
        assert_eq!(config, SchedulerConfig::Step { step_size: 3, gamma: 0.1 });
        let scheduler = config.build(1.0);
        assert_eq!(scheduler.name(), "StepLR");
        assert!((scheduler.get_lr(3) - 0.1).abs() < 1e-12);
        assert_eq!(SchedulerConfig::default().build(0.1).get_lr(9), 0.1);
    }
}
