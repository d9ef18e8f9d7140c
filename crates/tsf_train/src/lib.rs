//! # tsf_train
//!
//! Training and prediction for tsforecast.
//!
//! This crate provides:
//! - [`compute_loss`] with L1, MSE, [`QuantileLossMO`] and the
//!   persistence-aware loss terms ([`LossType`])
//! - [`OptimConfig`] (Adam, AdamW, SGD) and epoch based schedules
//!   ([`StepLR`], [`ConstantLR`])
//! - [`ForecastTrainer`] with best/last checkpoints and early stopping
//! - [`predict`] and NaN-aware [`metrics`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use tsf_train::{ForecastTrainer, OptimConfig, TrainerConfig};
//!
//! let trainer = ForecastTrainer::<Autodiff<NdArray>>::new(TrainerConfig::default(), device)
//!     .with_optim(OptimConfig::default());
//! let output = trainer.fit(model, &train_loader, Some(&valid_loader))?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod losses;
pub mod metrics;
pub mod optimizer;
pub mod predict;
pub mod scheduler;
pub mod trainer;

pub use error::{Result, TrainError};
pub use losses::{compute_loss, BaseLoss, LossConfig, LossType, QuantileLossMO};
pub use optimizer::{OptimConfig, OptimizerKind, DEFAULT_LR};
pub use predict::{predict, Predictions};
pub use scheduler::{ConstantLR, Scheduler, SchedulerConfig, StepLR};
pub use trainer::{
    ForecastTrainer, LossHistory, TrainerConfig, TrainingOutput, BEST_CHECKPOINT, LAST_CHECKPOINT,
};
