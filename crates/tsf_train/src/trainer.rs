//! Training loop for forecasting models.

use std::path::PathBuf;
use std::time::Instant;

use burn::module::AutodiffModule;
use burn::optim::{GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};
use tsf_core::ForecastModel;
use tsf_data::ForecastDataLoader;
use tsf_models::{CheckpointMetadata, ModelCheckpoint};

use crate::error::{Result, TrainError};
use crate::losses::{compute_loss, LossConfig};
use crate::optimizer::{OptimConfig, OptimizerKind};
use crate::scheduler::{Scheduler, SchedulerConfig};

/// Name of the checkpoint with the lowest validation loss.
pub const BEST_CHECKPOINT: &str = "best";

/// Name of the checkpoint written after the last epoch.
pub const LAST_CHECKPOINT: &str = "last";

/// Configuration of the training loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Number of epochs.
    pub max_epochs: usize,
    /// Early stopping patience in epochs (0 = disabled).
    pub patience: usize,
    /// Minimum decrease of the validation loss that counts as an improvement.
    pub min_delta: f32,
    /// Directory for the `best` and `last` checkpoints.
    pub checkpoint_dir: Option<PathBuf>,
    /// Log every epoch at info level.
    pub verbose: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_epochs: 20,
            patience: 0,
            min_delta: 0.0,
            checkpoint_dir: None,
            verbose: true,
        }
    }
}

/// Mean loss per epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LossHistory {
    /// Training losses.
    pub train: Vec<f32>,
    /// Validation losses.
    pub validation: Vec<f32>,
}

/// Result of [`ForecastTrainer::fit`].
#[derive(Debug)]
pub struct TrainingOutput<M> {
    /// Model with the lowest validation loss.
    pub model: M,
    /// Model after the last epoch.
    pub last_model: M,
    /// Loss history.
    pub losses: LossHistory,
    /// Epoch of the best model (0-based).
    pub best_epoch: usize,
    /// Validation loss of the best model.
    pub best_val_loss: f32,
    /// Total training time in seconds.
    pub training_time_secs: f64,
}

/// Trainer for [`ForecastModel`]s.
///
/// Each epoch runs the training loader (reshuffled per epoch when the
/// loader shuffles), then the validation loader on the model without
/// autodiff. Without a validation loader the training loss is used to pick
/// the best model.
pub struct ForecastTrainer<B: AutodiffBackend> {
    config: TrainerConfig,
    optim: OptimConfig,
    scheduler: SchedulerConfig,
    loss: LossConfig,
    device: B::Device,
}

impl<B: AutodiffBackend> ForecastTrainer<B> {
    /// Create a trainer with the default optimizer, schedule and loss.
    pub fn new(config: TrainerConfig, device: B::Device) -> Self {
        Self {
            config,
            optim: OptimConfig::default(),
            scheduler: SchedulerConfig::default(),
            loss: LossConfig::default(),
            device,
        }
    }

    /// Set the optimizer.
    #[must_use]
    pub fn with_optim(mut self, optim: OptimConfig) -> Self {
        self.optim = optim;
        self
    }

    /// Set the learning rate schedule.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Set the loss.
    #[must_use]
    pub fn with_loss(mut self, loss: LossConfig) -> Self {
        self.loss = loss;
        self
    }

    /// Train `model`.
    ///
    /// # Errors
    ///
    /// Fails on an invalid optimizer config, a data or checkpoint error, or
    /// a non-finite training loss.
    pub fn fit<M>(
        &self,
        model: M,
        train: &ForecastDataLoader,
        valid: Option<&ForecastDataLoader>,
    ) -> Result<TrainingOutput<M>>
    where
        M: ForecastModel<B> + AutodiffModule<B>,
        M::InnerModule: ForecastModel<B::InnerBackend>,
    {
        self.optim.validate()?;
        if self.config.max_epochs == 0 {
            return Err(TrainError::InvalidConfig("max_epochs must be positive".to_string()));
        }
        tracing::info!(
            optimizer = ?self.optim.optimizer,
            lr = self.optim.lr,
            epochs = self.config.max_epochs,
            batches = train.n_batches(),
            "start training"
        );
        match self.optim.optimizer {
            OptimizerKind::Adam => self.fit_with(model, self.optim.adam().init::<B, M>(), train, valid),
            OptimizerKind::AdamW => self.fit_with(model, self.optim.adamw().init::<B, M>(), train, valid),
            OptimizerKind::Sgd => self.fit_with(model, self.optim.sgd().init::<B, M>(), train, valid),
        }
    }

    fn fit_with<M, O>(
        &self,
        model: M,
        mut optim: O,
        train: &ForecastDataLoader,
        valid: Option<&ForecastDataLoader>,
    ) -> Result<TrainingOutput<M>>
    where
        M: ForecastModel<B> + AutodiffModule<B>,
        M::InnerModule: ForecastModel<B::InnerBackend>,
        O: Optimizer<M, B>,
    {
        let start_time = Instant::now();
        let scheduler = self.scheduler.build(self.optim.lr);
        if let Some(dir) = &self.config.checkpoint_dir {
            std::fs::create_dir_all(dir)?;
        }

        let mut best_model = model.clone();
        let mut best_val_loss = f32::INFINITY;
        let mut best_epoch = 0;
        let mut losses = LossHistory::default();
        let mut epochs_without_improvement = 0;
        let mut current_model = model;

        for epoch in 0..self.config.max_epochs {
            let lr = scheduler.get_lr(epoch);
            let train_loss = self.train_epoch(&mut current_model, &mut optim, train, lr, epoch)?;
            let val_loss = match valid {
                Some(loader) if loader.n_batches() > 0 => self.valid_epoch(&current_model, loader)?,
                _ => train_loss,
            };
            losses.train.push(train_loss);
            losses.validation.push(val_loss);

            let line = format!("Epoch: {epoch} train error: {train_loss:.4} validation loss: {val_loss:.4}");
            if self.config.verbose {
                tracing::info!("{line}");
            } else {
                tracing::debug!("{line}");
            }

            // the first epoch is always recorded so a best checkpoint exists
            if epoch == 0 || improves(best_val_loss, val_loss, self.config.min_delta) {
                best_val_loss = val_loss;
                best_epoch = epoch;
                best_model = current_model.clone();
                epochs_without_improvement = 0;
                self.save(&best_model, BEST_CHECKPOINT, epoch, val_loss)?;
            } else {
                epochs_without_improvement += 1;
            }
            self.save(&current_model, LAST_CHECKPOINT, epoch, val_loss)?;

            if self.config.patience > 0 && epochs_without_improvement >= self.config.patience {
                tracing::info!(epoch, patience = self.config.patience, "early stopping");
                break;
            }
        }

        let training_time_secs = start_time.elapsed().as_secs_f64();
        tracing::info!(best_epoch, best_val_loss, training_time_secs, "training complete");

        Ok(TrainingOutput {
            model: best_model,
            last_model: current_model,
            losses,
            best_epoch,
            best_val_loss,
            training_time_secs,
        })
    }

    fn train_epoch<M, O>(
        &self,
        model: &mut M,
        optim: &mut O,
        loader: &ForecastDataLoader,
        lr: f64,
        epoch: usize,
    ) -> Result<f32>
    where
        M: ForecastModel<B> + AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let quantiles = model.quantiles().to_vec();
        let mut total_loss = 0.0f32;
        let mut n_batches = 0usize;

        for batch in loader.iter_epoch::<B>(&self.device, epoch) {
            let batch = batch?;
            model.check_batch(&batch)?;
            let y_hat = model.forward(&batch);
            let loss = compute_loss(&self.loss, y_hat, &batch, &quantiles)?;
            let loss_value = loss.clone().into_scalar().elem::<f32>();
            if !loss_value.is_finite() {
                return Err(TrainError::NonFiniteLoss { epoch });
            }
            total_loss += loss_value;

            let grads = GradientsParams::from_grads(loss.backward(), model);
            *model = optim.step(lr, model.clone(), grads);
            n_batches += 1;
        }

        Ok(total_loss / n_batches.max(1) as f32)
    }

    fn valid_epoch<M>(&self, model: &M, loader: &ForecastDataLoader) -> Result<f32>
    where
        M: ForecastModel<B> + AutodiffModule<B>,
        M::InnerModule: ForecastModel<B::InnerBackend>,
    {
        let inner_model = model.valid();
        let inner_device: <B::InnerBackend as Backend>::Device = self.device.clone().into();
        let quantiles = inner_model.quantiles().to_vec();
        let mut total_loss = 0.0f32;
        let mut n_batches = 0usize;

        for batch in loader.iter::<B::InnerBackend>(&inner_device) {
            let batch = batch?;
            inner_model.check_batch(&batch)?;
            let y_hat = inner_model.forward(&batch);
            let loss = compute_loss(&self.loss, y_hat, &batch, &quantiles)?;
            total_loss += loss.into_scalar().elem::<f32>();
            n_batches += 1;
        }

        Ok(total_loss / n_batches.max(1) as f32)
    }

    fn save<M: AutodiffModule<B>>(&self, model: &M, name: &str, epoch: usize, val_loss: f32) -> Result<()> {
        let Some(dir) = &self.config.checkpoint_dir else {
            return Ok(());
        };
        model.save_checkpoint(dir.join(name))?;
        CheckpointMetadata::new(name)
            .with_epoch(epoch)
            .with_val_loss(val_loss)
            .save(dir.join(format!("{name}.json")))?;
        Ok(())
    }
}

/// Whether `val_loss` beats `best`. Any finite loss beats a non-finite best.
fn improves(best: f32, val_loss: f32, min_delta: f32) -> bool {
    if best.is_finite() {
        val_loss < best - min_delta
    } else {
        val_loss.is_finite()
    }
}
