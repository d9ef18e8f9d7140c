//! TOML run configuration shared by `tsf train` and `tsf infer`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use regex::{Captures, Regex};
use serde::Deserialize;
use tsf::{LoadSignalOptions, TimeSeries, TrainOptions};
use tsf_core::{Seed, Split};
use tsf_data::{read_public_dataset, Categorical, Monarch, SplitParams, TimeFrame};
use tsf_models::ModelSpec;
use tsf_train::{LossConfig, OptimConfig, SchedulerConfig};

/// Where the data comes from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum DatasetConfig {
    /// One of the long horizon benchmarks, target `y`.
    Public {
        dataset: String,
        path: PathBuf,
        /// Use the other columns as past variables.
        #[serde(default = "default_true")]
        use_covariates: bool,
    },
    /// A series of the Monash repository.
    Monarch {
        id: String,
        path: PathBuf,
        /// Series name, the first series when absent.
        #[serde(default)]
        series: Option<String>,
    },
    /// A CSV file with a time column.
    Csv {
        file: PathBuf,
        #[serde(default = "default_time_column")]
        time_column: String,
        #[serde(default)]
        time_format: Option<String>,
    },
    /// A signal generated from categorical regimes, target `signal` unless
    /// `[ts]` names one. The regimes join the `[ts]` categoricals.
    Synthetic {
        length: usize,
        #[serde(default)]
        noise_mean: f32,
        #[serde(default)]
        seed: u64,
        categoricals: Vec<Categorical>,
    },
}

fn default_true() -> bool {
    true
}

fn default_time_column() -> String {
    "time".to_string()
}

/// The `[ts]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TsConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(flatten)]
    pub signal: LoadSignalOptions,
}

fn default_version() -> u32 {
    1
}

/// The `[train_config]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrainSection {
    /// Checkpoints and saved series.
    pub dirpath: PathBuf,
    pub batch_size: usize,
    pub max_epochs: usize,
    pub patience: usize,
    pub seed: u64,
    /// Empty for point forecasts.
    pub quantiles: Vec<f32>,
}

impl Default for TrainSection {
    fn default() -> Self {
        let options = TrainOptions::default();
        Self {
            dirpath: PathBuf::from("runs"),
            batch_size: options.batch_size,
            max_epochs: options.max_epochs,
            patience: options.patience,
            seed: options.seed,
            quantiles: Vec::new(),
        }
    }
}

/// The `[inference]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub output_path: PathBuf,
    pub set: Split,
    pub rescaling: bool,
    pub batch_size: usize,
    /// Use the `last` checkpoint instead of `best`.
    pub load_last: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("output"),
            set: Split::Test,
            rescaling: true,
            batch_size: 100,
            load_last: true,
        }
    }
}

/// A whole run configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunConfig {
    pub dataset: DatasetConfig,
    pub ts: TsConfig,
    pub model: ModelSpec,
    pub split_params: SplitParams,
    #[serde(default)]
    pub train_config: TrainSection,
    #[serde(default)]
    pub optim: OptimConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub loss: LossConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
}

/// Replace every `${VAR}` with the value of the environment variable.
pub fn substitute_env(text: &str) -> Result<String> {
    let pattern = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")?;
    let mut missing = Vec::new();
    let replaced = pattern.replace_all(text, |caps: &Captures| match std::env::var(&caps[1]) {
        Ok(value) => value,
        Err(_) => {
            missing.push(caps[1].to_string());
            String::new()
        }
    });
    if !missing.is_empty() {
        bail!("undefined environment variables: {}", missing.join(", "));
    }
    Ok(replaced.into_owned())
}

impl RunConfig {
    /// Parse a configuration after environment substitution.
    pub fn parse(text: &str) -> Result<Self> {
        let text = substitute_env(text)?;
        Ok(toml::from_str(&text)?)
    }

    /// Read a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid configuration {}", path.display()))
    }

    /// Training settings.
    #[must_use]
    pub fn train_options(&self) -> TrainOptions {
        TrainOptions {
            batch_size: self.train_config.batch_size,
            max_epochs: self.train_config.max_epochs,
            patience: self.train_config.patience,
            seed: self.train_config.seed,
            optim: self.optim.clone(),
            scheduler: self.scheduler.clone(),
            loss: self.loss.clone(),
        }
    }

    /// Load the configured data into a new series.
    pub fn load_series(&self) -> Result<TimeSeries> {
        let mut ts = TimeSeries::new(self.ts.name.clone());
        let mut signal = self.ts.signal.clone();
        match &self.dataset {
            DatasetConfig::Public {
                dataset,
                path,
                use_covariates,
            } => {
                let (frame, covariates) = read_public_dataset(path, dataset)?;
                if *use_covariates {
                    signal.past_variables.extend(covariates);
                }
                with_default_target(&mut signal, tsf_data::public::TARGET_COLUMN);
                ts.load_signal(frame, signal)?;
            }
            DatasetConfig::Monarch { id, path, series } => {
                let data = Monarch::from_table(path.join("monarch.json"), Vec::new()).generate_dataset(path, id)?;
                let mut frames = data.to_frames()?;
                let index = match series {
                    Some(name) => frames
                        .iter()
                        .position(|(n, _)| n == name)
                        .with_context(|| format!("no series '{name}' in dataset {id}"))?,
                    None => 0,
                };
                if index >= frames.len() {
                    bail!("dataset {id} has no series");
                }
                let (_, frame) = frames.swap_remove(index);
                with_default_target(&mut signal, &data.value_column_name);
                ts.load_signal(frame, signal)?;
            }
            DatasetConfig::Csv {
                file,
                time_column,
                time_format,
            } => {
                let frame = TimeFrame::read_csv(file, time_column, time_format.as_deref())?;
                ts.load_signal(frame, signal)?;
            }
            DatasetConfig::Synthetic {
                length,
                noise_mean,
                seed,
                categoricals,
            } => {
                ts.generate_signal_with(*length, categoricals, *noise_mean, Seed::new(*seed), signal)?;
            }
        }
        ts.set_model(self.model.clone());
        ts.set_quantiles(self.train_config.quantiles.clone());
        Ok(ts)
    }

    /// File receiving the per-lag errors of an inference run.
    #[must_use]
    pub fn errors_file(&self) -> PathBuf {
        self.inference.output_path.join("csv").join(format!(
            "{}_{}_{}_{}.csv",
            self.model.name(),
            self.ts.name,
            self.ts.version,
            self.inference.set
        ))
    }
}

fn with_default_target(signal: &mut LoadSignalOptions, target: &str) {
    if signal.target_variables.is_empty() {
        signal.target_variables.push(target.to_string());
    }
}
