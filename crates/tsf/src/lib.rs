//! # tsf
//!
//! Multi-step time series forecasting in Rust.
//!
//! The [`TimeSeries`] object ties the workspace together: it loads a
//! [`TimeFrame`](tsf_data::TimeFrame), scales and windows it, trains one of
//! the models of [`tsf_models`] with [`tsf_train`] and lays the forecasts
//! out as a [`PredictionTable`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tsf::prelude::*;
//!
//! let (frame, covariates) = read_public_dataset("data", "etth1")?;
//! let mut ts = TimeSeries::new("etth1");
//! ts.load_signal(frame, LoadSignalOptions {
//!     past_variables: covariates,
//!     enrich_cat: vec![CalendarFeature::Hour, CalendarFeature::Dow],
//!     ..LoadSignalOptions::new(vec!["y".into()])
//! })?;
//! ts.set_model(ModelSpec::Rnn(RNNConfig::default()));
//! ts.train_model("runs/etth1", SplitParams::new(96, 24), TrainOptions::default())?;
//!
//! let table = ts.inference_on_set(64, Split::Test, true)?;
//! for error in table.errors_by_lag() {
//!     println!("{} lag {}: MSE {:.3}", error.variable, error.lag, error.mse);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod model;
mod table;
mod timeseries;

// Re-export all crates
pub use tsf_core as core;
pub use tsf_data as data;
pub use tsf_models as models;
pub use tsf_train as train;

pub use error::{Result, TsfError};
pub use model::{InferBackend, TrainBackend, TrainedModel};
pub use table::{write_errors_csv, LagError, PredictionRow, PredictionTable};
pub use timeseries::{LoadSignalOptions, TimeSeries, TrainOptions, SERIES_FILE};

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use tsf::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{LoadSignalOptions, PredictionTable, TimeSeries, TrainOptions, TsfError};

    // Core types
    pub use tsf_core::{ForecastBatch, ForecastModel, Seed, Split};

    // Data
    pub use tsf_data::{
        read_public_dataset, Action, CalendarFeature, Categorical, ForecastDataLoader, Frequency, Monarch,
        SplitParams, TimeFrame,
    };

    // Models
    pub use tsf_models::{
        AttentionConfig, ForecastDims, LinearKind, LinearTSConfig, ModelSpec, RNNConfig, RNNKind,
    };

    // Training
    pub use tsf_train::{BaseLoss, LossConfig, LossType, OptimConfig, OptimizerKind, SchedulerConfig};
}
