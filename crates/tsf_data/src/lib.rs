//! # tsf_data
//!
//! Data handling for tsforecast time series forecasting.
//!
//! This crate provides:
//! - [`TimeFrame`], a column table indexed by time, with CSV I/O and
//!   hole/duplicate repair
//! - [`Frequency`] and calendar enrichment ([`CalendarFeature`])
//! - [`Categorical`] regimes to generate synthetic signals
//! - [`StandardScaler`] and [`LabelEncoder`]
//! - [`split_frame`] and [`create_windows`] to build forecasting windows
//! - [`ForecastDataLoader`] for batched iteration with shuffling
//! - [`Monarch`] for the Monash forecasting repository and
//!   [`read_public_dataset`] for the long horizon benchmarks
//!
//! ## Example
//!
//! ```rust,ignore
//! use tsf_data::{create_windows, split_frame, ForecastDataLoader, SplitParams, WindowSpec};
//! use tsf_core::Seed;
//!
//! let params = SplitParams::new(64, 16);
//! let (train, _, _) = split_frame(&frame, &params)?;
//! let mut spec = WindowSpec::from_params(&params);
//! spec.past_variables = vec!["y".into()];
//! spec.target_variables = vec!["y".into()];
//!
//! let loader = ForecastDataLoader::builder(create_windows(&train, &spec)?)
//!     .batch_size(32)
//!     .shuffle(true)
//!     .seed(Seed::new(42))
//!     .build()?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod categorical;
mod enrich;
mod error;
mod frame;
mod freq;
mod loader;
pub mod monarch;
pub mod public;
mod scaler;
mod split;
pub mod tsf_file;
mod window;

pub use categorical::{generate_frame, synthetic_start, Action, Categorical, SIGNAL_COLUMN};
pub use enrich::{enrich, CalendarFeature};
pub use error::{DataError, Result};
pub use frame::{parse_timestamp, TimeFrame, TIME_COLUMN};
pub use freq::Frequency;
pub use loader::{ForecastDataLoader, ForecastDataLoaderBuilder, ForecastDataLoaderIter};
pub use monarch::{list_forecasting_datasets, Monarch, MonarchEntry};
pub use public::read_public_dataset;
pub use scaler::{LabelEncoder, StandardScaler};
pub use split::{split_frame, SplitParams, StartingPoint};
pub use tsf_file::{convert_tsf_to_dataframe, TsfData, TsfSeries};
pub use window::{create_windows, WindowDataset, WindowSpec};

/// Cache directory for downloaded datasets.
pub const CACHE_DIR: &str = ".cache/tsforecast";

/// Get the default cache directory path.
#[must_use]
pub fn cache_dir() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_DIR)
}
