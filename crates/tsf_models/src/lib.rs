//! # tsf_models
//!
//! Forecasting models for tsforecast.
//!
//! Every model implements [`tsf_core::ForecastModel`] and maps a
//! [`tsf_core::ForecastBatch`] to `(batch, future_steps, out_channels, mul)`.
//!
//! ## Models
//!
//! - [`LinearTS`]: linear, DLinear and NLinear with a covariate head
//! - [`RNN`]: LSTM/GRU encoder-decoder with a convolutional input encoder
//! - [`Attention`]: transformer encoder-decoder, autoregressive at inference
//! - [`Persistent`]: repeats the last observed value
//!
//! Models are described by a [`ModelSpec`] and built for the
//! [`ForecastDims`] of a dataset.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tsf_models::{ForecastDims, LinearKind, LinearTSConfig, ModelSpec};
//!
//! let dims = ForecastDims::new(64, 16, 3, 1, 1);
//! let spec = ModelSpec::Linear(LinearTSConfig::new(LinearKind::DLinear));
//! let model = spec.build::<NdArray>(&dims, &device)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod attention;
pub mod checkpoint;
mod embedding;
mod error;
mod linear;
mod persistent;
mod rnn;
mod spec;
mod utils;

pub use attention::{Attention, AttentionConfig, DecoderLayer, EncoderLayer, PositionalEncoding};
pub use checkpoint::{checkpoint_file, CheckpointError, CheckpointMetadata, ModelCheckpoint};
pub use embedding::CategoricalEmbedding;
pub use error::{ModelError, Result};
pub use linear::{LinearKind, LinearTS, LinearTSConfig, MovingAvg, SeriesDecomp};
pub use persistent::Persistent;
pub use rnn::{RNNConfig, RNNKind, RecurrentStack, RNN};
pub use spec::{AnyModel, ForecastDims, ModelSpec};
pub use utils::{generate_square_subsequent_mask, get_device, Permute};
