//! # tsf_core
//!
//! Core types and traits for tsforecast time series forecasting.
//!
//! This crate provides:
//! - [`Seed`] for deterministic random number generation
//! - [`Split`] naming the train/validation/test partitions
//! - [`ForecastBatch`], the batch layout every forecasting model consumes
//! - [`ForecastModel`], the trait every forecasting model implements
//! - Error types and common utilities
//!
//! ## Shape Convention
//!
//! Forecasting tensors are time-major, `(B, L, C)`:
//! - `B`: Batch size (number of windows)
//! - `L`: Steps (`past_steps` for inputs, `future_steps` for targets)
//! - `C`: Channels (variables)
//!
//! Model outputs add a trailing axis of size `mul` (1, or 3 with quantiles):
//! `(B, future_steps, out_channels, mul)`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tsf_core::{ForecastBatch, Seed};
//!
//! let seed = Seed::new(42);
//! let batch = ForecastBatch::new(x_num_past, vec![0])?.with_target(y)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod batch;
mod error;
mod model_trait;
mod seed;
mod split;

pub use batch::{BatchLayout, ForecastBatch};
pub use error::{CoreError, Result};
pub use model_trait::ForecastModel;
pub use seed::Seed;
pub use split::Split;
