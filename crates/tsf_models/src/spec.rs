//! Model dimensions and the serializable model description.

use burn::prelude::*;
use serde::{Deserialize, Serialize};
use tsf_core::BatchLayout;

use crate::attention::{Attention, AttentionConfig};
use crate::error::{ModelError, Result};
use crate::linear::{LinearTS, LinearTSConfig};
use crate::persistent::Persistent;
use crate::rnn::{RNNConfig, RNN};

/// Dimensions shared by every forecasting model, derived from the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDims {
    /// Length of the input context.
    pub past_steps: usize,
    /// Forecast horizon.
    pub future_steps: usize,
    /// Number of past numerical channels.
    pub past_channels: usize,
    /// Number of future numerical channels.
    pub future_channels: usize,
    /// Number of targets.
    pub out_channels: usize,
    /// Cardinality of each categorical variable.
    #[serde(default)]
    pub embs: Vec<usize>,
    /// Predicted quantiles, empty for point forecasts.
    #[serde(default)]
    pub quantiles: Vec<f32>,
}

impl ForecastDims {
    /// Create dimensions without categoricals or quantiles.
    #[must_use]
    pub fn new(
        past_steps: usize,
        future_steps: usize,
        past_channels: usize,
        future_channels: usize,
        out_channels: usize,
    ) -> Self {
        Self {
            past_steps,
            future_steps,
            past_channels,
            future_channels,
            out_channels,
            embs: Vec::new(),
            quantiles: Vec::new(),
        }
    }

    /// Set the categorical cardinalities.
    #[must_use]
    pub fn with_embs(mut self, embs: Vec<usize>) -> Self {
        self.embs = embs;
        self
    }

    /// Set the quantiles.
    #[must_use]
    pub fn with_quantiles(mut self, quantiles: Vec<f32>) -> Self {
        self.quantiles = quantiles;
        self
    }

    /// Number of outputs per target.
    #[must_use]
    pub fn mul(&self) -> usize {
        if self.quantiles.is_empty() {
            1
        } else {
            3
        }
    }

    /// Batch shapes a model built with these dimensions expects.
    #[must_use]
    pub fn layout(&self) -> BatchLayout {
        BatchLayout {
            past_steps: self.past_steps,
            past_channels: self.past_channels,
            future_steps: self.future_steps,
            future_channels: self.future_channels,
            n_cat: self.embs.len(),
        }
    }

    /// Check the dimensions and the quantiles.
    ///
    /// # Errors
    ///
    /// [`ModelError::InvalidDims`] for a zero length or channel count,
    /// [`ModelError::InvalidQuantiles`] unless there are zero or three
    /// increasing quantiles in (0, 1).
    pub fn validate(&self) -> Result<()> {
        if self.past_steps == 0 || self.future_steps == 0 {
            return Err(ModelError::InvalidDims(format!(
                "past_steps ({}) and future_steps ({}) must be positive",
                self.past_steps, self.future_steps
            )));
        }
        if self.past_channels == 0 || self.out_channels == 0 {
            return Err(ModelError::InvalidDims(
                "at least one past channel and one target are required".to_string(),
            ));
        }
        if self.embs.contains(&0) {
            return Err(ModelError::InvalidDims("categorical with no classes".to_string()));
        }
        if !self.quantiles.is_empty() {
            let in_range = self.quantiles.iter().all(|q| *q > 0.0 && *q < 1.0);
            let increasing = self.quantiles.windows(2).all(|w| w[0] < w[1]);
            if self.quantiles.len() != 3 || !in_range || !increasing {
                return Err(ModelError::InvalidQuantiles(self.quantiles.clone()));
            }
        }
        Ok(())
    }
}

/// Which model to build, with its hyperparameters.
///
/// Serialized with a `type` tag, e.g. `{"type": "rnn", "hidden_rnn": 32}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelSpec {
    /// Linear, DLinear or NLinear.
    Linear(LinearTSConfig),
    /// LSTM/GRU encoder-decoder.
    Rnn(RNNConfig),
    /// Transformer encoder-decoder.
    Attention(AttentionConfig),
    /// Repeat the last observed value.
    Persistent,
}

impl ModelSpec {
    /// Short name used in file names and logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Linear(_) => "linear",
            Self::Rnn(_) => "rnn",
            Self::Attention(_) => "attention",
            Self::Persistent => "persistent",
        }
    }

    /// Build the described model for the given dimensions.
    ///
    /// # Errors
    ///
    /// Fails when the dimensions or the hyperparameters are invalid.
    pub fn build<B: Backend>(&self, dims: &ForecastDims, device: &B::Device) -> Result<AnyModel<B>> {
        tracing::debug!(model = self.name(), ?dims, "building model");
        Ok(match self {
            Self::Linear(config) => AnyModel::Linear(LinearTS::new(dims, config, device)?),
            Self::Rnn(config) => AnyModel::Rnn(RNN::new(dims, config, device)?),
            Self::Attention(config) => AnyModel::Attention(Attention::new(dims, config, device)?),
            Self::Persistent => AnyModel::Persistent(Persistent::new(dims, device)?),
        })
    }
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self::Linear(LinearTSConfig::default())
    }
}

/// A model built from a [`ModelSpec`].
#[derive(Debug)]
pub enum AnyModel<B: Backend> {
    /// See [`LinearTS`].
    Linear(LinearTS<B>),
    /// See [`RNN`].
    Rnn(RNN<B>),
    /// See [`Attention`].
    Attention(Attention<B>),
    /// See [`Persistent`].
    Persistent(Persistent<B>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul() {
        let dims = ForecastDims::new(8, 4, 2, 0, 1);
        assert_eq!(dims.mul(), 1);
        assert_eq!(dims.with_quantiles(vec![0.1, 0.5, 0.9]).mul(), 3);
    }

    #[test]
    fn test_validate_quantiles() {
        let dims = ForecastDims::new(8, 4, 2, 0, 1);
        assert!(dims.validate().is_ok());
        assert!(dims.clone().with_quantiles(vec![0.1, 0.5, 0.9]).validate().is_ok());
        assert!(matches!(
            dims.clone().with_quantiles(vec![0.5, 0.9]).validate(),
            Err(ModelError::InvalidQuantiles(_))
        ));
        assert!(dims.clone().with_quantiles(vec![0.9, 0.5, 0.1]).validate().is_err());
        assert!(dims.with_quantiles(vec![0.0, 0.5, 1.0]).validate().is_err());
    }

    #[test]
    fn test_validate_dims() {
        assert!(ForecastDims::new(0, 4, 2, 0, 1).validate().is_err());
        assert!(ForecastDims::new(8, 4, 2, 0, 0).validate().is_err());
        assert!(ForecastDims::new(8, 4, 2, 0, 1).with_embs(vec![3, 0]).validate().is_err());
    }

    #[test]
    fn test_spec_serde() {
        let spec: ModelSpec = serde_json::from_str(r#"{"type": "rnn", "hidden_rnn": 16}"#).unwrap();
        match &spec {
            ModelSpec::Rnn(config) => assert_eq!(config.hidden_rnn, 16),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(spec.name(), "rnn");

        let persistent: ModelSpec = serde_json::from_str(r#"{"type": "persistent"}"#).unwrap();
        assert_eq!(persistent, ModelSpec::Persistent);

        let json = serde_json::to_string(&ModelSpec::default()).unwrap();
        assert!(json.contains(r#""type":"linear""#));
    }
}
