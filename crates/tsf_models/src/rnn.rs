//! Recurrent encoder-decoder forecaster.

use burn::nn::conv::{Conv1d, Conv1dConfig};
use burn::nn::gru::{Gru, GruConfig};
use burn::nn::lstm::{Lstm, LstmConfig, LstmState};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig1d, Relu};
use burn::prelude::*;
use serde::{Deserialize, Serialize};
use burn::module::Ignored;
use tsf_core::{BatchLayout, ForecastBatch, ForecastModel};

use crate::embedding::CategoricalEmbedding;
use crate::error::{ModelError, Result};
use crate::spec::ForecastDims;
use crate::utils::Permute;

/// Type of recurrent cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RNNKind {
    /// Long Short-Term Memory.
    #[default]
    Lstm,
    /// Gated Recurrent Unit.
    Gru,
}

/// Configuration for [`RNN`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RNNConfig {
    /// Cell type.
    pub kind: RNNKind,
    /// Hidden size of every recurrent layer.
    pub hidden_rnn: usize,
    /// Number of stacked layers in the encoder and in the decoder.
    pub num_layers_rnn: usize,
    /// Kernel of the convolutional input encoder, must be odd.
    pub kernel_size_encoder: usize,
    /// Embedding size of each categorical variable.
    pub cat_emb_dim: usize,
    /// Sum the categorical embeddings instead of concatenating them.
    pub sum_emb: bool,
    /// Dropout before the output head.
    pub dropout: f64,
}

impl Default for RNNConfig {
    fn default() -> Self {
        Self {
            kind: RNNKind::Lstm,
            hidden_rnn: 32,
            num_layers_rnn: 2,
            kernel_size_encoder: 3,
            cat_emb_dim: 8,
            sum_emb: true,
            dropout: 0.1,
        }
    }
}

impl RNNConfig {
    /// Create a config for the given cell type.
    #[must_use]
    pub fn new(kind: RNNKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// Initialize a model.
    ///
    /// # Errors
    ///
    /// See [`RNN::new`].
    pub fn init<B: Backend>(&self, dims: &ForecastDims, device: &B::Device) -> Result<RNN<B>> {
        RNN::new(dims, self, device)
    }
}

/// Final states of a stack, one per layer.
enum StackState<B: Backend> {
    Lstm(Vec<LstmState<B, 2>>),
    Gru(Vec<Tensor<B, 2>>),
}

/// Stacked LSTM or GRU layers; only one of the two vectors is filled.
#[derive(Module, Debug)]
pub struct RecurrentStack<B: Backend> {
    lstm: Vec<Lstm<B>>,
    gru: Vec<Gru<B>>,
}

impl<B: Backend> RecurrentStack<B> {
    fn new(kind: RNNKind, d_input: usize, d_hidden: usize, layers: usize, device: &B::Device) -> Self {
        let input = |layer: usize| if layer == 0 { d_input } else { d_hidden };
        match kind {
            RNNKind::Lstm => Self {
                lstm: (0..layers)
                    .map(|l| LstmConfig::new(input(l), d_hidden, true).init(device))
                    .collect(),
                gru: Vec::new(),
            },
            RNNKind::Gru => Self {
                lstm: Vec::new(),
                gru: (0..layers)
                    .map(|l| GruConfig::new(input(l), d_hidden, true).init(device))
                    .collect(),
            },
        }
    }

    /// Run all layers, each starting from the matching entry of `init`.
    fn forward(&self, x: Tensor<B, 3>, init: Option<StackState<B>>) -> (Tensor<B, 3>, StackState<B>) {
        if self.lstm.is_empty() {
            let mut init: Vec<Option<Tensor<B, 2>>> = match init {
                Some(StackState::Gru(states)) => states.into_iter().map(Some).collect(),
                _ => Vec::new(),
            };
            init.resize_with(self.gru.len(), || None);

            let mut x = x;
            let mut finals = Vec::with_capacity(self.gru.len());
            for (gru, state) in self.gru.iter().zip(init) {
                x = gru.forward(x, state);
                let [batch, steps, hidden] = x.dims();
                finals.push(x.clone().slice([0..batch, steps - 1..steps, 0..hidden]).reshape([batch, hidden]));
            }
            (x, StackState::Gru(finals))
        } else {
            let mut init: Vec<Option<LstmState<B, 2>>> = match init {
                Some(StackState::Lstm(states)) => states.into_iter().map(Some).collect(),
                _ => Vec::new(),
            };
            init.resize_with(self.lstm.len(), || None);

            let mut x = x;
            let mut finals = Vec::with_capacity(self.lstm.len());
            for (lstm, state) in self.lstm.iter().zip(init) {
                let (out, last) = lstm.forward(x, state);
                x = out;
                finals.push(last);
            }
            (x, StackState::Lstm(finals))
        }
    }
}

/// LSTM/GRU encoder-decoder.
///
/// Past numericals and past embeddings go through a `Conv1d` encoder and
/// a recurrent stack. The decoder stack starts from the encoder's final
/// states and reads, at every future step, the last encoder output next
/// to the future covariates.
#[derive(Module, Debug)]
pub struct RNN<B: Backend> {
    past_embedding: CategoricalEmbedding<B>,
    future_embedding: CategoricalEmbedding<B>,
    permute: Permute,
    conv: Conv1d<B>,
    activation: Relu,
    encoder: RecurrentStack<B>,
    decoder: RecurrentStack<B>,
    dropout: Dropout,
    head: Linear<B>,
    #[module(skip)]
    future_steps: usize,
    #[module(skip)]
    out_channels: usize,
    #[module(skip)]
    future_channels: usize,
    #[module(skip)]
    quantiles: Vec<f32>,
    #[module(skip)]
    layout: Ignored<BatchLayout>,
}

impl<B: Backend> RNN<B> {
    /// Create a new model.
    ///
    /// # Errors
    ///
    /// Fails on invalid dimensions, an even or zero encoder kernel, zero
    /// hidden size or layers, or a dropout outside `[0, 1)`.
    pub fn new(dims: &ForecastDims, config: &RNNConfig, device: &B::Device) -> Result<Self> {
        dims.validate()?;
        if config.kernel_size_encoder % 2 == 0 {
            return Err(ModelError::InvalidConfig(format!(
                "kernel_size_encoder must be odd, got {}",
                config.kernel_size_encoder
            )));
        }
        if config.hidden_rnn == 0 || config.num_layers_rnn == 0 {
            return Err(ModelError::InvalidConfig(
                "hidden_rnn and num_layers_rnn must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&config.dropout) {
            return Err(ModelError::InvalidConfig(format!("dropout {} not in [0, 1)", config.dropout)));
        }

        let hidden = config.hidden_rnn;
        let past_embedding = CategoricalEmbedding::new(&dims.embs, config.cat_emb_dim, config.sum_emb, device);
        let future_embedding = CategoricalEmbedding::new(&dims.embs, config.cat_emb_dim, config.sum_emb, device);

        let conv_in = dims.past_channels + past_embedding.output_dim();
        let conv = Conv1dConfig::new(conv_in, hidden, config.kernel_size_encoder)
            .with_padding(PaddingConfig1d::Explicit((config.kernel_size_encoder - 1) / 2))
            .init(device);

        let decoder_in = hidden + dims.future_channels + future_embedding.output_dim();
        let encoder = RecurrentStack::new(config.kind, hidden, hidden, config.num_layers_rnn, device);
        let decoder = RecurrentStack::new(config.kind, decoder_in, hidden, config.num_layers_rnn, device);

        Ok(Self {
            past_embedding,
            future_embedding,
            permute: Permute::new(),
            conv,
            activation: Relu::new(),
            encoder,
            decoder,
            dropout: DropoutConfig::new(config.dropout).init(),
            head: LinearConfig::new(hidden, dims.out_channels * dims.mul()).init(device),
            future_steps: dims.future_steps,
            out_channels: dims.out_channels,
            future_channels: dims.future_channels,
            quantiles: dims.quantiles.clone(),
            layout: Ignored(dims.layout()),
        })
    }
}

impl<B: Backend> ForecastModel<B> for RNN<B> {
    fn forward(&self, batch: &ForecastBatch<B>) -> Tensor<B, 4> {
        let batch_size = batch.batch_size();

        let mut past = vec![batch.x_num_past.clone()];
        if let Some(emb) = batch.x_cat_past.clone().and_then(|x| self.past_embedding.forward(x)) {
            past.push(emb);
        }
        let x = Tensor::cat(past, 2);
        let x = self.activation.forward(self.permute.forward(self.conv.forward(self.permute.forward(x))));
        let (encoded, state) = self.encoder.forward(x, None);

        let [_, steps, hidden] = encoded.dims();
        let last = encoded.slice([0..batch_size, steps - 1..steps, 0..hidden]);
        let mut future = vec![last.repeat_dim(1, self.future_steps)];
        if self.future_channels > 0 {
            if let Some(x) = &batch.x_num_future {
                future.push(x.clone());
            }
        }
        if let Some(emb) = batch.x_cat_future.clone().and_then(|x| self.future_embedding.forward(x)) {
            future.push(emb);
        }
        let (decoded, _) = self.decoder.forward(Tensor::cat(future, 2), Some(state));

        self.head
            .forward(self.dropout.forward(decoded))
            .reshape([batch_size, self.future_steps, self.out_channels, self.mul()])
    }

    fn layout(&self) -> BatchLayout {
        *self.layout
    }

    fn future_steps(&self) -> usize {
        self.future_steps
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }

    fn quantiles(&self) -> &[f32] {
        &self.quantiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    fn batch(device: &<TestBackend as Backend>::Device, with_future: bool) -> ForecastBatch<TestBackend> {
        let x = Tensor::<TestBackend, 3>::random([3, 10, 2], burn::tensor::Distribution::Default, device);
        let mut batch = ForecastBatch::new(x, vec![1]).unwrap();
        if with_future {
            batch = batch
                .with_num_future(Tensor::ones([3, 5, 1], device))
                .unwrap()
                .with_categoricals(
                    Tensor::<TestBackend, 3, Int>::zeros([3, 10, 2], device),
                    Tensor::<TestBackend, 3, Int>::ones([3, 5, 2], device),
                )
                .unwrap();
        }
        batch
    }

    #[test]
    fn test_lstm_forward() {
        let device = Default::default();
        let dims = ForecastDims::new(10, 5, 2, 0, 1);
        let model = RNNConfig::new(RNNKind::Lstm).init::<TestBackend>(&dims, &device).unwrap();
        assert_eq!(model.forward(&batch(&device, false)).dims(), [3, 5, 1, 1]);
    }

    #[test]
    fn test_gru_with_covariates() {
        let device = Default::default();
        let dims = ForecastDims::new(10, 5, 2, 1, 1)
            .with_embs(vec![2, 3])
            .with_quantiles(vec![0.1, 0.5, 0.9]);
        let config = RNNConfig {
            kind: RNNKind::Gru,
            num_layers_rnn: 3,
            sum_emb: false,
            ..Default::default()
        };
        let model = config.init::<TestBackend>(&dims, &device).unwrap();
        let batch = batch(&device, true);
        assert_eq!(model.forward(&batch).dims(), [3, 5, 1, 3]);
        assert_eq!(model.inference(&batch).dims(), [3, 5, 1, 3]);
    }

    #[test]
    fn test_even_kernel_rejected() {
        let device = Default::default();
        let dims = ForecastDims::new(10, 5, 2, 0, 1);
        let config = RNNConfig {
            kernel_size_encoder: 4,
            ..Default::default()
        };
        assert!(matches!(
            RNN::<TestBackend>::new(&dims, &config, &device),
            Err(ModelError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_serde() {
        let config: RNNConfig = serde_json::from_str(r#"{"kind": "gru", "hidden_rnn": 8}"#).unwrap();
        assert_eq!(config.kind, RNNKind::Gru);
        assert_eq!(config.hidden_rnn, 8);
        assert_eq!(config.num_layers_rnn, 2);
    }
}
