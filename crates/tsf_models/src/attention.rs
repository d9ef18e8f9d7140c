//! Transformer encoder-decoder forecaster.

use burn::nn::attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig};
use burn::nn::{Dropout, DropoutConfig, LayerNorm, LayerNormConfig, Linear, LinearConfig, Relu};
use burn::prelude::*;
use serde::{Deserialize, Serialize};
use burn::module::Ignored;
use tsf_core::{BatchLayout, ForecastBatch, ForecastModel};

use crate::embedding::CategoricalEmbedding;
use crate::error::{ModelError, Result};
use crate::spec::ForecastDims;
use crate::utils::generate_square_subsequent_mask;

/// Configuration for [`Attention`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttentionConfig {
    /// Model dimension.
    pub d_model: usize,
    /// Number of attention heads, must divide `d_model`.
    pub num_heads: usize,
    /// Number of encoder layers.
    pub n_layer_encoder: usize,
    /// Number of decoder layers.
    pub n_layer_decoder: usize,
    /// Width of the feedforward blocks.
    pub hidden_size: usize,
    /// Embedding size of each categorical variable.
    pub cat_emb_dim: usize,
    /// Sum the categorical embeddings instead of concatenating them.
    pub sum_emb: bool,
    /// Dropout rate.
    pub dropout: f64,
    /// Longest sequence the positional encoding accepts.
    pub max_len: usize,
}

impl Default for AttentionConfig {
    fn default() -> Self {
        Self {
            d_model: 32,
            num_heads: 4,
            n_layer_encoder: 2,
            n_layer_decoder: 2,
            hidden_size: 64,
            cat_emb_dim: 8,
            sum_emb: true,
            dropout: 0.1,
            max_len: 5000,
        }
    }
}

impl AttentionConfig {
    /// Initialize a model.
    ///
    /// # Errors
    ///
    /// See [`Attention::new`].
    pub fn init<B: Backend>(&self, dims: &ForecastDims, device: &B::Device) -> Result<Attention<B>> {
        Attention::new(dims, self, device)
    }
}

/// Sinusoidal positional encoding followed by dropout.
#[derive(Module, Clone, Debug)]
pub struct PositionalEncoding {
    dropout: Dropout,
    #[module(skip)]
    d_model: usize,
    #[module(skip)]
    max_len: usize,
}

impl PositionalEncoding {
    /// Create an encoding for sequences of at most `max_len` steps.
    #[must_use]
    pub fn new(d_model: usize, dropout: f64, max_len: usize) -> Self {
        Self {
            dropout: DropoutConfig::new(dropout).init(),
            d_model,
            max_len,
        }
    }

    /// Longest supported sequence.
    #[must_use]
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// The `(seq_len, d_model)` table.
    pub fn table<B: Backend>(&self, seq_len: usize, device: &B::Device) -> Tensor<B, 2> {
        let d_model = self.d_model;
        let mut pe = vec![0.0f32; seq_len * d_model];
        for pos in 0..seq_len {
            for i in 0..d_model {
                let angle = pos as f32 / 10000.0f32.powf((2 * (i / 2)) as f32 / d_model as f32);
                pe[pos * d_model + i] = if i % 2 == 0 { angle.sin() } else { angle.cos() };
            }
        }
        Tensor::<B, 1>::from_floats(pe.as_slice(), device).reshape([seq_len, d_model])
    }

    /// Add the encoding to `(batch, steps, d_model)`.
    pub fn forward<B: Backend>(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [_, steps, _] = x.dims();
        let pe = self.table::<B>(steps.min(self.max_len), &x.device());
        self.dropout.forward(x + pe.unsqueeze::<3>())
    }
}

#[derive(Module, Debug)]
struct FeedForward<B: Backend> {
    linear1: Linear<B>,
    linear2: Linear<B>,
    activation: Relu,
    dropout: Dropout,
}

impl<B: Backend> FeedForward<B> {
    fn new(d_model: usize, hidden: usize, dropout: f64, device: &B::Device) -> Self {
        Self {
            linear1: LinearConfig::new(d_model, hidden).init(device),
            linear2: LinearConfig::new(hidden, d_model).init(device),
            activation: Relu::new(),
            dropout: DropoutConfig::new(dropout).init(),
        }
    }

    fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = self.dropout.forward(self.activation.forward(self.linear1.forward(x)));
        self.linear2.forward(x)
    }
}

/// Post-norm encoder layer.
#[derive(Module, Debug)]
pub struct EncoderLayer<B: Backend> {
    attention: MultiHeadAttention<B>,
    norm1: LayerNorm<B>,
    feed_forward: FeedForward<B>,
    norm2: LayerNorm<B>,
    dropout: Dropout,
}

impl<B: Backend> EncoderLayer<B> {
    fn new(config: &AttentionConfig, device: &B::Device) -> Self {
        Self {
            attention: MultiHeadAttentionConfig::new(config.d_model, config.num_heads)
                .with_dropout(config.dropout)
                .init(device),
            norm1: LayerNormConfig::new(config.d_model).init(device),
            feed_forward: FeedForward::new(config.d_model, config.hidden_size, config.dropout, device),
            norm2: LayerNormConfig::new(config.d_model).init(device),
            dropout: DropoutConfig::new(config.dropout).init(),
        }
    }

    fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let attn = self.attention.forward(MhaInput::self_attn(x.clone())).context;
        let x = self.norm1.forward(x + self.dropout.forward(attn));
        let ff = self.feed_forward.forward(x.clone());
        self.norm2.forward(x + self.dropout.forward(ff))
    }
}

/// Post-norm decoder layer: masked self-attention, cross-attention on the
/// encoder output, feedforward.
#[derive(Module, Debug)]
pub struct DecoderLayer<B: Backend> {
    self_attention: MultiHeadAttention<B>,
    norm1: LayerNorm<B>,
    cross_attention: MultiHeadAttention<B>,
    norm2: LayerNorm<B>,
    feed_forward: FeedForward<B>,
    norm3: LayerNorm<B>,
    dropout: Dropout,
}

impl<B: Backend> DecoderLayer<B> {
    fn new(config: &AttentionConfig, device: &B::Device) -> Self {
        let mha = || {
            MultiHeadAttentionConfig::new(config.d_model, config.num_heads)
                .with_dropout(config.dropout)
                .init(device)
        };
        Self {
            self_attention: mha(),
            norm1: LayerNormConfig::new(config.d_model).init(device),
            cross_attention: mha(),
            norm2: LayerNormConfig::new(config.d_model).init(device),
            feed_forward: FeedForward::new(config.d_model, config.hidden_size, config.dropout, device),
            norm3: LayerNormConfig::new(config.d_model).init(device),
            dropout: DropoutConfig::new(config.dropout).init(),
        }
    }

    fn forward(&self, x: Tensor<B, 3>, memory: Tensor<B, 3>, mask: Tensor<B, 3, Bool>) -> Tensor<B, 3> {
        let attn = self
            .self_attention
            .forward(MhaInput::self_attn(x.clone()).mask_attn(mask))
            .context;
        let x = self.norm1.forward(x + self.dropout.forward(attn));
        let cross = self
            .cross_attention
            .forward(MhaInput::new(x.clone(), memory.clone(), memory))
            .context;
        let x = self.norm2.forward(x + self.dropout.forward(cross));
        let ff = self.feed_forward.forward(x.clone());
        self.norm3.forward(x + self.dropout.forward(ff))
    }
}

/// Transformer encoder-decoder.
///
/// The encoder reads the past numericals and embeddings. The decoder reads
/// the sequence `[last past target, y_1, .., y_{F-1}]` next to the future
/// covariates, under a causal mask. Training feeds the true targets
/// (teacher forcing); [`ForecastModel::inference`] feeds back its own
/// predictions, using the median when predicting quantiles.
#[derive(Module, Debug)]
pub struct Attention<B: Backend> {
    past_embedding: CategoricalEmbedding<B>,
    future_embedding: CategoricalEmbedding<B>,
    encoder_input: Linear<B>,
    decoder_input: Linear<B>,
    positional: PositionalEncoding,
    encoder: Vec<EncoderLayer<B>>,
    decoder: Vec<DecoderLayer<B>>,
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

impl<B: Backend> Attention<B> {
    /// Create a new model.
    ///
    /// # Errors
    ///
    /// Fails on invalid dimensions, when `num_heads` does not divide
    /// `d_model`, when a sequence exceeds `max_len`, or for a dropout
    /// outside `[0, 1)`.
    pub fn new(dims: &ForecastDims, config: &AttentionConfig, device: &B::Device) -> Result<Self> {
        dims.validate()?;
        if config.d_model == 0 || config.num_heads == 0 || config.d_model % config.num_heads != 0 {
            return Err(ModelError::InvalidConfig(format!(
                "d_model ({}) must be a positive multiple of num_heads ({})",
                config.d_model, config.num_heads
            )));
        }
        if dims.past_steps.max(dims.future_steps) > config.max_len {
            return Err(ModelError::InvalidConfig(format!(
                "sequences longer than max_len ({})",
                config.max_len
            )));
        }
        if !(0.0..1.0).contains(&config.dropout) {
            return Err(ModelError::InvalidConfig(format!("dropout {} not in [0, 1)", config.dropout)));
        }

        let past_embedding = CategoricalEmbedding::new(&dims.embs, config.cat_emb_dim, config.sum_emb, device);
        let future_embedding = CategoricalEmbedding::new(&dims.embs, config.cat_emb_dim, config.sum_emb, device);
        let encoder_in = dims.past_channels + past_embedding.output_dim();
        let decoder_in = dims.out_channels + dims.future_channels + future_embedding.output_dim();

        Ok(Self {
            encoder_input: LinearConfig::new(encoder_in, config.d_model).init(device),
            decoder_input: LinearConfig::new(decoder_in, config.d_model).init(device),
            past_embedding,
            future_embedding,
            positional: PositionalEncoding::new(config.d_model, config.dropout, config.max_len),
            encoder: (0..config.n_layer_encoder).map(|_| EncoderLayer::new(config, device)).collect(),
            decoder: (0..config.n_layer_decoder).map(|_| DecoderLayer::new(config, device)).collect(),
            head: LinearConfig::new(config.d_model, dims.out_channels * dims.mul()).init(device),
            future_steps: dims.future_steps,
            out_channels: dims.out_channels,
            future_channels: dims.future_channels,
            quantiles: dims.quantiles.clone(),
            layout: Ignored(dims.layout()),
        })
    }

    fn encode(&self, batch: &ForecastBatch<B>) -> Tensor<B, 3> {
        let mut past = vec![batch.x_num_past.clone()];
        if let Some(emb) = batch.x_cat_past.clone().and_then(|x| self.past_embedding.forward(x)) {
            past.push(emb);
        }
        let x = self.positional.forward(self.encoder_input.forward(Tensor::cat(past, 2)));
        self.encoder.iter().fold(x, |x, layer| layer.forward(x))
    }

    /// Decode the first `tokens.dims()[1]` steps; returns
    /// `(batch, steps, out_channels, mul)`.
    fn decode(&self, batch: &ForecastBatch<B>, memory: Tensor<B, 3>, tokens: Tensor<B, 3>) -> Tensor<B, 4> {
        let [batch_size, steps, _] = tokens.dims();
        let mut inputs = vec![tokens];
        if self.future_channels > 0 {
            if let Some(future) = &batch.x_num_future {
                let [b, _, c] = future.dims();
                inputs.push(future.clone().slice([0..b, 0..steps, 0..c]));
            }
        }
        if let Some(future) = &batch.x_cat_future {
            let [b, _, c] = future.dims();
            if let Some(emb) = self.future_embedding.forward(future.clone().slice([0..b, 0..steps, 0..c])) {
                inputs.push(emb);
            }
        }

        let x = self.positional.forward(self.decoder_input.forward(Tensor::cat(inputs, 2)));
        let mask = generate_square_subsequent_mask::<B>(batch_size, steps, &x.device());
        let x = self
            .decoder
            .iter()
            .fold(x, |x, layer| layer.forward(x, memory.clone(), mask.clone()));
        self.head
            .forward(x)
            .reshape([batch_size, steps, self.out_channels, self.mul()])
    }

    /// Point forecast fed back to the decoder: the only output, or the median.
    fn point(&self, y_hat: Tensor<B, 4>) -> Tensor<B, 3> {
        let [b, steps, c, mul] = y_hat.dims();
        let k = mul / 2;
        y_hat
            .slice([0..b, steps - 1..steps, 0..c, k..k + 1])
            .reshape([b, 1, c])
    }
}

impl<B: Backend> ForecastModel<B> for Attention<B> {
    fn forward(&self, batch: &ForecastBatch<B>) -> Tensor<B, 4> {
        let Some(y) = &batch.y else {
            return self.inference(batch);
        };
        let memory = self.encode(batch);
        let [b, _, c] = y.dims();
        let mut tokens = vec![batch.last_target()];
        if self.future_steps > 1 {
            tokens.push(y.clone().slice([0..b, 0..self.future_steps - 1, 0..c]));
        }
        self.decode(batch, memory, Tensor::cat(tokens, 1))
    }

    fn inference(&self, batch: &ForecastBatch<B>) -> Tensor<B, 4> {
        let memory = self.encode(batch);
        let mut tokens = batch.last_target();
        for _ in 1..self.future_steps {
            let y_hat = self.decode(batch, memory.clone(), tokens.clone());
            tokens = Tensor::cat(vec![tokens, self.point(y_hat)], 1);
        }
        self.decode(batch, memory, tokens)
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

    fn small() -> AttentionConfig {
        AttentionConfig {
            d_model: 8,
            num_heads: 2,
            n_layer_encoder: 1,
            n_layer_decoder: 1,
            hidden_size: 16,
            dropout: 0.0,
            ..Default::default()
        }
    }

    fn batch(device: &<TestBackend as Backend>::Device) -> ForecastBatch<TestBackend> {
        let x = Tensor::<TestBackend, 3>::random([2, 6, 2], burn::tensor::Distribution::Default, device);
        let y = Tensor::<TestBackend, 3>::random([2, 3, 1], burn::tensor::Distribution::Default, device);
        ForecastBatch::new(x, vec![0])
            .unwrap()
            .with_target(y)
            .unwrap()
            .with_num_future(Tensor::zeros([2, 3, 1], device))
            .unwrap()
    }

    #[test]
    fn test_positional_encoding_table() {
        let device = Default::default();
        let pe = PositionalEncoding::new(4, 0.0, 100).table::<TestBackend>(3, &device);
        assert_eq!(pe.dims(), [3, 4]);
        let values = pe.into_data().to_vec::<f32>().unwrap();
        // position 0: sin(0), cos(0), sin(0), cos(0)
        assert_eq!(&values[..4], &[0.0, 1.0, 0.0, 1.0]);
        assert!((values[4] - 1.0f32.sin()).abs() < 1e-6);
    }

    #[test]
    fn test_forward_and_inference_shapes() {
        let device = Default::default();
        let dims = ForecastDims::new(6, 3, 2, 1, 1);
        let model = small().init::<TestBackend>(&dims, &device).unwrap();
        let batch = batch(&device);
        assert_eq!(model.forward(&batch).dims(), [2, 3, 1, 1]);
        assert_eq!(model.inference(&batch).dims(), [2, 3, 1, 1]);
    }

    #[test]
    fn test_inference_matches_forward_on_own_predictions() {
        let device = Default::default();
        let dims = ForecastDims::new(6, 3, 2, 1, 1);
        let model = small().init::<TestBackend>(&dims, &device).unwrap();
        let batch = batch(&device);

        let decoded = model.inference(&batch);
        let fed = decoded.clone().reshape([2, 3, 1]);
        let teacher_forced = model.forward(&batch.clone().with_target(fed).unwrap());

        let a = decoded.into_data().to_vec::<f32>().unwrap();
        let b = teacher_forced.into_data().to_vec::<f32>().unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-4, "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn test_quantiles() {
        let device = Default::default();
        let dims = ForecastDims::new(6, 3, 2, 1, 1).with_quantiles(vec![0.1, 0.5, 0.9]);
        let model = small().init::<TestBackend>(&dims, &device).unwrap();
        assert_eq!(model.inference(&batch(&device)).dims(), [2, 3, 1, 3]);
    }

    #[test]
    fn test_heads_must_divide_d_model() {
        let device = Default::default();
        let dims = ForecastDims::new(6, 3, 2, 0, 1);
        let config = AttentionConfig {
            d_model: 10,
            num_heads: 4,
            ..Default::default()
        };
        assert!(matches!(
            Attention::<TestBackend>::new(&dims, &config, &device),
            Err(ModelError::InvalidConfig(_))
        ));
    }
}
