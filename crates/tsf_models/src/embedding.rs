//! Embeddings for categorical covariates.

use burn::nn::{Embedding, EmbeddingConfig};
use burn::prelude::*;

/// One embedding table per categorical variable.
///
/// The per-variable embeddings are either summed (`sum_emb`) or
/// concatenated along the feature axis.
#[derive(Module, Debug)]
pub struct CategoricalEmbedding<B: Backend> {
    embeddings: Vec<Embedding<B>>,
    #[module(skip)]
    emb_dim: usize,
    #[module(skip)]
    sum_emb: bool,
}

impl<B: Backend> CategoricalEmbedding<B> {
    /// Create embeddings for variables with the given cardinalities.
    pub fn new(cardinalities: &[usize], emb_dim: usize, sum_emb: bool, device: &B::Device) -> Self {
        let embeddings = cardinalities
            .iter()
            .map(|&card| EmbeddingConfig::new(card, emb_dim).init(device))
            .collect();
        Self {
            embeddings,
            emb_dim,
            sum_emb,
        }
    }

    /// Number of features produced per step, 0 without categoricals.
    pub fn output_dim(&self) -> usize {
        match (self.embeddings.len(), self.sum_emb) {
            (0, _) => 0,
            (_, true) => self.emb_dim,
            (n, false) => n * self.emb_dim,
        }
    }

    /// Embed `(batch, steps, n_cat)` class indices into
    /// `(batch, steps, output_dim)`.
    ///
    /// Returns `None` when there is nothing to embed.
    pub fn forward(&self, x: Tensor<B, 3, Int>) -> Option<Tensor<B, 3>> {
        let [batch, steps, n_cat] = x.dims();
        let n = n_cat.min(self.embeddings.len());
        if n == 0 {
            return None;
        }

        let embedded = self.embeddings.iter().take(n).enumerate().map(|(j, emb)| {
            let column = x.clone().slice([0..batch, 0..steps, j..j + 1]).reshape([batch, steps]);
            emb.forward(column)
        });

        if self.sum_emb {
            embedded.reduce(|acc, e| acc + e)
        } else {
            Some(Tensor::cat(embedded.collect(), 2))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::TensorData;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    fn classes(device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 3, Int> {
        let data: Vec<i64> = vec![0, 1, 2, 0, 1, 1, 0, 2, 1, 0, 2, 2];
        Tensor::from_data(TensorData::new(data, [2, 3, 2]), device)
    }

    #[test]
    fn test_sum_embedding() {
        let device = Default::default();
        let emb = CategoricalEmbedding::<TestBackend>::new(&[3, 3], 4, true, &device);
        assert_eq!(emb.output_dim(), 4);
        let out = emb.forward(classes(&device)).unwrap();
        assert_eq!(out.dims(), [2, 3, 4]);
    }

    #[test]
    fn test_concat_embedding() {
        let device = Default::default();
        let emb = CategoricalEmbedding::<TestBackend>::new(&[3, 3], 4, false, &device);
        assert_eq!(emb.output_dim(), 8);
        let out = emb.forward(classes(&device)).unwrap();
        assert_eq!(out.dims(), [2, 3, 8]);
    }

    #[test]
    fn test_no_categoricals() {
        let device = Default::default();
        let emb = CategoricalEmbedding::<TestBackend>::new(&[], 4, true, &device);
        assert_eq!(emb.output_dim(), 0);
        assert!(emb.forward(classes(&device)).is_none());
    }
}
