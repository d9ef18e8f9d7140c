//! Dataloader producing forecasting batches.

use burn::prelude::*;
use burn::tensor::TensorData;
use ndarray::Array3;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use tsf_core::{ForecastBatch, Seed};

use crate::error::{DataError, Result};
use crate::window::{select_windows, WindowDataset};

/// A dataloader that produces [`ForecastBatch`]es from a [`WindowDataset`].
///
/// # Example
///
/// ```rust,ignore
/// use tsf_data::ForecastDataLoader;
/// use tsf_core::Seed;
///
/// let loader = ForecastDataLoader::builder(windows)
///     .batch_size(32)
///     .shuffle(true)
///     .seed(Seed::new(42))
///     .build()?;
///
/// for batch in loader.iter::<NdArray>(&device) {
///     let batch = batch?;
/// }
/// ```
pub struct ForecastDataLoader {
    dataset: WindowDataset,
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
    seed: Option<Seed>,
}

impl ForecastDataLoader {
    /// Create a new dataloader builder.
    #[must_use]
    pub fn builder(dataset: WindowDataset) -> ForecastDataLoaderBuilder {
        ForecastDataLoaderBuilder::new(dataset)
    }

    /// Get the dataset.
    #[must_use]
    pub fn dataset(&self) -> &WindowDataset {
        &self.dataset
    }

    /// Get the batch size.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Get the number of batches.
    #[must_use]
    pub fn n_batches(&self) -> usize {
        let n = self.dataset.len();
        if self.drop_last {
            n / self.batch_size
        } else {
            n.div_ceil(self.batch_size)
        }
    }

    /// Get the total number of windows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    /// Check if the loader is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// Create an iterator over batches.
    ///
    /// Shuffled loaders draw a new order per call, derived from the seed and
    /// `epoch`, so successive epochs see different orders.
    #[must_use]
    pub fn iter_epoch<B: Backend>(&self, device: &B::Device, epoch: usize) -> ForecastDataLoaderIter<'_, B> {
        ForecastDataLoaderIter::new(self, device.clone(), epoch)
    }

    /// Create an iterator over batches for the first epoch.
    #[must_use]
    pub fn iter<B: Backend>(&self, device: &B::Device) -> ForecastDataLoaderIter<'_, B> {
        self.iter_epoch(device, 0)
    }
}

/// Builder for [`ForecastDataLoader`].
pub struct ForecastDataLoaderBuilder {
    dataset: WindowDataset,
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
    seed: Option<Seed>,
}

impl ForecastDataLoaderBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new(dataset: WindowDataset) -> Self {
        Self {
            dataset,
            batch_size: 32,
            shuffle: false,
            drop_last: false,
            seed: None,
        }
    }

    /// Set the batch size.
    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Enable or disable shuffling.
    #[must_use]
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Enable or disable dropping the last incomplete batch.
    #[must_use]
    pub fn drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    /// Set the random seed for shuffling.
    #[must_use]
    pub fn seed(mut self, seed: Seed) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build the dataloader.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch size is zero or the dataset is empty.
    pub fn build(self) -> Result<ForecastDataLoader> {
        if self.batch_size == 0 {
            return Err(DataError::InvalidBatchSize(
                "Batch size must be greater than 0".to_string(),
            ));
        }

        if self.dataset.is_empty() {
            return Err(DataError::EmptyDataset);
        }

        Ok(ForecastDataLoader {
            dataset: self.dataset,
            batch_size: self.batch_size,
            shuffle: self.shuffle,
            drop_last: self.drop_last,
            seed: self.seed,
        })
    }
}

/// Iterator over batches from a [`ForecastDataLoader`].
pub struct ForecastDataLoaderIter<'a, B: Backend> {
    loader: &'a ForecastDataLoader,
    device: B::Device,
    indices: Vec<usize>,
    current_batch: usize,
    n_batches: usize,
}

impl<'a, B: Backend> ForecastDataLoaderIter<'a, B> {
    fn new(loader: &'a ForecastDataLoader, device: B::Device, epoch: usize) -> Self {
        let n = loader.dataset.len();
        let mut indices: Vec<usize> = (0..n).collect();

        if loader.shuffle {
            let mut rng = match loader.seed {
                Some(seed) => seed.derive(&format!("epoch-{epoch}")).to_rng(),
                None => ChaCha8Rng::from_entropy(),
            };
            indices.shuffle(&mut rng);
        }

        Self {
            loader,
            device,
            indices,
            current_batch: 0,
            n_batches: loader.n_batches(),
        }
    }

    fn float_tensor(&self, array: &Array3<f32>, indices: &[usize]) -> Tensor<B, 3> {
        let selected = select_windows(array, indices);
        let [b, l, c] = [selected.shape()[0], selected.shape()[1], selected.shape()[2]];
        let flat: Vec<f32> = selected.iter().copied().collect();
        Tensor::<B, 1>::from_floats(flat.as_slice(), &self.device).reshape([b, l, c])
    }

    fn int_tensor(&self, array: &Array3<i64>, indices: &[usize]) -> Tensor<B, 3, Int> {
        let selected = select_windows(array, indices);
        let shape = [selected.shape()[0], selected.shape()[1], selected.shape()[2]];
        let flat: Vec<i64> = selected.iter().copied().collect();
        Tensor::from_data(TensorData::new(flat, shape), &self.device)
    }

    fn create_batch(&self, indices: &[usize]) -> Result<ForecastBatch<B>> {
        let dataset = &self.loader.dataset;

        let x_num_past = self.float_tensor(&dataset.x_num_past, indices);
        let y = self.float_tensor(&dataset.y, indices);
        let mut batch = ForecastBatch::new(x_num_past, dataset.idx_target.clone())?.with_target(y)?;

        if let Some(future) = &dataset.x_num_future {
            batch = batch.with_num_future(self.float_tensor(future, indices))?;
        }
        if let (Some(past), Some(future)) = (&dataset.x_cat_past, &dataset.x_cat_future) {
            batch = batch.with_categoricals(self.int_tensor(past, indices), self.int_tensor(future, indices))?;
        }
        Ok(batch)
    }
}

impl<B: Backend> Iterator for ForecastDataLoaderIter<'_, B> {
    type Item = Result<ForecastBatch<B>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_batch >= self.n_batches {
            return None;
        }

        let start = self.current_batch * self.loader.batch_size;
        let end = std::cmp::min(start + self.loader.batch_size, self.indices.len());
        let batch_indices: Vec<usize> = self.indices[start..end].to_vec();

        self.current_batch += 1;

        Some(self.create_batch(&batch_indices))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.n_batches - self.current_batch;
        (remaining, Some(remaining))
    }
}

impl<B: Backend> ExactSizeIterator for ForecastDataLoaderIter<'_, B> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::TimeFrame;
    use crate::window::{create_windows, WindowSpec};
    use burn_ndarray::NdArray;
    use chrono::{Duration, NaiveDate};

    type TestBackend = NdArray;

    fn dataset(n: usize) -> WindowDataset {
        let t0 = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let time = (0..n as i64).map(|d| t0 + Duration::days(d)).collect();
        let frame = TimeFrame::new(time)
            .with_column("y", (0..n).map(|v| v as f32).collect())
            .unwrap()
            .with_column("dow", (0..n).map(|v| (v % 7) as f32).collect())
            .unwrap();
        let spec = WindowSpec {
            past_steps: 4,
            future_steps: 2,
            shift: 0,
            skip_step: 1,
            past_variables: vec!["y".to_string()],
            future_variables: vec![],
            target_variables: vec!["y".to_string()],
            cat_var: vec!["dow".to_string()],
            starting_point: None,
            keep_missing_target: false,
        };
        create_windows(&frame, &spec).unwrap()
    }

    #[test]
    fn test_batch_shapes() {
        let device = Default::default();
        // 20 rows give 15 windows
        let loader = ForecastDataLoader::builder(dataset(20)).batch_size(4).build().unwrap();
        assert_eq!(loader.n_batches(), 4);

        let batches: Vec<_> = loader
            .iter::<TestBackend>(&device)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(batches.len(), 4);
        assert_eq!(batches[0].x_num_past.dims(), [4, 4, 1]);
        assert_eq!(batches[0].y.as_ref().unwrap().dims(), [4, 2, 1]);
        assert_eq!(batches[0].x_cat_past.as_ref().unwrap().dims(), [4, 4, 1]);
        assert!(batches[0].x_num_future.is_none());
        assert_eq!(batches[3].batch_size(), 3);

        let first_y = batches[0].y.clone().unwrap().into_data().to_vec::<f32>().unwrap();
        assert_eq!(&first_y[..2], &[4.0, 5.0]);
    }

    #[test]
    fn test_drop_last() {
        let loader = ForecastDataLoader::builder(dataset(20))
            .batch_size(4)
            .drop_last(true)
            .build()
            .unwrap();
        assert_eq!(loader.n_batches(), 3);
    }

    #[test]
    fn test_shuffle_is_seeded() {
        let device = Default::default();
        let build = || {
            ForecastDataLoader::builder(dataset(20))
                .batch_size(15)
                .shuffle(true)
                .seed(Seed::new(3))
                .build()
                .unwrap()
        };
        let first = |loader: &ForecastDataLoader, epoch| {
            let batch = loader
                .iter_epoch::<TestBackend>(&device, epoch)
                .next()
                .unwrap()
                .unwrap();
            batch.y.unwrap().into_data().to_vec::<f32>().unwrap()
        };
        let (a, b) = (build(), build());
        assert_eq!(first(&a, 0), first(&b, 0));
        assert_ne!(first(&a, 0), first(&a, 1));
    }

    #[test]
    fn test_invalid_batch_size() {
        let result = ForecastDataLoader::builder(dataset(20)).batch_size(0).build();
        assert!(matches!(result, Err(DataError::InvalidBatchSize(_))));
    }
}
