//! Batched inference over a dataloader.

use burn::prelude::*;
use ndarray::{Array3, Array4, Axis};
use tsf_core::ForecastModel;
use tsf_data::ForecastDataLoader;

use crate::error::{Result, TrainError};

/// Forecasts for every window of a dataset, in dataset order.
#[derive(Debug, Clone)]
pub struct Predictions {
    /// Forecasts `(windows, future_steps, out_channels, mul)`.
    pub y_hat: Array4<f32>,
    /// Targets `(windows, future_steps, out_channels)`, NaN where missing.
    pub y: Array3<f32>,
}

impl Predictions {
    /// Number of windows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.y_hat.shape()[0]
    }

    /// Whether there is no window.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn to_array4<B: Backend>(tensor: Tensor<B, 4>) -> Result<Array4<f32>> {
    let [a, b, c, d] = tensor.dims();
    let values = tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| TrainError::Tensor(format!("{e:?}")))?;
    Array4::from_shape_vec((a, b, c, d), values).map_err(|e| TrainError::Tensor(e.to_string()))
}

/// Run [`ForecastModel::inference`] over all batches of `loader`.
///
/// The loader must not shuffle, otherwise the forecasts do not line up
/// with the targets of the dataset.
///
/// # Errors
///
/// Fails when a batch cannot be built or read back.
pub fn predict<B, M>(model: &M, loader: &ForecastDataLoader, device: &B::Device) -> Result<Predictions>
where
    B: Backend,
    M: ForecastModel<B>,
{
    let mut parts = Vec::with_capacity(loader.n_batches());
    for batch in loader.iter::<B>(device) {
        let batch = batch?;
        model.check_batch(&batch)?;
        parts.push(to_array4(model.inference(&batch))?);
    }
    let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
    let y_hat = ndarray::concatenate(Axis(0), &views).map_err(|e| TrainError::Tensor(e.to_string()))?;

    let dataset = loader.dataset();
    let y = dataset.y.slice(ndarray::s![..y_hat.shape()[0], .., ..]).to_owned();
    tracing::debug!(windows = y_hat.shape()[0], "prediction done");
    Ok(Predictions { y_hat, y })
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use chrono::{Duration, NaiveDate};
    use tsf_data::{create_windows, TimeFrame, WindowSpec};
    use tsf_models::{ForecastDims, LinearTSConfig, Persistent};

    type TestBackend = NdArray;

    #[test]
    fn test_predict_persistence() {
        let device = Default::default();
        let t0 = NaiveDate::from_ymd_opt(2021, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let time = (0..10i64).map(|d| t0 + Duration::days(d)).collect();
        let frame = TimeFrame::new(time)
            .with_column("y", (0..10).map(|v| v as f32).collect())
            .unwrap();
        let spec = WindowSpec {
            past_steps: 3,
            future_steps: 2,
            shift: 0,
            skip_step: 1,
            past_variables: vec!["y".to_string()],
            future_variables: vec![],
            target_variables: vec!["y".to_string()],
            cat_var: vec![],
            starting_point: None,
            keep_missing_target: false,
        };
        let loader = ForecastDataLoader::builder(create_windows(&frame, &spec).unwrap())
            .batch_size(4)
            .build()
            .unwrap();
        let model = Persistent::<TestBackend>::new(&ForecastDims::new(3, 2, 1, 0, 1), &device).unwrap();

        let predictions = predict(&model, &loader, &device).unwrap();
        assert_eq!(predictions.len(), 6);
        assert_eq!(predictions.y_hat.shape(), &[6, 2, 1, 1]);
        // first window: past [0, 1, 2], targets [3, 4]
        assert_eq!(predictions.y_hat[[0, 1, 0, 0]], 2.0);
        assert_eq!(predictions.y[[0, 1, 0]], 4.0);
        assert_eq!(predictions.y_hat[[5, 0, 0, 0]], 7.0);

        // a model expecting a future covariate gets an error, not a panic
        let dims = ForecastDims::new(3, 2, 1, 1, 1);
        let covariate_model = LinearTSConfig::default().init::<TestBackend>(&dims, &device).unwrap();
        assert!(matches!(
            predict(&covariate_model, &loader, &device),
            Err(TrainError::CoreError(tsf_core::CoreError::ShapeMismatch(_)))
        ));
    }
}
