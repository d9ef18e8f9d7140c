//! Forecasts laid out one row per window and lag.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tsf_data::{StandardScaler, WindowDataset};
use tsf_train::metrics::{mape, mse};
use tsf_train::Predictions;

use crate::error::{Result, TsfError};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Forecast of every target for one window at one lag.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRow {
    /// Timestamp being forecast.
    pub time: NaiveDateTime,
    /// Position inside the horizon, starting at 1.
    pub lag: usize,
    /// Last observed timestamp when the forecast was made.
    pub prediction_time: NaiveDateTime,
    /// Observed value per target, `NaN` when unknown.
    pub real: Vec<f32>,
    /// Forecast per target: one value, or low, median and high.
    pub pred: Vec<Vec<f32>>,
}

impl PredictionRow {
    /// Point forecast of target `c`, the median for quantile models.
    #[must_use]
    pub fn point(&self, c: usize) -> f32 {
        let values = &self.pred[c];
        values.get(values.len() / 2).copied().unwrap_or(f32::NAN)
    }
}

/// Per-lag error of one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LagError {
    /// Position inside the horizon, starting at 1.
    pub lag: usize,
    /// Target name.
    pub variable: String,
    /// Mean squared error.
    #[serde(rename = "MSE")]
    pub mse: f32,
    /// Mean absolute percentage error.
    #[serde(rename = "MAPE")]
    pub mape: f32,
}

/// Forecasts of a set of windows.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionTable {
    targets: Vec<String>,
    quantiles: bool,
    rows: Vec<PredictionRow>,
}

impl PredictionTable {
    /// Lay out `predictions` made on `dataset`.
    ///
    /// With `scalers` (one per target) both forecasts and observations are
    /// brought back to the original scale.
    pub fn new(
        predictions: &Predictions,
        dataset: &WindowDataset,
        targets: Vec<String>,
        scalers: Option<&[StandardScaler]>,
    ) -> Result<Self> {
        let shape = predictions.y_hat.shape();
        let (n, steps, channels, mul) = (shape[0], shape[1], shape[2], shape[3]);
        if channels != targets.len() || n > dataset.len() {
            return Err(TsfError::InvalidInput(format!(
                "{n} forecasts of {channels} targets do not match {} windows of {} targets",
                dataset.len(),
                targets.len()
            )));
        }
        if let Some(s) = scalers {
            if s.len() != channels {
                return Err(TsfError::InvalidInput(format!("{} scalers for {channels} targets", s.len())));
            }
        }
        let rescale = |c: usize, v: f32| scalers.map_or(v, |s| s[c].inverse_value(v));

        let mut rows = Vec::with_capacity(n * steps);
        for w in 0..n {
            for l in 0..steps {
                rows.push(PredictionRow {
                    time: dataset.future_times[w][l],
                    lag: l + 1,
                    prediction_time: dataset.past_end[w],
                    real: (0..channels).map(|c| rescale(c, predictions.y[[w, l, c]])).collect(),
                    pred: (0..channels)
                        .map(|c| (0..mul).map(|q| rescale(c, predictions.y_hat[[w, l, c, q]])).collect())
                        .collect(),
                });
            }
        }
        Ok(Self {
            targets,
            quantiles: mul > 1,
            rows,
        })
    }

    /// Target names.
    #[must_use]
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Whether the forecasts are quantiles.
    #[must_use]
    pub fn has_quantiles(&self) -> bool {
        self.quantiles
    }

    /// Rows, ordered by window then lag.
    #[must_use]
    pub fn rows(&self) -> &[PredictionRow] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no row.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names: `time`, `lag`, `prediction_time`, then per target its
    /// observed value followed by `_pred` or `_low`, `_median`, `_high`.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        let mut columns = vec!["time".to_string(), "lag".to_string(), "prediction_time".to_string()];
        let suffixes: &[&str] = if self.quantiles {
            &["low", "median", "high"]
        } else {
            &["pred"]
        };
        for target in &self.targets {
            columns.push(target.clone());
            columns.extend(suffixes.iter().map(|s| format!("{target}_{s}")));
        }
        columns
    }

    /// Write the table as CSV; `NaN` is written empty.
    pub fn to_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        writer.write_record(self.columns())?;
        let cell = |v: f32| if v.is_nan() { String::new() } else { v.to_string() };
        for row in &self.rows {
            let mut record = vec![
                row.time.format(TIME_FORMAT).to_string(),
                row.lag.to_string(),
                row.prediction_time.format(TIME_FORMAT).to_string(),
            ];
            for (real, pred) in row.real.iter().zip(&row.pred) {
                record.push(cell(*real));
                record.extend(pred.iter().map(|v| cell(*v)));
            }
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// MSE and MAPE of the point forecast per lag and target.
    ///
    /// Rows with a missing observation are skipped.
    #[must_use]
    pub fn errors_by_lag(&self) -> Vec<LagError> {
        let mut by_lag: BTreeMap<usize, Vec<&PredictionRow>> = BTreeMap::new();
        for row in &self.rows {
            by_lag.entry(row.lag).or_default().push(row);
        }
        let mut errors = Vec::with_capacity(by_lag.len() * self.targets.len());
        for (c, target) in self.targets.iter().enumerate() {
            for (lag, rows) in &by_lag {
                let real: Vec<f32> = rows.iter().map(|r| r.real[c]).collect();
                let pred: Vec<f32> = rows.iter().map(|r| r.point(c)).collect();
                errors.push(LagError {
                    lag: *lag,
                    variable: target.clone(),
                    mse: mse(&real, &pred),
                    mape: mape(&real, &pred),
                });
            }
        }
        errors
    }
}

/// Write per-lag errors as CSV.
pub fn write_errors_csv(errors: &[LagError], path: impl AsRef<Path>) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    for error in errors {
        writer.serialize(error)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use ndarray::{Array3, Array4};

    fn dataset(n: usize, steps: usize) -> WindowDataset {
        let t0 = NaiveDate::from_ymd_opt(2022, 5, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let hour = |h: usize| t0 + Duration::hours(h as i64);
        WindowDataset {
            x_num_past: Array3::zeros((n, 2, 1)),
            x_num_future: None,
            x_cat_past: None,
            x_cat_future: None,
            y: Array3::zeros((n, steps, 1)),
            idx_target: vec![0],
            future_times: (0..n).map(|w| (0..steps).map(|l| hour(w + 2 + l)).collect()).collect(),
            past_end: (0..n).map(|w| hour(w + 1)).collect(),
        }
    }

    fn predictions(mul: usize) -> Predictions {
        // two windows, two lags, one target
        let y = Array3::from_shape_vec((2, 2, 1), vec![10.0, 20.0, 20.0, f32::NAN]).unwrap();
        let mut y_hat = Array4::zeros((2, 2, 1, mul));
        for w in 0..2 {
            for l in 0..2 {
                for q in 0..mul {
                    y_hat[[w, l, 0, q]] = 11.0 + q as f32;
                }
            }
        }
        Predictions { y_hat, y }
    }

    #[test]
    fn test_rows_and_columns() {
        let table = PredictionTable::new(&predictions(1), &dataset(2, 2), vec!["y".into()], None).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.columns(), vec!["time", "lag", "prediction_time", "y", "y_pred"]);

        let row = &table.rows()[1];
        assert_eq!(row.lag, 2);
        assert_eq!(row.real, vec![20.0]);
        assert_eq!(row.time - row.prediction_time, Duration::hours(2));
    }

    #[test]
    fn test_quantile_columns_and_point() {
        let table = PredictionTable::new(&predictions(3), &dataset(2, 2), vec!["y".into()], None).unwrap();
        assert!(table.has_quantiles());
        assert_eq!(table.columns()[4..], ["y_low", "y_median", "y_high"]);
        assert_eq!(table.rows()[0].point(0), 12.0);
    }

    #[test]
    fn test_rescaling() {
        let scaler = StandardScaler { mean: 1.0, std: 2.0 };
        let table = PredictionTable::new(&predictions(1), &dataset(2, 2), vec!["y".into()], Some(&[scaler])).unwrap();
        assert_eq!(table.rows()[0].real, vec![21.0]);
        assert_eq!(table.rows()[0].pred, vec![vec![23.0]]);
    }

    #[test]
    fn test_errors_by_lag_skip_missing() {
        let table = PredictionTable::new(&predictions(1), &dataset(2, 2), vec!["y".into()], None).unwrap();
        let errors = table.errors_by_lag();
        assert_eq!(errors.len(), 2);

        // lag 1 sees 10 and 20 against 11
        assert_eq!(errors[0].lag, 1);
        assert!((errors[0].mse - 41.0).abs() < 1e-4);
        assert!((errors[0].mape - 27.5).abs() < 1e-3);
        // lag 2 only sees 20 against 11
        assert!((errors[1].mse - 81.0).abs() < 1e-4);
    }

    #[test]
    fn test_shape_mismatch() {
        let result = PredictionTable::new(&predictions(1), &dataset(2, 2), vec!["a".into(), "b".into()], None);
        assert!(matches!(result, Err(TsfError::InvalidInput(_))));
    }

    #[test]
    fn test_csv_output() {
        let dir = tempfile::tempdir().unwrap();
        let table = PredictionTable::new(&predictions(1), &dataset(2, 2), vec!["y".into()], None).unwrap();
        let path = dir.path().join("pred.csv");
        table.to_csv(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "time,lag,prediction_time,y,y_pred");
        assert_eq!(lines.len(), 5);
        assert!(lines[4].ends_with(",,11"));

        let errors_path = dir.path().join("errors.csv");
        write_errors_csv(&table.errors_by_lag(), &errors_path).unwrap();
        let errors = std::fs::read_to_string(&errors_path).unwrap();
        assert!(errors.starts_with("lag,variable,MSE,MAPE"));
    }
}
