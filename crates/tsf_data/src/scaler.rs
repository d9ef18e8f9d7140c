//! Per column scalers and label encoders.

use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};

/// Standardizes a column to zero mean and unit variance.
///
/// Fitting ignores `NaN`; a constant column gets a unit standard deviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Fitted mean.
    pub mean: f32,
    /// Fitted standard deviation.
    pub std: f32,
}

impl StandardScaler {
    /// Fit on the finite values of `values`.
    ///
    /// # Errors
    ///
    /// Returns an error if no finite value is present.
    pub fn fit(values: &[f32]) -> Result<Self> {
        let finite: Vec<f64> = values
            .iter()
            .filter(|v| v.is_finite())
            .map(|&v| f64::from(v))
            .collect();
        if finite.is_empty() {
            return Err(DataError::InvalidInput(
                "cannot fit a scaler without finite values".to_string(),
            ));
        }
        let n = finite.len() as f64;
        let mean = finite.iter().sum::<f64>() / n;
        let var = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        let std = if std > f64::EPSILON { std } else { 1.0 };
        Ok(Self {
            mean: mean as f32,
            std: std as f32,
        })
    }

    /// Scale a single value.
    #[must_use]
    pub fn transform_value(&self, v: f32) -> f32 {
        (v - self.mean) / self.std
    }

    /// Undo the scaling of a single value.
    #[must_use]
    pub fn inverse_value(&self, v: f32) -> f32 {
        v * self.std + self.mean
    }

    /// Scale a column; `NaN` stays `NaN`.
    #[must_use]
    pub fn transform(&self, values: &[f32]) -> Vec<f32> {
        values.iter().map(|&v| self.transform_value(v)).collect()
    }

    /// Undo [`StandardScaler::transform`].
    #[must_use]
    pub fn inverse_transform(&self, values: &[f32]) -> Vec<f32> {
        values.iter().map(|&v| self.inverse_value(v)).collect()
    }
}

/// Maps the distinct values of a categorical column to `0..cardinality`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    /// Sorted distinct values.
    pub classes: Vec<f32>,
}

impl LabelEncoder {
    /// Fit on the distinct non `NaN` values.
    pub fn fit(values: &[f32]) -> Result<Self> {
        let mut classes: Vec<f32> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if classes.is_empty() {
            return Err(DataError::InvalidInput(
                "cannot fit an encoder without values".to_string(),
            ));
        }
        classes.sort_by(f32::total_cmp);
        classes.dedup();
        Ok(Self { classes })
    }

    /// Number of classes.
    #[must_use]
    pub fn cardinality(&self) -> usize {
        self.classes.len()
    }

    /// Index of a single value.
    pub fn transform_value(&self, v: f32) -> Result<usize> {
        if v.is_nan() {
            return Err(DataError::InvalidInput("cannot encode a missing category".to_string()));
        }
        self.classes
            .binary_search_by(|c| c.total_cmp(&v))
            .map_err(|_| DataError::InvalidInput(format!("unknown category {v}")))
    }

    /// Encode a column.
    pub fn transform(&self, values: &[f32]) -> Result<Vec<usize>> {
        values.iter().map(|&v| self.transform_value(v)).collect()
    }

    /// Value of an encoded index.
    pub fn inverse_value(&self, index: usize) -> Result<f32> {
        self.classes
            .get(index)
            .copied()
            .ok_or(DataError::IndexOutOfBounds {
                index,
                length: self.classes.len(),
            })
    }
}
