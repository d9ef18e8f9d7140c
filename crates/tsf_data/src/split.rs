//! Train / validation / test splitting of a time frame.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};
use crate::frame::TimeFrame;

fn default_shift() -> usize {
    0
}

fn default_skip_step() -> usize {
    1
}

fn default_perc_train() -> f32 {
    0.6
}

fn default_perc_valid() -> f32 {
    0.2
}

/// Keep only the windows whose first future row has `column == value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartingPoint {
    /// Column checked at the first future row.
    pub column: String,
    /// Required value.
    pub value: f32,
}

/// How a series is cut into partitions and windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitParams {
    /// Context length of every window.
    pub past_steps: usize,
    /// Forecast horizon of every window.
    pub future_steps: usize,
    /// Offset of the future covariates with respect to the targets.
    #[serde(default = "default_shift")]
    pub shift: usize,
    /// Stride between consecutive windows.
    #[serde(default = "default_skip_step")]
    pub skip_step: usize,
    /// Fraction of rows used for training.
    #[serde(default = "default_perc_train")]
    pub perc_train: f32,
    /// Fraction of rows used for validation.
    #[serde(default = "default_perc_valid")]
    pub perc_valid: f32,
    /// Explicit training period, inclusive.
    #[serde(default)]
    pub range_train: Option<(NaiveDateTime, NaiveDateTime)>,
    /// Explicit validation period, inclusive.
    #[serde(default)]
    pub range_validation: Option<(NaiveDateTime, NaiveDateTime)>,
    /// Explicit test period, inclusive.
    #[serde(default)]
    pub range_test: Option<(NaiveDateTime, NaiveDateTime)>,
    /// Window filter applied to every partition.
    #[serde(default)]
    pub starting_point: Option<StartingPoint>,
}

impl SplitParams {
    /// Parameters with the default percentages.
    #[must_use]
    pub fn new(past_steps: usize, future_steps: usize) -> Self {
        Self {
            past_steps,
            future_steps,
            shift: default_shift(),
            skip_step: default_skip_step(),
            perc_train: default_perc_train(),
            perc_valid: default_perc_valid(),
            range_train: None,
            range_validation: None,
            range_test: None,
            starting_point: None,
        }
    }

    /// Set the train and validation fractions.
    #[must_use]
    pub fn with_percentages(mut self, perc_train: f32, perc_valid: f32) -> Self {
        self.perc_train = perc_train;
        self.perc_valid = perc_valid;
        self
    }

    /// Set the shift of future covariates.
    #[must_use]
    pub fn with_shift(mut self, shift: usize) -> Self {
        self.shift = shift;
        self
    }

    /// Set the stride between windows.
    #[must_use]
    pub fn with_skip_step(mut self, skip_step: usize) -> Self {
        self.skip_step = skip_step;
        self
    }

    /// Use explicit datetime ranges instead of percentages.
    #[must_use]
    pub fn with_ranges(
        mut self,
        train: (NaiveDateTime, NaiveDateTime),
        validation: (NaiveDateTime, NaiveDateTime),
        test: (NaiveDateTime, NaiveDateTime),
    ) -> Self {
        self.range_train = Some(train);
        self.range_validation = Some(validation);
        self.range_test = Some(test);
        self
    }

    /// Check the window geometry and the percentages.
    pub fn validate(&self) -> Result<()> {
        if self.past_steps == 0 || self.future_steps == 0 {
            return Err(DataError::InvalidInput(
                "past_steps and future_steps must be positive".to_string(),
            ));
        }
        if self.skip_step == 0 {
            return Err(DataError::InvalidInput("skip_step must be positive".to_string()));
        }
        if self.shift > self.past_steps {
            return Err(DataError::InvalidInput(format!(
                "shift {} cannot exceed past_steps {}",
                self.shift, self.past_steps
            )));
        }
        let in_unit = |p: f32| (0.0..=1.0).contains(&p);
        if !in_unit(self.perc_train) || !in_unit(self.perc_valid) {
            return Err(DataError::SplitError(
                "percentages must lie in [0, 1]".to_string(),
            ));
        }
        if self.perc_train + self.perc_valid > 1.0 + f32::EPSILON {
            return Err(DataError::SplitError(format!(
                "perc_train + perc_valid = {} exceeds 1",
                self.perc_train + self.perc_valid
            )));
        }
        Ok(())
    }

    fn ranges(&self) -> Option<[(NaiveDateTime, NaiveDateTime); 3]> {
        Some([self.range_train?, self.range_validation?, self.range_test?])
    }
}

/// Split a time sorted frame into train, validation and test frames.
///
/// Validation and test start `past_steps` rows early so that their first
/// window sees a full context.
pub fn split_frame(frame: &TimeFrame, params: &SplitParams) -> Result<(TimeFrame, TimeFrame, TimeFrame)> {
    params.validate()?;
    let n = frame.len();
    let bounds = match params.ranges() {
        Some(ranges) => ranges.map(|(start, end)| {
            let first = frame.time().partition_point(|t| *t < start);
            let last = frame.time().partition_point(|t| *t <= end);
            (first, last.max(first))
        }),
        None => {
            let train_end = (n as f64 * f64::from(params.perc_train)) as usize;
            let valid_end = (n as f64 * f64::from(params.perc_train + params.perc_valid)) as usize;
            let valid_end = valid_end.clamp(train_end, n);
            [(0, train_end), (train_end, valid_end), (valid_end, n)]
        }
    };

    let names = ["train", "validation", "test"];
    for (name, (start, end)) in names.iter().zip(bounds.iter()) {
        if start >= end {
            return Err(DataError::SplitError(format!("the {name} split is empty")));
        }
    }

    let [train, validation, test] = bounds;
    let extend = |(start, end): (usize, usize)| start.saturating_sub(params.past_steps)..end;
    let train = frame.slice_rows(train.0..train.1)?;
    let validation = frame.slice_rows(extend(validation))?;
    let test = frame.slice_rows(extend(test))?;
    tracing::debug!(
        train = train.len(),
        validation = validation.len(),
        test = test.len(),
        "split frame"
    );
    Ok((train, validation, test))
}
