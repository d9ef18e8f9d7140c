//! Synthetic signals driven by categorical regimes.

use chrono::{NaiveDate, NaiveDateTime};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tsf_core::Seed;

use crate::error::{DataError, Result};
use crate::frame::TimeFrame;

/// Name of the target column of a synthetic frame.
pub const SIGNAL_COLUMN: &str = "signal";

/// How a categorical signal combines with the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Added to the running signal.
    #[default]
    Additive,
    /// Multiplies the running signal.
    Multiplicative,
}

/// A categorical variable with a level per class, used to build toy series.
///
/// With more than one class (or `frequency == 1`) the classes cycle: class `c`
/// stays active for `duration[c] * frequency` steps. With a single class and
/// `frequency > 1` the class fires every `frequency` steps for `duration[0]`
/// steps and is idle otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Categorical {
    /// Column name of the class index.
    pub name: String,
    /// Cycle multiplier, or spot period with a single class.
    pub frequency: usize,
    /// Active steps per class.
    pub duration: Vec<usize>,
    /// Number of classes.
    pub classes: usize,
    /// Combination rule.
    pub action: Action,
    /// Signal level per class.
    pub level: Vec<f32>,
    /// Noise variance per class, empty for a noiseless level.
    #[serde(default)]
    pub variance: Vec<f32>,
}

impl Categorical {
    /// Create a validated categorical.
    ///
    /// # Errors
    ///
    /// Returns an error if the per class vectors disagree with `classes`.
    pub fn new(
        name: impl Into<String>,
        frequency: usize,
        duration: Vec<usize>,
        classes: usize,
        action: Action,
        level: Vec<f32>,
        variance: Vec<f32>,
    ) -> Result<Self> {
        let categorical = Self {
            name: name.into(),
            frequency,
            duration,
            classes,
            action,
            level,
            variance,
        };
        categorical.validate()?;
        Ok(categorical)
    }

    /// Check the per class vectors.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(DataError::InvalidInput(format!("categorical '{}': {msg}", self.name)));
        if self.classes == 0 {
            return invalid("needs at least one class".to_string());
        }
        if self.frequency == 0 {
            return invalid("frequency must be at least 1".to_string());
        }
        if self.duration.len() != self.classes {
            return invalid(format!("{} durations for {} classes", self.duration.len(), self.classes));
        }
        if self.duration.iter().any(|&d| d == 0) {
            return invalid("durations must be positive".to_string());
        }
        if self.level.len() != self.classes {
            return invalid(format!("{} levels for {} classes", self.level.len(), self.classes));
        }
        if !self.variance.is_empty() && self.variance.len() != self.classes {
            return invalid(format!("{} variances for {} classes", self.variance.len(), self.classes));
        }
        if self.variance.iter().any(|&v| v < 0.0) {
            return invalid("variances must be non negative".to_string());
        }
        Ok(())
    }

    fn is_spot(&self) -> bool {
        self.classes == 1 && self.frequency > 1
    }

    fn idle_level(&self) -> f32 {
        match self.action {
            Action::Additive => 0.0,
            Action::Multiplicative => 1.0,
        }
    }

    /// Generate `length` steps of class indices and signal values.
    ///
    /// In spot mode the class column is `1` when the class is active and `0`
    /// when idle.
    pub fn generate_signal<R: Rng + ?Sized>(&self, length: usize, rng: &mut R) -> (Vec<usize>, Vec<f32>) {
        let mut classes = Vec::with_capacity(length);
        let mut signal = Vec::with_capacity(length);

        let sample = |c: usize, rng: &mut R| {
            let std = self.variance.get(c).map_or(0.0, |v| v.sqrt());
            Seed::sample_normal(rng, self.level[c], std)
        };

        if self.is_spot() {
            let active = self.duration[0];
            for t in 0..length {
                if t % self.frequency < active {
                    classes.push(1);
                    signal.push(sample(0, &mut *rng));
                } else {
                    classes.push(0);
                    signal.push(self.idle_level());
                }
            }
        } else {
            'outer: loop {
                for c in 0..self.classes {
                    for _ in 0..self.duration[c] * self.frequency {
                        if classes.len() == length {
                            break 'outer;
                        }
                        classes.push(c);
                        signal.push(sample(c, &mut *rng));
                    }
                }
            }
        }
        (classes, signal)
    }
}

/// First timestamp of synthetic frames.
#[must_use]
pub fn synthetic_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Build a daily frame by combining categorical signals.
///
/// Additive categoricals are summed, multiplicative ones then scale the sum,
/// and `N(noise_mean, 1)` noise is added. The frame holds the `signal` column
/// and one class column per categorical.
pub fn generate_frame(
    length: usize,
    categoricals: &[Categorical],
    noise_mean: f32,
    seed: Seed,
) -> Result<TimeFrame> {
    if length == 0 {
        return Err(DataError::InvalidInput("signal length must be positive".to_string()));
    }
    let mut rng = seed.to_rng();
    let start = synthetic_start();
    let time = (0..length as i64)
        .map(|d| start + chrono::Duration::days(d))
        .collect();
    let mut frame = TimeFrame::new(time);

    let mut additive = vec![0.0f32; length];
    let mut multiplicative = vec![1.0f32; length];
    for categorical in categoricals {
        categorical.validate()?;
        let (classes, signal) = categorical.generate_signal(length, &mut rng);
        match categorical.action {
            Action::Additive => additive.iter_mut().zip(&signal).for_each(|(a, v)| *a += v),
            Action::Multiplicative => multiplicative.iter_mut().zip(&signal).for_each(|(m, v)| *m *= v),
        }
        frame.add_column(
            categorical.name.clone(),
            classes.into_iter().map(|c| c as f32).collect(),
        )?;
    }

    let signal = additive
        .iter()
        .zip(&multiplicative)
        .map(|(a, m)| a * m + Seed::sample_normal(&mut rng, noise_mean, 1.0))
        .collect();
    frame.add_column(SIGNAL_COLUMN, signal)?;
    tracing::info!(length, categoricals = categoricals.len(), "generated synthetic signal");
    Ok(frame)
}
