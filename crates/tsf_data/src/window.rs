//! Sliding forecasting windows over a time frame.

use chrono::NaiveDateTime;
use ndarray::{Array3, Axis};

use crate::error::{DataError, Result};
use crate::frame::TimeFrame;
use crate::split::{SplitParams, StartingPoint};

/// Geometry and variables of the windows cut from a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSpec {
    /// Context length.
    pub past_steps: usize,
    /// Forecast horizon.
    pub future_steps: usize,
    /// Offset of future covariates with respect to the targets.
    pub shift: usize,
    /// Stride between consecutive windows.
    pub skip_step: usize,
    /// Numerical columns seen over the past.
    pub past_variables: Vec<String>,
    /// Numerical columns known over the future.
    pub future_variables: Vec<String>,
    /// Columns to forecast; each must be a past variable.
    pub target_variables: Vec<String>,
    /// Label encoded categorical columns, seen over past and future.
    pub cat_var: Vec<String>,
    /// Optional filter on the first future row.
    pub starting_point: Option<StartingPoint>,
    /// Keep windows whose targets are missing.
    pub keep_missing_target: bool,
}

impl WindowSpec {
    /// Window spec with the geometry of `params` and no variables.
    #[must_use]
    pub fn from_params(params: &SplitParams) -> Self {
        Self {
            past_steps: params.past_steps,
            future_steps: params.future_steps,
            shift: params.shift,
            skip_step: params.skip_step,
            past_variables: Vec::new(),
            future_variables: Vec::new(),
            target_variables: Vec::new(),
            cat_var: Vec::new(),
            starting_point: params.starting_point.clone(),
            keep_missing_target: false,
        }
    }

    /// Position of each target inside the past variables.
    pub fn idx_target(&self) -> Result<Vec<usize>> {
        self.target_variables
            .iter()
            .map(|t| {
                self.past_variables.iter().position(|p| p == t).ok_or_else(|| {
                    DataError::InvalidInput(format!("target '{t}' is not a past variable"))
                })
            })
            .collect()
    }
}

/// Windows cut from a frame, stored host side.
///
/// Arrays are `(windows, steps, channels)`. Optional blocks are `None` when
/// the spec has no variable of that kind.
#[derive(Debug, Clone)]
pub struct WindowDataset {
    /// Past numerical block.
    pub x_num_past: Array3<f32>,
    /// Future numerical block.
    pub x_num_future: Option<Array3<f32>>,
    /// Past categorical block.
    pub x_cat_past: Option<Array3<i64>>,
    /// Future categorical block.
    pub x_cat_future: Option<Array3<i64>>,
    /// Targets over the horizon, `NaN` where missing.
    pub y: Array3<f32>,
    /// Position of each target inside the past block.
    pub idx_target: Vec<usize>,
    /// Timestamps of the future rows of each window.
    pub future_times: Vec<Vec<NaiveDateTime>>,
    /// Timestamp of the last past row of each window.
    pub past_end: Vec<NaiveDateTime>,
}

impl WindowDataset {
    /// Number of windows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.x_num_past.shape()[0]
    }

    /// Check if there is no window.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forecast horizon.
    #[must_use]
    pub fn future_steps(&self) -> usize {
        self.y.shape()[1]
    }

    /// Number of targets.
    #[must_use]
    pub fn n_targets(&self) -> usize {
        self.y.shape()[2]
    }
}

fn columns<'a>(frame: &'a TimeFrame, names: &[String]) -> Result<Vec<&'a [f32]>> {
    names.iter().map(|n| frame.require_column(n)).collect()
}

/// Prefix counts of rows failing `ok`, so a span can be checked in O(1).
fn bad_prefix(n: usize, ok: impl Fn(usize) -> bool) -> Vec<usize> {
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0);
    for r in 0..n {
        let last = prefix[r];
        prefix.push(last + usize::from(!ok(r)));
    }
    prefix
}

/// Gather `steps` rows per window starting at `offset(start)`.
fn fill(cols: &[&[f32]], steps: usize, starts: &[usize], offset: impl Fn(usize) -> usize) -> Array3<f32> {
    let mut out = Array3::<f32>::zeros((starts.len(), steps, cols.len()));
    for (k, &i) in starts.iter().enumerate() {
        let first = offset(i);
        for s in 0..steps {
            for (c, col) in cols.iter().enumerate() {
                out[[k, s, c]] = col[first + s];
            }
        }
    }
    out
}

fn span_ok(prefix: &[usize], start: usize, end: usize) -> bool {
    prefix[end] == prefix[start]
}

/// Cut forecasting windows from `frame`.
///
/// A window whose first future row is `i` covers past rows
/// `[i - past_steps, i)`, targets `[i, i + future_steps)` and future
/// covariates shifted back by `shift`. Windows containing `NaN` are skipped,
/// except for missing targets when `keep_missing_target` is set.
///
/// # Errors
///
/// Returns [`DataError::EmptyDataset`] when no window survives.
pub fn create_windows(frame: &TimeFrame, spec: &WindowSpec) -> Result<WindowDataset> {
    let (past_steps, future_steps, shift) = (spec.past_steps, spec.future_steps, spec.shift);
    if past_steps == 0 || future_steps == 0 || spec.skip_step == 0 || shift > past_steps {
        return Err(DataError::InvalidInput(format!(
            "invalid window geometry: past {past_steps}, future {future_steps}, shift {shift}, skip {}",
            spec.skip_step
        )));
    }
    if spec.past_variables.is_empty() || spec.target_variables.is_empty() {
        return Err(DataError::InvalidInput(
            "windows need past and target variables".to_string(),
        ));
    }
    let idx_target = spec.idx_target()?;

    let past = columns(frame, &spec.past_variables)?;
    let future = columns(frame, &spec.future_variables)?;
    let targets = columns(frame, &spec.target_variables)?;
    let cats = columns(frame, &spec.cat_var)?;
    let n = frame.len();

    let past_bad = bad_prefix(n, |r| {
        past.iter().all(|c| !c[r].is_nan()) && cats.iter().all(|c| !c[r].is_nan())
    });
    let future_bad = bad_prefix(n, |r| {
        future.iter().all(|c| !c[r].is_nan()) && cats.iter().all(|c| !c[r].is_nan())
    });
    let target_bad = bad_prefix(n, |r| targets.iter().all(|c| !c[r].is_nan()));

    let start_filter = match &spec.starting_point {
        Some(sp) => Some((frame.require_column(&sp.column)?, sp.value)),
        None => None,
    };

    let mut starts = Vec::new();
    let mut i = past_steps;
    while i + future_steps <= n {
        let keep = span_ok(&past_bad, i - past_steps, i)
            && span_ok(&future_bad, i - shift, i + future_steps - shift)
            && (spec.keep_missing_target || span_ok(&target_bad, i, i + future_steps))
            && start_filter.map_or(true, |(col, value)| col[i] == value);
        if keep {
            starts.push(i);
        }
        i += spec.skip_step;
    }

    if starts.is_empty() {
        tracing::warn!(rows = n, past_steps, future_steps, "no valid window in frame");
        return Err(DataError::EmptyDataset);
    }

    let past_offset = |i: usize| i - past_steps;
    let future_offset = |i: usize| i - shift;
    let target_offset = |i: usize| i;

    let x_num_past = fill(&past, past_steps, &starts, past_offset);
    let y = fill(&targets, future_steps, &starts, target_offset);
    let x_num_future =
        (!future.is_empty()).then(|| fill(&future, future_steps, &starts, future_offset));
    let (x_cat_past, x_cat_future) = if cats.is_empty() {
        (None, None)
    } else {
        let to_int = |a: Array3<f32>| a.mapv(|v| v as i64);
        (
            Some(to_int(fill(&cats, past_steps, &starts, past_offset))),
            Some(to_int(fill(&cats, future_steps, &starts, target_offset))),
        )
    };

    let time = frame.time();
    let future_times = starts
        .iter()
        .map(|&i| time[i..i + future_steps].to_vec())
        .collect();
    let past_end = starts.iter().map(|&i| time[i - 1]).collect();

    tracing::debug!(windows = starts.len(), rows = n, "created windows");
    Ok(WindowDataset {
        x_num_past,
        x_num_future,
        x_cat_past,
        x_cat_future,
        y,
        idx_target,
        future_times,
        past_end,
    })
}

/// Select a subset of windows, in the given order.
pub(crate) fn select_windows<T: Clone>(array: &Array3<T>, indices: &[usize]) -> Array3<T> {
    array.select(Axis(0), indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn frame(n: usize) -> TimeFrame {
        let t0 = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let time = (0..n as i64).map(|d| t0 + Duration::hours(d)).collect();
        TimeFrame::new(time)
            .with_column("y", (0..n).map(|v| v as f32).collect())
            .unwrap()
            .with_column("x", (0..n).map(|v| 100.0 + v as f32).collect())
            .unwrap()
            .with_column("hour", (0..n).map(|v| (v % 24) as f32).collect())
            .unwrap()
    }

    fn spec() -> WindowSpec {
        WindowSpec {
            past_steps: 3,
            future_steps: 2,
            shift: 0,
            skip_step: 1,
            past_variables: vec!["x".to_string(), "y".to_string()],
            future_variables: vec!["x".to_string()],
            target_variables: vec!["y".to_string()],
            cat_var: vec!["hour".to_string()],
            starting_point: None,
            keep_missing_target: false,
        }
    }

    #[test]
    fn test_window_layout() {
        let ds = create_windows(&frame(10), &spec()).unwrap();
        // first future row runs from 3 to 8
        assert_eq!(ds.len(), 6);
        assert_eq!(ds.idx_target, vec![1]);
        assert_eq!(ds.x_num_past[[0, 0, 1]], 0.0);
        assert_eq!(ds.x_num_past[[0, 2, 0]], 102.0);
        assert_eq!(ds.y[[0, 0, 0]], 3.0);
        assert_eq!(ds.y[[5, 1, 0]], 9.0);

        let future = ds.x_num_future.as_ref().unwrap();
        assert_eq!(future[[0, 0, 0]], 103.0);
        let cat_future = ds.x_cat_future.as_ref().unwrap();
        assert_eq!(cat_future[[1, 1, 0]], 5);
        assert_eq!(ds.future_times[0].len(), 2);
        assert_eq!(ds.past_end[0], frame(10).time()[2]);
    }

    #[test]
    fn test_shift_and_skip() {
        let mut s = spec();
        s.shift = 1;
        s.skip_step = 2;
        let ds = create_windows(&frame(10), &s).unwrap();
        assert_eq!(ds.len(), 3);
        let future = ds.x_num_future.as_ref().unwrap();
        assert_eq!(future[[0, 0, 0]], 102.0);
        assert_eq!(ds.y[[1, 0, 0]], 5.0);
    }

    #[test]
    fn test_nan_windows_skipped() {
        let mut f = frame(10);
        f.column_mut("y").unwrap()[4] = f32::NAN;
        let ds = create_windows(&f, &spec()).unwrap();
        // windows touching row 4: starts 3, 4 (targets) and 5, 6, 7 (past)
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.y[[0, 0, 0]], 8.0);
    }

    #[test]
    fn test_keep_missing_target() {
        let mut f = frame(10);
        f.column_mut("y").unwrap()[9] = f32::NAN;
        let mut s = spec();
        s.keep_missing_target = true;
        let ds = create_windows(&f, &s).unwrap();
        assert_eq!(ds.len(), 6);
        assert!(ds.y[[5, 1, 0]].is_nan());
    }

    #[test]
    fn test_starting_point_filter() {
        let mut s = spec();
        s.starting_point = Some(StartingPoint {
            column: "hour".to_string(),
            value: 5.0,
        });
        let ds = create_windows(&frame(30), &s).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.y[[0, 0, 0]], 5.0);
    }

    #[test]
    fn test_errors() {
        let mut s = spec();
        s.target_variables = vec!["hour".to_string()];
        assert!(create_windows(&frame(10), &s).is_err());

        let err = create_windows(&frame(4), &spec()).unwrap_err();
        assert!(matches!(err, DataError::EmptyDataset));

        let mut s = spec();
        s.past_variables.push("missing".to_string());
        assert!(matches!(
            create_windows(&frame(10), &s).unwrap_err(),
            DataError::ColumnNotFound(_)
        ));
    }
}
