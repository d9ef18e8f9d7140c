//! Column table indexed by a time axis.

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{DataError, Result};
use crate::freq::{month_index, Frequency};

/// Name of the time axis in CSV files written by [`TimeFrame::write_csv`].
pub const TIME_COLUMN: &str = "time";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const KNOWN_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

/// A table of `f32` columns sharing one timestamp axis.
///
/// Missing values are stored as `NaN`. Categorical columns hold class
/// values as floats until they are label encoded.
///
/// # Example
///
/// ```rust
/// use chrono::NaiveDate;
/// use tsf_data::TimeFrame;
///
/// let t0 = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let time = (0..3).map(|d| t0 + chrono::Duration::days(d)).collect();
/// let frame = TimeFrame::new(time).with_column("y", vec![1.0, 2.0, 3.0]).unwrap();
/// assert_eq!(frame.len(), 3);
/// assert_eq!(frame.column("y").unwrap()[2], 3.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TimeFrame {
    time: Vec<NaiveDateTime>,
    names: Vec<String>,
    columns: Vec<Vec<f32>>,
}

impl TimeFrame {
    /// Create a frame with a time axis and no columns.
    #[must_use]
    pub fn new(time: Vec<NaiveDateTime>) -> Self {
        Self {
            time,
            names: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Builder style [`TimeFrame::add_column`].
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<f32>) -> Result<Self> {
        self.add_column(name, values)?;
        Ok(self)
    }

    /// Add a column, replacing any column with the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the column length differs from the time axis.
    pub fn add_column(&mut self, name: impl Into<String>, values: Vec<f32>) -> Result<()> {
        let name = name.into();
        if values.len() != self.time.len() {
            return Err(DataError::InvalidShape(format!(
                "column '{name}' has {} rows, the time axis has {}",
                values.len(),
                self.time.len()
            )));
        }
        match self.position(&name) {
            Some(i) => self.columns[i] = values,
            None => {
                self.names.push(name);
                self.columns.push(values);
            }
        }
        Ok(())
    }

    /// Remove a column and return its values.
    pub fn remove_column(&mut self, name: &str) -> Option<Vec<f32>> {
        let i = self.position(name)?;
        self.names.remove(i);
        Some(self.columns.remove(i))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Values of a column.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&[f32]> {
        self.position(name).map(|i| self.columns[i].as_slice())
    }

    /// Mutable values of a column.
    pub fn column_mut(&mut self, name: &str) -> Option<&mut [f32]> {
        self.position(name).map(|i| self.columns[i].as_mut_slice())
    }

    /// Values of a column, erroring when it is missing.
    pub fn require_column(&self, name: &str) -> Result<&[f32]> {
        self.column(name)
            .ok_or_else(|| DataError::ColumnNotFound(name.to_string()))
    }

    /// Check whether a column exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Column names in insertion order.
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Check if the frame has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// The time axis.
    #[must_use]
    pub fn time(&self) -> &[NaiveDateTime] {
        &self.time
    }

    /// Build a frame from a subset of rows, in the given order.
    #[must_use]
    pub fn take_rows(&self, rows: &[usize]) -> Self {
        Self {
            time: rows.iter().map(|&r| self.time[r]).collect(),
            names: self.names.clone(),
            columns: self
                .columns
                .iter()
                .map(|col| rows.iter().map(|&r| col[r]).collect())
                .collect(),
        }
    }

    /// Sort rows by time. The sort is stable, ties keep their order.
    pub fn sort_by_time(&mut self) {
        if self.time.windows(2).all(|w| w[0] <= w[1]) {
            return;
        }
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by_key(|&i| self.time[i]);
        *self = self.take_rows(&order);
    }

    /// Rows in `range`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range ends past the last row.
    pub fn slice_rows(&self, range: Range<usize>) -> Result<Self> {
        if range.end > self.len() || range.start > range.end {
            return Err(DataError::IndexOutOfBounds {
                index: range.end,
                length: self.len(),
            });
        }
        let rows: Vec<usize> = range.collect();
        Ok(self.take_rows(&rows))
    }

    /// Rows with `start <= time <= end`.
    #[must_use]
    pub fn filter_time(&self, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        let rows: Vec<usize> = (0..self.len())
            .filter(|&i| self.time[i] >= start && self.time[i] <= end)
            .collect();
        self.take_rows(&rows)
    }

    /// Keep the first row for each timestamp; returns how many rows were removed.
    pub fn drop_duplicates(&mut self) -> usize {
        let mut seen = HashSet::with_capacity(self.len());
        let rows: Vec<usize> = (0..self.len())
            .filter(|&i| seen.insert(self.time[i]))
            .collect();
        let removed = self.len() - rows.len();
        if removed > 0 {
            *self = self.take_rows(&rows);
        }
        removed
    }

    /// Reindex the frame on the regular `freq` grid between its first and last
    /// timestamp. Missing timestamps get `NaN` rows, off-grid rows are dropped.
    ///
    /// Monthly, quarterly and yearly frames are matched by calendar period
    /// instead: each row keeps its own timestamp, a period without a row gets
    /// a `NaN` row, and extra rows falling in an occupied period are dropped.
    ///
    /// Assumes the frame is sorted and free of duplicates. Returns how many
    /// rows were inserted.
    pub fn extend_time(&mut self, freq: Frequency) -> Result<usize> {
        let (Some(&start), Some(&end)) = (self.time.first(), self.time.last()) else {
            return Ok(0);
        };
        if let Some(months) = freq.months() {
            return self.extend_calendar(freq, start, end, months);
        }

        let index: HashMap<NaiveDateTime, usize> =
            self.time.iter().enumerate().map(|(i, &t)| (t, i)).collect();

        let mut grid = Vec::new();
        let mut k = 0i64;
        loop {
            let t = freq.advance(start, k)?;
            if t > end {
                break;
            }
            grid.push(t);
            k += 1;
        }

        let matched = grid.iter().filter(|t| index.contains_key(t)).count();
        let inserted = grid.len() - matched;
        let dropped = self.len() - matched;
        if dropped > 0 {
            tracing::warn!(dropped, %freq, "rows off the time grid were dropped");
        }
        if inserted == 0 && dropped == 0 {
            return Ok(0);
        }

        let columns = self
            .columns
            .iter()
            .map(|col| {
                grid.iter()
                    .map(|t| index.get(t).map_or(f32::NAN, |&r| col[r]))
                    .collect()
            })
            .collect();
        self.time = grid;
        self.columns = columns;
        Ok(inserted)
    }

    fn extend_calendar(
        &mut self,
        freq: Frequency,
        start: NaiveDateTime,
        end: NaiveDateTime,
        months: u32,
    ) -> Result<usize> {
        let step = i64::from(months);
        let origin = month_index(start);
        let period = |t: NaiveDateTime| (month_index(t) - origin).div_euclid(step);
        let periods = usize::try_from(period(end) + 1)
            .map_err(|_| DataError::InvalidInput("time axis is not sorted".to_string()))?;

        let mut slots: Vec<Option<usize>> = vec![None; periods];
        let mut dropped = 0usize;
        for (row, &t) in self.time.iter().enumerate() {
            let slot = usize::try_from(period(t))
                .ok()
                .and_then(|k| slots.get_mut(k))
                .ok_or_else(|| DataError::InvalidInput("time axis is not sorted".to_string()))?;
            if slot.is_some() {
                dropped += 1;
            } else {
                *slot = Some(row);
            }
        }
        if dropped > 0 {
            tracing::warn!(dropped, %freq, "rows sharing a calendar period were dropped");
        }
        let inserted = slots.iter().filter(|s| s.is_none()).count();
        if inserted == 0 && dropped == 0 {
            return Ok(0);
        }

        let mut time = Vec::with_capacity(periods);
        for (k, slot) in slots.iter().enumerate() {
            let t = match slot {
                Some(row) => self.time[*row],
                None => freq.advance(start, k as i64)?,
            };
            time.push(t);
        }
        let columns = self
            .columns
            .iter()
            .map(|col| {
                slots
                    .iter()
                    .map(|slot| slot.map_or(f32::NAN, |r| col[r]))
                    .collect()
            })
            .collect();
        self.time = time;
        self.columns = columns;
        Ok(inserted)
    }

    /// Smallest positive gap between consecutive timestamps, as a [`Frequency`].
    ///
    /// # Errors
    ///
    /// Returns an error with fewer than two distinct timestamps.
    pub fn infer_frequency(&self) -> Result<Frequency> {
        let mut sorted = self.time.clone();
        sorted.sort();
        let gap = sorted
            .windows(2)
            .map(|w| w[1] - w[0])
            .filter(|d| d.num_seconds() > 0)
            .min()
            .ok_or_else(|| {
                DataError::InvalidInput(
                    "at least two distinct timestamps are needed to infer a frequency".to_string(),
                )
            })?;
        Frequency::from_gap(gap)
    }

    /// Sort, drop duplicated timestamps and fill holes on the inferred grid.
    ///
    /// Returns how many rows were inserted.
    pub fn check_holes_and_duplicates(&mut self) -> Result<usize> {
        self.sort_by_time();
        let removed = self.drop_duplicates();
        if removed > 0 {
            tracing::info!(removed, "removed duplicated timestamps");
        }
        let freq = self.infer_frequency()?;
        let inserted = self.extend_time(freq)?;
        if inserted > 0 {
            tracing::info!(inserted, %freq, "filled holes in the time axis");
        }
        Ok(inserted)
    }

    /// Read a CSV file.
    ///
    /// `time_column` is parsed with `time_format`, or with a set of common
    /// ISO-like layouts when no format is given, and becomes the time axis.
    /// Every other column is parsed as `f32`, non numeric cells become `NaN`.
    pub fn read_csv(
        path: impl AsRef<Path>,
        time_column: &str,
        time_format: Option<&str>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let time_idx = headers
            .iter()
            .position(|h| h == time_column)
            .ok_or_else(|| DataError::ColumnNotFound(time_column.to_string()))?;

        let mut time = Vec::new();
        let mut columns: Vec<Vec<f32>> = vec![Vec::new(); headers.len()];
        for record in reader.records() {
            let record = record?;
            let raw = record.get(time_idx).unwrap_or_default();
            time.push(parse_timestamp(raw, time_format)?);
            for (i, cell) in record.iter().enumerate() {
                if i != time_idx {
                    columns[i].push(cell.trim().parse::<f32>().unwrap_or(f32::NAN));
                }
            }
        }

        let mut frame = Self::new(time);
        for (i, (name, values)) in headers.iter().zip(columns).enumerate() {
            if i != time_idx {
                frame.add_column(name, values)?;
            }
        }
        tracing::debug!(path = %path.display(), rows = frame.len(), "read csv");
        Ok(frame)
    }

    /// Write the frame as CSV with a leading `time` column; `NaN` is written empty.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        let mut header = vec![TIME_COLUMN.to_string()];
        header.extend(self.names.iter().cloned());
        writer.write_record(&header)?;
        for (r, t) in self.time.iter().enumerate() {
            let mut row = Vec::with_capacity(self.columns.len() + 1);
            row.push(t.format(TIME_FORMAT).to_string());
            for col in &self.columns {
                let v = col[r];
                row.push(if v.is_nan() { String::new() } else { v.to_string() });
            }
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Parse a timestamp with an explicit format or a set of common layouts.
///
/// Bare dates are read as midnight.
pub fn parse_timestamp(raw: &str, format: Option<&str>) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    let fail = || DataError::Parse(format!("cannot parse timestamp '{raw}'"));
    if let Some(fmt) = format {
        return NaiveDateTime::parse_from_str(raw, fmt)
            .or_else(|_| NaiveDate::parse_from_str(raw, fmt).map(|d| d.and_time(chrono::NaiveTime::MIN)))
            .map_err(|_| fail());
    }
    for fmt in KNOWN_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(t);
        }
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Ok(d.and_time(chrono::NaiveTime::MIN));
        }
    }
    Err(fail())
}
