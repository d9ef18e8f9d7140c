//! Parser for the Monash `.tsf` forecasting format.
//!
//! A `.tsf` file has a header of `@` directives followed by one series per
//! line after `@data`:
//!
//! ```text
//! @relation example
//! @attribute series_name string
//! @attribute start_timestamp date
//! @frequency daily
//! @horizon 7
//! @missing true
//! @equallength false
//! @data
//! T1:2015-01-01 00-00-00:1,2,?,4
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};
use crate::frame::TimeFrame;
use crate::freq::Frequency;

const TSF_DATE_FORMAT: &str = "%Y-%m-%d %H-%M-%S";

/// Type of a series attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    /// Free text.
    String,
    /// Number.
    Numeric,
    /// Timestamp in `%Y-%m-%d %H-%M-%S`.
    Date,
}

/// Value of a series attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// Free text.
    String(String),
    /// Number.
    Numeric(f64),
    /// Timestamp.
    Date(NaiveDateTime),
}

/// One series of a `.tsf` file.
#[derive(Debug, Clone, PartialEq)]
pub struct TsfSeries {
    /// Attribute values, in header order.
    pub attributes: Vec<(String, AttributeValue)>,
    /// Observations, missing values replaced.
    pub values: Vec<f32>,
}

impl TsfSeries {
    /// The `series_name` attribute, when present.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.attributes.iter().find_map(|(k, v)| match (k.as_str(), v) {
            ("series_name", AttributeValue::String(s)) => Some(s.as_str()),
            _ => None,
        })
    }

    /// The `start_timestamp` attribute, when present.
    #[must_use]
    pub fn start_timestamp(&self) -> Option<NaiveDateTime> {
        self.attributes.iter().find_map(|(k, v)| match (k.as_str(), v) {
            ("start_timestamp", AttributeValue::Date(t)) => Some(*t),
            _ => None,
        })
    }

    /// Expand the series into a frame with one `value_column_name` column.
    ///
    /// Series without a start timestamp start on 2000-01-01.
    pub fn to_frame(&self, freq: Frequency, value_column_name: &str) -> Result<TimeFrame> {
        let start = self.start_timestamp().unwrap_or_else(default_start);
        let time = (0..self.values.len() as i64)
            .map(|k| freq.advance(start, k))
            .collect::<Result<Vec<_>>>()?;
        TimeFrame::new(time).with_column(value_column_name, self.values.clone())
    }
}

fn default_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Content of a `.tsf` file.
#[derive(Debug, Clone, PartialEq)]
pub struct TsfData {
    /// Relation name.
    pub relation: Option<String>,
    /// Declared attributes.
    pub attributes: Vec<(String, AttributeKind)>,
    /// Series in file order.
    pub series: Vec<TsfSeries>,
    /// Monash frequency name, e.g. `daily`.
    pub frequency: Option<String>,
    /// Declared forecast horizon.
    pub forecast_horizon: Option<usize>,
    /// Whether the file declares missing values.
    pub contain_missing_values: bool,
    /// Whether all series have the same length.
    pub contain_equal_length: bool,
    /// Name given to the value column by [`TsfData::to_frames`].
    pub value_column_name: String,
}

impl TsfData {
    /// Parsed [`Frequency`] of the file.
    pub fn parsed_frequency(&self) -> Result<Frequency> {
        let name = self
            .frequency
            .as_deref()
            .ok_or_else(|| DataError::FormatError("the file declares no @frequency".to_string()))?;
        Frequency::get_freq(name)
    }

    /// Horizon of the file, or the default horizon of its frequency.
    pub fn horizon(&self) -> Result<usize> {
        match self.forecast_horizon {
            Some(h) => Ok(h),
            None => Ok(self.parsed_frequency()?.default_horizon()),
        }
    }

    /// One frame per series, named after `series_name` or its position.
    pub fn to_frames(&self) -> Result<Vec<(String, TimeFrame)>> {
        let freq = self.parsed_frequency()?;
        self.series
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let name = s.name().map_or_else(|| format!("T{}", i + 1), str::to_string);
                Ok((name, s.to_frame(freq, &self.value_column_name)?))
            })
            .collect()
    }
}

fn parse_bool(directive: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(DataError::FormatError(format!(
            "invalid value '{other}' for @{directive}"
        ))),
    }
}

/// Parse a `.tsf` file.
///
/// Missing observations (`?`) are replaced with `replace_missing_vals_with`,
/// `NaN` when `None`.
pub fn convert_tsf_to_dataframe(
    path: impl AsRef<Path>,
    replace_missing_vals_with: Option<f32>,
    value_column_name: &str,
) -> Result<TsfData> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut data = parse_tsf(reader, replace_missing_vals_with, value_column_name)?;
    if data.relation.is_none() {
        data.relation = path.file_stem().map(|s| s.to_string_lossy().into_owned());
    }
    tracing::info!(
        path = %path.display(),
        series = data.series.len(),
        frequency = ?data.frequency,
        "loaded tsf file"
    );
    Ok(data)
}

/// Parse `.tsf` content from any reader.
pub fn parse_tsf<R: BufRead>(
    reader: R,
    replace_missing_vals_with: Option<f32>,
    value_column_name: &str,
) -> Result<TsfData> {
    let missing = replace_missing_vals_with.unwrap_or(f32::NAN);
    let mut data = TsfData {
        relation: None,
        attributes: Vec::new(),
        series: Vec::new(),
        frequency: None,
        forecast_horizon: None,
        contain_missing_values: false,
        contain_equal_length: false,
        value_column_name: value_column_name.to_string(),
    };
    let mut found_data = false;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if !found_data {
            let Some(directive) = line.strip_prefix('@') else {
                return Err(DataError::FormatError(format!(
                    "line {}: expected a directive before @data",
                    line_no + 1
                )));
            };
            let (key, value) = directive.split_once(char::is_whitespace).unwrap_or((directive, ""));
            let value = value.trim();
            match key.to_lowercase().as_str() {
                "data" => {
                    if data.attributes.is_empty() {
                        return Err(DataError::FormatError("no @attribute before @data".to_string()));
                    }
                    found_data = true;
                }
                "relation" => data.relation = Some(value.to_string()),
                "attribute" => {
                    let (name, kind) = value.split_once(char::is_whitespace).ok_or_else(|| {
                        DataError::FormatError(format!("line {}: malformed @attribute", line_no + 1))
                    })?;
                    let kind = match kind.trim().to_lowercase().as_str() {
                        "string" => AttributeKind::String,
                        "numeric" => AttributeKind::Numeric,
                        "date" => AttributeKind::Date,
                        other => {
                            return Err(DataError::FormatError(format!(
                                "unsupported attribute type '{other}'"
                            )))
                        }
                    };
                    data.attributes.push((name.to_string(), kind));
                }
                "frequency" => data.frequency = Some(value.to_string()),
                "horizon" => {
                    data.forecast_horizon = Some(value.parse().map_err(|_| {
                        DataError::FormatError(format!("invalid @horizon '{value}'"))
                    })?);
                }
                "missing" => data.contain_missing_values = parse_bool("missing", value)?,
                "equallength" => data.contain_equal_length = parse_bool("equallength", value)?,
                other => {
                    return Err(DataError::FormatError(format!("unknown directive @{other}")));
                }
            }
            continue;
        }

        let n_attr = data.attributes.len();
        let parts: Vec<&str> = line.splitn(n_attr + 1, ':').collect();
        if parts.len() != n_attr + 1 {
            return Err(DataError::FormatError(format!(
                "line {}: expected {} attributes and a series",
                line_no + 1,
                n_attr
            )));
        }

        let mut attributes = Vec::with_capacity(n_attr);
        for ((name, kind), raw) in data.attributes.iter().zip(&parts[..n_attr]) {
            let value = match kind {
                AttributeKind::String => AttributeValue::String((*raw).to_string()),
                AttributeKind::Numeric => AttributeValue::Numeric(raw.trim().parse().map_err(|_| {
                    DataError::Parse(format!("attribute {name}: '{raw}' is not numeric"))
                })?),
                AttributeKind::Date => AttributeValue::Date(
                    NaiveDateTime::parse_from_str(raw.trim(), TSF_DATE_FORMAT).map_err(|_| {
                        DataError::Parse(format!("attribute {name}: invalid date '{raw}'"))
                    })?,
                ),
            };
            attributes.push((name.clone(), value));
        }

        let series_raw = parts[n_attr].trim();
        if series_raw.is_empty() {
            return Err(DataError::FormatError(format!("line {}: empty series", line_no + 1)));
        }
        let values = series_raw
            .split(',')
            .map(|v| {
                let v = v.trim();
                if v == "?" {
                    Ok(missing)
                } else {
                    v.parse::<f32>()
                        .map_err(|_| DataError::Parse(format!("line {}: invalid value '{v}'", line_no + 1)))
                }
            })
            .collect::<Result<Vec<f32>>>()?;
        data.series.push(TsfSeries { attributes, values });
    }

    if !found_data {
        return Err(DataError::FormatError("missing @data section".to_string()));
    }
    if data.series.is_empty() {
        return Err(DataError::EmptyDataset);
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "# comment\n\
@relation sample\n\
@attribute series_name string\n\
@attribute start_timestamp date\n\
@frequency daily\n\
@horizon 3\n\
@missing true\n\
@equallength false\n\
@data\n\
T1:2015-01-01 00-00-00:1,2,?,4\n\
T2:2015-02-01 00-00-00:5,6\n";

    #[test]
    fn test_parse_sample() {
        let data = parse_tsf(Cursor::new(SAMPLE), None, "series_value").unwrap();
        assert_eq!(data.relation.as_deref(), Some("sample"));
        assert_eq!(data.series.len(), 2);
        assert_eq!(data.frequency.as_deref(), Some("daily"));
        assert_eq!(data.forecast_horizon, Some(3));
        assert!(data.contain_missing_values);
        assert!(!data.contain_equal_length);

        let first = &data.series[0];
        assert_eq!(first.name(), Some("T1"));
        assert!(first.values[2].is_nan());
        assert_eq!(
            first.start_timestamp().unwrap(),
            NaiveDate::from_ymd_opt(2015, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_replace_missing() {
        let data = parse_tsf(Cursor::new(SAMPLE), Some(0.0), "series_value").unwrap();
        assert_eq!(data.series[0].values, vec![1.0, 2.0, 0.0, 4.0]);
    }

    #[test]
    fn test_to_frames() {
        let data = parse_tsf(Cursor::new(SAMPLE), None, "series_value").unwrap();
        let frames = data.to_frames().unwrap();
        assert_eq!(frames[1].0, "T2");
        let frame = &frames[1].1;
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.column("series_value").unwrap(), &[5.0, 6.0]);
        assert_eq!(frame.time()[1] - frame.time()[0], chrono::Duration::days(1));
        assert_eq!(data.horizon().unwrap(), 3);
    }

    #[test]
    fn test_default_start() {
        let text = "@attribute series_name string\n@frequency monthly\n@data\nA:1,2,3\n";
        let data = parse_tsf(Cursor::new(text), None, "v").unwrap();
        let frames = data.to_frames().unwrap();
        assert_eq!(frames[0].1.time()[0], default_start());
        assert_eq!(data.horizon().unwrap(), 12);
    }

    #[test]
    fn test_malformed() {
        assert!(parse_tsf(Cursor::new("@attribute a string\nA:1\n"), None, "v").is_err());
        assert!(parse_tsf(Cursor::new("@data\nA:1\n"), None, "v").is_err());
        assert!(parse_tsf(Cursor::new("@attribute a numeric\n@data\nx:1\n"), None, "v").is_err());
        assert!(parse_tsf(Cursor::new("@attribute a string\n@data\nA:1,b\n"), None, "v").is_err());
    }
}
