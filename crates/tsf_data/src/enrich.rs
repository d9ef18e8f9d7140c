//! Calendar features derived from the time axis.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};
use crate::frame::TimeFrame;

/// A calendar attribute of a timestamp, used as a categorical variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarFeature {
    /// Hour of the day, 0 to 23.
    Hour,
    /// Day of the week, Monday = 0.
    Dow,
    /// Month, 1 to 12.
    Month,
    /// Minute of the hour.
    Minute,
    /// Day of the month.
    Day,
    /// Calendar year.
    Year,
    /// ISO week number.
    Week,
}

impl CalendarFeature {
    /// Column name of the feature.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Dow => "dow",
            Self::Month => "month",
            Self::Minute => "minute",
            Self::Day => "day",
            Self::Year => "year",
            Self::Week => "week",
        }
    }

    /// Value of the feature at `t`.
    #[must_use]
    pub fn value(&self, t: &NaiveDateTime) -> f32 {
        match self {
            Self::Hour => t.hour() as f32,
            Self::Dow => t.weekday().num_days_from_monday() as f32,
            Self::Month => t.month() as f32,
            Self::Minute => t.minute() as f32,
            Self::Day => t.day() as f32,
            Self::Year => t.year() as f32,
            Self::Week => t.iso_week().week() as f32,
        }
    }
}

impl fmt::Display for CalendarFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CalendarFeature {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hour" => Ok(Self::Hour),
            "dow" => Ok(Self::Dow),
            "month" => Ok(Self::Month),
            "minute" => Ok(Self::Minute),
            "day" => Ok(Self::Day),
            "year" => Ok(Self::Year),
            "week" => Ok(Self::Week),
            other => Err(DataError::InvalidInput(format!(
                "unknown calendar feature '{other}'"
            ))),
        }
    }
}

/// Add one column per calendar feature, named after the feature.
///
/// Returns the names of the added columns.
pub fn enrich(frame: &mut TimeFrame, features: &[CalendarFeature]) -> Result<Vec<String>> {
    let mut added = Vec::with_capacity(features.len());
    for feature in features {
        let values = frame.time().iter().map(|t| feature.value(t)).collect();
        frame.add_column(feature.name(), values)?;
        added.push(feature.name().to_string());
    }
    tracing::debug!(?added, "added calendar features");
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_enrich_adds_columns() {
        // 2021-03-01 was a Monday
        let t = NaiveDate::from_ymd_opt(2021, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let time = (0..48).map(|h| t + chrono::Duration::hours(h)).collect();
        let mut frame = TimeFrame::new(time);

        let added = enrich(&mut frame, &[CalendarFeature::Hour, CalendarFeature::Dow]).unwrap();
        assert_eq!(added, vec!["hour".to_string(), "dow".to_string()]);

        let hour = frame.column("hour").unwrap();
        assert_eq!(hour[0], 0.0);
        assert_eq!(hour[25], 1.0);
        let dow = frame.column("dow").unwrap();
        assert_eq!(dow[0], 0.0);
        assert_eq!(dow[30], 1.0);
    }

    #[test]
    fn test_feature_values() {
        let t = NaiveDate::from_ymd_opt(2020, 12, 31)
            .unwrap()
            .and_hms_opt(17, 45, 0)
            .unwrap();
        assert_eq!(CalendarFeature::Month.value(&t), 12.0);
        assert_eq!(CalendarFeature::Minute.value(&t), 45.0);
        assert_eq!(CalendarFeature::Day.value(&t), 31.0);
        assert_eq!(CalendarFeature::Year.value(&t), 2020.0);
        assert_eq!(CalendarFeature::Week.value(&t), 53.0);
    }

    #[test]
    fn test_parse_feature() {
        assert_eq!("DOW".parse::<CalendarFeature>().unwrap(), CalendarFeature::Dow);
        assert!("season".parse::<CalendarFeature>().is_err());
    }
}
