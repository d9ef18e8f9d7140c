//! Sampling frequencies of a time axis.

use std::fmt;

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;

/// Time series frequency.
///
/// Serialized as its pandas-style alias (`"10min"`, `"H"`, `"D"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Frequency {
    /// Every `n` seconds.
    Seconds(u32),
    /// Every `n` minutes.
    Minutes(u32),
    /// Hourly (H)
    Hourly,
    /// Daily (D)
    Daily,
    /// Weekly (W)
    Weekly,
    /// Monthly (M)
    Monthly,
    /// Quarterly (Q)
    Quarterly,
    /// Yearly (Y)
    Yearly,
}

impl Frequency {
    /// Map a Monash `.tsf` frequency name to a [`Frequency`].
    ///
    /// ```rust
    /// use tsf_data::Frequency;
    ///
    /// assert_eq!(Frequency::get_freq("10_minutes").unwrap(), Frequency::Minutes(10));
    /// assert_eq!(Frequency::get_freq("half_hourly").unwrap(), Frequency::Minutes(30));
    /// ```
    pub fn get_freq(tsf_frequency: &str) -> Result<Self> {
        let name = tsf_frequency.trim().to_lowercase();
        let freq = match name.as_str() {
            "secondly" => Self::Seconds(1),
            "minutely" => Self::Minutes(1),
            "half_hourly" => Self::Minutes(30),
            "hourly" => Self::Hourly,
            "daily" => Self::Daily,
            "weekly" => Self::Weekly,
            "monthly" => Self::Monthly,
            "quarterly" => Self::Quarterly,
            "yearly" => Self::Yearly,
            other => {
                let parsed = other.split_once('_').and_then(|(n, unit)| {
                    let n: u32 = n.parse().ok().filter(|&n| n > 0)?;
                    match unit {
                        "seconds" => Some(Self::Seconds(n)),
                        "minutes" => Some(Self::Minutes(n)),
                        _ => None,
                    }
                });
                parsed.ok_or_else(|| {
                    DataError::InvalidInput(format!("unknown tsf frequency '{tsf_frequency}'"))
                })?
            }
        };
        Ok(freq)
    }

    /// Pandas-style alias of the frequency.
    #[must_use]
    pub fn alias(&self) -> String {
        match self {
            Self::Seconds(1) => "S".to_string(),
            Self::Seconds(n) => format!("{n}S"),
            Self::Minutes(1) => "min".to_string(),
            Self::Minutes(n) => format!("{n}min"),
            Self::Hourly => "H".to_string(),
            Self::Daily => "D".to_string(),
            Self::Weekly => "W".to_string(),
            Self::Monthly => "M".to_string(),
            Self::Quarterly => "Q".to_string(),
            Self::Yearly => "Y".to_string(),
        }
    }

    /// Parse a pandas-style alias, the inverse of [`Frequency::alias`].
    pub fn from_alias(alias: &str) -> Result<Self> {
        let alias = alias.trim();
        let split = alias
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| DataError::InvalidInput(format!("invalid frequency alias '{alias}'")))?;
        let (count, unit) = alias.split_at(split);
        let n: u32 = if count.is_empty() {
            1
        } else {
            count
                .parse()
                .map_err(|_| DataError::InvalidInput(format!("invalid frequency alias '{alias}'")))?
        };
        if n == 0 {
            return Err(DataError::InvalidInput(format!("invalid frequency alias '{alias}'")));
        }

        let freq = match (unit, n) {
            ("S" | "s", n) => Self::Seconds(n),
            ("min" | "T", n) => Self::Minutes(n),
            ("H" | "h", 1) => Self::Hourly,
            ("H" | "h", n) => Self::Minutes(n * 60),
            ("D" | "d", 1) => Self::Daily,
            ("W", 1) => Self::Weekly,
            ("M" | "MS", 1) => Self::Monthly,
            ("Q" | "QS", 1) => Self::Quarterly,
            ("Y" | "A" | "YS" | "AS", 1) => Self::Yearly,
            _ => {
                return Err(DataError::InvalidInput(format!(
                    "unsupported frequency alias '{alias}'"
                )))
            }
        };
        Ok(freq)
    }

    /// Fixed length of one step, `None` for calendar frequencies.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Self::Seconds(n) => Some(Duration::seconds(i64::from(*n))),
            Self::Minutes(n) => Some(Duration::minutes(i64::from(*n))),
            Self::Hourly => Some(Duration::hours(1)),
            Self::Daily => Some(Duration::days(1)),
            Self::Weekly => Some(Duration::weeks(1)),
            Self::Monthly | Self::Quarterly | Self::Yearly => None,
        }
    }

    /// Months per step for calendar frequencies.
    pub(crate) fn months(&self) -> Option<u32> {
        match self {
            Self::Monthly => Some(1),
            Self::Quarterly => Some(3),
            Self::Yearly => Some(12),
            _ => None,
        }
    }

    /// Move `t` by `n` steps, calendar aware for monthly and coarser frequencies.
    ///
    /// A month-end `t` lands on month-ends: `2020-04-30` advanced by one
    /// month is `2020-05-31`.
    pub fn advance(&self, t: NaiveDateTime, n: i64) -> Result<NaiveDateTime> {
        let overflow = || DataError::InvalidInput(format!("{t} moved by {n} x {self} overflows"));
        if let Some(step) = self.duration() {
            let delta = i32::try_from(n)
                .ok()
                .and_then(|k| step.checked_mul(k))
                .ok_or_else(overflow)?;
            return t.checked_add_signed(delta).ok_or_else(overflow);
        }
        let months = self.months().unwrap_or(1);
        let total = u32::try_from(n.unsigned_abs())
            .ok()
            .and_then(|k| k.checked_mul(months))
            .ok_or_else(overflow)?;
        let moved = if n >= 0 {
            t.checked_add_months(Months::new(total))
        } else {
            t.checked_sub_months(Months::new(total))
        }
        .ok_or_else(overflow)?;
        if is_month_end(t) {
            month_end(moved).ok_or_else(overflow)
        } else {
            Ok(moved)
        }
    }

    /// Default forecast horizon for this frequency.
    #[must_use]
    pub fn default_horizon(&self) -> usize {
        match self {
            Self::Seconds(_) => 60,
            Self::Minutes(_) => 60,
            Self::Hourly => 48,
            Self::Daily => 30,
            Self::Weekly => 8,
            Self::Monthly => 12,
            Self::Quarterly => 4,
            Self::Yearly => 4,
        }
    }

    /// The frequency whose step matches `gap`.
    ///
    /// Gaps of 28 to 31 days are monthly, 89 to 92 days quarterly and
    /// 365 or 366 days yearly.
    pub fn from_gap(gap: Duration) -> Result<Self> {
        let secs = gap.num_seconds();
        if secs <= 0 {
            return Err(DataError::InvalidInput(format!(
                "cannot infer a frequency from a gap of {secs} seconds"
            )));
        }
        let days = secs / DAY;
        let freq = match secs {
            s if s == HOUR => Self::Hourly,
            s if s == DAY => Self::Daily,
            s if s == WEEK => Self::Weekly,
            s if s % DAY == 0 && (28..=31).contains(&days) => Self::Monthly,
            s if s % DAY == 0 && (89..=92).contains(&days) => Self::Quarterly,
            s if s % DAY == 0 && (365..=366).contains(&days) => Self::Yearly,
            s if s % MINUTE == 0 => Self::Minutes(to_u32(s / MINUTE)?),
            s => Self::Seconds(to_u32(s)?),
        };
        Ok(freq)
    }
}

fn is_month_end(t: NaiveDateTime) -> bool {
    t.date().succ_opt().map_or(true, |next| next.month() != t.month())
}

fn month_end(t: NaiveDateTime) -> Option<NaiveDateTime> {
    let next_month = NaiveDate::from_ymd_opt(t.year(), t.month(), 1)?.checked_add_months(Months::new(1))?;
    Some(next_month.pred_opt()?.and_time(t.time()))
}

/// Months elapsed since year 0, used to bucket timestamps by calendar period.
pub(crate) fn month_index(t: NaiveDateTime) -> i64 {
    i64::from(t.year()) * 12 + i64::from(t.month0())
}

fn to_u32(v: i64) -> Result<u32> {
    u32::try_from(v).map_err(|_| DataError::InvalidInput(format!("gap of {v} units is too large")))
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.alias())
    }
}

impl From<Frequency> for String {
    fn from(freq: Frequency) -> Self {
        freq.alias()
    }
}

impl TryFrom<String> for Frequency {
    type Error = DataError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_alias(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_get_freq_monash_names() {
        assert_eq!(Frequency::get_freq("4_seconds").unwrap(), Frequency::Seconds(4));
        assert_eq!(Frequency::get_freq("minutely").unwrap(), Frequency::Minutes(1));
        assert_eq!(Frequency::get_freq("hourly").unwrap(), Frequency::Hourly);
        assert_eq!(Frequency::get_freq("Yearly").unwrap(), Frequency::Yearly);
        assert!(Frequency::get_freq("fortnightly").is_err());
    }

    #[test]
    fn test_alias_roundtrip() {
        for freq in [
            Frequency::Seconds(4),
            Frequency::Minutes(1),
            Frequency::Minutes(10),
            Frequency::Hourly,
            Frequency::Daily,
            Frequency::Weekly,
            Frequency::Monthly,
            Frequency::Quarterly,
            Frequency::Yearly,
        ] {
            assert_eq!(Frequency::from_alias(&freq.alias()).unwrap(), freq);
        }
        assert_eq!(Frequency::from_alias("2H").unwrap(), Frequency::Minutes(120));
        assert!(Frequency::from_alias("3D").is_err());
        assert!(Frequency::from_alias("").is_err());
    }

    #[test]
    fn test_advance_calendar() {
        let jan31 = ts(2021, 1, 31, 0);
        assert_eq!(Frequency::Monthly.advance(jan31, 1).unwrap(), ts(2021, 2, 28, 0));
        assert_eq!(Frequency::Quarterly.advance(jan31, 1).unwrap(), ts(2021, 4, 30, 0));
        assert_eq!(Frequency::Yearly.advance(jan31, -1).unwrap(), ts(2020, 1, 31, 0));
        assert_eq!(Frequency::Hourly.advance(jan31, 5).unwrap(), ts(2021, 1, 31, 5));
        assert_eq!(Frequency::Daily.advance(jan31, -1).unwrap(), ts(2021, 1, 30, 0));
    }

    #[test]
    fn test_advance_keeps_month_ends() {
        let apr30 = ts(2020, 4, 30, 0);
        assert_eq!(Frequency::Monthly.advance(apr30, 1).unwrap(), ts(2020, 5, 31, 0));
        assert_eq!(Frequency::Monthly.advance(apr30, -2).unwrap(), ts(2020, 2, 29, 0));
        assert_eq!(Frequency::Quarterly.advance(ts(2021, 2, 28, 6), 1).unwrap(), ts(2021, 5, 31, 6));
        assert_eq!(Frequency::Yearly.advance(ts(2020, 2, 29, 0), 1).unwrap(), ts(2021, 2, 28, 0));

        // mid-month anchors are left alone
        let apr15 = ts(2020, 4, 15, 0);
        assert_eq!(Frequency::Monthly.advance(apr15, 1).unwrap(), ts(2020, 5, 15, 0));
    }

    #[test]
    fn test_from_gap() {
        assert_eq!(Frequency::from_gap(Duration::hours(1)).unwrap(), Frequency::Hourly);
        assert_eq!(Frequency::from_gap(Duration::minutes(15)).unwrap(), Frequency::Minutes(15));
        assert_eq!(Frequency::from_gap(Duration::seconds(4)).unwrap(), Frequency::Seconds(4));
        assert_eq!(Frequency::from_gap(Duration::days(30)).unwrap(), Frequency::Monthly);
        assert_eq!(Frequency::from_gap(Duration::days(91)).unwrap(), Frequency::Quarterly);
        assert_eq!(Frequency::from_gap(Duration::days(365)).unwrap(), Frequency::Yearly);
        assert!(Frequency::from_gap(Duration::zero()).is_err());
    }

    #[test]
    fn test_serde_uses_alias() {
        let json = serde_json::to_string(&Frequency::Minutes(10)).unwrap();
        assert_eq!(json, "\"10min\"");
        let freq: Frequency = serde_json::from_str("\"H\"").unwrap();
        assert_eq!(freq, Frequency::Hourly);
    }
}
