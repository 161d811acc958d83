//! Bar timeframes: `"5m"`, `"1h"`, `"1d"`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MINUTES_PER_HOUR: u32 = 60;
const MINUTES_PER_DAY: u32 = 24 * MINUTES_PER_HOUR;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeframeParseError {
    #[error("empty timeframe")]
    Empty,

    #[error("unknown timeframe unit in '{0}' (expected m, h or d)")]
    UnknownUnit(String),

    #[error("invalid timeframe length in '{0}'")]
    InvalidLength(String),
}

/// Length of one bar, stored in whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timeframe {
    minutes: u32,
}

impl Timeframe {
    pub const M5: Timeframe = Timeframe { minutes: 5 };
    pub const M15: Timeframe = Timeframe { minutes: 15 };
    pub const H1: Timeframe = Timeframe { minutes: 60 };

    /// Returns `None` for a zero-length timeframe.
    pub fn from_minutes(minutes: u32) -> Option<Self> {
        (minutes > 0).then_some(Self { minutes })
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.minutes))
    }

    /// How many `finer` bars make up one bar of `self`, if `self` is a whole multiple.
    pub fn ratio_to(&self, finer: Timeframe) -> Option<u32> {
        (self.minutes % finer.minutes == 0).then(|| self.minutes / finer.minutes)
    }

    /// Start of the bucket containing `ts`, aligned to the Unix epoch.
    pub fn bucket_start(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let span = i64::from(self.minutes) * 60;
        let offset = ts.timestamp().rem_euclid(span);
        ts - Duration::seconds(offset) - Duration::nanoseconds(i64::from(ts.timestamp_subsec_nanos()))
    }

    /// True when `ts` lies exactly on a bucket boundary.
    pub fn is_boundary(&self, ts: DateTime<Utc>) -> bool {
        self.bucket_start(ts) == ts
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.minutes % MINUTES_PER_DAY == 0 {
            write!(f, "{}d", self.minutes / MINUTES_PER_DAY)
        } else if self.minutes % MINUTES_PER_HOUR == 0 {
            write!(f, "{}h", self.minutes / MINUTES_PER_HOUR)
        } else {
            write!(f, "{}m", self.minutes)
        }
    }
}

impl FromStr for Timeframe {
    type Err = TimeframeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let unit = s.chars().last().ok_or(TimeframeParseError::Empty)?;
        let multiplier = match unit {
            'm' => 1,
            'h' => MINUTES_PER_HOUR,
            'd' => MINUTES_PER_DAY,
            _ => return Err(TimeframeParseError::UnknownUnit(s.to_string())),
        };
        let length: u32 = s[..s.len() - 1]
            .parse()
            .map_err(|_| TimeframeParseError::InvalidLength(s.to_string()))?;
        length
            .checked_mul(multiplier)
            .and_then(Timeframe::from_minutes)
            .ok_or_else(|| TimeframeParseError::InvalidLength(s.to_string()))
    }
}

impl TryFrom<String> for Timeframe {
    type Error = TimeframeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_minutes_hours_days() {
        assert_eq!("15m".parse::<Timeframe>().unwrap().minutes(), 15);
        assert_eq!("1h".parse::<Timeframe>().unwrap().minutes(), 60);
        assert_eq!("4h".parse::<Timeframe>().unwrap().minutes(), 240);
        assert_eq!("1d".parse::<Timeframe>().unwrap().minutes(), 1440);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!("".parse::<Timeframe>(), Err(TimeframeParseError::Empty));
        assert!(matches!(
            "15s".parse::<Timeframe>(),
            Err(TimeframeParseError::UnknownUnit(_))
        ));
        assert!(matches!(
            "0m".parse::<Timeframe>(),
            Err(TimeframeParseError::InvalidLength(_))
        ));
        assert!(matches!(
            "xh".parse::<Timeframe>(),
            Err(TimeframeParseError::InvalidLength(_))
        ));
    }

    #[test]
    fn display_uses_largest_whole_unit() {
        assert_eq!(Timeframe::from_minutes(15).unwrap().to_string(), "15m");
        assert_eq!(Timeframe::from_minutes(120).unwrap().to_string(), "2h");
        assert_eq!(Timeframe::from_minutes(1440).unwrap().to_string(), "1d");
        assert_eq!(Timeframe::from_minutes(90).unwrap().to_string(), "90m");
    }

    #[test]
    fn ratio_requires_whole_multiple() {
        let m15 = Timeframe::from_minutes(15).unwrap();
        let h1 = Timeframe::from_minutes(60).unwrap();
        let m45 = Timeframe::from_minutes(45).unwrap();
        assert_eq!(h1.ratio_to(m15), Some(4));
        assert_eq!(h1.ratio_to(m45), None);
    }

    #[test]
    fn bucket_start_floors_to_boundary() {
        let h1 = Timeframe::from_minutes(60).unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 9, 1, 10, 45, 0).unwrap();
        assert_eq!(
            h1.bucket_start(ts),
            Utc.with_ymd_and_hms(2024, 9, 1, 10, 0, 0).unwrap()
        );
        assert!(!h1.is_boundary(ts));
        assert!(h1.is_boundary(Utc.with_ymd_and_hms(2024, 9, 1, 11, 0, 0).unwrap()));
    }

    #[test]
    fn serde_uses_string_form() {
        let tf: Timeframe = serde_json::from_str("\"4h\"").unwrap();
        assert_eq!(tf.minutes(), 240);
        assert_eq!(serde_json::to_string(&tf).unwrap(), "\"4h\"");
    }
}
