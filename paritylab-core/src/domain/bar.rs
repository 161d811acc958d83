//! Bar: the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Timeframe;

/// Reasons a bar is refused before it reaches any indicator state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("{field} is not finite ({value})")]
    NonFinitePrice { field: &'static str, value: f64 },

    #[error("{field} must be positive, got {value}")]
    NonPositivePrice { field: &'static str, value: f64 },

    #[error("volume must be finite and non-negative, got {0}")]
    InvalidVolume(f64),

    #[error("inconsistent range: open={open} high={high} low={low} close={close}")]
    InconsistentRange {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },

    #[error("timestamp {received} does not advance past {previous}")]
    NonIncreasingTimestamp {
        previous: DateTime<Utc>,
        received: DateTime<Utc>,
    },

    #[error("expected a {expected} bar, got a {received} bar")]
    TimeframeMismatch {
        expected: Timeframe,
        received: Timeframe,
    },
}

/// OHLCV bar for one symbol on one timeframe.
///
/// `timestamp` is the bar's open time; the bar is complete at [`Bar::close_time`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub timeframe: Timeframe,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        timeframe: Timeframe,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            timeframe,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// A flat bar where every price equals `close`.
    pub fn flat(timestamp: DateTime<Utc>, timeframe: Timeframe, close: f64) -> Self {
        Self::new(timestamp, timeframe, close, close, close, close, 0.0)
    }

    pub fn close_time(&self) -> DateTime<Utc> {
        self.timestamp + self.timeframe.duration()
    }

    /// Price sanity: finite, positive OHLC with high/low bracketing open and close.
    pub fn validate(&self) -> Result<(), BarError> {
        for (field, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ] {
            if !value.is_finite() {
                return Err(BarError::NonFinitePrice { field, value });
            }
            if value <= 0.0 {
                return Err(BarError::NonPositivePrice { field, value });
            }
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(BarError::InvalidVolume(self.volume));
        }
        if self.high < self.low
            || self.high < self.open.max(self.close)
            || self.low > self.open.min(self.close)
        {
            return Err(BarError::InconsistentRange {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }
        Ok(())
    }

    pub fn is_sane(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Per-timeframe admission check: right timeframe, sane prices, strictly
/// increasing timestamps.
///
/// Checking and committing are separate so a caller can validate several
/// bars before mutating anything.
#[derive(Debug, Clone)]
pub struct SequenceGuard {
    timeframe: Timeframe,
    last: Option<DateTime<Utc>>,
}

impl SequenceGuard {
    pub fn new(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            last: None,
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last
    }

    pub fn check(&self, bar: &Bar) -> Result<(), BarError> {
        if bar.timeframe != self.timeframe {
            return Err(BarError::TimeframeMismatch {
                expected: self.timeframe,
                received: bar.timeframe,
            });
        }
        bar.validate()?;
        if let Some(previous) = self.last {
            if bar.timestamp <= previous {
                return Err(BarError::NonIncreasingTimestamp {
                    previous,
                    received: bar.timestamp,
                });
            }
        }
        Ok(())
    }

    pub fn commit(&mut self, bar: &Bar) {
        self.last = Some(bar.timestamp);
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
