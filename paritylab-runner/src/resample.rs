//! Confirmation bars built from entry bars.
//!
//! Buckets are aligned to the Unix epoch on the target timeframe. A bucket is
//! emitted on the entry bar whose close time reaches the bucket boundary:
//! open = first open, high = max, low = min, close = last close, volume = sum.
//!
//! When a gap skips a boundary the unfinished bucket is emitted as soon as a
//! bar from a later bucket arrives. If that same bar also completes its own
//! bucket, the newer bucket wins and the stale partial is dropped.
//!
//! A source bar that fails [`Bar::validate`] is left out of every bucket and
//! does not advance the ordering check; the engine rejects it on its own.

use chrono::{DateTime, Utc};
use tracing::{trace, warn};

use paritylab_core::domain::{Bar, Timeframe};

use crate::feed::FeedError;

#[derive(Debug, Clone)]
pub struct Resampler {
    source: Timeframe,
    target: Timeframe,
    bucket: Option<Bar>,
    last: Option<DateTime<Utc>>,
}

impl Resampler {
    pub fn new(source: Timeframe, target: Timeframe) -> Result<Self, FeedError> {
        match target.ratio_to(source) {
            Some(ratio) if ratio > 1 => Ok(Self {
                source,
                target,
                bucket: None,
                last: None,
            }),
            _ => Err(FeedError::IncompatibleTimeframes {
                finer: source,
                coarser: target,
            }),
        }
    }

    pub fn target(&self) -> Timeframe {
        self.target
    }

    /// The bucket being accumulated, if any.
    pub fn pending(&self) -> Option<&Bar> {
        self.bucket.as_ref()
    }

    /// Add one source bar; returns the target bar that closed with it.
    pub fn push(&mut self, bar: &Bar) -> Result<Option<Bar>, FeedError> {
        if bar.timeframe != self.source {
            return Err(FeedError::TimeframeMismatch {
                expected: self.source,
                received: bar.timeframe,
            });
        }
        if let Err(err) = bar.validate() {
            warn!(ts = %bar.timestamp, error = %err, "invalid bar left out of confirmation bucket");
            return Ok(None);
        }
        if let Some(previous) = self.last {
            if bar.timestamp <= previous {
                return Err(FeedError::OutOfOrder {
                    previous,
                    received: bar.timestamp,
                });
            }
        }
        self.last = Some(bar.timestamp);

        let start = self.target.bucket_start(bar.timestamp);
        let partial = if self.bucket.as_ref().is_some_and(|b| b.timestamp != start) {
            self.bucket.take()
        } else {
            None
        };

        let bucket = self.bucket.get_or_insert_with(|| Bar {
            timestamp: start,
            timeframe: self.target,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: 0.0,
        });
        bucket.high = bucket.high.max(bar.high);
        bucket.low = bucket.low.min(bar.low);
        bucket.close = bar.close;
        bucket.volume += bar.volume;

        if bar.close_time() >= bucket.close_time() {
            let complete = self.bucket.take();
            if let Some(stale) = partial {
                warn!(
                    bucket = %stale.timestamp,
                    "gap: unfinished confirmation bucket superseded by a complete one"
                );
            }
            trace!(target_tf = %self.target, ts = %start, "confirmation bar closed");
            return Ok(complete);
        }
        if let Some(stale) = &partial {
            warn!(bucket = %stale.timestamp, "gap: emitting unfinished confirmation bucket");
        }
        Ok(partial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 2, 0, 0, 0).unwrap()
    }

    fn m5(i: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar::new(
            start() + Duration::minutes(5 * i),
            Timeframe::M5,
            open,
            high,
            low,
            close,
            10.0,
        )
    }

    #[test]
    fn aggregates_ohlcv_on_boundary() {
        let mut r = Resampler::new(Timeframe::M5, Timeframe::M15).unwrap();
        assert!(r.push(&m5(0, 100.0, 102.0, 99.0, 101.0)).unwrap().is_none());
        assert!(r.push(&m5(1, 101.0, 105.0, 100.0, 104.0)).unwrap().is_none());
        let bar = r.push(&m5(2, 104.0, 104.5, 97.0, 98.0)).unwrap().unwrap();
        assert_eq!(bar.timestamp, start());
        assert_eq!(bar.timeframe, Timeframe::M15);
        assert_eq!((bar.open, bar.high, bar.low, bar.close), (100.0, 105.0, 97.0, 98.0));
        assert_eq!(bar.volume, 30.0);
        assert!(r.pending().is_none());
        assert!(bar.is_sane());
    }

    #[test]
    fn one_hour_from_fifteen_minutes_closes_every_fourth_bar() {
        let mut r = Resampler::new(Timeframe::M15, Timeframe::H1).unwrap();
        let closed: Vec<i64> = (0..12)
            .filter(|&i| {
                let bar = Bar::flat(start() + Duration::minutes(15 * i), Timeframe::M15, 100.0);
                r.push(&bar).unwrap().is_some()
            })
            .collect();
        assert_eq!(closed, vec![3, 7, 11]);
    }

    #[test]
    fn series_starting_mid_bucket_emits_partial_on_boundary() {
        let mut r = Resampler::new(Timeframe::M5, Timeframe::M15).unwrap();
        assert!(r.push(&m5(1, 1.0, 1.0, 1.0, 1.0)).unwrap().is_none());
        let bar = r.push(&m5(2, 2.0, 2.0, 2.0, 2.0)).unwrap().unwrap();
        assert_eq!((bar.open, bar.close, bar.volume), (1.0, 2.0, 20.0));
    }

    #[test]
    fn gap_emits_unfinished_bucket_when_next_begins() {
        let mut r = Resampler::new(Timeframe::M5, Timeframe::M15).unwrap();
        r.push(&m5(0, 1.0, 1.0, 1.0, 1.0)).unwrap();
        // Bars 1 and 2 missing; bar 3 opens the next bucket.
        let partial = r.push(&m5(3, 3.0, 3.0, 3.0, 3.0)).unwrap().unwrap();
        assert_eq!(partial.timestamp, start());
        assert_eq!(partial.close, 1.0);
        assert_eq!(r.pending().unwrap().close, 3.0);
    }

    #[test]
    fn gap_into_a_closing_bar_prefers_the_complete_bucket() {
        let mut r = Resampler::new(Timeframe::M5, Timeframe::M15).unwrap();
        r.push(&m5(0, 1.0, 1.0, 1.0, 1.0)).unwrap();
        let bar = r.push(&m5(5, 5.0, 5.0, 5.0, 5.0)).unwrap().unwrap();
        assert_eq!(bar.timestamp, start() + Duration::minutes(15));
        assert_eq!(bar.close, 5.0);
    }

    #[test]
    fn rejects_wrong_timeframe_and_disorder() {
        let mut r = Resampler::new(Timeframe::M5, Timeframe::M15).unwrap();
        let wrong = Bar::flat(start(), Timeframe::M15, 1.0);
        assert!(matches!(r.push(&wrong), Err(FeedError::TimeframeMismatch { .. })));
        r.push(&m5(1, 1.0, 1.0, 1.0, 1.0)).unwrap();
        assert!(matches!(
            r.push(&m5(1, 1.0, 1.0, 1.0, 1.0)),
            Err(FeedError::OutOfOrder { .. })
        ));
    }

    #[test]
    fn invalid_bar_mid_bucket_is_left_out() {
        let mut r = Resampler::new(Timeframe::M5, Timeframe::M15).unwrap();
        assert!(r.push(&m5(0, 100.0, 101.0, 99.0, 100.5)).unwrap().is_none());
        assert!(r.push(&m5(1, 100.0, 100.0, 0.0, 100.0)).unwrap().is_none());
        assert_eq!(r.pending().unwrap().low, 99.0);
        let bar = r.push(&m5(2, 100.5, 102.0, 100.0, 101.0)).unwrap().unwrap();
        assert_eq!((bar.open, bar.high, bar.low, bar.close), (100.0, 102.0, 99.0, 101.0));
        assert_eq!(bar.volume, 20.0);
        assert!(bar.validate().is_ok());
    }

    #[test]
    fn invalid_bar_does_not_advance_ordering() {
        let mut r = Resampler::new(Timeframe::M5, Timeframe::M15).unwrap();
        r.push(&m5(0, 1.0, 1.0, 1.0, 1.0)).unwrap();
        assert!(r.push(&m5(2, 1.0, 1.0, f64::NAN, 1.0)).unwrap().is_none());
        // Bar 1 still fits after the rejected bar 2.
        assert!(r.push(&m5(1, 1.0, 1.0, 1.0, 1.0)).unwrap().is_none());
        assert_eq!(r.pending().unwrap().volume, 20.0);
    }

    #[test]
    fn same_timeframe_is_not_resampling() {
        assert!(Resampler::new(Timeframe::M5, Timeframe::M5).is_err());
    }
}
