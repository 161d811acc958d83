//! Incremental Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * price[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (N + 1).
//! Seed: the first observed price, unsmoothed.
//! Warmup: the line is trusted once it has seen N prices.
//!
//! `previous` is rewritten inside `update` together with `current`, so it always
//! holds the value from immediately before the bar being applied.

use serde::{Deserialize, Serialize};

/// Snapshot of one EMA line after an update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmaState {
    pub current: f64,
    /// Value of `current` before the most recent update.
    pub previous: f64,
    /// Number of prices applied so far.
    pub samples: usize,
    pub initialized: bool,
}

/// One EMA line for one timeframe.
#[derive(Debug, Clone)]
pub struct EmaTracker {
    period: usize,
    alpha: f64,
    state: Option<EmaState>,
}

impl EmaTracker {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            alpha: 2.0 / (period as f64 + 1.0),
            state: None,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Apply one price and return `(previous, current)`.
    pub fn update(&mut self, price: f64) -> (f64, f64) {
        let next = match self.state {
            None => EmaState {
                current: price,
                previous: price,
                samples: 1,
                initialized: self.period <= 1,
            },
            Some(prev) => {
                let samples = prev.samples.saturating_add(1);
                EmaState {
                    current: self.alpha * price + (1.0 - self.alpha) * prev.current,
                    previous: prev.current,
                    samples,
                    initialized: samples >= self.period,
                }
            }
        };
        self.state = Some(next);
        (next.previous, next.current)
    }

    pub fn state(&self) -> Option<EmaState> {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some_and(|s| s.initialized)
    }

    pub fn reset(&mut self) {
        self.state = None;
    }
}

/// Fast/slow EMA lines advanced together on the same bar.
#[derive(Debug, Clone)]
pub struct EmaPair {
    fast: EmaTracker,
    slow: EmaTracker,
}

impl EmaPair {
    pub fn new(fast_period: usize, slow_period: usize) -> Self {
        Self {
            fast: EmaTracker::new(fast_period),
            slow: EmaTracker::new(slow_period),
        }
    }

    pub fn update(&mut self, price: f64) {
        self.fast.update(price);
        self.slow.update(price);
    }

    pub fn fast(&self) -> Option<EmaState> {
        self.fast.state()
    }

    pub fn slow(&self) -> Option<EmaState> {
        self.slow.state()
    }

    /// Both lines have completed warmup.
    pub fn is_initialized(&self) -> bool {
        self.fast.is_initialized() && self.slow.is_initialized()
    }

    pub fn reset(&mut self) {
        self.fast.reset();
        self.slow.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn first_price_seeds_directly() {
        let mut ema = EmaTracker::new(3);
        let (prev, cur) = ema.update(10.0);
        assert_approx(prev, 10.0, DEFAULT_EPSILON);
        assert_approx(cur, 10.0, DEFAULT_EPSILON);
        assert!(!ema.is_initialized());
    }

    #[test]
    fn ema_3_known_values() {
        // alpha = 0.5
        // 10 -> 10.0
        // 12 -> 0.5*12 + 0.5*10 = 11.0
        // 14 -> 0.5*14 + 0.5*11 = 12.5
        let mut ema = EmaTracker::new(3);
        ema.update(10.0);
        let (prev, cur) = ema.update(12.0);
        assert_approx(prev, 10.0, DEFAULT_EPSILON);
        assert_approx(cur, 11.0, DEFAULT_EPSILON);
        let (prev, cur) = ema.update(14.0);
        assert_approx(prev, 11.0, DEFAULT_EPSILON);
        assert_approx(cur, 12.5, DEFAULT_EPSILON);
    }

    #[test]
    fn previous_is_one_update_old() {
        let mut ema = EmaTracker::new(4);
        let mut last_current = None;
        for price in [5.0, 7.0, 3.0, 9.0, 11.0, 2.0] {
            let (prev, cur) = ema.update(price);
            if let Some(expected_prev) = last_current {
                assert_eq!(prev, expected_prev);
            }
            last_current = Some(cur);
        }
    }

    #[test]
    fn initializes_after_period_samples() {
        let mut ema = EmaTracker::new(20);
        for _ in 0..19 {
            ema.update(100.0);
        }
        assert!(!ema.is_initialized());
        assert_eq!(ema.state().unwrap().samples, 19);
        ema.update(100.0);
        assert!(ema.is_initialized());
    }

    #[test]
    fn period_1_tracks_price() {
        let mut ema = EmaTracker::new(1);
        for price in [100.0, 200.0, 300.0] {
            let (_, cur) = ema.update(price);
            assert_approx(cur, price, DEFAULT_EPSILON);
            assert!(ema.is_initialized());
        }
    }

    #[test]
    fn reset_clears_state() {
        let mut ema = EmaTracker::new(2);
        ema.update(1.0);
        ema.update(2.0);
        ema.reset();
        assert!(ema.state().is_none());
        assert!(!ema.is_initialized());
    }

    #[test]
    #[should_panic(expected = "EMA period must be >= 1")]
    fn zero_period_panics() {
        EmaTracker::new(0);
    }

    #[test]
    fn pair_initializes_with_slow_line() {
        let mut pair = EmaPair::new(2, 5);
        for _ in 0..4 {
            pair.update(50.0);
        }
        assert!(pair.fast().unwrap().initialized);
        assert!(!pair.is_initialized());
        pair.update(50.0);
        assert!(pair.is_initialized());
    }
}
