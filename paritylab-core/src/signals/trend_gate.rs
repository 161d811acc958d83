//! Trend gate: directional bias from the confirmation timeframe.
//!
//! The gate only moves when a confirmation bar closes; between closes it keeps
//! reporting the bias computed at the last close.

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, Direction};
use crate::indicators::{EmaPair, EmaState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendBias {
    Bullish,
    Bearish,
    Neutral,
}

impl TrendBias {
    /// True when the bias allows opening a position in `direction`.
    pub fn permits(&self, direction: Direction) -> bool {
        matches!(
            (self, direction),
            (TrendBias::Bullish, Direction::Long) | (TrendBias::Bearish, Direction::Short)
        )
    }
}

#[derive(Debug, Clone)]
pub struct TrendGate {
    emas: EmaPair,
    bias: TrendBias,
    observed: usize,
}

impl TrendGate {
    pub fn new(fast_period: usize, slow_period: usize) -> Self {
        Self {
            emas: EmaPair::new(fast_period, slow_period),
            bias: TrendBias::Neutral,
            observed: 0,
        }
    }

    /// Apply a closed confirmation bar and recompute the bias.
    pub fn observe(&mut self, bar: &Bar) -> TrendBias {
        self.emas.update(bar.close);
        self.observed += 1;
        self.bias = match (self.emas.fast(), self.emas.slow()) {
            (Some(fast), Some(slow)) if fast.initialized && slow.initialized => {
                if fast.current > slow.current {
                    TrendBias::Bullish
                } else if fast.current < slow.current {
                    TrendBias::Bearish
                } else {
                    TrendBias::Neutral
                }
            }
            _ => TrendBias::Neutral,
        };
        self.bias
    }

    pub fn current_bias(&self) -> TrendBias {
        self.bias
    }

    pub fn is_initialized(&self) -> bool {
        self.emas.is_initialized()
    }

    /// Confirmation bars observed so far.
    pub fn observed(&self) -> usize {
        self.observed
    }

    pub fn fast(&self) -> Option<EmaState> {
        self.emas.fast()
    }

    pub fn slow(&self) -> Option<EmaState> {
        self.emas.slow()
    }

    pub fn reset(&mut self) {
        self.emas.reset();
        self.bias = TrendBias::Neutral;
        self.observed = 0;
    }
}
