//! Crossover detection between a fast and a slow EMA line.
//!
//! - Bullish: previous fast <= previous slow AND current fast > current slow
//! - Bearish: previous fast >= previous slow AND current fast < current slow
//!
//! The non-strict comparison on the previous side classifies a move away from
//! equality as a cross.

use serde::{Deserialize, Serialize};

use crate::domain::Direction;
use crate::indicators::{EmaPair, EmaState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrossoverResult {
    None,
    Bullish,
    Bearish,
}

impl CrossoverResult {
    pub fn is_cross(&self) -> bool {
        !matches!(self, CrossoverResult::None)
    }

    /// Position direction this cross points to.
    pub fn direction(&self) -> Option<Direction> {
        match self {
            CrossoverResult::None => None,
            CrossoverResult::Bullish => Some(Direction::Long),
            CrossoverResult::Bearish => Some(Direction::Short),
        }
    }
}

/// Classify the transition captured in two already-updated EMA states.
///
/// Returns `None` unless both lines have completed warmup.
pub fn detect_crossover(fast: &EmaState, slow: &EmaState) -> CrossoverResult {
    if !(fast.initialized && slow.initialized) {
        return CrossoverResult::None;
    }
    if fast.previous <= slow.previous && fast.current > slow.current {
        CrossoverResult::Bullish
    } else if fast.previous >= slow.previous && fast.current < slow.current {
        CrossoverResult::Bearish
    } else {
        CrossoverResult::None
    }
}

impl EmaPair {
    /// Crossover for the bar most recently applied to this pair.
    pub fn crossover(&self) -> CrossoverResult {
        match (self.fast(), self.slow()) {
            (Some(fast), Some(slow)) => detect_crossover(&fast, &slow),
            _ => CrossoverResult::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(previous: f64, current: f64) -> EmaState {
        EmaState {
            current,
            previous,
            samples: 100,
            initialized: true,
        }
    }

    #[test]
    fn bullish_cross() {
        assert_eq!(
            detect_crossover(&line(9.0, 11.0), &line(10.0, 10.0)),
            CrossoverResult::Bullish
        );
    }

    #[test]
    fn bearish_cross() {
        assert_eq!(
            detect_crossover(&line(11.0, 9.0), &line(10.0, 10.0)),
            CrossoverResult::Bearish
        );
    }

    #[test]
    fn cross_from_equality_counts() {
        assert_eq!(
            detect_crossover(&line(10.0, 10.5), &line(10.0, 10.0)),
            CrossoverResult::Bullish
        );
        assert_eq!(
            detect_crossover(&line(10.0, 9.5), &line(10.0, 10.0)),
            CrossoverResult::Bearish
        );
    }

    #[test]
    fn touching_without_crossing_is_none() {
        // fast was above, now equal: not a bearish cross
        assert_eq!(
            detect_crossover(&line(11.0, 10.0), &line(10.0, 10.0)),
            CrossoverResult::None
        );
        // staying above
        assert_eq!(
            detect_crossover(&line(11.0, 12.0), &line(10.0, 10.0)),
            CrossoverResult::None
        );
    }

    #[test]
    fn uninitialized_lines_never_cross() {
        let mut fast = line(9.0, 11.0);
        fast.initialized = false;
        assert_eq!(
            detect_crossover(&fast, &line(10.0, 10.0)),
            CrossoverResult::None
        );
    }

    #[test]
    fn direction_mapping() {
        assert_eq!(CrossoverResult::Bullish.direction(), Some(Direction::Long));
        assert_eq!(CrossoverResult::Bearish.direction(), Some(Direction::Short));
        assert_eq!(CrossoverResult::None.direction(), None);
        assert!(!CrossoverResult::None.is_cross());
    }

    #[test]
    fn pair_without_updates_has_no_cross() {
        let pair = EmaPair::new(2, 3);
        assert_eq!(pair.crossover(), CrossoverResult::None);
    }
}
