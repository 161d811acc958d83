//! Positions: trade direction and the open position it belongs to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn opposite(&self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// The single open position. Immutable once opened; only the state machine
/// creates or destroys it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub direction: Direction,
    pub entry_price: f64,
    /// Index of the entry-timeframe bar the position was opened on.
    pub entry_bar_index: usize,
    pub entry_time: DateTime<Utc>,
    pub quantity: f64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.direction == Direction::Long
    }

    pub fn is_short(&self) -> bool {
        self.direction == Direction::Short
    }

    pub fn bars_held(&self, current_bar_index: usize) -> usize {
        current_bar_index.saturating_sub(self.entry_bar_index)
    }

    /// Signed return relative to entry: positive means the position is in profit.
    pub fn unrealized_pnl_pct(&self, current_price: f64) -> f64 {
        match self.direction {
            Direction::Long => (current_price - self.entry_price) / self.entry_price,
            Direction::Short => (self.entry_price - current_price) / self.entry_price,
        }
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        self.unrealized_pnl_pct(current_price) * self.entry_price * self.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn position(direction: Direction) -> Position {
        Position {
            direction,
            entry_price: 100.0,
            entry_bar_index: 10,
            entry_time: Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap(),
            quantity: 2.0,
        }
    }

    #[test]
    fn long_pnl_follows_price() {
        let pos = position(Direction::Long);
        assert!((pos.unrealized_pnl_pct(110.0) - 0.10).abs() < 1e-12);
        assert!((pos.unrealized_pnl(110.0) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn short_pnl_is_mirrored() {
        let pos = position(Direction::Short);
        assert!((pos.unrealized_pnl_pct(90.0) - 0.10).abs() < 1e-12);
        assert!(pos.unrealized_pnl_pct(110.0) < 0.0);
    }

    #[test]
    fn bars_held_counts_from_entry() {
        let pos = position(Direction::Long);
        assert_eq!(pos.bars_held(10), 0);
        assert_eq!(pos.bars_held(107), 97);
        assert_eq!(pos.bars_held(3), 0);
    }

    #[test]
    fn direction_opposite() {
        assert_eq!(Direction::Long.opposite(), Direction::Short);
        assert_eq!(Direction::Short.opposite(), Direction::Long);
        assert_eq!(Direction::Long.to_string(), "LONG");
    }
}
