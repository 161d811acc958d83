//! Trade intents: what the engine wants done, not what was filled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    OpenLong,
    OpenShort,
    Close,
}

/// Why an intent was emitted. Exit reasons are listed in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeReason {
    StopLoss,
    TakeProfit,
    Timeout,
    SignalExit,
    SignalEntry,
}

impl TradeReason {
    pub fn is_exit(&self) -> bool {
        !matches!(self, TradeReason::SignalEntry)
    }
}

impl fmt::Display for TradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradeReason::StopLoss => "STOP_LOSS",
            TradeReason::TakeProfit => "TAKE_PROFIT",
            TradeReason::Timeout => "TIMEOUT",
            TradeReason::SignalExit => "SIGNAL_EXIT",
            TradeReason::SignalEntry => "SIGNAL_ENTRY",
        };
        f.write_str(s)
    }
}

/// Order side an execution venue sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => f.write_str("BUY"),
            TradeSide::Sell => f.write_str("SELL"),
        }
    }
}

/// Outcome of a position that has just been closed, valued at the exit price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub direction: Direction,
    pub entry_price: f64,
    pub entry_bar_index: usize,
    pub entry_time: DateTime<Utc>,
    pub exit_price: f64,
    pub quantity: f64,
    pub reason: TradeReason,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub bars_held: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeIntent {
    pub action: TradeAction,
    /// Direction of the position being opened or closed.
    pub direction: Direction,
    pub price: f64,
    pub quantity: f64,
    pub reason: TradeReason,
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    /// Present on close intents only.
    pub closed: Option<ClosedTrade>,
}

impl TradeIntent {
    pub fn open(
        direction: Direction,
        price: f64,
        quantity: f64,
        bar_index: usize,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let action = match direction {
            Direction::Long => TradeAction::OpenLong,
            Direction::Short => TradeAction::OpenShort,
        };
        Self {
            action,
            direction,
            price,
            quantity,
            reason: TradeReason::SignalEntry,
            bar_index,
            timestamp,
            closed: None,
        }
    }

    pub fn close(closed: ClosedTrade, bar_index: usize, timestamp: DateTime<Utc>) -> Self {
        Self {
            action: TradeAction::Close,
            direction: closed.direction,
            price: closed.exit_price,
            quantity: closed.quantity,
            reason: closed.reason,
            bar_index,
            timestamp,
            closed: Some(closed),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.action, TradeAction::OpenLong | TradeAction::OpenShort)
    }

    pub fn is_close(&self) -> bool {
        self.action == TradeAction::Close
    }

    pub fn side(&self) -> TradeSide {
        match (self.action, self.direction) {
            (TradeAction::Close, Direction::Long) => TradeSide::Sell,
            (TradeAction::Close, Direction::Short) => TradeSide::Buy,
            (_, Direction::Long) => TradeSide::Buy,
            (_, Direction::Short) => TradeSide::Sell,
        }
    }
}
