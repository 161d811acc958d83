//! Position state machine: FLAT → LONG/SHORT → FLAT.
//!
//! There is no direct LONG ↔ SHORT edge. A reversal is a close followed by a
//! separate open.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::{ClosedTrade, Direction, Position, TradeReason};
use crate::signals::CrossoverResult;

/// Operation requested in the wrong state. Always a caller ordering bug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("cannot open {requested}: a {current} position is already open")]
    AlreadyOpen {
        current: Direction,
        requested: Direction,
    },

    #[error("cannot close: no position is open")]
    NotOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    Flat,
    Long,
    Short,
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionStatus::Flat => f.write_str("FLAT"),
            PositionStatus::Long => f.write_str("LONG"),
            PositionStatus::Short => f.write_str("SHORT"),
        }
    }
}

/// Thresholds for the exit checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitRules {
    /// Loss fraction that triggers a stop (0.02 = 2%).
    pub stop_loss_pct: f64,
    /// Gain fraction that triggers a take-profit.
    pub take_profit_pct: f64,
    /// Close once more than this many bars have elapsed since entry.
    pub max_hold_bars: usize,
}

#[derive(Debug, Clone)]
pub struct PositionStateMachine {
    rules: ExitRules,
    quantity: f64,
    position: Option<Position>,
}

impl PositionStateMachine {
    pub fn new(rules: ExitRules, quantity: f64) -> Self {
        Self {
            rules,
            quantity,
            position: None,
        }
    }

    pub fn rules(&self) -> ExitRules {
        self.rules
    }

    pub fn status(&self) -> PositionStatus {
        match &self.position {
            None => PositionStatus::Flat,
            Some(p) if p.is_long() => PositionStatus::Long,
            Some(_) => PositionStatus::Short,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn open(
        &mut self,
        direction: Direction,
        price: f64,
        bar_index: usize,
        timestamp: DateTime<Utc>,
    ) -> Result<&Position, PositionError> {
        if let Some(current) = &self.position {
            return Err(PositionError::AlreadyOpen {
                current: current.direction,
                requested: direction,
            });
        }
        Ok(&*self.position.insert(Position {
            direction,
            entry_price: price,
            entry_bar_index: bar_index,
            entry_time: timestamp,
            quantity: self.quantity,
        }))
    }

    pub fn close(
        &mut self,
        price: f64,
        reason: TradeReason,
        bar_index: usize,
    ) -> Result<ClosedTrade, PositionError> {
        let position = self.position.take().ok_or(PositionError::NotOpen)?;
        let pnl_pct = position.unrealized_pnl_pct(price);
        Ok(ClosedTrade {
            direction: position.direction,
            entry_price: position.entry_price,
            entry_bar_index: position.entry_bar_index,
            entry_time: position.entry_time,
            exit_price: price,
            quantity: position.quantity,
            reason,
            pnl: pnl_pct * position.entry_price * position.quantity,
            pnl_pct,
            bars_held: position.bars_held(bar_index),
        })
    }

    /// First exit condition that holds, in precedence order:
    /// stop-loss, take-profit, timeout, signal-exit. Does not mutate state.
    pub fn exit_reason(
        &self,
        price: f64,
        bar_index: usize,
        crossover: CrossoverResult,
    ) -> Option<TradeReason> {
        let position = self.position.as_ref()?;
        let pnl_pct = position.unrealized_pnl_pct(price);

        if pnl_pct <= -self.rules.stop_loss_pct {
            return Some(TradeReason::StopLoss);
        }
        if pnl_pct >= self.rules.take_profit_pct {
            return Some(TradeReason::TakeProfit);
        }
        if position.bars_held(bar_index) > self.rules.max_hold_bars {
            return Some(TradeReason::Timeout);
        }
        if crossover.direction() == Some(position.direction.opposite()) {
            return Some(TradeReason::SignalExit);
        }
        None
    }

    pub fn reset(&mut self) {
        self.position = None;
    }
}
