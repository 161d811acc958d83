//! Execution: the outbound side of the engine.
//!
//! The engine treats every intent as filled immediately at its own price; an
//! executor reports what actually happened so the runner can account for it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use paritylab_core::domain::{TradeAction, TradeIntent, TradeReason, TradeSide};

/// Commission as a fraction of notional.
pub const DEFAULT_COMMISSION_RATE: f64 = 0.001;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("invalid fill price {0}")]
    InvalidPrice(f64),

    #[error("invalid order quantity {0}")]
    InvalidQuantity(f64),

    #[error("order rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub action: TradeAction,
    pub side: TradeSide,
    pub reason: TradeReason,
    pub price: f64,
    pub quantity: f64,
    pub commission: f64,
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
}

impl Fill {
    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }
}

pub trait Executor {
    fn execute(&mut self, intent: &TradeIntent) -> Result<Fill, ExecutionError>;
}

impl<E: Executor + ?Sized> Executor for Box<E> {
    fn execute(&mut self, intent: &TradeIntent) -> Result<Fill, ExecutionError> {
        (**self).execute(intent)
    }
}

/// Fills every intent at its price and charges a flat commission rate.
#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
    commission_rate: f64,
    fills: Vec<Fill>,
}

impl Default for SimulatedExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_COMMISSION_RATE)
    }
}

impl SimulatedExecutor {
    pub fn new(commission_rate: f64) -> Self {
        Self {
            commission_rate,
            fills: Vec::new(),
        }
    }

    pub fn commission_rate(&self) -> f64 {
        self.commission_rate
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn total_commission(&self) -> f64 {
        self.fills.iter().map(|f| f.commission).sum()
    }
}

impl Executor for SimulatedExecutor {
    fn execute(&mut self, intent: &TradeIntent) -> Result<Fill, ExecutionError> {
        if !(intent.price.is_finite() && intent.price > 0.0) {
            return Err(ExecutionError::InvalidPrice(intent.price));
        }
        if !(intent.quantity.is_finite() && intent.quantity > 0.0) {
            return Err(ExecutionError::InvalidQuantity(intent.quantity));
        }
        let fill = Fill {
            action: intent.action,
            side: intent.side(),
            reason: intent.reason,
            price: intent.price,
            quantity: intent.quantity,
            commission: intent.price * intent.quantity * self.commission_rate,
            bar_index: intent.bar_index,
            timestamp: intent.timestamp,
        };
        debug!(
            side = %fill.side,
            price = fill.price,
            quantity = fill.quantity,
            commission = fill.commission,
            "simulated fill"
        );
        self.fills.push(fill.clone());
        Ok(fill)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use paritylab_core::domain::Direction;

    fn intent(price: f64, quantity: f64) -> TradeIntent {
        let ts = Utc.with_ymd_and_hms(2024, 9, 2, 0, 0, 0).unwrap();
        TradeIntent::open(Direction::Short, price, quantity, 4, ts)
    }

    #[test]
    fn fills_at_intent_price_with_commission() {
        let mut exec = SimulatedExecutor::default();
        let fill = exec.execute(&intent(50_000.0, 0.001)).unwrap();
        assert_eq!(fill.price, 50_000.0);
        assert_eq!(fill.side, TradeSide::Sell);
        assert_eq!(fill.bar_index, 4);
        assert!((fill.commission - 0.05).abs() < 1e-12);
        assert!((fill.notional() - 50.0).abs() < 1e-9);
        assert_eq!(exec.fills().len(), 1);
        assert!((exec.total_commission() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn zero_commission_rate() {
        let mut exec = SimulatedExecutor::new(0.0);
        assert_eq!(exec.execute(&intent(10.0, 1.0)).unwrap().commission, 0.0);
    }

    #[test]
    fn rejects_nonsense_orders() {
        let mut exec = SimulatedExecutor::default();
        assert!(matches!(
            exec.execute(&intent(f64::NAN, 1.0)),
            Err(ExecutionError::InvalidPrice(_))
        ));
        assert_eq!(
            exec.execute(&intent(100.0, 0.0)),
            Err(ExecutionError::InvalidQuantity(0.0))
        );
        assert!(exec.fills().is_empty());
    }
}
