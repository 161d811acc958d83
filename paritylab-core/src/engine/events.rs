//! Structured engine events and state snapshots.
//!
//! Events are appended in processing order while a bar is evaluated and handed
//! out through [`SignalEvaluator::drain_events`](super::SignalEvaluator::drain_events).
//! The journal is independent of any `tracing` subscriber.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Position, TradeIntent};
use crate::indicators::EmaState;
use crate::position_management::PositionStatus;
use crate::signals::{CrossoverResult, TrendBias};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// An entry bar passed validation. `confirmation` is set when a closed
    /// confirmation bar arrived with it.
    BarReceived {
        bar_index: usize,
        timestamp: DateTime<Utc>,
        close: f64,
        confirmation: bool,
    },
    TrendUpdated {
        bar_index: usize,
        timestamp: DateTime<Utc>,
        bias: TrendBias,
        previous: TrendBias,
    },
    SignalDetected {
        bar_index: usize,
        timestamp: DateTime<Utc>,
        crossover: CrossoverResult,
    },
    IntentEmitted {
        bar_index: usize,
        timestamp: DateTime<Utc>,
        intent: TradeIntent,
    },
    /// Both timeframes' EMA lines reported initialized for the first time.
    WarmupComplete {
        bar_index: usize,
        timestamp: DateTime<Utc>,
    },
}

impl EngineEvent {
    pub fn bar_index(&self) -> usize {
        match self {
            EngineEvent::BarReceived { bar_index, .. }
            | EngineEvent::TrendUpdated { bar_index, .. }
            | EngineEvent::SignalDetected { bar_index, .. }
            | EngineEvent::IntentEmitted { bar_index, .. }
            | EngineEvent::WarmupComplete { bar_index, .. } => *bar_index,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            EngineEvent::BarReceived { timestamp, .. }
            | EngineEvent::TrendUpdated { timestamp, .. }
            | EngineEvent::SignalDetected { timestamp, .. }
            | EngineEvent::IntentEmitted { timestamp, .. }
            | EngineEvent::WarmupComplete { timestamp, .. } => *timestamp,
        }
    }

    pub fn intent(&self) -> Option<&TradeIntent> {
        match self {
            EngineEvent::IntentEmitted { intent, .. } => Some(intent),
            _ => None,
        }
    }
}

/// Point-in-time view of everything the evaluator holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Index the next entry bar will receive.
    pub bar_index: usize,
    pub warm: bool,
    pub entry_fast: Option<EmaState>,
    pub entry_slow: Option<EmaState>,
    pub confirmation_fast: Option<EmaState>,
    pub confirmation_slow: Option<EmaState>,
    pub confirmation_bars: usize,
    pub bias: TrendBias,
    pub status: PositionStatus,
    pub position: Option<Position>,
    pub last_entry_timestamp: Option<DateTime<Utc>>,
    pub last_confirmation_timestamp: Option<DateTime<Utc>>,
}
