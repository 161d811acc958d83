//! Session runner: wires a feed, the evaluator, and an executor together.
//!
//! `run_session()` is the single loop used by backtest and live alike: pull a
//! step from the feed, evaluate it, hand every intent to the executor, record
//! the trade. The only difference between drivers is the [`BarFeed`] passed in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, info_span, warn};

use paritylab_core::engine::{
    ConfigError, EngineConfig, EngineError, EngineEvent, EngineSnapshot, SignalEvaluator,
};
use paritylab_core::fingerprint::ConfigFingerprint;

use crate::execution::{ExecutionError, Executor, Fill};
use crate::feed::{BarFeed, FeedError};
use crate::metrics;
use crate::trade_log::TradeLog;

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),
}

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Intents on entry bars opening before this instant are evaluated but
    /// neither executed nor logged. Used to rebuild state after a restart.
    pub execute_from: Option<DateTime<Utc>>,
    /// Keep the engine event journal in the result.
    pub collect_events: bool,
}

impl SessionOptions {
    pub fn execute_from(mut self, from: DateTime<Utc>) -> Self {
        self.execute_from = Some(from);
        self
    }

    pub fn with_events(mut self) -> Self {
        self.collect_events = true;
        self
    }

    fn executes(&self, timestamp: DateTime<Utc>) -> bool {
        self.execute_from.map_or(true, |from| timestamp >= from)
    }
}

/// Aggregate outcome of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub symbol: String,
    pub fingerprint: ConfigFingerprint,
    pub bars: usize,
    /// Entry bars the engine refused (bad prices, timestamp disorder).
    pub rejected_bars: usize,
    /// Confirmation bars the engine refused; their entry bars were still
    /// evaluated.
    pub dropped_confirmations: usize,
    pub intents: usize,
    /// Intents evaluated before `execute_from`.
    pub suppressed_intents: usize,
    pub round_trips: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub gross_pnl: f64,
    pub commission: f64,
    /// Realized pnl of closed round trips after commission.
    pub total_pnl: f64,
    pub profit_factor: f64,
    pub max_drawdown: f64,
    /// A position was still open when the feed ended.
    pub open_at_end: bool,
}

#[derive(Debug, Clone)]
pub struct RunResult {
    pub summary: RunSummary,
    pub trades: TradeLog,
    pub fills: Vec<Fill>,
    /// Empty unless [`SessionOptions::collect_events`] is set.
    pub events: Vec<EngineEvent>,
    /// Engine state after the last step.
    pub snapshot: EngineSnapshot,
}

/// Drive `feed` to exhaustion through a fresh evaluator.
///
/// An entry bar the engine rejects is skipped and counted; engine state is
/// untouched by it. A rejected confirmation bar is dropped and its entry bar
/// evaluated alone. Feed, execution, and position errors end the session.
pub fn run_session<F, E>(
    config: &EngineConfig,
    feed: &mut F,
    executor: &mut E,
    options: &SessionOptions,
) -> Result<RunResult, RunError>
where
    F: BarFeed + ?Sized,
    E: Executor + ?Sized,
{
    let mut evaluator = SignalEvaluator::new(config.clone())?;
    let fingerprint = config.fingerprint();
    let span = info_span!("session", symbol = %config.symbol, config = %fingerprint.short());
    let _enter = span.enter();
    info!(
        entry = %config.entry.timeframe,
        confirmation = %config.confirmation.timeframe,
        execute_from = ?options.execute_from,
        "session started"
    );

    let mut trades = TradeLog::new();
    let mut fills = Vec::new();
    let mut events = Vec::new();
    let mut bars = 0usize;
    let mut rejected_bars = 0usize;
    let mut dropped_confirmations = 0usize;
    let mut intents = 0usize;
    let mut suppressed_intents = 0usize;
    let mut gross = Vec::new();
    let mut net = Vec::new();
    let mut open_commission = 0.0;

    while let Some(step) = feed.next_step()? {
        let evaluated = match evaluator.on_bar(&step.entry, step.confirmation.as_ref()) {
            Err(err @ (EngineError::ConfirmationBar(_) | EngineError::ConfirmationAhead { .. })) => {
                // The entry bar is fine; evaluate it without the confirmation bar.
                warn!(ts = %step.entry.timestamp, error = %err, "confirmation bar dropped");
                dropped_confirmations += 1;
                evaluator.on_bar(&step.entry, None)
            }
            evaluated => evaluated,
        };
        let outcome = match evaluated {
            Ok(outcome) => outcome,
            Err(err @ EngineError::EntryBar(_)) => {
                warn!(ts = %step.entry.timestamp, error = %err, "bar skipped");
                rejected_bars += 1;
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        bars += 1;

        let drained = evaluator.drain_events();
        if options.collect_events {
            events.extend(drained);
        }

        for intent in outcome.into_intents() {
            intents += 1;
            if !options.executes(intent.timestamp) {
                debug!(bar_index = intent.bar_index, reason = %intent.reason, "intent before execute_from");
                suppressed_intents += 1;
                continue;
            }
            let fill = executor.execute(&intent)?;
            match &intent.closed {
                Some(closed) => {
                    gross.push(closed.pnl);
                    net.push(closed.pnl - open_commission - fill.commission);
                    open_commission = 0.0;
                }
                None => open_commission = fill.commission,
            }
            trades.record_intent(&config.symbol, &intent);
            fills.push(fill);
        }
    }

    let snapshot = evaluator.snapshot();
    let summary = RunSummary {
        symbol: config.symbol.clone(),
        fingerprint,
        bars,
        rejected_bars,
        dropped_confirmations,
        intents,
        suppressed_intents,
        round_trips: net.len(),
        wins: net.iter().filter(|&&p| p > 0.0).count(),
        win_rate: metrics::win_rate(&net),
        gross_pnl: gross.iter().sum(),
        commission: fills.iter().map(|f: &Fill| f.commission).sum(),
        total_pnl: net.iter().sum(),
        profit_factor: metrics::profit_factor(&net),
        max_drawdown: metrics::max_drawdown(&net),
        open_at_end: !evaluator.positions().is_flat(),
    };
    info!(
        bars = summary.bars,
        round_trips = summary.round_trips,
        total_pnl = summary.total_pnl,
        "session finished"
    );

    Ok(RunResult {
        summary,
        trades,
        fills,
        events,
        snapshot,
    })
}
