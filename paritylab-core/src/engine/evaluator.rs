//! Signal evaluator: the per-bar orchestrator.
//!
//! Every entry-timeframe bar runs the same fixed sequence:
//!
//! 1. Validate the entry bar and the optional confirmation bar (no mutation yet)
//! 2. Advance the entry EMA pair
//! 3. Advance the trend gate if a confirmation bar closed with this bar
//! 4. Compute the entry crossover
//! 5. Exit phase: close the open position if any exit condition holds
//! 6. Entry phase: open on a crossover that matches the bias, if flat
//! 7. Advance the bar counter
//!
//! Step 6 runs even when step 5 just closed a position, so a reversal shows up
//! as two intents on the same bar, close first.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, trace};

use super::config::{ConfigError, EngineConfig};
use super::events::{EngineEvent, EngineSnapshot};
use crate::domain::{Bar, BarError, SequenceGuard, TradeIntent};
use crate::indicators::EmaPair;
use crate::position_management::{PositionError, PositionStateMachine};
use crate::signals::{CrossoverResult, TrendBias, TrendGate};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("entry bar rejected: {0}")]
    EntryBar(BarError),

    #[error("confirmation bar rejected: {0}")]
    ConfirmationBar(BarError),

    #[error(
        "confirmation bar closing at {confirmation_close} arrived with an entry bar closing at {entry_close}"
    )]
    ConfirmationAhead {
        entry_close: DateTime<Utc>,
        confirmation_close: DateTime<Utc>,
    },

    #[error(transparent)]
    Position(#[from] PositionError),
}

/// What one entry bar produced.
#[derive(Debug, Clone, PartialEq)]
pub struct BarOutcome {
    pub bar_index: usize,
    pub crossover: CrossoverResult,
    /// Bias in force when the entry phase ran.
    pub bias: TrendBias,
    pub exit: Option<TradeIntent>,
    pub entry: Option<TradeIntent>,
}

impl BarOutcome {
    /// Intents in emission order: close before open.
    pub fn intents(&self) -> impl Iterator<Item = &TradeIntent> {
        self.exit.iter().chain(self.entry.iter())
    }

    pub fn into_intents(self) -> Vec<TradeIntent> {
        self.exit.into_iter().chain(self.entry).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.exit.is_none() && self.entry.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct SignalEvaluator {
    config: EngineConfig,
    entry_guard: SequenceGuard,
    confirmation_guard: SequenceGuard,
    entry_emas: EmaPair,
    trend: TrendGate,
    positions: PositionStateMachine,
    bar_index: usize,
    warm: bool,
    events: Vec<EngineEvent>,
}

impl SignalEvaluator {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            entry_guard: SequenceGuard::new(config.entry.timeframe),
            confirmation_guard: SequenceGuard::new(config.confirmation.timeframe),
            entry_emas: EmaPair::new(config.entry.fast_period, config.entry.slow_period),
            trend: TrendGate::new(
                config.confirmation.fast_period,
                config.confirmation.slow_period,
            ),
            positions: PositionStateMachine::new(config.exit_rules(), config.quantity),
            bar_index: 0,
            warm: false,
            events: Vec::new(),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Index the next entry bar will be evaluated under.
    pub fn bar_index(&self) -> usize {
        self.bar_index
    }

    /// Both timeframes have completed EMA warmup.
    pub fn is_warm(&self) -> bool {
        self.warm
    }

    pub fn positions(&self) -> &PositionStateMachine {
        &self.positions
    }

    pub fn trend_bias(&self) -> TrendBias {
        self.trend.current_bias()
    }

    /// Evaluate one entry-timeframe bar.
    ///
    /// `confirmation` is the confirmation-timeframe bar that closed together
    /// with (or before) `entry`, if any. On error nothing has changed.
    pub fn on_bar(
        &mut self,
        entry: &Bar,
        confirmation: Option<&Bar>,
    ) -> Result<BarOutcome, EngineError> {
        self.entry_guard.check(entry).map_err(EngineError::EntryBar)?;
        if let Some(confirmation) = confirmation {
            self.confirmation_guard
                .check(confirmation)
                .map_err(EngineError::ConfirmationBar)?;
            if confirmation.close_time() > entry.close_time() {
                return Err(EngineError::ConfirmationAhead {
                    entry_close: entry.close_time(),
                    confirmation_close: confirmation.close_time(),
                });
            }
        }

        let bar_index = self.bar_index;
        let timestamp = entry.timestamp;
        let span = tracing::debug_span!("bar", bar_index, ts = %timestamp);
        let _enter = span.enter();

        self.entry_guard.commit(entry);
        self.events.push(EngineEvent::BarReceived {
            bar_index,
            timestamp,
            close: entry.close,
            confirmation: confirmation.is_some(),
        });

        self.entry_emas.update(entry.close);
        trace!(
            close = entry.close,
            fast = ?self.entry_emas.fast().map(|s| s.current),
            slow = ?self.entry_emas.slow().map(|s| s.current),
            "entry emas updated"
        );

        if let Some(confirmation) = confirmation {
            self.confirmation_guard.commit(confirmation);
            let previous = self.trend.current_bias();
            let bias = self.trend.observe(confirmation);
            if bias != previous {
                debug!(?previous, ?bias, "trend bias changed");
            }
            self.events.push(EngineEvent::TrendUpdated {
                bar_index,
                timestamp,
                bias,
                previous,
            });
        }

        if !self.warm && self.entry_emas.is_initialized() && self.trend.is_initialized() {
            self.warm = true;
            debug!("warmup complete");
            self.events
                .push(EngineEvent::WarmupComplete { bar_index, timestamp });
        }

        let crossover = self.entry_emas.crossover();
        if crossover.is_cross() {
            debug!(?crossover, "crossover detected");
            self.events.push(EngineEvent::SignalDetected {
                bar_index,
                timestamp,
                crossover,
            });
        }

        let exit = self.exit_phase(entry, crossover)?;
        let bias = self.trend.current_bias();
        let entry_intent = self.entry_phase(entry, crossover, bias)?;

        self.bar_index += 1;
        Ok(BarOutcome {
            bar_index,
            crossover,
            bias,
            exit,
            entry: entry_intent,
        })
    }

    fn exit_phase(
        &mut self,
        bar: &Bar,
        crossover: CrossoverResult,
    ) -> Result<Option<TradeIntent>, EngineError> {
        let Some(reason) = self
            .positions
            .exit_reason(bar.close, self.bar_index, crossover)
        else {
            return Ok(None);
        };
        let closed = self.positions.close(bar.close, reason, self.bar_index)?;
        info!(
            direction = %closed.direction,
            %reason,
            price = bar.close,
            pnl_pct = closed.pnl_pct,
            bars_held = closed.bars_held,
            "close intent"
        );
        let intent = TradeIntent::close(closed, self.bar_index, bar.timestamp);
        self.record(&intent);
        Ok(Some(intent))
    }

    fn entry_phase(
        &mut self,
        bar: &Bar,
        crossover: CrossoverResult,
        bias: TrendBias,
    ) -> Result<Option<TradeIntent>, EngineError> {
        if !self.positions.is_flat() {
            return Ok(None);
        }
        let Some(direction) = crossover.direction() else {
            return Ok(None);
        };
        if !bias.permits(direction) {
            trace!(?crossover, ?bias, "crossover filtered by trend bias");
            return Ok(None);
        }
        let position = self
            .positions
            .open(direction, bar.close, self.bar_index, bar.timestamp)?;
        info!(%direction, price = bar.close, "open intent");
        let intent = TradeIntent::open(
            direction,
            position.entry_price,
            position.quantity,
            self.bar_index,
            bar.timestamp,
        );
        self.record(&intent);
        Ok(Some(intent))
    }

    fn record(&mut self, intent: &TradeIntent) {
        self.events.push(EngineEvent::IntentEmitted {
            bar_index: intent.bar_index,
            timestamp: intent.timestamp,
            intent: intent.clone(),
        });
    }

    /// Take every event recorded since the last drain.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            bar_index: self.bar_index,
            warm: self.warm,
            entry_fast: self.entry_emas.fast(),
            entry_slow: self.entry_emas.slow(),
            confirmation_fast: self.trend.fast(),
            confirmation_slow: self.trend.slow(),
            confirmation_bars: self.trend.observed(),
            bias: self.trend.current_bias(),
            status: self.positions.status(),
            position: self.positions.position().cloned(),
            last_entry_timestamp: self.entry_guard.last_timestamp(),
            last_confirmation_timestamp: self.confirmation_guard.last_timestamp(),
        }
    }

    /// Back to the freshly constructed state, same configuration.
    pub fn reset(&mut self) {
        self.entry_guard.reset();
        self.confirmation_guard.reset();
        self.entry_emas.reset();
        self.trend.reset();
        self.positions.reset();
        self.bar_index = 0;
        self.warm = false;
        self.events.clear();
    }
}
