//! ParityLab Core: a multi-timeframe EMA trend engine with execution parity.
//!
//! This crate contains the signal/state engine and nothing that talks to the
//! outside world:
//! - Domain types (bars, timeframes, positions, trade intents)
//! - Incremental EMA tracking with the previous value captured inside `update`
//! - Crossover detection and the confirmation-timeframe trend gate
//! - Position state machine with fixed exit precedence
//! - The per-bar signal evaluator and its structured event journal
//!
//! The same evaluator drives historical replay and live streaming; feeds,
//! execution and trade logs live in `paritylab-runner`.

pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod indicators;
pub mod position_management;
pub mod signals;

pub use engine::{BarOutcome, EngineConfig, EngineError, EngineEvent, SignalEvaluator};
