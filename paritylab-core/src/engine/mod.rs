//! Signal engine: configuration, the per-bar evaluator, and its event journal.
//!
//! The evaluator consumes one entry-timeframe bar at a time (plus the
//! confirmation bar that closed with it, if any) and emits trade intents:
//!
//! 1. Entry EMAs advance, capturing `previous` before `current` moves
//! 2. The trend gate advances only on confirmation closes
//! 3. Exit phase, then entry phase, against the position state machine

pub mod config;
pub mod evaluator;
pub mod events;

pub use config::{ConfigError, EmaParams, EngineConfig};
pub use evaluator::{BarOutcome, EngineError, SignalEvaluator};
pub use events::{EngineEvent, EngineSnapshot};
