//! Signal generation: market-only inputs.
//!
//! Nothing in this module sees position state. Crossovers come from the entry
//! timeframe's EMA pair; the trend gate supplies the confirmation timeframe's bias.

pub mod crossover;
pub mod trend_gate;

pub use crossover::{detect_crossover, CrossoverResult};
pub use trend_gate::{TrendBias, TrendGate};
