//! ParityLab Runner: everything around the engine that talks to the world.
//!
//! This crate builds on `paritylab-core` to provide:
//! - CSV bar loading and canonicalization
//! - Bar feeds: historical replay and a channel-backed live stream
//! - Confirmation-bar resampling shared by both feeds
//! - Simulated execution with commission
//! - The session loop, run summary and metrics
//! - Trade-log CSV I/O and backtest/live parity comparison

pub mod data_loader;
pub mod execution;
pub mod feed;
pub mod metrics;
pub mod parity;
pub mod resample;
pub mod runner;
pub mod trade_log;

pub use data_loader::{canonicalize, load_bars_csv, CanonicalReport, LoadError};
pub use execution::{ExecutionError, Executor, Fill, SimulatedExecutor};
pub use feed::{BarFeed, FeedError, FeedStep, ReplayFeed, StreamFeed};
pub use parity::{compare_trade_logs, ParityReport};
pub use resample::Resampler;
pub use runner::{run_session, RunError, RunResult, RunSummary, SessionOptions};
pub use trade_log::{TradeLog, TradeLogError, TradeRecord};
