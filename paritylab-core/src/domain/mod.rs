//! Domain types for the signal engine

pub mod bar;
pub mod intent;
pub mod position;
pub mod timeframe;

pub use bar::{Bar, BarError, SequenceGuard};
pub use intent::{ClosedTrade, TradeAction, TradeIntent, TradeReason, TradeSide};
pub use position::{Direction, Position};
pub use timeframe::{Timeframe, TimeframeParseError};
