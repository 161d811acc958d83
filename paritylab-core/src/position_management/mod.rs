/// Position management: one position at a time, explicit transitions.
///
/// **Key Design Principles:**
/// 1. Open and close are the only mutations; both fail loudly in the wrong state
/// 2. Exit checks are read-only queries with a fixed precedence
/// 3. The machine knows nothing about EMAs; crossovers arrive as plain values
pub mod state_machine;

pub use state_machine::{ExitRules, PositionError, PositionStateMachine, PositionStatus};
