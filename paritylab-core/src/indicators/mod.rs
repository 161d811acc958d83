//! Incremental indicators.
//!
//! Indicators here are advanced one bar at a time rather than precomputed over
//! a whole series, so a replay and a live stream drive exactly the same code.

pub mod ema;

pub use ema::{EmaPair, EmaState, EmaTracker};

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
