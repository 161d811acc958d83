//! Trade-log parity: does a live run reproduce the backtest decisions?
//!
//! Rows are compared positionally. Parity holds when both logs have the same
//! number of rows and the side and reason sequences agree everywhere. Timing
//! drift is measured and reported but never breaks parity: a live fill can
//! land later than the bar that triggered it.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use crate::trade_log::TradeLog;

/// How many mismatches a report keeps.
pub const MAX_REPORTED_MISMATCHES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchField {
    Side,
    Reason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mismatch {
    pub index: usize,
    pub field: MismatchField,
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParityReport {
    pub left_count: usize,
    pub right_count: usize,
    pub count_match: bool,
    /// Rows compared: the shorter of the two logs.
    pub compared: usize,
    pub side_match_rate: f64,
    pub reason_match_rate: f64,
    /// Largest absolute timestamp difference between paired rows.
    pub max_drift_secs: i64,
    /// Paired rows whose drift exceeds the tolerance.
    pub drift_beyond_tolerance: usize,
    pub mismatches: Vec<Mismatch>,
}

impl ParityReport {
    pub fn is_parity(&self) -> bool {
        self.count_match && self.side_match_rate == 1.0 && self.reason_match_rate == 1.0
    }
}

/// Compare two trade logs row by row.
pub fn compare_trade_logs(left: &TradeLog, right: &TradeLog, tolerance: Duration) -> ParityReport {
    let (a, b) = (left.records(), right.records());
    let compared = a.len().min(b.len());

    let mut side_matches = 0usize;
    let mut reason_matches = 0usize;
    let mut max_drift = Duration::zero();
    let mut drift_beyond_tolerance = 0usize;
    let mut mismatches = Vec::new();

    for (index, (l, r)) in a.iter().zip(b).enumerate() {
        if l.side == r.side {
            side_matches += 1;
        } else {
            mismatches.push(Mismatch {
                index,
                field: MismatchField::Side,
                left: l.side.to_string(),
                right: r.side.to_string(),
            });
        }
        if l.reason == r.reason {
            reason_matches += 1;
        } else {
            mismatches.push(Mismatch {
                index,
                field: MismatchField::Reason,
                left: l.reason.to_string(),
                right: r.reason.to_string(),
            });
        }

        let drift = if l.timestamp >= r.timestamp {
            l.timestamp - r.timestamp
        } else {
            r.timestamp - l.timestamp
        };
        if drift > tolerance {
            drift_beyond_tolerance += 1;
        }
        max_drift = max_drift.max(drift);
    }
    mismatches.truncate(MAX_REPORTED_MISMATCHES);

    let rate = |matches: usize| {
        if compared == 0 {
            1.0
        } else {
            matches as f64 / compared as f64
        }
    };
    let report = ParityReport {
        left_count: a.len(),
        right_count: b.len(),
        count_match: a.len() == b.len(),
        compared,
        side_match_rate: rate(side_matches),
        reason_match_rate: rate(reason_matches),
        max_drift_secs: max_drift.num_seconds(),
        drift_beyond_tolerance,
        mismatches,
    };

    if report.is_parity() {
        info!(rows = compared, "trade logs in parity");
    } else {
        warn!(
            left = report.left_count,
            right = report.right_count,
            side_match_rate = report.side_match_rate,
            reason_match_rate = report.reason_match_rate,
            "trade logs diverge"
        );
    }
    if drift_beyond_tolerance > 0 {
        warn!(
            rows = drift_beyond_tolerance,
            max_drift_secs = report.max_drift_secs,
            "timestamp drift beyond tolerance"
        );
    }
    report
}

impl fmt::Display for ParityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "trades:      {} vs {} ({})",
            self.left_count,
            self.right_count,
            if self.count_match { "match" } else { "MISMATCH" }
        )?;
        writeln!(f, "sides:       {:.1}% of {}", self.side_match_rate * 100.0, self.compared)?;
        writeln!(f, "reasons:     {:.1}% of {}", self.reason_match_rate * 100.0, self.compared)?;
        writeln!(
            f,
            "drift:       max {}s, {} beyond tolerance",
            self.max_drift_secs, self.drift_beyond_tolerance
        )?;
        for m in &self.mismatches {
            writeln!(f, "  #{} {:?}: {} vs {}", m.index, m.field, m.left, m.right)?;
        }
        write!(f, "parity:      {}", if self.is_parity() { "OK" } else { "FAILED" })
    }
}
