//! Bar loading and canonicalization for the runner.
//!
//! CSV input has the columns `timestamp,open,high,low,close,volume`, where
//! `timestamp` is the bar's open time as RFC 3339 or epoch milliseconds.
//! Loading is strict about syntax; [`canonicalize`] then applies the feed
//! policy the engine relies on:
//! 1. Sort by timestamp
//! 2. Keep the first bar of any duplicated timestamp
//! 3. Drop bars that fail price validation or sit off the timeframe grid
//!
//! Gaps are counted, not filled.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use paritylab_core::domain::{Bar, Timeframe};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read bars from {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("row {row}: unparseable timestamp '{value}' (expected RFC 3339 or epoch millis)")]
    Timestamp { row: usize, value: String },
}

#[derive(Debug, Deserialize)]
struct CsvBar {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

/// What [`canonicalize`] did to a raw series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalReport {
    pub input: usize,
    pub kept: usize,
    pub duplicates: usize,
    pub invalid: usize,
    pub misaligned: usize,
    /// Adjacent kept bars more than one timeframe apart.
    pub gaps: usize,
}

impl CanonicalReport {
    pub fn dropped(&self) -> usize {
        self.duplicates + self.invalid + self.misaligned
    }
}

/// Parse a CSV timestamp: RFC 3339 first, then integer epoch milliseconds.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    value
        .parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

/// Load raw bars from any CSV reader. Rows keep their file order.
pub fn read_bars<R: Read>(
    reader: R,
    timeframe: Timeframe,
    source_name: &str,
) -> Result<Vec<Bar>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars = Vec::new();
    for (i, row) in rdr.deserialize::<CsvBar>().enumerate() {
        let row = row.map_err(|source| LoadError::Csv {
            path: source_name.to_string(),
            source,
        })?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| LoadError::Timestamp {
            row: i + 1,
            value: row.timestamp.clone(),
        })?;
        bars.push(Bar::new(
            timestamp, timeframe, row.open, row.high, row.low, row.close, row.volume,
        ));
    }
    debug!(source = source_name, rows = bars.len(), %timeframe, "bars read");
    Ok(bars)
}

pub fn load_bars_csv(path: &Path, timeframe: Timeframe) -> Result<Vec<Bar>, LoadError> {
    let name = path.display().to_string();
    let file = std::fs::File::open(path).map_err(|e| LoadError::Csv {
        path: name.clone(),
        source: csv::Error::from(e),
    })?;
    read_bars(file, timeframe, &name)
}

/// Sort, dedupe and validate a raw series.
pub fn canonicalize(mut bars: Vec<Bar>) -> (Vec<Bar>, CanonicalReport) {
    let mut report = CanonicalReport {
        input: bars.len(),
        ..CanonicalReport::default()
    };
    // Stable sort: the first of two equal timestamps stays first.
    bars.sort_by_key(|b| b.timestamp);

    let mut kept: Vec<Bar> = Vec::with_capacity(bars.len());
    for bar in bars {
        if kept.last().is_some_and(|last| last.timestamp == bar.timestamp) {
            report.duplicates += 1;
            continue;
        }
        if let Err(e) = bar.validate() {
            warn!(ts = %bar.timestamp, error = %e, "dropping invalid bar");
            report.invalid += 1;
            continue;
        }
        if !bar.timeframe.is_boundary(bar.timestamp) {
            warn!(ts = %bar.timestamp, timeframe = %bar.timeframe, "dropping misaligned bar");
            report.misaligned += 1;
            continue;
        }
        if let Some(last) = kept.last() {
            if bar.timestamp - last.timestamp > bar.timeframe.duration() {
                report.gaps += 1;
            }
        }
        kept.push(bar);
    }
    report.kept = kept.len();
    if report.dropped() > 0 || report.gaps > 0 {
        warn!(
            duplicates = report.duplicates,
            invalid = report.invalid,
            misaligned = report.misaligned,
            gaps = report.gaps,
            "series canonicalized with changes"
        );
    }
    (kept, report)
}
