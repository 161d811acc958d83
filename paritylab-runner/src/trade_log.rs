//! Trade log: one CSV row per executed intent, shared by backtest and live.
//!
//! Columns: timestamp, symbol, side, entry_price, exit_price, quantity,
//! reason, pnl, pnl_pct, duration_bars. Entry rows leave the exit columns
//! empty. `pnl` is gross; commission is accounted in the run summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;
use tracing::info;

use paritylab_core::domain::{TradeIntent, TradeReason, TradeSide};

pub const TRADE_CSV_HEADERS: [&str; 10] = [
    "timestamp",
    "symbol",
    "side",
    "entry_price",
    "exit_price",
    "quantity",
    "reason",
    "pnl",
    "pnl_pct",
    "duration_bars",
];

#[derive(Debug, Error)]
pub enum TradeLogError {
    #[error("trade log {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("trade log {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub side: TradeSide,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub quantity: f64,
    pub reason: TradeReason,
    pub pnl: Option<f64>,
    pub pnl_pct: Option<f64>,
    pub duration_bars: Option<usize>,
}

impl TradeRecord {
    pub fn from_intent(symbol: &str, intent: &TradeIntent) -> Self {
        match &intent.closed {
            Some(closed) => Self {
                timestamp: intent.timestamp,
                symbol: symbol.to_string(),
                side: intent.side(),
                entry_price: closed.entry_price,
                exit_price: Some(closed.exit_price),
                quantity: closed.quantity,
                reason: closed.reason,
                pnl: Some(closed.pnl),
                pnl_pct: Some(closed.pnl_pct),
                duration_bars: Some(closed.bars_held),
            },
            None => Self {
                timestamp: intent.timestamp,
                symbol: symbol.to_string(),
                side: intent.side(),
                entry_price: intent.price,
                exit_price: None,
                quantity: intent.quantity,
                reason: intent.reason,
                pnl: None,
                pnl_pct: None,
                duration_bars: None,
            },
        }
    }

    /// True for rows that close a position.
    pub fn is_exit(&self) -> bool {
        self.reason.is_exit()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeLog {
    records: Vec<TradeRecord>,
}

impl From<Vec<TradeRecord>> for TradeLog {
    fn from(records: Vec<TradeRecord>) -> Self {
        Self { records }
    }
}

impl TradeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: TradeRecord) {
        self.records.push(record);
    }

    pub fn record_intent(&mut self, symbol: &str, intent: &TradeIntent) {
        self.records.push(TradeRecord::from_intent(symbol, intent));
    }

    pub fn records(&self) -> &[TradeRecord] {
        &self.records
    }

    /// Rows that closed a position.
    pub fn exits(&self) -> impl Iterator<Item = &TradeRecord> {
        self.records.iter().filter(|r| r.is_exit())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write CSV with a header row, even when there are no trades.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        wtr.write_record(TRADE_CSV_HEADERS)?;
        for record in &self.records {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn read_from<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut rdr = csv::Reader::from_reader(reader);
        let records = rdr
            .deserialize::<TradeRecord>()
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { records })
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), TradeLogError> {
        let name = path.display().to_string();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| TradeLogError::Io {
                path: name.clone(),
                source,
            })?;
        }
        let file = std::fs::File::create(path).map_err(|source| TradeLogError::Io {
            path: name.clone(),
            source,
        })?;
        self.write_to(file)
            .map_err(|source| TradeLogError::Csv { path: name, source })?;
        info!(path = %path.display(), rows = self.records.len(), "trade log written");
        Ok(())
    }

    pub fn read_csv(path: &Path) -> Result<Self, TradeLogError> {
        let name = path.display().to_string();
        let file = std::fs::File::open(path).map_err(|source| TradeLogError::Io {
            path: name.clone(),
            source,
        })?;
        Self::read_from(file).map_err(|source| TradeLogError::Csv { path: name, source })
    }
}
