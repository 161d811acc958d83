//! Bar feeds: the inbound side of the engine.
//!
//! A feed yields one [`FeedStep`] per entry-timeframe bar, carrying the
//! confirmation bar that closed with it, if any. A confirmation bar is never
//! attached to an entry bar that closes before it does.
//!
//! - [`ReplayFeed`] walks stored history
//! - [`StreamFeed`] blocks on a channel the way a live poller hands bars over
//!
//! Both run confirmation bars through the same [`Resampler`] when they are
//! derived from entry bars, so a replay and a stream over the same history
//! produce identical steps. An invalid entry bar is still forwarded so the
//! engine can reject and count it, but it never reaches a confirmation bucket.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use paritylab_core::domain::{Bar, Timeframe};

use crate::resample::Resampler;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeedError {
    #[error("expected a {expected} bar, got a {received} bar")]
    TimeframeMismatch {
        expected: Timeframe,
        received: Timeframe,
    },

    #[error("bar at {received} arrived after {previous}")]
    OutOfOrder {
        previous: DateTime<Utc>,
        received: DateTime<Utc>,
    },

    #[error("cannot build {coarser} bars from {finer} bars")]
    IncompatibleTimeframes { finer: Timeframe, coarser: Timeframe },
}

/// One entry bar plus the confirmation bar that closed with it.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedStep {
    pub entry: Bar,
    pub confirmation: Option<Bar>,
}

pub trait BarFeed {
    /// Next step, or `None` once the feed is exhausted.
    fn next_step(&mut self) -> Result<Option<FeedStep>, FeedError>;
}

impl<F: BarFeed + ?Sized> BarFeed for Box<F> {
    fn next_step(&mut self) -> Result<Option<FeedStep>, FeedError> {
        (**self).next_step()
    }
}

// ─── Replay ─────────────────────────────────────────────────────────

#[derive(Debug)]
enum Confirmations {
    Series(VecDeque<Bar>),
    Resampled(Resampler),
}

/// Historical replay over an already canonicalized entry series.
#[derive(Debug)]
pub struct ReplayFeed {
    entry: VecDeque<Bar>,
    confirmations: Confirmations,
}

impl ReplayFeed {
    /// Replay with an explicit confirmation series.
    ///
    /// Each confirmation bar is attached to the first entry bar whose close
    /// time reaches its own close time. If an entry gap makes several due at
    /// once, the latest is attached and the rest are skipped.
    pub fn new(entry: Vec<Bar>, confirmation: Vec<Bar>) -> Self {
        Self {
            entry: entry.into(),
            confirmations: Confirmations::Series(confirmation.into()),
        }
    }

    /// Replay with confirmation bars resampled from the entry bars.
    pub fn from_entry_bars(entry: Vec<Bar>, confirmation: Timeframe) -> Result<Self, FeedError> {
        let source = match entry.first() {
            Some(bar) => bar.timeframe,
            None => {
                return Ok(Self {
                    entry: VecDeque::new(),
                    confirmations: Confirmations::Series(VecDeque::new()),
                })
            }
        };
        Ok(Self {
            entry: entry.into(),
            confirmations: Confirmations::Resampled(Resampler::new(source, confirmation)?),
        })
    }

    /// Entry bars not yet handed out.
    pub fn remaining(&self) -> usize {
        self.entry.len()
    }
}

impl BarFeed for ReplayFeed {
    fn next_step(&mut self) -> Result<Option<FeedStep>, FeedError> {
        let Some(entry) = self.entry.pop_front() else {
            return Ok(None);
        };
        let confirmation = match &mut self.confirmations {
            Confirmations::Resampled(resampler) => resampler.push(&entry)?,
            Confirmations::Series(queue) => {
                let mut due = None;
                let mut skipped = 0usize;
                while queue
                    .front()
                    .is_some_and(|c| c.close_time() <= entry.close_time())
                {
                    if due.is_some() {
                        skipped += 1;
                    }
                    due = queue.pop_front();
                }
                if skipped > 0 {
                    warn!(
                        ts = %entry.timestamp,
                        skipped,
                        "entry gap: several confirmation bars due at once, attaching the latest"
                    );
                }
                due
            }
        };
        Ok(Some(FeedStep {
            entry,
            confirmation,
        }))
    }
}

// ─── Stream ─────────────────────────────────────────────────────────

/// Live-style feed: entry bars arrive one at a time over a channel and the
/// call blocks until the next one does. Ends when every sender is dropped.
#[derive(Debug)]
pub struct StreamFeed {
    rx: Receiver<Bar>,
    resampler: Resampler,
    received: usize,
}

impl StreamFeed {
    pub fn new(
        rx: Receiver<Bar>,
        entry: Timeframe,
        confirmation: Timeframe,
    ) -> Result<Self, FeedError> {
        Ok(Self {
            rx,
            resampler: Resampler::new(entry, confirmation)?,
            received: 0,
        })
    }

    /// A connected sender and feed.
    pub fn channel(
        entry: Timeframe,
        confirmation: Timeframe,
    ) -> Result<(Sender<Bar>, Self), FeedError> {
        let (tx, rx) = mpsc::channel();
        Ok((tx, Self::new(rx, entry, confirmation)?))
    }

    pub fn received(&self) -> usize {
        self.received
    }
}

impl BarFeed for StreamFeed {
    fn next_step(&mut self) -> Result<Option<FeedStep>, FeedError> {
        let Ok(entry) = self.rx.recv() else {
            debug!(received = self.received, "stream closed");
            return Ok(None);
        };
        self.received += 1;
        let confirmation = self.resampler.push(&entry)?;
        Ok(Some(FeedStep {
            entry,
            confirmation,
        }))
    }
}
