//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Determinism: two fresh engines over the same bars emit the same intents
//! 2. Single position: opens only while flat, closes only while open
//! 3. Exit before entry: a bar with two intents is always close, then open
//! 4. Warmup suppression: nothing is emitted before both timeframes are warm
//! 5. Crossover symmetry: swapping fast and slow mirrors the result
//! 6. EMA previous: `previous` always equals the `current` before the update

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use paritylab_core::domain::{Bar, Timeframe, TradeIntent};
use paritylab_core::engine::{BarOutcome, EngineConfig, EngineEvent, SignalEvaluator};
use paritylab_core::indicators::{EmaState, EmaTracker};
use paritylab_core::signals::{detect_crossover, CrossoverResult};

// ── Strategies (proptest) ────────────────────────────────────────────

/// Random-walk closes: multiplicative steps of up to ±3%.
fn arb_path() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.03..0.03_f64, 30..300).prop_map(|steps| {
        let mut price = 100.0;
        steps
            .into_iter()
            .map(|r| {
                price *= 1.0 + r;
                price
            })
            .collect()
    })
}

fn arb_periods() -> impl Strategy<Value = (usize, usize, usize, usize)> {
    (1..6usize, 1..6usize, 1..4usize, 1..5usize)
        .prop_map(|(ef, ed, cf, cd)| (ef, ef + ed, cf, cf + cd))
}

fn arb_line() -> impl Strategy<Value = EmaState> {
    (50.0..150.0_f64, 50.0..150.0_f64).prop_map(|(previous, current)| EmaState {
        current,
        previous,
        samples: 10,
        initialized: true,
    })
}

// ── Helpers ──────────────────────────────────────────────────────────

fn make_config((ef, es, cf, cs): (usize, usize, usize, usize)) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.entry.fast_period = ef;
    config.entry.slow_period = es;
    config.confirmation.fast_period = cf;
    config.confirmation.slow_period = cs;
    config
}

/// Run a path of 5m closes with 15m confirmation bars aggregated from them.
fn run(config: EngineConfig, closes: &[f64]) -> (Vec<BarOutcome>, Vec<EngineEvent>) {
    let start = Utc.with_ymd_and_hms(2024, 9, 2, 0, 0, 0).unwrap();
    let mut engine = SignalEvaluator::new(config).unwrap();
    let mut outcomes = Vec::with_capacity(closes.len());
    for (i, &close) in closes.iter().enumerate() {
        let entry = Bar::flat(start + Duration::minutes(5 * i as i64), Timeframe::M5, close);
        let confirmation = ((i + 1) % 3 == 0).then(|| {
            let bucket = &closes[i - 2..=i];
            Bar::new(
                start + Duration::minutes(5 * (i as i64 - 2)),
                Timeframe::M15,
                bucket[0],
                bucket.iter().cloned().fold(f64::MIN, f64::max),
                bucket.iter().cloned().fold(f64::MAX, f64::min),
                bucket[2],
                0.0,
            )
        });
        outcomes.push(engine.on_bar(&entry, confirmation.as_ref()).unwrap());
    }
    (outcomes, engine.drain_events())
}

fn intents(outcomes: &[BarOutcome]) -> Vec<TradeIntent> {
    outcomes.iter().flat_map(|o| o.intents().cloned()).collect()
}

// ── 1. Determinism ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn same_bars_same_intents(path in arb_path(), periods in arb_periods()) {
        let (a, events_a) = run(make_config(periods), &path);
        let (b, events_b) = run(make_config(periods), &path);
        prop_assert_eq!(intents(&a), intents(&b));
        prop_assert_eq!(events_a, events_b);
    }
}

// ── 2. Single Position ───────────────────────────────────────────────

proptest! {
    #[test]
    fn at_most_one_position(path in arb_path(), periods in arb_periods()) {
        let (outcomes, _) = run(make_config(periods), &path);
        let mut open = false;
        for intent in intents(&outcomes) {
            if intent.is_open() {
                prop_assert!(!open, "open intent while a position is open");
                open = true;
            } else {
                prop_assert!(open, "close intent while flat");
                open = false;
            }
        }
    }
}

// ── 3. Exit Before Entry ─────────────────────────────────────────────

proptest! {
    #[test]
    fn close_precedes_open_on_the_same_bar(path in arb_path(), periods in arb_periods()) {
        let (outcomes, events) = run(make_config(periods), &path);
        for outcome in &outcomes {
            if let Some(close) = &outcome.exit {
                prop_assert!(close.is_close());
                prop_assert!(close.reason.is_exit());
            }
            if let Some(open) = &outcome.entry {
                prop_assert!(open.is_open());
            }
            if let (Some(close), Some(open)) = (&outcome.exit, &outcome.entry) {
                prop_assert_eq!(close.bar_index, open.bar_index);
            }
        }

        // The journal keeps the same order.
        let journal: Vec<&TradeIntent> = events.iter().filter_map(EngineEvent::intent).collect();
        let emitted = intents(&outcomes);
        prop_assert_eq!(journal.len(), emitted.len());
        for (a, b) in journal.iter().zip(&emitted) {
            prop_assert_eq!(*a, b);
        }
    }
}

// ── 4. Warmup Suppression ────────────────────────────────────────────

proptest! {
    #[test]
    fn nothing_before_warmup(path in arb_path(), periods in arb_periods()) {
        let (outcomes, events) = run(make_config(periods), &path);
        let warm_at = events.iter().find_map(|e| match e {
            EngineEvent::WarmupComplete { bar_index, .. } => Some(*bar_index),
            _ => None,
        });
        for intent in intents(&outcomes) {
            let warm_at = warm_at.expect("intent emitted without warmup");
            prop_assert!(intent.bar_index >= warm_at);
        }
    }
}

// ── 5. Crossover Symmetry ────────────────────────────────────────────

proptest! {
    #[test]
    fn crossover_mirrors_when_lines_swap(fast in arb_line(), slow in arb_line()) {
        let forward = detect_crossover(&fast, &slow);
        let mirrored = detect_crossover(&slow, &fast);
        match forward {
            CrossoverResult::Bullish => prop_assert_eq!(mirrored, CrossoverResult::Bearish),
            CrossoverResult::Bearish => prop_assert_eq!(mirrored, CrossoverResult::Bullish),
            CrossoverResult::None => {
                prop_assert!(!(fast.previous <= slow.previous && fast.current > slow.current));
                prop_assert!(!(fast.previous >= slow.previous && fast.current < slow.current));
            }
        }
    }
}

// ── 6. EMA Previous ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn previous_is_value_before_update(path in arb_path(), period in 1..30usize) {
        let mut ema = EmaTracker::new(period);
        let mut before: Option<f64> = None;
        for (i, &price) in path.iter().enumerate() {
            let (previous, current) = ema.update(price);
            match before {
                None => prop_assert_eq!(previous, price),
                Some(b) => prop_assert_eq!(previous, b),
            }
            prop_assert_eq!(ema.is_initialized(), i + 1 >= period);
            before = Some(current);
        }
    }
}
