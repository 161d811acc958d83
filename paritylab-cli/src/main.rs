//! ParityLab CLI: backtest, live-path replay, and parity checks.
//!
//! Commands:
//! - `backtest`: replay CSV history through the engine and write a trade log
//! - `stream`: push the same history through a channel into the live feed
//! - `compare`: check two trade logs for execution parity
//! - `config`: print the effective configuration and its fingerprint
//!
//! Configuration comes from an optional TOML file, then environment variables
//! (a `.env` file in the working directory is loaded first).

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use paritylab_core::domain::{Bar, Timeframe};
use paritylab_core::engine::EngineConfig;
use paritylab_runner::data_loader::parse_timestamp;
use paritylab_runner::execution::DEFAULT_COMMISSION_RATE;
use paritylab_runner::{
    canonicalize, compare_trade_logs, load_bars_csv, run_session, BarFeed, ReplayFeed, RunResult,
    SessionOptions, SimulatedExecutor, StreamFeed, TradeLog,
};

#[derive(Parser)]
#[command(
    name = "paritylab",
    about = "ParityLab CLI: multi-timeframe EMA trend engine with execution parity"
)]
struct Cli {
    /// Log output format (stderr). Filter with RUST_LOG.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(clap::Args)]
struct SessionArgs {
    /// Entry-timeframe bars (timestamp,open,high,low,close,volume).
    #[arg(long)]
    entry: PathBuf,

    /// Path to a TOML engine config. Defaults apply when omitted.
    #[arg(long, env = "PARITYLAB_CONFIG")]
    config: Option<PathBuf>,

    /// Evaluate earlier bars for warmup only; execute from this RFC 3339 time.
    #[arg(long)]
    execute_from: Option<String>,

    /// Commission as a fraction of notional.
    #[arg(long, default_value_t = DEFAULT_COMMISSION_RATE)]
    commission: f64,

    /// Print the run summary as JSON instead of text.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay CSV history and write the resulting trade log.
    Backtest {
        #[command(flatten)]
        session: SessionArgs,

        /// Confirmation-timeframe bars. Resampled from entry bars when omitted.
        #[arg(long)]
        confirmation: Option<PathBuf>,

        /// Trade log output.
        #[arg(long, default_value = "results/backtest_trades.csv")]
        out: PathBuf,
    },
    /// Push CSV history bar by bar through the live feed path.
    Stream {
        #[command(flatten)]
        session: SessionArgs,

        /// Delay between bars, to mimic arrival pacing.
        #[arg(long, default_value_t = 0)]
        pace_ms: u64,

        /// Trade log output.
        #[arg(long, default_value = "results/live_trades.csv")]
        out: PathBuf,
    },
    /// Compare two trade logs; exits non-zero when parity fails.
    Compare {
        left: PathBuf,
        right: PathBuf,

        /// Timestamp drift allowed before a row is flagged.
        #[arg(long, default_value_t = 0)]
        tolerance_secs: i64,

        /// Print the report as JSON instead of text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the effective configuration (file + environment) and fingerprint.
    Config {
        #[arg(long, env = "PARITYLAB_CONFIG")]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Loaded before parsing so .env values reach clap's `env` args.
    let env_file = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(cli.log_format);
    if let Some(err) = env_file_problem(env_file) {
        warn!(error = %err, "ignoring malformed .env file");
    }

    match cli.command {
        Commands::Backtest {
            session,
            confirmation,
            out,
        } => run_backtest(&session, confirmation.as_deref(), &out),
        Commands::Stream {
            session,
            pace_ms,
            out,
        } => run_stream(&session, pace_ms, &out),
        Commands::Compare {
            left,
            right,
            tolerance_secs,
            json,
        } => run_compare(&left, &right, tolerance_secs, json),
        Commands::Config { config } => run_config(config.as_deref()),
    }
}

fn init_logging(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init(),
    }
}

/// A missing .env file is normal; anything else is worth a warning.
fn env_file_problem(loaded: dotenvy::Result<PathBuf>) -> Option<dotenvy::Error> {
    match loaded {
        Err(err) if !err.not_found() => Some(err),
        _ => None,
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let base = match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    base.with_env_overrides(|key| std::env::var(key).ok())
        .context("applying environment overrides")
}

fn load_series(path: &Path, timeframe: Timeframe) -> Result<Vec<Bar>> {
    let raw = load_bars_csv(path, timeframe)?;
    let (bars, report) = canonicalize(raw);
    info!(
        path = %path.display(),
        kept = report.kept,
        dropped = report.dropped(),
        gaps = report.gaps,
        "bars loaded"
    );
    Ok(bars)
}

fn session_options(args: &SessionArgs) -> Result<SessionOptions> {
    let mut options = SessionOptions::default();
    if let Some(raw) = &args.execute_from {
        let from: DateTime<Utc> = parse_timestamp(raw)
            .with_context(|| format!("--execute-from: unparseable timestamp '{raw}'"))?;
        options = options.execute_from(from);
    }
    Ok(options)
}

fn run_backtest(args: &SessionArgs, confirmation: Option<&Path>, out: &Path) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let entry = load_series(&args.entry, config.entry.timeframe)?;
    let mut feed = match confirmation {
        Some(path) => ReplayFeed::new(entry, load_series(path, config.confirmation.timeframe)?),
        None => ReplayFeed::from_entry_bars(entry, config.confirmation.timeframe)?,
    };
    finish(args, &config, &mut feed, out)
}

fn run_stream(args: &SessionArgs, pace_ms: u64, out: &Path) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let bars = load_series(&args.entry, config.entry.timeframe)?;
    let (tx, mut feed) = StreamFeed::channel(config.entry.timeframe, config.confirmation.timeframe)?;

    let producer = spawn_producer(tx, bars, pace_ms);
    let result = finish(args, &config, &mut feed, out);
    // Closing the receiver stops a paced producer when the session ended early.
    drop(feed);
    match producer.join() {
        Ok(sent) => debug!(sent, "bar producer finished"),
        Err(_) => warn!("bar producer thread panicked"),
    }
    result
}

/// Send `bars` down the channel, sleeping `pace_ms` between them. Stops as
/// soon as the receiving feed is gone; returns how many bars were sent.
fn spawn_producer(tx: Sender<Bar>, bars: Vec<Bar>, pace_ms: u64) -> JoinHandle<usize> {
    thread::spawn(move || {
        let mut sent = 0;
        for bar in bars {
            if tx.send(bar).is_err() {
                break;
            }
            sent += 1;
            if pace_ms > 0 {
                thread::sleep(std::time::Duration::from_millis(pace_ms));
            }
        }
        sent
    })
}

/// Run the session, write the trade log, print the summary.
fn finish<F: BarFeed>(
    args: &SessionArgs,
    config: &EngineConfig,
    feed: &mut F,
    out: &Path,
) -> Result<()> {
    let options = session_options(args)?;
    let mut executor = SimulatedExecutor::new(args.commission);
    let result = run_session(config, feed, &mut executor, &options)?;
    result.trades.write_csv(out)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result.summary)?);
    } else {
        print_summary(&result);
    }
    println!("Trade log written to: {}", out.display());
    Ok(())
}

fn print_summary(result: &RunResult) {
    let s = &result.summary;
    println!("Symbol:        {}", s.symbol);
    println!("Config:        {}", s.fingerprint.short());
    println!("Bars:          {} ({} rejected)", s.bars, s.rejected_bars);
    if s.dropped_confirmations > 0 {
        println!("Confirmation:  {} bars dropped", s.dropped_confirmations);
    }
    println!("Intents:       {} ({} before execute-from)", s.intents, s.suppressed_intents);
    println!("Round trips:   {}", s.round_trips);
    println!("Win rate:      {:.1}% ({} wins)", s.win_rate * 100.0, s.wins);
    println!("Gross PnL:     {:.4}", s.gross_pnl);
    println!("Commission:    {:.4}", s.commission);
    println!("Net PnL:       {:.4}", s.total_pnl);
    println!("Profit factor: {:.2}", s.profit_factor);
    println!("Max drawdown:  {:.4}", s.max_drawdown);
    if s.open_at_end {
        println!("Position still open at end of data");
    }
}

fn run_compare(left: &Path, right: &Path, tolerance_secs: i64, json: bool) -> Result<()> {
    if tolerance_secs < 0 {
        bail!("--tolerance-secs must be non-negative");
    }
    let a = TradeLog::read_csv(left)?;
    let b = TradeLog::read_csv(right)?;
    let report = compare_trade_logs(&a, &b, Duration::seconds(tolerance_secs));

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    if !report.is_parity() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_config(path: Option<&Path>) -> Result<()> {
    let config = load_config(path)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    println!("fingerprint: {}", config.fingerprint());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io;
    use std::sync::mpsc;
    use std::time::Instant;

    fn bars(n: i64) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 9, 2, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| Bar::flat(start + Duration::minutes(5 * i), Timeframe::M5, 100.0))
            .collect()
    }

    #[test]
    fn producer_stops_once_the_receiver_is_dropped() {
        let (tx, rx) = mpsc::channel();
        let began = Instant::now();
        let producer = spawn_producer(tx, bars(1_000), 20);
        assert!(rx.recv().is_ok());
        drop(rx);
        let sent = producer.join().unwrap();
        assert!(sent < 1_000);
        assert!(began.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn unpaced_producer_sends_everything() {
        let (tx, rx) = mpsc::channel();
        assert_eq!(spawn_producer(tx, bars(12), 0).join().unwrap(), 12);
        assert_eq!(rx.iter().count(), 12);
    }

    #[test]
    fn missing_env_file_is_quiet_but_malformed_one_is_not() {
        let missing = dotenvy::Error::Io(io::Error::from(io::ErrorKind::NotFound));
        assert!(env_file_problem(Err(missing)).is_none());
        assert!(env_file_problem(Ok(PathBuf::from(".env"))).is_none());
        let malformed = dotenvy::Error::LineParse("KEY VALUE".to_string(), 4);
        assert!(env_file_problem(Err(malformed)).is_some());
    }
}
