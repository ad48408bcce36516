//! Firstboard CLI: replay recorded sessions and inspect the decision components.
//!
//! Commands:
//! - `replay`: run the strategy over recorded daily bars, ticks and candidates
//! - `screen`: screen one day's candidates at a given timestamp
//! - `resistance`: show pivot highs and the resistance level for a symbol
//! - `config`: validate a strategy TOML and print the effective config

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use firstboard_core::broker::PaperBroker;
use firstboard_core::components::CandidateScreener;
use firstboard_core::data::ingest::{load_candidates, load_daily_bars, load_ticks, parse_timestamp};
use firstboard_core::data::{CandidateSource, InMemoryFeed, WeekdayCalendar};
use firstboard_core::domain::DailyBar;
use firstboard_core::engine::{replay_sessions, ReplaySummary, StrategyScheduler};
use firstboard_core::indicators::ResistanceEstimator;
use firstboard_core::StrategyConfig;

#[derive(Parser)]
#[command(
    name = "firstboard",
    about = "Firstboard CLI: first-board limit-up strategy replay and inspection"
)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded sessions through the strategy with a paper broker.
    Replay {
        /// Strategy TOML. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Daily bars CSV: symbol,date,open,high,low,close,volume.
        #[arg(long)]
        daily: PathBuf,

        /// Intraday ticks CSV: symbol,timestamp,price.
        #[arg(long)]
        ticks: PathBuf,

        /// Candidates CSV: date,symbol.
        #[arg(long)]
        candidates: PathBuf,

        /// Starting cash for the paper broker.
        #[arg(long, default_value_t = 100_000.0)]
        cash: f64,

        /// Exchange holiday (YYYY-MM-DD). Repeatable.
        #[arg(long = "holiday")]
        holidays: Vec<NaiveDate>,

        /// Print the replay summary as JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Screen one day's candidates as of a timestamp.
    Screen {
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        daily: PathBuf,

        #[arg(long)]
        ticks: PathBuf,

        #[arg(long)]
        candidates: PathBuf,

        /// Evaluation time, "YYYY-MM-DD HH:MM[:SS]".
        #[arg(long, value_parser = parse_at)]
        at: NaiveDateTime,
    },
    /// Show pivot highs and the resistance level for one symbol.
    Resistance {
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        daily: PathBuf,

        #[arg(long)]
        symbol: String,

        /// Price the level must clear.
        #[arg(long)]
        price: f64,

        /// Only bars before this date are used. Defaults to the day after the last bar.
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Validate a strategy TOML and print the effective config.
    Config {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Commands::Replay {
            config,
            daily,
            ticks,
            candidates,
            cash,
            holidays,
            json,
        } => run_replay(
            config.as_deref(),
            &daily,
            &ticks,
            &candidates,
            cash,
            holidays,
            json,
        ),
        Commands::Screen {
            config,
            daily,
            ticks,
            candidates,
            at,
        } => run_screen(config.as_deref(), &daily, &ticks, &candidates, at),
        Commands::Resistance {
            config,
            daily,
            symbol,
            price,
            as_of,
        } => run_resistance(config.as_deref(), &daily, &symbol, price, as_of),
        Commands::Config { config } => run_config(config.as_deref()),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn parse_at(raw: &str) -> std::result::Result<NaiveDateTime, String> {
    parse_timestamp(raw).map_err(|e| e.to_string())
}

fn load_config(path: Option<&Path>) -> Result<StrategyConfig> {
    match path {
        Some(p) => StrategyConfig::from_file(p)
            .with_context(|| format!("loading strategy config {}", p.display())),
        None => Ok(StrategyConfig::default()),
    }
}

fn load_feed(config: &StrategyConfig, daily: &Path, ticks: Option<&Path>) -> Result<InMemoryFeed> {
    let mut feed = InMemoryFeed::new(config.limit_up_ratio);
    feed.add_daily_bars(read_daily(daily)?);

    if let Some(path) = ticks {
        let ticks =
            load_ticks(path).with_context(|| format!("reading ticks {}", path.display()))?;
        info!(ticks = ticks.len(), "ticks loaded");
        feed.add_ticks(ticks);
    }
    Ok(feed)
}

fn read_daily(path: &Path) -> Result<Vec<DailyBar>> {
    let bars =
        load_daily_bars(path).with_context(|| format!("reading daily bars {}", path.display()))?;
    info!(bars = bars.len(), "daily bars loaded");
    Ok(bars)
}

fn run_replay(
    config_path: Option<&Path>,
    daily: &Path,
    ticks: &Path,
    candidates_path: &Path,
    cash: f64,
    holidays: Vec<NaiveDate>,
    json: bool,
) -> Result<()> {
    if !(cash > 0.0) {
        bail!("--cash must be positive");
    }
    let config = load_config(config_path)?;
    let mut feed = load_feed(&config, daily, Some(ticks))?;
    let candidates = load_candidates(candidates_path)
        .with_context(|| format!("reading candidates {}", candidates_path.display()))?;
    let calendar = WeekdayCalendar::with_holidays(holidays);
    let mut broker = PaperBroker::new(cash);

    let scheduler = StrategyScheduler::new(config)?;
    let summary = replay_sessions(&scheduler, &mut feed, &calendar, &candidates, &mut broker);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary, cash);
    }
    Ok(())
}

fn run_screen(
    config_path: Option<&Path>,
    daily: &Path,
    ticks: &Path,
    candidates_path: &Path,
    at: NaiveDateTime,
) -> Result<()> {
    let config = load_config(config_path)?;
    let mut feed = load_feed(&config, daily, Some(ticks))?;
    feed.set_clock(at);

    let candidates = load_candidates(candidates_path)
        .with_context(|| format!("reading candidates {}", candidates_path.display()))?
        .candidates(at.date())?;
    let screener = CandidateScreener::new(config.screener.clone());
    let outcome = screener.screen(&candidates, &feed, &HashSet::new());

    println!();
    println!("=== Screen {} ===", at.format("%Y-%m-%d %H:%M"));
    println!("Candidates: {}", candidates.len());
    println!("Qualified:  {}", outcome.qualified.join(", "));
    println!();
    for (symbol, rejection) in &outcome.rejected {
        println!("  {symbol:<12} rejected: {rejection}");
    }
    for err in &outcome.errors {
        println!("  {:<12} error: {err}", err.symbol());
    }
    Ok(())
}

fn run_resistance(
    config_path: Option<&Path>,
    daily: &Path,
    symbol: &str,
    price: f64,
    as_of: Option<NaiveDate>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let estimator = ResistanceEstimator::new(config.resistance.clone());

    let bars: Vec<DailyBar> = read_daily(daily)?
        .into_iter()
        .filter(|b| b.symbol == symbol)
        .collect();
    let mut feed = InMemoryFeed::new(config.limit_up_ratio);
    feed.add_daily_bars(bars.iter().cloned());
    let Some(last) = bars.last() else {
        bail!("no daily bars for {symbol}");
    };
    let as_of = match as_of {
        Some(d) => d,
        None => last.date.succ_opt().context("date overflow")?,
    };
    feed.set_clock(as_of.and_time(NaiveTime::MIN));

    let history: Vec<_> = bars.into_iter().filter(|b| b.date < as_of).collect();
    let start = history.len().saturating_sub(config.resistance.lookback_bars);
    let window = &history[start..];
    let level = estimator.estimate(&feed, symbol, price)?;

    println!();
    println!("=== Resistance {symbol} as of {as_of} ===");
    println!("Bars used:  {}", window.len());
    println!("Pivot highs:");
    for p in estimator.pivot_highs(window) {
        println!(
            "  {}  high {:>10.2}  weight {:>14.0}",
            window[p.index].date, p.price, p.volume_weight
        );
    }
    match level {
        Some(l) => println!("Level:      {l:.2} (price {price:.2})"),
        None => println!("Level:      none above {:.2}", price * config.resistance.margin),
    }
    Ok(())
}

fn run_config(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    println!("# fingerprint {}", config.fingerprint());
    print!("{}", toml::to_string(&config)?);
    Ok(())
}

fn print_summary(summary: &ReplaySummary, starting_cash: f64) {
    println!();
    println!("=== Replay Result ===");
    let short = summary
        .config_fingerprint
        .get(..12)
        .unwrap_or(&summary.config_fingerprint);
    println!("Config:         {short}");
    println!("Sessions:       {}", summary.sessions.len());
    println!("Trades:         {}", summary.trade_count());
    println!("Starting cash:  {starting_cash:.2}");
    println!("Final cash:     {:.2}", summary.final_cash);
    println!();

    for session in &summary.sessions {
        println!(
            "--- {} --- candidates {} qualified [{}]",
            session.date,
            session.candidates,
            session.qualified.join(", ")
        );
        for t in &session.trades {
            let side = if t.quantity > 0 { "BUY " } else { "SELL" };
            let reason = t.reason.map(|r| r.to_string()).unwrap_or_default();
            println!(
                "  {} {side} {:<12} {:>8} @ {:>8.2}  {reason}",
                t.timestamp,
                t.symbol,
                t.quantity.unsigned_abs(),
                t.price
            );
        }
        for h in &session.report.holdings {
            let profit = h
                .profit_rate
                .map(|r| format!("{:+.2}%", r * 100.0))
                .unwrap_or_else(|| "n/a".into());
            println!(
                "  hold {:<12} {:>8} cost {:>8.2} profit {profit}",
                h.symbol, h.quantity, h.cost_basis
            );
        }
        for err in &session.errors {
            println!("  WARNING: {err}");
        }
    }

    if !summary.open_records.is_empty() {
        println!();
        println!("Open at end:");
        for rec in &summary.open_records {
            println!(
                "  {:<12} bought {} limit-up high {:.2}",
                rec.symbol, rec.buy_date, rec.limit_up_high
            );
        }
    }
    println!();
}
