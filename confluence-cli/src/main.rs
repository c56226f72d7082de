//! Confluence CLI: analyze, scan, run, replay and signals commands.
//!
//! Commands:
//! - `analyze`: evaluate one CSV candle series and print the analysis
//! - `scan`: run a single scan cycle from a TOML config
//! - `run`: run the periodic scan loop
//! - `replay`: replay the watchlist over stored history
//! - `signals`: list stored signals

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use confluence_core::domain::System;
use confluence_core::engine::{Analysis, ConfluenceEngine, EngineParams};
use confluence_runner::replay::{replay, ReplaySettings};
use confluence_runner::source::read_csv;
use confluence_runner::{
    format_alert, IntervalTicker, JsonlSignalStore, ScanReport, Scanner, ScannerConfig,
    SignalStore,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "confluence",
    version,
    about = "Confluence: multi-indicator signal scanner for OHLCV candles"
)]
struct Cli {
    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one CSV candle series (timestamp,open,high,low,close,volume).
    Analyze {
        /// Path to the CSV file.
        #[arg(long)]
        csv: PathBuf,

        /// Symbol label for the output. Defaults to the file stem.
        #[arg(long)]
        symbol: Option<String>,

        #[arg(long, default_value = "1h")]
        timeframe: String,

        /// Scanner config to take engine parameters from.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the full analysis as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Run a single scan cycle.
    Scan {
        #[arg(long)]
        config: PathBuf,
    },
    /// Run the scan loop on the configured interval.
    Run {
        #[arg(long)]
        config: PathBuf,

        /// Stop after this many cycles.
        #[arg(long)]
        cycles: Option<usize>,
    },
    /// Replay the watchlist over stored history.
    Replay {
        #[arg(long)]
        config: PathBuf,

        /// Append replayed signals to this JSONL file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List stored signals, newest first.
    Signals {
        #[arg(long)]
        config: PathBuf,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Analyze {
            csv,
            symbol,
            timeframe,
            config,
            json,
        } => run_analyze(&csv, symbol, &timeframe, config.as_deref(), json),
        Commands::Scan { config } => run_scan(&config),
        Commands::Run { config, cycles } => run_loop(&config, cycles),
        Commands::Replay { config, output } => run_replay(&config, output),
        Commands::Signals { config, limit } => run_signals(&config, limit),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_target(false)
        .init();
}

fn load_config(path: &Path) -> Result<ScannerConfig> {
    ScannerConfig::from_file(path).with_context(|| format!("loading {}", path.display()))
}

fn run_analyze(
    csv: &Path,
    symbol: Option<String>,
    timeframe: &str,
    config: Option<&Path>,
    json: bool,
) -> Result<()> {
    let params = match config {
        Some(path) => load_config(path)?.engine,
        None => EngineParams::default(),
    };
    let candles = read_csv(csv).with_context(|| format!("reading {}", csv.display()))?;
    if candles.is_empty() {
        bail!("{} contains no candles", csv.display());
    }
    let symbol = symbol.unwrap_or_else(|| {
        csv.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    let analysis = ConfluenceEngine::new(params).evaluate(&candles)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        print_analysis(&symbol, timeframe, &analysis);
    }
    Ok(())
}

fn run_scan(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let mut scanner = Scanner::from_config(&config);
    let report = scanner.scan_once(None)?;
    print_report(&report);
    Ok(())
}

fn run_loop(config_path: &Path, cycles: Option<usize>) -> Result<()> {
    let config = load_config(config_path)?;
    let mut scanner = Scanner::from_config(&config);
    let mut ticker = IntervalTicker::new(Duration::from_secs(config.scan.interval_secs))
        .with_max_cycles(cycles);
    info!(
        interval_secs = config.scan.interval_secs,
        cycles = ?cycles,
        "starting scan loop"
    );
    let summary = scanner.run(&mut ticker, None);
    println!(
        "Cycles: {} ({} failed), new signals: {}, notifications: {}, entry errors: {}",
        summary.cycles,
        summary.failed_cycles,
        summary.new_signals,
        summary.notifications,
        summary.entry_errors
    );
    Ok(())
}

fn run_replay(config_path: &Path, output: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let engine = ConfluenceEngine::new(config.engine.clone());
    let source = config.candle_source();
    let watchlist = config.watchlist_source();
    let settings = ReplaySettings::from_config(&config);

    let report = replay(&engine, source.as_ref(), watchlist.as_ref(), &settings, None)?;

    println!();
    println!("=== Replay ===");
    for entry in &report.entries {
        match &entry.error {
            Some(err) => println!("{:<28} error: {err}", entry.entry.to_string()),
            None => println!(
                "{:<28} {:>6} candles {:>5} evaluations {:>4} signals",
                entry.entry.to_string(),
                entry.candles,
                entry.evaluations,
                entry.signals
            ),
        }
    }
    println!();
    for signal in &report.signals {
        println!(
            "{}  {:<12} {:<4} {:<8} {:>5.2}  {}",
            fmt_time(signal.timestamp),
            signal.symbol,
            signal.timeframe,
            signal.direction.as_str(),
            signal.score,
            signal.classification
        );
    }
    println!("Total signals: {}", report.signals.len());

    if let Some(path) = output {
        let store = JsonlSignalStore::new(&path);
        for signal in &report.signals {
            store.persist_signal(signal)?;
        }
        println!("Signals written to: {}", path.display());
    }
    Ok(())
}

fn run_signals(config_path: &Path, limit: usize) -> Result<()> {
    let config = load_config(config_path)?;
    let store = config.signal_store();
    let signals = store.recent_signals(limit)?;
    if signals.is_empty() {
        println!("No signals in {}", config.store.signals_path.display());
        return Ok(());
    }
    for signal in &signals {
        println!("{}", format_alert(signal));
        println!("Notified: {}", if signal.notified { "yes" } else { "no" });
        println!();
    }
    Ok(())
}

fn fmt_time(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map_or_else(|| ts.to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string())
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"))
}

fn print_report(report: &ScanReport) {
    println!();
    println!("=== Scan ===");
    println!("Entries:          {}", report.entries);
    println!("New signals:      {}", report.new_signals);
    println!("Duplicates:       {}", report.duplicates);
    println!("Below threshold:  {}", report.below_threshold);
    println!("Wrong direction:  {}", report.direction_mismatches);
    println!("Short history:    {}", report.insufficient_history);
    println!("Errors:           {}", report.errors);
    println!("Persist failures: {}", report.persist_failures);
    println!("Notifications:    {}", report.notifications);
    if report.interrupted {
        println!("(interrupted)");
    }
    for signal in &report.signals {
        println!();
        println!("{}", format_alert(signal));
    }
}

fn print_analysis(symbol: &str, timeframe: &str, analysis: &Analysis) {
    let result = &analysis.confluence;
    let snapshot = &analysis.snapshot;

    println!();
    println!("=== {symbol} {timeframe} ===");
    println!("Time:           {}", fmt_time(analysis.timestamp));
    println!("Price:          {:.4}", analysis.price);
    println!(
        "Candles:        {} ({} dropped)",
        analysis.candles_used, analysis.candles_dropped
    );
    println!();
    println!("--- Confluence ---");
    println!("Score:          {:.2}", result.score);
    println!("Classification: {}", result.classification);
    println!(
        "System:         {}",
        result.primary_system.map_or("none", System::as_str)
    );
    println!("Signals:        {}", result.signal_count);
    for factor in &result.factors {
        println!("  - {factor}");
    }

    println!();
    println!("--- Events ---");
    let mut any = false;
    for event in analysis.events.in_order() {
        any = true;
        let scored = if event.is_scored() { "" } else { " (context)" };
        println!(
            "  [{}] {} {} {:.1}{scored}",
            event.family, event.description, event.system, event.strength
        );
    }
    if !any {
        println!("  none");
    }

    println!();
    println!("--- Indicators ---");
    println!("Hull 21:        {}", fmt_opt(snapshot.hull_fast));
    println!("Hull 34:        {}", fmt_opt(snapshot.hull_slow));
    println!("AO:             {}", fmt_opt(snapshot.ao));
    if let Some(lines) = snapshot.alligator {
        println!(
            "Alligator:      jaw {:.4} teeth {:.4} lips {:.4}",
            lines.jaw, lines.teeth, lines.lips
        );
    }
    if let Some(state) = &snapshot.alligator_state {
        println!("Alligator state: {state}");
    }
    if let Some(transition) = &snapshot.alligator_transition {
        println!(
            "  {} ({:.0}h ago)",
            transition.description, transition.hours_ago
        );
    }
    if let Some(ichimoku) = snapshot.ichimoku {
        println!(
            "Ichimoku:       tenkan {:.4} kijun {:.4} span A {:.4} span B {:.4}",
            ichimoku.tenkan, ichimoku.kijun, ichimoku.senkou_a, ichimoku.senkou_b
        );
    }
    if let Some(color) = snapshot.cloud_color {
        println!("Cloud:          {color}");
    }
    for change in &snapshot.color_changes {
        println!(
            "  cloud {} -> {} ({:.0}h ago)",
            change.from, change.to, change.hours_ago
        );
    }
    if let Some(volume) = analysis.latest_volume() {
        println!(
            "Volume:         {} ({:.2}x baseline)",
            volume.level, volume.ratio
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_with_cycles() {
        let cli = Cli::try_parse_from(["confluence", "run", "--config", "scan.toml", "--cycles", "2"])
            .unwrap();
        match cli.command {
            Commands::Run { config, cycles } => {
                assert_eq!(config, PathBuf::from("scan.toml"));
                assert_eq!(cycles, Some(2));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::try_parse_from(["confluence", "signals", "--config", "c.toml", "-v"]).unwrap();
        assert!(cli.verbose);
    }
}
