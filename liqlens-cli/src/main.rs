//! LiqLens CLI: inspect the indicator panel, net liquidity, event studies
//! and correlations from the terminal.
//!
//! Commands:
//! - `catalog`: list configured indicators
//! - `panel`: fetch, align and print the indicator panel
//! - `liquidity`: print the composed net-liquidity series
//! - `backtest`: run the event study and print its statistics
//! - `correlate`: correlate every panel column with a target

mod logging;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::debug;

use liqlens_core::align::AlignedPanel;
use liqlens_core::backtest::{Direction, Outcome};
use liqlens_core::data::{FetchProgress, LogProgress};
use liqlens_runner::export::{
    export_correlations_csv, export_events_csv, export_json, export_panel_csv, generate_report,
};
use liqlens_runner::{BacktestReport, DashboardConfig, LoadedPanel, ProviderSet, Session};

use logging::LogFormat;

#[derive(Parser)]
#[command(
    name = "liqlens",
    about = "LiqLens CLI: macro liquidity indicators and event studies"
)]
struct Cli {
    /// Path to a TOML config file. Defaults to the stock dashboard.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use synthetic data instead of Yahoo Finance and FRED.
    #[arg(long, global = true, default_value_t = false)]
    offline: bool,

    /// Last date of the history window (YYYY-MM-DD). Defaults to today.
    #[arg(long, global = true)]
    as_of: Option<String>,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the configured indicators.
    Catalog,
    /// Fetch and align every indicator, then print the panel.
    Panel {
        /// Number of trailing rows to print.
        #[arg(long, default_value_t = 20)]
        tail: usize,

        /// Only keep rows where every column is defined.
        #[arg(long, default_value_t = false)]
        complete: bool,

        /// Print CSV instead of a table.
        #[arg(long, default_value_t = false)]
        csv: bool,
    },
    /// Print the net-liquidity series and its components.
    Liquidity {
        /// Number of trailing rows to print.
        #[arg(long, default_value_t = 20)]
        tail: usize,
    },
    /// Run the event study. Flags override the config's [backtest] section.
    Backtest {
        /// Driver series name.
        #[arg(long)]
        driver: Option<String>,

        /// Target series name.
        #[arg(long)]
        target: Option<String>,

        /// Lookback window in trading days.
        #[arg(long)]
        lookback: Option<usize>,

        /// Threshold as a fraction (0.03 = 3%).
        #[arg(long)]
        threshold: Option<f64>,

        /// Which side of the threshold counts as an event.
        #[arg(long, value_enum)]
        direction: Option<DirectionArg>,

        /// Forward horizon in trading days.
        #[arg(long)]
        horizon: Option<usize>,

        /// Minimum rows between events (0 keeps every qualifying date).
        #[arg(long)]
        min_gap: Option<usize>,

        /// Print the full report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Print per-event records as CSV.
        #[arg(long, default_value_t = false)]
        events_csv: bool,

        /// Print a Markdown report.
        #[arg(long, default_value_t = false)]
        markdown: bool,
    },
    /// Correlate every panel column with a target series.
    Correlate {
        /// Target series. Defaults to the backtest target.
        #[arg(long)]
        target: Option<String>,

        /// Print CSV instead of a table.
        #[arg(long, default_value_t = false)]
        csv: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DirectionArg {
    Up,
    Down,
}

impl From<DirectionArg> for Direction {
    fn from(d: DirectionArg) -> Self {
        match d {
            DirectionArg::Up => Direction::Up,
            DirectionArg::Down => Direction::Down,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_format, logging::level_for(cli.verbose))?;

    let config = match &cli.config {
        Some(path) => DashboardConfig::from_file(path)?,
        None => DashboardConfig::default(),
    };

    if let Commands::Catalog = cli.command {
        print_catalog(&config);
        return Ok(());
    }

    let mut session = build_session(config, cli.offline, cli.as_of.as_deref())?;

    match cli.command {
        Commands::Catalog => {}
        Commands::Panel {
            tail,
            complete,
            csv,
        } => run_panel(&mut session, tail, complete, csv)?,
        Commands::Liquidity { tail } => run_liquidity(&mut session, tail)?,
        Commands::Backtest {
            driver,
            target,
            lookback,
            threshold,
            direction,
            horizon,
            min_gap,
            json,
            events_csv,
            markdown,
        } => {
            let mut settings = session.config().backtest.clone();
            if let Some(d) = driver {
                settings.driver = d;
            }
            if let Some(t) = target {
                settings.target = t;
            }
            if let Some(w) = lookback {
                settings.lookback = w;
            }
            if let Some(t) = threshold {
                settings.threshold = t;
            }
            if let Some(d) = direction {
                settings.direction = d.into();
            }
            if let Some(h) = horizon {
                settings.horizon = h;
            }
            if let Some(g) = min_gap {
                settings.min_gap = g;
            }

            load(&mut session)?;
            let report = session.backtest_with(&settings)?;

            if json {
                println!("{}", export_json(&report)?);
            } else if events_csv {
                print!("{}", export_events_csv(&report.result)?);
            } else if markdown {
                print!("{}", generate_report(&report));
            } else {
                print_summary(&report);
            }
        }
        Commands::Correlate { target, csv } => {
            let target = target.unwrap_or_else(|| session.config().backtest.target.clone());
            load(&mut session)?;
            let table = session.correlations(&target)?;
            if csv {
                print!("{}", export_correlations_csv(&table)?);
            } else {
                println!();
                println!("=== Correlation with {target} ===");
                println!("{:<16} {:>12} {:>8}", "Series", "Pearson r", "Pairs");
                for c in &table {
                    println!("{:<16} {:>12.4} {:>8}", c.name, c.coefficient, c.pairs);
                }
                println!();
            }
        }
    }

    let stats = session.cache_stats();
    debug!(
        hits = stats.hits,
        misses = stats.misses,
        entries = stats.entries,
        "fetch cache"
    );
    Ok(())
}

fn build_session(config: DashboardConfig, offline: bool, as_of: Option<&str>) -> Result<Session> {
    let ttl = config.cache_ttl();
    let providers = if offline {
        ProviderSet::offline(ttl)
    } else {
        ProviderSet::live(ttl).context("failed to build HTTP providers")?
    };

    let mut session = Session::new(config, providers)?;
    if let Some(s) = as_of {
        let today = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid --as-of date: {s}"))?;
        session = session.with_today(today);
    }
    Ok(session)
}

/// Load the panel with progress logging and print any data warnings.
fn load(session: &mut Session) -> Result<&LoadedPanel> {
    let progress: &dyn FetchProgress = &LogProgress;
    let loaded = session.panel_with_progress(Some(progress))?;

    for f in &loaded.failures {
        eprintln!(
            "WARNING: {} ({}) unavailable: {}",
            f.name, f.identifier, f.reason
        );
    }
    if let Some(e) = &loaded.liquidity_error {
        eprintln!("WARNING: net liquidity unavailable: {e}");
    }
    if loaded.has_synthetic {
        eprintln!("WARNING: Results based on SYNTHETIC data");
    }
    Ok(loaded)
}

fn run_panel(session: &mut Session, tail: usize, complete: bool, csv: bool) -> Result<()> {
    let loaded = load(session)?;
    let panel = if complete {
        loaded.panel.select_rows(&loaded.panel.complete_rows())
    } else {
        loaded.panel.clone()
    };
    if panel.is_empty() {
        bail!("panel has no rows to show");
    }
    let shown = panel.tail(tail);

    if csv {
        print!("{}", export_panel_csv(&shown)?);
        return Ok(());
    }

    println!();
    println!("=== Indicator Panel ===");
    println!("Period:         {} to {}", loaded.start, loaded.end);
    println!("Rows:           {} ({} shown)", panel.len(), shown.len());
    println!("Fill:           {:?}", panel.fill_policy());
    println!("Dataset Hash:   {}", loaded.dataset_hash);
    println!();
    print_table(&shown);
    println!();
    Ok(())
}

fn run_liquidity(session: &mut Session, tail: usize) -> Result<()> {
    let liquidity = session.config().liquidity.clone();
    let loaded = load(session)?;
    let panel = &loaded.panel;

    let Some(net) = panel.column_series(&liquidity.output) else {
        bail!("net liquidity is not in the panel");
    };
    let (Some(first), Some(last)) = (net.first(), net.last()) else {
        bail!("net liquidity has no observations");
    };

    println!();
    println!("=== Net Liquidity ($B) ===");
    println!(
        "Formula:        {} - {} - {}",
        liquidity.balance_sheet, liquidity.treasury_general_account, liquidity.reverse_repo
    );
    println!("First:          {} {:.1}", first.date, first.value);
    println!("Last:           {} {:.1}", last.date, last.value);
    println!(
        "Change:         {:+.1} ({:+.2}%)",
        last.value - first.value,
        (last.value / first.value - 1.0) * 100.0
    );
    println!();

    let columns = [
        liquidity.balance_sheet.as_str(),
        liquidity.treasury_general_account.as_str(),
        liquidity.reverse_repo.as_str(),
        liquidity.output.as_str(),
    ];
    let rows: Vec<usize> = (0..panel.len())
        .filter(|&i| panel.value(&liquidity.output, i).is_some())
        .collect();
    let start = rows.len().saturating_sub(tail);

    print!("{:<12}", "Date");
    for name in columns {
        print!(" {:>16}", name);
    }
    println!();
    for &i in &rows[start..] {
        print!("{:<12}", panel.dates()[i]);
        for name in columns {
            print!(" {:>16}", cell(panel.value(name, i)));
        }
        println!();
    }
    println!();
    Ok(())
}

fn print_catalog(config: &DashboardConfig) {
    println!();
    println!(
        "{:<10} {:<7} {:<12} {:<10} Label",
        "Name", "Source", "Identifier", "Units"
    );
    for ind in &config.indicators {
        let units = ind
            .units
            .map(|u| format!("{u:?}").to_lowercase())
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<10} {:<7} {:<12} {:<10} {}",
            ind.name,
            format!("{:?}", ind.source).to_lowercase(),
            ind.identifier,
            units,
            ind.display_label()
        );
    }
    println!();
    println!("Derived:        {}", config.liquidity.output);
    println!("Calendar:       {:?}", config.alignment.calendar);
    if let Some(anchor) = config.alignment.anchor() {
        println!("Anchor:         {anchor}");
    }
    println!("History:        {} years", config.data.years_back);
    println!();
}

fn print_table(panel: &AlignedPanel) {
    print!("{:<12}", "Date");
    for name in panel.names() {
        print!(" {:>14}", name);
    }
    println!();
    for (i, date) in panel.dates().iter().enumerate() {
        print!("{:<12}", date);
        for v in panel.row(i) {
            print!(" {:>14}", cell(v));
        }
        println!();
    }
}

fn cell(v: Option<f64>) -> String {
    match v {
        Some(x) => format!("{x:.2}"),
        None => "-".into(),
    }
}

fn print_summary(report: &BacktestReport) {
    let r = &report.result;
    let p = &r.params;
    println!();
    println!("=== Event Study ===");
    println!("Driver:         {}", r.driver);
    println!("Target:         {}", r.target);
    println!("Period:         {} to {}", report.start, report.end);
    match r.eligible_range {
        Some((first, last)) => println!("Eligible:       {first} to {last}"),
        None => println!("Eligible:       none (history shorter than lookback)"),
    }
    println!(
        "Rule:           {:?} {:.2}% over {} days, horizon {} days",
        p.direction,
        p.threshold * 100.0,
        p.lookback,
        p.horizon
    );
    println!("Cluster:        {:?}", p.cluster);
    println!(
        "Events:         {} ({} resolved, {} pending, {} unpriced)",
        r.event_count, r.resolved_count, r.pending_count, r.unpriced_count
    );
    println!();
    println!("--- Forward Returns ---");
    match &r.stats {
        None if r.event_count == 0 => println!("No qualifying events."),
        None => println!("No event has a resolved forward return yet."),
        Some(s) => {
            println!("Mean:           {:+.2}%", s.mean * 100.0);
            println!("Median:         {:+.2}%", s.median * 100.0);
            println!("Min:            {:+.2}%", s.min * 100.0);
            println!("Max:            {:+.2}%", s.max * 100.0);
            println!("Std Dev:        {:.2}%", s.std_dev * 100.0);
            println!(
                "Decline Prob:   {:.1}% ({}/{})",
                s.decline_probability * 100.0,
                s.declines,
                s.count
            );
            match s.win_loss_ratio {
                Some(w) => println!("Win/Loss:       {w:.2}"),
                None => println!("Win/Loss:       n/a (no declines)"),
            }
        }
    }

    if !r.events.is_empty() {
        println!();
        println!("--- Events ---");
        println!(
            "{:<12} {:>10} {:<10} {:>10}",
            "Date", "Change", "Status", "Forward"
        );
        for e in &r.events {
            let (status, fwd) = match e.outcome {
                Outcome::Resolved { forward_return, .. } => {
                    ("resolved", format!("{:+.2}%", forward_return * 100.0))
                }
                Outcome::Pending => ("pending", "-".into()),
                Outcome::Unpriced => ("unpriced", "-".into()),
            };
            println!(
                "{:<12} {:>9.2}% {:<10} {:>10}",
                e.date,
                e.driver_change * 100.0,
                status,
                fwd
            );
        }
    }

    println!();
    println!("Dataset Hash:   {}", report.dataset_hash);
    println!("Digest:         {}", report.digest);
    if report.has_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    println!();
}
