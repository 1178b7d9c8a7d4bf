//! RegimeLab CLI — analyze, batch, and history commands.
//!
//! Commands:
//! - `analyze` — run the reflexion pipeline on one price series at one point
//! - `batch` — analyze several series in parallel at their latest point
//! - `history` — classify every point of a series and report crossovers
//! - `config` — print the effective configuration and its fingerprint

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::{Path, PathBuf};

use regimelab_core::classifier::{regime_series, MaCross};
use regimelab_runner::{
    analyze, export_history_csv, export_json, export_report, load_prices, render_summary,
    run_batch, AnalysisRecord, AsOf, LoadOptions, LoadedPrices, PipelineConfig, RunRequest,
};

#[derive(Parser)]
#[command(
    name = "regimelab",
    about = "RegimeLab CLI — market regime classification with reflexive strategy review"
)]
struct Cli {
    /// Path to a TOML pipeline config. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline on one series.
    Analyze {
        /// CSV with date and close columns. Omit with --synthetic.
        #[arg(long)]
        prices: Option<PathBuf>,

        /// Analyze as of this date (YYYY-MM-DD); the last observation on or before it is used.
        #[arg(long, conflicts_with = "index")]
        as_of: Option<String>,

        /// Analyze at this zero-based index.
        #[arg(long)]
        index: Option<usize>,

        /// Fall back to a synthetic series when no CSV is given.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Symbol label. Defaults to the CSV file stem, or SYNTH for synthetic data.
        #[arg(long)]
        symbol: Option<String>,

        /// Print the full record as JSON instead of the summary.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Write report.json and summary.md under this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Analyze several series in parallel at their latest point.
    Batch {
        /// CSV files, one series each.
        #[arg(required = true)]
        prices: Vec<PathBuf>,

        /// Write one bundle per series under this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Classify every point of a series.
    History {
        /// CSV with date and close columns.
        #[arg(long)]
        prices: PathBuf,

        /// Emit CSV instead of a condensed regime timeline.
        #[arg(long, default_value_t = false)]
        csv: bool,
    },
    /// Print the effective configuration as TOML with its fingerprint.
    Config,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze {
            prices,
            as_of,
            index,
            synthetic,
            symbol,
            json,
            output_dir,
        } => run_analyze(
            &config,
            prices.as_deref(),
            parse_as_of(as_of.as_deref(), index)?,
            synthetic,
            symbol.as_deref(),
            json,
            output_dir.as_deref(),
        ),
        Commands::Batch { prices, output_dir } => {
            run_batch_cmd(&config, &prices, output_dir.as_deref())
        }
        Commands::History { prices, csv } => run_history(&config, &prices, csv),
        Commands::Config => {
            print!("{}", config.to_toml()?);
            println!("# fingerprint: {}", config.fingerprint());
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn parse_as_of(date: Option<&str>, index: Option<usize>) -> Result<AsOf> {
    Ok(match (date, index) {
        (Some(_), Some(_)) => bail!("--as-of and --index are mutually exclusive"),
        (Some(d), None) => AsOf::Date(parse_date(d)?),
        (None, Some(i)) => AsOf::Index(i),
        (None, None) => AsOf::Latest,
    })
}

fn load(path: Option<&Path>, synthetic: bool, symbol: Option<&str>) -> Result<LoadedPrices> {
    // An empty symbol keeps the CSV file stem.
    let symbol = symbol.unwrap_or(if path.is_some() { "" } else { "SYNTH" });
    let opts = LoadOptions {
        synthetic,
        ..LoadOptions::synthetic_year(symbol, chrono::Local::now().date_naive())
    };
    let loaded = load_prices(path, &opts)?;
    info!(
        "loaded {} prices for {} (dataset {})",
        loaded.prices.len(),
        loaded.symbol,
        loaded.dataset_hash.short()
    );
    Ok(loaded)
}

fn run_analyze(
    config: &PipelineConfig,
    prices: Option<&Path>,
    as_of: AsOf,
    synthetic: bool,
    symbol: Option<&str>,
    json: bool,
    output_dir: Option<&Path>,
) -> Result<()> {
    let machine = config.build_machine()?;
    let loaded = load(prices, synthetic, symbol)?;
    let record = analyze(&machine, &loaded, as_of)?;

    if json {
        println!("{}", export_json(&record)?);
    } else {
        println!("{}", render_summary(&record));
    }
    if let Some(dir) = output_dir {
        let bundle = export_report(&record, dir)?;
        println!("Report saved to: {}", bundle.display());
    }
    exit_on_failure(std::slice::from_ref(&record));
    Ok(())
}

fn run_batch_cmd(config: &PipelineConfig, paths: &[PathBuf], output_dir: Option<&Path>) -> Result<()> {
    let machine = config.build_machine()?;

    let mut requests = Vec::with_capacity(paths.len());
    for path in paths {
        let loaded = load(Some(path), false, None)?;
        requests.push(RunRequest::from_loaded(loaded, AsOf::Latest)?);
    }
    let records = run_batch(&machine, &requests);

    println!();
    println!(
        "{:<10} {:<12} {:<16} {:<20} {:>6} {:<9}",
        "Symbol", "As Of", "Regime", "Action", "Size", "Severity"
    );
    println!("{}", "-".repeat(78));
    for record in &records {
        print_batch_row(record);
    }
    println!();

    if let Some(dir) = output_dir {
        for record in &records {
            let bundle = export_report(record, dir)?;
            println!("Report saved to: {}", bundle.display());
        }
    }
    exit_on_failure(&records);
    Ok(())
}

fn print_batch_row(record: &AnalysisRecord) {
    match (record.report.decision_trail(), record.report.failure()) {
        (Some(trail), _) => println!(
            "{:<10} {:<12} {:<16} {:<20} {:>5.0}% {:<9}",
            record.label,
            trail.metrics.as_of_date().to_string(),
            trail.assessment.regime().label(),
            trail.decision.final_action(),
            trail.decision.position_size() * 100.0,
            trail.critique.severity().to_string(),
        ),
        (None, Some(failed)) => println!(
            "{:<10} FAILED in {}: {:?} ({})",
            record.label, failed.failed_stage, failed.error_kind, failed.message
        ),
        (None, None) => warn!("record for {} has no outcome", record.label),
    }
}

fn exit_on_failure(records: &[AnalysisRecord]) {
    if records.iter().any(|r| !r.report.is_completed()) {
        std::process::exit(1);
    }
}

fn run_history(config: &PipelineConfig, path: &Path, csv: bool) -> Result<()> {
    let loaded = load(Some(path), false, None)?;
    let points = regime_series(&loaded.prices, &config.metrics, &config.classifier)?;

    if csv {
        print!("{}", export_history_csv(&points)?);
        return Ok(());
    }

    println!("Regime history: {} ({} points)", loaded.symbol, points.len());
    println!();
    let mut current = None;
    for point in &points {
        if current != Some(point.regime) {
            println!("{}  #{:<6} -> {}", point.date, point.index, point.regime.label());
            current = Some(point.regime);
        }
        match point.cross {
            Some(MaCross::Golden) => println!("{}  #{:<6}    golden cross", point.date, point.index),
            Some(MaCross::Death) => println!("{}  #{:<6}    death cross", point.date, point.index),
            None => {}
        }
    }
    Ok(())
}
