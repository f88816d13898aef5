//! Aviastat - historical aviation accident dataset cleaning & trend
//! analysis.
//!
//! One-shot batch pipeline: raw CSV -> cleaner -> normalized CSV ->
//! aggregator -> derived tables -> JSON export / static charts.

mod charts;
mod data;
mod stats;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use std::path::{Path, PathBuf};

use charts::ChartPlotter;
use data::Cleaner;
use stats::{Aggregator, Metric, ReliabilityReport};

#[derive(Parser)]
#[command(name = "aviastat", version, about = "Aviation accident dataset cleaning & trend analysis")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Clean the raw accident CSV and write the normalized dataset
    Clean {
        /// Raw accident CSV
        input: PathBuf,
        /// Where to write the normalized CSV
        #[arg(long, default_value = "aviation_cleaned.csv")]
        output: PathBuf,
    },
    /// Compute the derived tables from an already-cleaned dataset
    Analyze {
        /// Cleaned accident CSV
        input: PathBuf,
        #[command(flatten)]
        opts: AnalyzeOpts,
    },
    /// Full pipeline: clean, then analyze the cleaned output
    Run {
        /// Raw accident CSV
        input: PathBuf,
        /// Where to write the normalized CSV
        #[arg(long, default_value = "aviation_cleaned.csv")]
        cleaned: PathBuf,
        #[command(flatten)]
        opts: AnalyzeOpts,
    },
}

#[derive(Args)]
struct AnalyzeOpts {
    /// Directory for the rendered charts
    #[arg(long, default_value = "charts")]
    charts_dir: PathBuf,
    /// Skip chart rendering
    #[arg(long)]
    no_charts: bool,
    /// Write the derived tables as JSON for external renderers
    #[arg(long)]
    export: Option<PathBuf>,
    /// First year of the trend-fit range
    #[arg(long, default_value_t = 1990)]
    trend_from: i32,
    /// Last year of the trend-fit range (defaults to the last observed year)
    #[arg(long)]
    trend_to: Option<i32>,
}

fn main() -> Result<()> {
    pretty_env_logger::formatted_builder()
        .parse_filters(&std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Clean { input, output } => {
            run_clean(&input, &output)?;
        }
        Command::Analyze { input, opts } => {
            run_analyze(&input, &opts)?;
        }
        Command::Run {
            input,
            cleaned,
            opts,
        } => {
            // The cleaner finishes and closes its output before the
            // aggregator reopens it as input.
            run_clean(&input, &cleaned)?;
            run_analyze(&cleaned, &opts)?;
        }
    }
    Ok(())
}

fn run_clean(input: &Path, output: &Path) -> Result<()> {
    info!("loading raw dataset from {}", input.display());
    let raw = data::load_raw_csv(input)
        .with_context(|| format!("loading raw dataset {}", input.display()))?;
    info!("loaded {} raw records", raw.height());

    let cleaned = Cleaner::clean(&raw)?;
    info!(
        "cleaned {} records ({} duplicates removed, date column {})",
        cleaned.records.len(),
        cleaned.duplicates_removed,
        if cleaned.keep_date { "kept" } else { "dropped" },
    );
    info!("head preview:\n{}", Cleaner::preview(&cleaned.records, 5));

    Cleaner::write_csv(&cleaned, output)
        .with_context(|| format!("writing cleaned dataset {}", output.display()))?;
    info!("cleaned dataset saved to {}", output.display());
    Ok(())
}

fn run_analyze(input: &Path, opts: &AnalyzeOpts) -> Result<()> {
    let records = data::load_cleaned_csv(input)
        .with_context(|| format!("loading cleaned dataset {}", input.display()))?;
    info!("analyzing {} normalized records", records.len());

    let last_year = records.iter().filter_map(|r| r.year).max();
    let trend_to = opts.trend_to.or(last_year).unwrap_or(opts.trend_from);
    let report = Aggregator::build_report(&records, opts.trend_from, trend_to);

    for metric in [Metric::Accidents, Metric::Fatalities, Metric::Severity] {
        match metric.fit(&report) {
            Some(fit) => info!(
                "{} tendency {}-{}: y = {:.1}x + {:.1}",
                metric.label(),
                opts.trend_from,
                trend_to,
                fit.slope,
                fit.intercept,
            ),
            None => warn!(
                "{} tendency {}-{}: insufficient data (fewer than 2 points)",
                metric.label(),
                opts.trend_from,
                trend_to,
            ),
        }
    }

    info!("{}", ReliabilityReport::build(&records));

    if let Some(path) = &opts.export {
        let file = std::fs::File::create(path)
            .with_context(|| format!("creating export file {}", path.display()))?;
        serde_json::to_writer_pretty(file, &report)?;
        info!("derived tables exported to {}", path.display());
    }

    if !opts.no_charts {
        let written = ChartPlotter::render_all(&report, &opts.charts_dir)?;
        for path in &written {
            info!("chart written: {}", path.display());
        }
    }

    Ok(())
}
