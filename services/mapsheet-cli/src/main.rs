//! MapSheet command-line driver.
//!
//! Creates mapsheets from an ASCII description, ingests sounding
//! batches, exports raster layers, and queries or nominates individual
//! nodes — a thin synchronous shell over `mapsheet-core`.
//!
//! # Usage
//!
//! ## Create a sheet from a description
//! ```bash
//! mapsheet create --description chart.sheet --algorithm hypothesis
//! ```
//!
//! ## Ingest a batch of soundings
//! ```bash
//! mapsheet ingest --sheet ./chart.sheet --soundings soundings.txt
//! ```

mod config;
mod export;
mod ingest;
mod query;
mod sheet;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mapsheet_core::{Algorithm, Layer, MapSheet};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "mapsheet")]
#[command(about = "Create, ingest, and query bathymetric MapSheets")]
struct Args {
    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new mapsheet from an ASCII sheet description.
    Create {
        /// Path to the `.sheet` description file.
        #[arg(long)]
        description: PathBuf,

        /// In-memory estimator to attach.
        #[arg(long, default_value = "hypothesis")]
        algorithm: String,

        /// Backing-store directory; overrides the description's `backstore`.
        #[arg(long)]
        out: Option<PathBuf>,

        /// JSON file of `Parameters` overrides.
        #[arg(long)]
        params: Option<PathBuf>,
    },

    /// Submit a batch of soundings to an existing mapsheet.
    Ingest {
        /// Backing-store directory of the mapsheet to update.
        #[arg(long)]
        sheet: PathBuf,

        /// Line-oriented sounding batch.
        #[arg(long)]
        soundings: PathBuf,
    },

    /// Export one layer as an OMG1/R4 raster.
    Export {
        #[arg(long)]
        sheet: PathBuf,

        /// depth | uncertainty | stddev | hit-count | hypothesis-count | hypothesis-strength
        #[arg(long)]
        layer: String,

        #[arg(long)]
        out: PathBuf,
    },

    /// Summarize a rectangular area of interest.
    Aoi {
        #[arg(long)]
        sheet: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        sw_x: f64,
        #[arg(long, allow_hyphen_values = true)]
        sw_y: f64,
        #[arg(long, allow_hyphen_values = true)]
        ne_x: f64,
        #[arg(long, allow_hyphen_values = true)]
        ne_y: f64,
    },

    /// Print every live hypothesis at one node.
    Hypotheses {
        #[arg(long)]
        sheet: PathBuf,
        #[arg(long)]
        col: u32,
        #[arg(long)]
        row: u32,
    },

    /// Force a node's reportable depth to a specific hypothesis.
    Nominate {
        #[arg(long)]
        sheet: PathBuf,
        #[arg(long)]
        col: u32,
        #[arg(long)]
        row: u32,
        #[arg(long, allow_hyphen_values = true)]
        depth: f64,
    },

    /// Clear a node's nomination.
    Unnominate {
        #[arg(long)]
        sheet: PathBuf,
        #[arg(long)]
        col: u32,
        #[arg(long)]
        row: u32,
    },

    /// Flush dirty tiles to the backing store without a full save.
    Flush {
        #[arg(long)]
        sheet: PathBuf,
    },

    /// Evict sell-by-aged tiles from the resident cache.
    MinimizeMemory {
        #[arg(long)]
        sheet: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .json()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Create {
            description,
            algorithm,
            out,
            params,
        } => run_create(&description, &algorithm, out.as_deref(), params.as_deref()),
        Command::Ingest { sheet, soundings } => run_ingest(&sheet, &soundings),
        Command::Export { sheet, layer, out } => run_export(&sheet, &layer, &out),
        Command::Aoi {
            sheet,
            sw_x,
            sw_y,
            ne_x,
            ne_y,
        } => run_aoi(&sheet, sw_x, sw_y, ne_x, ne_y),
        Command::Hypotheses { sheet, col, row } => run_hypotheses(&sheet, col, row),
        Command::Nominate { sheet, col, row, depth } => run_nominate(&sheet, col, row, depth),
        Command::Unnominate { sheet, col, row } => run_unnominate(&sheet, col, row),
        Command::Flush { sheet } => run_flush(&sheet),
        Command::MinimizeMemory { sheet } => run_minimize_memory(&sheet),
    }
}

fn run_create(
    description: &std::path::Path,
    algorithm: &str,
    out: Option<&std::path::Path>,
    params: Option<&std::path::Path>,
) -> Result<()> {
    let algorithm = parse_algorithm(algorithm)?;
    let params = config::load_parameters(params)?;
    let mut sheet = sheet::create_from_description(description, out, params)?;
    sheet.attach_depth_layer(algorithm)?;
    sheet.save()?;
    info!(?algorithm, "mapsheet created");
    Ok(())
}

fn run_ingest(sheet_path: &std::path::Path, soundings: &std::path::Path) -> Result<()> {
    let mut sheet = sheet::open(sheet_path)?;
    let summary = ingest::ingest_file(&mut sheet, soundings)?;
    sheet.save()?;
    println!("{}", serde_json::to_string_pretty(&IngestReport::from(summary))?);
    Ok(())
}

fn run_export(sheet_path: &std::path::Path, layer: &str, out: &std::path::Path) -> Result<()> {
    let mut sheet = sheet::open(sheet_path)?;
    let layer = parse_layer(layer)?;
    export::export_layer(&mut sheet, layer, out)?;
    info!(out = %out.display(), "layer exported");
    Ok(())
}

fn run_aoi(sheet_path: &std::path::Path, sw_x: f64, sw_y: f64, ne_x: f64, ne_y: f64) -> Result<()> {
    let mut sheet = sheet::open(sheet_path)?;
    query::print_aoi(&mut sheet, sw_x, sw_y, ne_x, ne_y)
}

fn run_hypotheses(sheet_path: &std::path::Path, col: u32, row: u32) -> Result<()> {
    let mut sheet = sheet::open(sheet_path)?;
    query::print_hypotheses(&mut sheet, col, row)
}

fn run_nominate(sheet_path: &std::path::Path, col: u32, row: u32, depth: f64) -> Result<()> {
    let mut sheet = sheet::open(sheet_path)?;
    query::nominate(&mut sheet, col, row, depth)?;
    sheet.save()?;
    Ok(())
}

fn run_unnominate(sheet_path: &std::path::Path, col: u32, row: u32) -> Result<()> {
    let mut sheet = sheet::open(sheet_path)?;
    query::unnominate(&mut sheet, col, row)?;
    sheet.save()?;
    Ok(())
}

fn run_flush(sheet_path: &std::path::Path) -> Result<()> {
    let mut sheet: MapSheet<_> = sheet::open(sheet_path)?;
    sheet.flush()?;
    Ok(())
}

fn run_minimize_memory(sheet_path: &std::path::Path) -> Result<()> {
    let mut sheet = sheet::open(sheet_path)?;
    sheet.minimize_memory()?;
    sheet.save()?;
    Ok(())
}

fn parse_algorithm(s: &str) -> Result<Algorithm> {
    Ok(match s.to_ascii_lowercase().replace('-', "_").as_str() {
        "nodal" => Algorithm::Nodal,
        "binned_mean" | "binnedmean" => Algorithm::BinnedMean,
        "binned_median" | "binnedmedian" => Algorithm::BinnedMedian,
        "hypothesis" => Algorithm::Hypothesis,
        other => anyhow::bail!("unrecognized algorithm: {other}"),
    })
}

fn parse_layer(s: &str) -> Result<Layer> {
    Ok(match s.to_ascii_lowercase().replace('-', "_").as_str() {
        "depth" => Layer::Depth,
        "uncertainty" => Layer::Uncertainty,
        "stddev" | "std_dev" => Layer::StdDev,
        "hit_count" | "hitcount" => Layer::HitCount,
        "hypothesis_count" | "hypothesiscount" => Layer::HypothesisCount,
        "hypothesis_strength" | "hypothesisstrength" => Layer::HypothesisStrength,
        other => anyhow::bail!("unrecognized layer: {other}"),
    })
}

#[derive(serde::Serialize)]
struct IngestReport {
    read: u64,
    applied: u64,
    dropped: u64,
}

impl From<sounding_ingest::IngestSummary> for IngestReport {
    fn from(s: sounding_ingest::IngestSummary) -> Self {
        Self {
            read: s.read,
            applied: s.applied,
            dropped: s.dropped,
        }
    }
}
