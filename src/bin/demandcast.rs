//! Command-line front end for the demandcast engine.
//!
//! Reads demand history and requests as JSON, writes JSON results to stdout.
//! Logs go to stderr and honour `RUST_LOG`.

use clap::{Parser, Subcommand};
use demandcast::core::{GapPolicy, Observation, RegressorSet, SeriesKey, TimeSeriesDataset};
use demandcast::{
    EngineConfig, ForecastEngine, ForecastError, InMemoryDatasetProvider, ModelSelection,
    PlanRequest,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

type CliResult<T> = std::result::Result<T, ForecastError>;

#[derive(Parser)]
#[command(name = "demandcast")]
#[command(about = "Demand forecasting and inventory replenishment", long_about = None)]
struct Cli {
    /// Engine configuration (JSON); defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Demand history: a JSON array of series
    #[arg(short, long, global = true)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forecast one series with the configured ensemble
    Forecast {
        #[arg(short, long)]
        product: String,

        #[arg(short, long)]
        location: String,

        /// Days to forecast
        #[arg(long, default_value = "30")]
        horizon: usize,

        /// Restrict to these models (repeatable)
        #[arg(short, long)]
        model: Vec<String>,

        /// Regressors to include (repeatable)
        #[arg(short, long)]
        regressor: Vec<String>,
    },

    /// Plan replenishment for a batch of requests
    Plan {
        /// JSON array of plan requests
        #[arg(short, long)]
        requests: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

/// One series as stored in the data file.
#[derive(Debug, Serialize, Deserialize)]
struct SeriesRecord {
    product_id: String,
    location_id: String,
    #[serde(default)]
    gap_policy: GapPolicy,
    observations: Vec<Observation>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> CliResult<T> {
    let text = std::fs::read_to_string(path).map_err(|e| ForecastError::Config {
        reason: format!("cannot read {}: {e}", path.display()),
    })?;
    Ok(serde_json::from_str(&text)?)
}

fn load_provider(path: Option<&Path>) -> CliResult<InMemoryDatasetProvider> {
    let Some(path) = path else {
        return Err(ForecastError::Config {
            reason: "--data is required for this command".to_string(),
        });
    };
    let records: Vec<SeriesRecord> = read_json(path)?;
    records
        .into_iter()
        .map(|r| {
            TimeSeriesDataset::new(
                SeriesKey::new(r.product_id, r.location_id),
                r.observations,
                r.gap_policy,
            )
        })
        .collect()
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(cli: Cli) -> CliResult<()> {
    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Config => print_json(&config),
        Commands::Forecast {
            product,
            location,
            horizon,
            model,
            regressor,
        } => {
            let provider = load_provider(cli.data.as_deref())?;
            let engine = ForecastEngine::new(config, Arc::new(provider))?;
            let selection = if model.is_empty() {
                ModelSelection::All
            } else {
                ModelSelection::Only(model)
            };
            let forecast = engine.forecast(
                &SeriesKey::new(product, location),
                horizon,
                &RegressorSet::new(regressor),
                &selection,
            )?;
            print_json(&forecast)
        }
        Commands::Plan { requests } => {
            let provider = load_provider(cli.data.as_deref())?;
            let requests: Vec<PlanRequest> = read_json(&requests)?;
            let engine = ForecastEngine::new(config, Arc::new(provider))?;
            print_json(&engine.plan_batch(&requests))
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, kind = ?err.kind(), "command failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
