//! Command-line front end for the stock consumption forecaster
//!
//! Usage:
//!   stockcast run transactions.csv
//!   stockcast forecast 5901234123457 --history
//!   stockcast train
//!   stockcast status

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use stock_forecast::logging::{init_tracing, DEFAULT_LOG_LEVEL};
use stock_forecast::{
    ArtifactStore, BatchPipeline, ForecastError, ForecastOutcome, Forecaster, PipelineConfig,
    PipelineReport, ProductId, ProductOutcome,
};
use tracing::error;

const EXIT_FAILURE: u8 = 1;
const EXIT_UNKNOWN_PRODUCT: u8 = 2;
const EXIT_NOT_READY: u8 = 3;

#[derive(Parser, Debug)]
#[command(author, version, about = "Weekly stock consumption forecasting")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Artifact directory (overrides the configuration)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level for the crate targets
    #[arg(long, global = true, default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Aggregate a raw export, train all products and publish the artifacts
    Run {
        /// Raw transaction CSV
        raw_csv: PathBuf,
    },
    /// Retrain from the published weekly series
    Train,
    /// Forecast the next weeks of one product
    Forecast {
        /// Product identifier (EAN)
        product_id: String,

        /// Also print the historical weekly consumption
        #[arg(long)]
        history: bool,
    },
    /// Show the published artifact generation
    Status,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    match execute(cli) {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            if e.is_not_ready() {
                ExitCode::from(EXIT_NOT_READY)
            } else {
                ExitCode::from(EXIT_FAILURE)
            }
        }
    }
}

fn load_config(cli: &Cli) -> stock_forecast::Result<PipelineConfig> {
    let config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    Ok(match &cli.data_dir {
        Some(dir) => config.with_data_dir(dir),
        None => config,
    })
}

fn execute(cli: Cli) -> stock_forecast::Result<ExitCode> {
    let config = load_config(&cli)?;

    match cli.command {
        Command::Run { raw_csv } => {
            let pipeline = BatchPipeline::new(config)?;
            let job = pipeline.spawn(raw_csv, |stage| println!("{}...", stage))?;
            let report = job.join()?;
            print_report(&report);
            Ok(ExitCode::SUCCESS)
        }
        Command::Train => {
            let pipeline = BatchPipeline::new(config)?;
            let report = pipeline.retrain()?;
            print_report(&report);
            Ok(ExitCode::SUCCESS)
        }
        Command::Forecast {
            product_id,
            history,
        } => forecast(config, &product_id, history),
        Command::Status => {
            let manifest = ArtifactStore::new(config.data_dir).load_manifest()?;
            println!("Generation:   {}", manifest.generation);
            println!("Last update:  {}", manifest.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
            if let Some(source) = &manifest.source_file {
                println!("Source:       {}", source);
            }
            println!("Products:     {}", manifest.products);
            println!("Weeks:        {}", manifest.weeks);
            println!(
                "Models:       {} trained, {} skipped, {} failed",
                manifest.trained, manifest.skipped, manifest.failed
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn forecast(config: PipelineConfig, raw_id: &str, history: bool) -> stock_forecast::Result<ExitCode> {
    let product_id: ProductId = raw_id.parse()?;
    let pipeline = BatchPipeline::new(config.clone())?;
    let forecaster = Forecaster::new(config.forecast)?;

    let result = match forecaster.forecast_latest(&product_id, &pipeline.artifacts()) {
        Ok(ForecastOutcome::Found(result)) => result,
        Ok(ForecastOutcome::NotFound(id)) => {
            eprintln!("Unknown product {}", id);
            return Ok(ExitCode::from(EXIT_UNKNOWN_PRODUCT));
        }
        Err(ForecastError::MissingArtifact(_)) => {
            eprintln!("No trained models yet; run `stockcast run <RAW_CSV>` first");
            return Ok(ExitCode::from(EXIT_NOT_READY));
        }
        Err(e) => return Err(e),
    };

    println!("Forecast for product {}", result.product_id);
    for (i, point) in result.forecast.iter().enumerate() {
        println!("Week {} ({}): {} units", i + 1, point.week_start, point.units);
    }

    if history {
        println!();
        println!("History:");
        for point in &result.history {
            println!("{}  {:.0}", point.week_start, point.consumption);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_report(report: &PipelineReport) {
    if let Some(ingest) = &report.ingest {
        println!(
            "Read {} rows, {} accepted, {} malformed",
            ingest.total_rows,
            ingest.accepted,
            ingest.malformed_count()
        );
    }

    println!(
        "Generation {}: {} products over {} weeks",
        report.manifest.generation, report.manifest.products, report.manifest.weeks
    );

    for (product_id, outcome) in &report.training.outcomes {
        match outcome {
            ProductOutcome::Trained { rmse: Some(rmse), .. } => {
                println!("EAN {} - RMSE: {:.4}", product_id, rmse)
            }
            ProductOutcome::Trained { rmse: None, .. } => {
                println!("EAN {} - RMSE: n/a (no holdout rows)", product_id)
            }
            ProductOutcome::Skipped { weeks } => {
                println!("EAN {} - skipped ({} weeks of history)", product_id, weeks)
            }
            ProductOutcome::Failed { reason } => {
                println!("EAN {} - FAILED: {}", product_id, reason)
            }
        }
    }
}
