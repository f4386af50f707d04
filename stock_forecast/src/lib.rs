//! # Stock Forecast
//!
//! A Rust library for forecasting short-term stock consumption per product
//! from raw transaction exports.
//!
//! ## Features
//!
//! - Transaction ingestion from CSV exports (polars), with malformed rows reported
//! - Weekly aggregation with gap filling over the global week calendar
//! - One shared standard scaler for all products
//! - Lag features (`Lag_1..Lag_4`) and one random forest per product
//! - Iterative 4-week-ahead forecasts in whole units
//! - Versioned on-disk artifacts swapped atomically after a successful run
//! - A background batch pipeline with stage progress
//!
//! ## Data Flow
//!
//! ```text
//! raw CSV -> TransactionLoader -> TimeSeriesAggregator -> WeeklySeries + StandardScaler
//!         -> ModelTrainer -> ModelRegistry -> ArtifactStore / SharedArtifacts
//!         -> Forecaster -> ForecastResult
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stock_forecast::{BatchPipeline, Forecaster, PipelineConfig, ProductId};
//!
//! # fn main() -> stock_forecast::Result<()> {
//! let config = PipelineConfig::default().with_data_dir("data");
//! let pipeline = BatchPipeline::new(config.clone())?;
//!
//! // Aggregate, train and commit a new artifact generation
//! let report = pipeline.run("transactions.csv")?;
//! println!("trained {} products", report.training.trained_count());
//!
//! // Forecast the next four weeks of one product
//! let forecaster = Forecaster::new(config.forecast)?;
//! let product: ProductId = "5901234123457".parse()?;
//! if let Some(result) = forecaster.forecast_latest(&product, &pipeline.artifacts())?.found() {
//!     for point in &result.forecast {
//!         println!("{}: {} units", point.week_start, point.units);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregation;
pub mod artifacts;
pub mod calendar;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod forecasting;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod training;

// Re-export commonly used types
pub use crate::aggregation::{AggregatedSeries, TimeSeriesAggregator, WeeklySeries, WeeklySeriesPoint};
pub use crate::artifacts::{ArtifactManifest, ArtifactSet, ArtifactStore, SharedArtifacts};
pub use crate::calendar::{WeekKey, WeekStart};
pub use crate::config::{
    AggregationConfig, ColumnNames, ForecastConfig, PipelineConfig, SeedWindow, TrainingConfig,
};
pub use crate::data::{IngestReport, ProductId, TransactionLoader, TransactionRecord};
pub use crate::error::{ForecastError, Result};
pub use crate::features::{FeatureBuilder, FeatureMatrix, LagWindow};
pub use crate::forecasting::{ForecastOutcome, ForecastPoint, ForecastResult, Forecaster};
pub use crate::models::{ForestConfig, RandomForest, RegressionModel, TrainedRegressor};
pub use crate::pipeline::{BatchPipeline, PipelineJob, PipelineReport, PipelineStage};
pub use crate::training::{ModelRegistry, ModelTrainer, ProductOutcome, RmseMap, TrainingReport};
pub use forecast_math::StandardScaler;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
