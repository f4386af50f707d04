//! Error types for the stock_forecast crate

use polars::prelude::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

/// Custom error types for the stock_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// The input file cannot be used at all (missing columns, empty)
    #[error("Data error: {0}")]
    DataError(String),

    /// A single raw row that was rejected during ingestion
    #[error("Malformed record at row {row}: {reason}")]
    MalformedRecord { row: usize, reason: String },

    /// A product without enough weekly points to build one lag row
    #[error("Insufficient history for product {product_id}: {weeks} weeks")]
    InsufficientHistory { product_id: String, weeks: usize },

    /// Fitting the model of one product failed
    #[error("Training failed for product {product_id}: {reason}")]
    TrainingFailure { product_id: String, reason: String },

    /// A persisted artifact is not there yet
    #[error("Missing artifact: {}", .0.display())]
    MissingArtifact(PathBuf),

    /// A persisted artifact exists but cannot be decoded
    #[error("Corrupt artifact {}: {reason}", .path.display())]
    ArtifactCorrupt { path: PathBuf, reason: String },

    /// A pipeline run failed as a whole
    #[error("Batch failed: {0}")]
    BatchFailed(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error related to parameter validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error from numeric helpers
    #[error("Math error: {0}")]
    Math(#[from] forecast_math::MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from JSON encoding or decoding
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from CSV encoding or decoding
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    Polars(String),
}

impl ForecastError {
    /// True for the "artifacts are not ready yet" condition
    pub fn is_not_ready(&self) -> bool {
        matches!(
            self,
            ForecastError::MissingArtifact(_) | ForecastError::ArtifactCorrupt { .. }
        )
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::Polars(err.to_string())
    }
}
