//! # Forecast Math
//!
//! Numeric building blocks shared by the forecasting pipeline.
//! This crate has no I/O: it provides the standard scaler used to move
//! consumption values in and out of the scaled domain, and the regression
//! error metrics reported after training.

use thiserror::Error;

pub mod metrics;
pub mod scaling;

pub use metrics::{mean_squared_error, root_mean_squared_error};
pub use scaling::StandardScaler;

/// Errors that can occur in numeric calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for numeric operations
pub type Result<T> = std::result::Result<T, MathError>;
