//! Mean/variance normalisation of a single numeric column

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Standard scaler: `z = (x - mean) / scale`.
///
/// `scale` is the population standard deviation of the fitted values. A
/// constant column has zero deviation, in which case `scale` is 1 so the
/// transform degenerates to mean-centering instead of dividing by zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: f64,
    scale: f64,
}

impl StandardScaler {
    /// Build a scaler from known parameters
    pub fn new(mean: f64, scale: f64) -> Result<Self> {
        if !mean.is_finite() {
            return Err(MathError::InvalidInput(format!(
                "Scaler mean must be finite, got {}",
                mean
            )));
        }
        if !scale.is_finite() || scale <= 0.0 {
            return Err(MathError::InvalidInput(format!(
                "Scaler scale must be finite and positive, got {}",
                scale
            )));
        }

        Ok(Self { mean, scale })
    }

    /// Fit the scaler on every value of the column
    pub fn fit(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(MathError::InsufficientData(
                "Cannot fit a scaler on an empty column".to_string(),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(MathError::InvalidInput(
                "Cannot fit a scaler on non-finite values".to_string(),
            ));
        }

        let mean = values.mean();
        let std_dev = values.population_std_dev();
        let scale = if std_dev > f64::EPSILON { std_dev } else { 1.0 };

        Self::new(mean, scale)
    }

    /// Fit the scaler and return the transformed column
    pub fn fit_transform(values: &[f64]) -> Result<(Self, Vec<f64>)> {
        let scaler = Self::fit(values)?;
        let transformed = scaler.transform_all(values);
        Ok((scaler, transformed))
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Raw value to the scaled domain
    pub fn transform(&self, value: f64) -> f64 {
        (value - self.mean) / self.scale
    }

    /// Scaled value back to raw units
    pub fn inverse_transform(&self, value: f64) -> f64 {
        value * self.scale + self.mean
    }

    pub fn transform_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.transform(v)).collect()
    }

    pub fn inverse_transform_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.inverse_transform(v)).collect()
    }
}
