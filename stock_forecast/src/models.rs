//! Regression models fitted per product
//!
//! A `RegressionModel` is an unfitted configuration; fitting it yields a
//! `TrainedRegressor`, so a model that has not been trained cannot be asked
//! for predictions.

use crate::error::{ForecastError, Result};
use std::fmt::Debug;

/// Fitted regression model
pub trait TrainedRegressor: Debug + Send + Sync {
    /// Predict the target for one feature row
    fn predict_one(&self, features: &[f64]) -> Result<f64>;

    /// Predict the target for every row
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        rows.iter().map(|row| self.predict_one(row)).collect()
    }

    /// Number of features the model was fitted on
    fn n_features(&self) -> usize;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Regression model that can be fitted on a feature matrix
pub trait RegressionModel: Debug + Clone + Send + Sync {
    /// The type of fitted model produced
    type Trained: TrainedRegressor;

    /// Fit on `features` (one row per sample) against `targets`
    fn fit(&self, features: &[Vec<f64>], targets: &[f64]) -> Result<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

/// Check a training set and return its feature count
pub(crate) fn validate_training_data(features: &[Vec<f64>], targets: &[f64]) -> Result<usize> {
    if features.is_empty() {
        return Err(ForecastError::ValidationError(
            "Cannot fit a model on zero rows".to_string(),
        ));
    }
    if features.len() != targets.len() {
        return Err(ForecastError::ValidationError(format!(
            "Feature rows ({}) don't match targets ({})",
            features.len(),
            targets.len()
        )));
    }

    let n_features = features[0].len();
    if n_features == 0 {
        return Err(ForecastError::ValidationError(
            "Feature rows must not be empty".to_string(),
        ));
    }
    if features.iter().any(|row| row.len() != n_features) {
        return Err(ForecastError::ValidationError(
            "Feature rows have different widths".to_string(),
        ));
    }
    if features.iter().flatten().chain(targets).any(|v| !v.is_finite()) {
        return Err(ForecastError::ValidationError(
            "Training data contains non-finite values".to_string(),
        ));
    }

    Ok(n_features)
}

pub(crate) fn check_feature_width(expected: usize, features: &[f64]) -> Result<()> {
    if features.len() != expected {
        return Err(ForecastError::ValidationError(format!(
            "Expected {} features, got {}",
            expected,
            features.len()
        )));
    }
    Ok(())
}

pub mod decision_tree;
pub mod random_forest;

pub use decision_tree::{DecisionTree, TreeConfig};
pub use random_forest::{ForestConfig, RandomForest};
