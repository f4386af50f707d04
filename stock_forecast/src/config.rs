//! Pipeline configuration
//!
//! Every section has working defaults, so a configuration file only needs
//! the values it changes.

use crate::calendar::WeekStart;
use crate::error::{ForecastError, Result};
use crate::models::ForestConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Column names of the raw transaction export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub product_id: String,
    pub quantity: String,
    pub timestamp: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            product_id: "product_id".to_string(),
            quantity: "quantity".to_string(),
            timestamp: "creation_timestamp".to_string(),
        }
    }
}

/// Weekly aggregation settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Weekday the aggregation week starts on
    pub week_start: WeekStart,
    /// Raw export columns
    pub columns: ColumnNames,
}

/// Per-product model training settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub forest: ForestConfig,
    /// Share of lag rows, taken from the start, used for fitting
    pub train_ratio: f64,
    /// Fail the whole batch when any single product fails
    pub abort_on_product_failure: bool,
    /// Train products concurrently
    pub parallel: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            forest: ForestConfig::default(),
            train_ratio: 0.8,
            abort_on_product_failure: false,
            parallel: true,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.train_ratio > 0.0 && self.train_ratio <= 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "train_ratio must be in (0, 1], got {}",
                self.train_ratio
            )));
        }
        self.forest.validate()
    }
}

/// Lag window the first forecast step starts from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedWindow {
    /// Lags of the last training row, built exactly as during training
    #[default]
    LastLagRow,
    /// The four most recent weeks, so `Lag_1` is the last observed week
    LatestWeeks,
}

/// Forecast settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Number of weeks predicted per request
    pub horizon: usize,
    /// Floor predictions at zero units
    pub clamp_negative: bool,
    pub seed: SeedWindow,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon: 4,
            clamp_negative: false,
            seed: SeedWindow::default(),
        }
    }
}

impl ForecastConfig {
    pub fn validate(&self) -> Result<()> {
        if self.horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "Forecast horizon must be at least one week".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the persisted artifacts
    pub data_dir: PathBuf,
    pub aggregation: AggregationConfig,
    pub training: TrainingConfig,
    pub forecast: ForecastConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            aggregation: AggregationConfig::default(),
            training: TrainingConfig::default(),
            forecast: ForecastConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a JSON configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Builder-style override of the artifact directory
    pub fn with_data_dir<P: Into<PathBuf>>(mut self, data_dir: P) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ForecastError::InvalidParameter(
                "data_dir must not be empty".to_string(),
            ));
        }
        self.training.validate()?;
        self.forecast.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.forecast.horizon, 4);
        assert_eq!(config.forecast.seed, SeedWindow::LastLagRow);
        assert_eq!(config.training.train_ratio, 0.8);
        assert_eq!(config.aggregation.week_start, WeekStart::Sunday);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"data_dir": "/tmp/stock", "aggregation": {{"week_start": "monday"}}, "training": {{"forest": {{"n_trees": 10}}}}}}"#
        )
        .unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/stock"));
        assert_eq!(config.aggregation.week_start, WeekStart::Monday);
        assert_eq!(config.aggregation.columns, ColumnNames::default());
        assert_eq!(config.training.forest.n_trees, 10);
        assert_eq!(config.training.forest.seed, 42);
        assert_eq!(config.forecast.horizon, 4);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = PipelineConfig::default();
        config.training.train_ratio = 0.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.forecast.horizon = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.training.forest.n_trees = 0;
        assert!(config.validate().is_err());
    }
}
