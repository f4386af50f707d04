//! Per-product model training
//!
//! Every product gets its own forest, fitted on the first `train_ratio` of
//! its lag rows and scored on the rest. Rows are never shuffled: the holdout
//! slice is always the most recent weeks.

use crate::aggregation::{WeeklySeries, WeeklySeriesPoint};
use crate::config::TrainingConfig;
use crate::data::ProductId;
use crate::error::{ForecastError, Result};
use crate::features::{FeatureBuilder, MIN_HISTORY_WEEKS};
use crate::models::{RandomForest, RegressionModel, TrainedRegressor};
use forecast_math::root_mean_squared_error;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Holdout RMSE per product, in the scaled domain
pub type RmseMap = BTreeMap<ProductId, f64>;

/// Trained model per product
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelRegistry {
    models: BTreeMap<ProductId, RandomForest>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, product_id: ProductId, model: RandomForest) {
        self.models.insert(product_id, model);
    }

    pub fn get(&self, product_id: &ProductId) -> Option<&RandomForest> {
        self.models.get(product_id)
    }

    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.models.contains_key(product_id)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn product_ids(&self) -> impl Iterator<Item = &ProductId> {
        self.models.keys()
    }
}

/// What happened to one product during a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProductOutcome {
    Trained {
        /// `None` when the holdout slice is empty
        rmse: Option<f64>,
        train_rows: usize,
        test_rows: usize,
    },
    /// Too few weeks to build a single lag row
    Skipped { weeks: usize },
    Failed { reason: String },
}

/// Per-product outcomes of a training run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub outcomes: BTreeMap<ProductId, ProductOutcome>,
}

impl TrainingReport {
    pub fn trained_count(&self) -> usize {
        self.count(|o| matches!(o, ProductOutcome::Trained { .. }))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|o| matches!(o, ProductOutcome::Skipped { .. }))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, ProductOutcome::Failed { .. }))
    }

    /// Failed products with their reasons
    pub fn failures(&self) -> Vec<(&ProductId, &str)> {
        self.outcomes
            .iter()
            .filter_map(|(id, outcome)| match outcome {
                ProductOutcome::Failed { reason } => Some((id, reason.as_str())),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&ProductOutcome) -> bool) -> usize {
        self.outcomes.values().filter(|o| pred(o)).count()
    }
}

/// Model of one product with its evaluation
#[derive(Debug, Clone)]
pub struct ProductModel {
    pub model: RandomForest,
    pub rmse: Option<f64>,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Output of a full training run
#[derive(Debug, Clone)]
pub struct TrainedModels {
    pub registry: ModelRegistry,
    pub rmse: RmseMap,
    pub report: TrainingReport,
}

/// Fits one forest per product
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    config: TrainingConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Number of leading rows used for fitting; always at least one
    pub fn split_index(&self, n_rows: usize) -> usize {
        let idx = (n_rows as f64 * self.config.train_ratio).floor() as usize;
        idx.clamp(1, n_rows.max(1))
    }

    /// Train and score the model of one product.
    ///
    /// Fails with `InsufficientHistory` when the product has fewer weeks
    /// than one lag row needs, and with `TrainingFailure` when fitting or
    /// scoring fails.
    pub fn train_product(
        &self,
        product_id: &ProductId,
        points: &[WeeklySeriesPoint],
    ) -> Result<ProductModel> {
        if points.len() < MIN_HISTORY_WEEKS {
            return Err(ForecastError::InsufficientHistory {
                product_id: product_id.to_string(),
                weeks: points.len(),
            });
        }

        let failure = |e: ForecastError| ForecastError::TrainingFailure {
            product_id: product_id.to_string(),
            reason: e.to_string(),
        };

        let matrix = FeatureBuilder::build(points);
        let features = matrix.features();
        let targets = matrix.targets();
        let split = self.split_index(matrix.len());

        let model = self
            .config
            .forest
            .fit(&features[..split], &targets[..split])
            .map_err(failure)?;

        let (test_x, test_y) = (&features[split..], &targets[split..]);
        let rmse = if test_x.is_empty() {
            None
        } else {
            let predictions = model.predict(test_x).map_err(failure)?;
            let rmse = root_mean_squared_error(test_y, &predictions)
                .map_err(|e| failure(e.into()))?;
            Some(rmse)
        };

        Ok(ProductModel {
            model,
            rmse,
            train_rows: split,
            test_rows: test_x.len(),
        })
    }

    /// Train every product of the series into a fresh registry.
    ///
    /// Skipped and failed products are recorded in the report and do not
    /// stop the run. A run where every product was skipped yields an empty
    /// registry. The run fails when products failed and none was trained,
    /// or when `abort_on_product_failure` is set and any product failed.
    pub fn train_all(&self, series: &WeeklySeries) -> Result<TrainedModels> {
        let products = series.by_product();
        if products.is_empty() {
            return Err(ForecastError::BatchFailed(
                "Weekly series has no products".to_string(),
            ));
        }

        let train = |(product_id, points): &(&ProductId, &[WeeklySeriesPoint])| {
            ((*product_id).clone(), self.train_product(product_id, points))
        };
        let results: Vec<(ProductId, Result<ProductModel>)> = if self.config.parallel {
            products.par_iter().map(train).collect()
        } else {
            products.iter().map(train).collect()
        };

        let mut registry = ModelRegistry::new();
        let mut rmse = RmseMap::new();
        let mut report = TrainingReport::default();

        for (product_id, result) in results {
            let outcome = match result {
                Ok(trained) => {
                    debug!(
                        product = %product_id,
                        rmse = ?trained.rmse,
                        train_rows = trained.train_rows,
                        test_rows = trained.test_rows,
                        "Trained product model"
                    );
                    if let Some(value) = trained.rmse {
                        rmse.insert(product_id.clone(), value);
                    }
                    registry.insert(product_id.clone(), trained.model);
                    ProductOutcome::Trained {
                        rmse: trained.rmse,
                        train_rows: trained.train_rows,
                        test_rows: trained.test_rows,
                    }
                }
                Err(ForecastError::InsufficientHistory { weeks, .. }) => {
                    debug!(product = %product_id, weeks, "Skipped product with short history");
                    ProductOutcome::Skipped { weeks }
                }
                Err(e) => {
                    warn!(product = %product_id, error = %e, "Product training failed");
                    ProductOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            report.outcomes.insert(product_id, outcome);
        }

        info!(
            trained = report.trained_count(),
            skipped = report.skipped_count(),
            failed = report.failed_count(),
            "Finished training run"
        );

        if self.config.abort_on_product_failure && report.failed_count() > 0 {
            let names: Vec<String> = report
                .failures()
                .iter()
                .map(|(id, _)| id.to_string())
                .collect();
            return Err(ForecastError::BatchFailed(format!(
                "Training failed for {}",
                names.join(", ")
            )));
        }
        if registry.is_empty() && report.failed_count() > 0 {
            return Err(ForecastError::BatchFailed(format!(
                "No product could be trained ({} skipped, {} failed)",
                report.skipped_count(),
                report.failed_count()
            )));
        }
        if registry.is_empty() {
            warn!(
                skipped = report.skipped_count(),
                "No product has enough history for a model"
            );
        }

        Ok(TrainedModels {
            registry,
            rmse,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;

    #[test]
    fn test_split_index() {
        let trainer = ModelTrainer::new(TrainingConfig::default()).unwrap();
        assert_eq!(trainer.split_index(1), 1);
        assert_eq!(trainer.split_index(2), 1);
        assert_eq!(trainer.split_index(10), 8);
        assert_eq!(trainer.split_index(16), 12);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = TrainingConfig {
            train_ratio: 1.5,
            ..Default::default()
        };
        assert!(ModelTrainer::new(config).is_err());
    }
}
