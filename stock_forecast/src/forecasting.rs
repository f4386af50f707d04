//! Iterative multi-step forecasting
//!
//! The first step starts from the lags of the product's last training row.
//! Each step predicts the next scaled value from the current lag window,
//! then pushes the prediction into the window as `Lag_1`. Predictions are
//! inverse-scaled and rounded to whole units only at the end.

use crate::aggregation::{WeeklySeries, WeeklySeriesPoint};
use crate::artifacts::SharedArtifacts;
use crate::config::{ForecastConfig, SeedWindow};
use crate::data::ProductId;
use crate::error::{ForecastError, Result};
use crate::features::{FeatureBuilder, LagWindow};
use crate::models::TrainedRegressor;
use crate::training::ModelRegistry;
use chrono::{Duration, NaiveDate};
use forecast_math::StandardScaler;
use serde::{Deserialize, Serialize};

/// Predicted consumption for one future week
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub week_start: NaiveDate,
    pub units: i64,
}

/// Observed consumption for one past week, in raw units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub week_start: NaiveDate,
    pub consumption: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub product_id: ProductId,
    pub forecast: Vec<ForecastPoint>,
    /// Full unscaled history of the product
    pub history: Vec<HistoryPoint>,
}

/// Answer to a forecast query
#[derive(Debug, Clone, PartialEq)]
pub enum ForecastOutcome {
    Found(ForecastResult),
    /// No model exists for this product
    NotFound(ProductId),
}

impl ForecastOutcome {
    pub fn found(self) -> Option<ForecastResult> {
        match self {
            ForecastOutcome::Found(result) => Some(result),
            ForecastOutcome::NotFound(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ForecastOutcome::NotFound(_))
    }
}

/// Produces forecasts from trained models
#[derive(Debug, Clone, Default)]
pub struct Forecaster {
    config: ForecastConfig,
}

impl Forecaster {
    pub fn new(config: ForecastConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn horizon(&self) -> usize {
        self.config.horizon
    }

    /// Forecast a product from explicit artifacts
    pub fn forecast(
        &self,
        product_id: &ProductId,
        series: &WeeklySeries,
        registry: &ModelRegistry,
        scaler: &StandardScaler,
    ) -> Result<ForecastOutcome> {
        let Some(model) = registry.get(product_id) else {
            return Ok(ForecastOutcome::NotFound(product_id.clone()));
        };
        let points = series.product(product_id).ok_or_else(|| {
            ForecastError::ValidationError(format!(
                "Product {} has a model but no weekly series",
                product_id
            ))
        })?;

        self.forecast_with(product_id, points, model, scaler)
            .map(ForecastOutcome::Found)
    }

    /// Forecast a product from the live artifact generation.
    ///
    /// Fails with `MissingArtifact` while nothing has been loaded.
    pub fn forecast_latest(
        &self,
        product_id: &ProductId,
        artifacts: &SharedArtifacts,
    ) -> Result<ForecastOutcome> {
        let set = artifacts.current()?;
        self.forecast(product_id, &set.series, &set.registry, &set.scaler)
    }

    /// Forecast from one product's points with any fitted model
    pub fn forecast_with<R: TrainedRegressor + ?Sized>(
        &self,
        product_id: &ProductId,
        points: &[WeeklySeriesPoint],
        model: &R,
        scaler: &StandardScaler,
    ) -> Result<ForecastResult> {
        let (Some(window), Some(last)) = (self.seed_window(points), points.last()) else {
            return Err(ForecastError::InsufficientHistory {
                product_id: product_id.to_string(),
                weeks: points.len(),
            });
        };

        let forecast = self
            .predict_steps(model, window)?
            .into_iter()
            .enumerate()
            .map(|(i, scaled)| ForecastPoint {
                week_start: last.week_start + Duration::weeks(i as i64 + 1),
                units: self.to_units(scaler.inverse_transform(scaled)),
            })
            .collect();

        let history = points
            .iter()
            .map(|p| HistoryPoint {
                week_start: p.week_start,
                consumption: scaler.inverse_transform(p.consumption),
            })
            .collect();

        Ok(ForecastResult {
            product_id: product_id.clone(),
            forecast,
            history,
        })
    }

    /// Starting window for `points`, `None` when the history is too short
    pub fn seed_window(&self, points: &[WeeklySeriesPoint]) -> Option<LagWindow> {
        match self.config.seed {
            SeedWindow::LastLagRow => FeatureBuilder::build(points)
                .rows()
                .last()
                .map(|row| LagWindow::new(row.lags)),
            SeedWindow::LatestWeeks => {
                let values: Vec<f64> = points.iter().map(|p| p.consumption).collect();
                LagWindow::from_tail(&values)
            }
        }
    }

    /// Scaled predictions for `horizon` weeks following `window`
    pub fn predict_steps<R: TrainedRegressor + ?Sized>(
        &self,
        model: &R,
        mut window: LagWindow,
    ) -> Result<Vec<f64>> {
        let mut predictions = Vec::with_capacity(self.config.horizon);
        for step in 1..=self.config.horizon {
            let next = model.predict_one(window.lags())?;
            if !next.is_finite() {
                return Err(ForecastError::ValidationError(format!(
                    "Model produced a non-finite prediction at step {}",
                    step
                )));
            }
            predictions.push(next);
            window.push(next);
        }
        Ok(predictions)
    }

    fn to_units(&self, raw: f64) -> i64 {
        let rounded = raw.round();
        if self.config.clamp_negative {
            rounded.max(0.0) as i64
        } else {
            rounded as i64
        }
    }
}
