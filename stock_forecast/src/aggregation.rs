//! Weekly aggregation of raw transactions
//!
//! Turns irregular transaction records into the canonical weekly series:
//! one point per (product, week), where the set of weeks is the set observed
//! anywhere in the dataset and every product is densified over it with zero
//! consumption. Consumption is stored in the scaled domain of a single
//! `StandardScaler` fitted over all products combined.

use crate::calendar::{WeekKey, WeekStart};
use crate::config::AggregationConfig;
use crate::data::{ProductId, TransactionRecord};
use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use forecast_math::StandardScaler;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{Read, Write};
use tracing::info;

/// One row of the canonical weekly series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySeriesPoint {
    pub product_id: ProductId,
    pub week_key: WeekKey,
    pub week_start: NaiveDate,
    /// Weekly consumption in the scaled domain
    pub consumption: f64,
}

/// Canonical weekly series, ordered by (product, week start)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeeklySeries {
    points: Vec<WeeklySeriesPoint>,
}

impl WeeklySeries {
    /// Build a series from arbitrary-order points.
    ///
    /// Points are sorted by (product, week start). A product may not hold the
    /// same week twice.
    pub fn from_points(mut points: Vec<WeeklySeriesPoint>) -> Result<Self> {
        points.sort_by(|a, b| {
            a.product_id
                .cmp(&b.product_id)
                .then(a.week_start.cmp(&b.week_start))
        });

        for pair in points.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if a.product_id == b.product_id
                && (a.week_start == b.week_start || a.week_key == b.week_key)
            {
                return Err(ForecastError::ValidationError(format!(
                    "Product {} has week {} more than once",
                    a.product_id, a.week_key
                )));
            }
        }

        Ok(Self { points })
    }

    pub fn points(&self) -> &[WeeklySeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points of one product, in chronological order
    pub fn product(&self, product_id: &ProductId) -> Option<&[WeeklySeriesPoint]> {
        let start = self.points.partition_point(|p| p.product_id < *product_id);
        let end = self.points.partition_point(|p| p.product_id <= *product_id);
        if start == end {
            None
        } else {
            Some(&self.points[start..end])
        }
    }

    /// Every product with its points, in product order
    pub fn by_product(&self) -> Vec<(&ProductId, &[WeeklySeriesPoint])> {
        let mut groups = Vec::new();
        let mut start = 0;
        for end in 1..=self.points.len() {
            if end == self.points.len() || self.points[end].product_id != self.points[start].product_id
            {
                groups.push((&self.points[start].product_id, &self.points[start..end]));
                start = end;
            }
        }
        groups
    }

    pub fn product_ids(&self) -> Vec<&ProductId> {
        self.by_product().into_iter().map(|(id, _)| id).collect()
    }

    /// Distinct weeks across all products
    pub fn week_keys(&self) -> BTreeSet<&WeekKey> {
        self.points.iter().map(|p| &p.week_key).collect()
    }

    /// Check that every product covers exactly the same set of weeks
    pub fn check_coverage(&self) -> Result<()> {
        let all_weeks = self.week_keys();
        for (product_id, points) in self.by_product() {
            if points.len() != all_weeks.len() {
                return Err(ForecastError::ValidationError(format!(
                    "Product {} covers {} of {} weeks",
                    product_id,
                    points.len(),
                    all_weeks.len()
                )));
            }
        }
        Ok(())
    }

    /// Write the series as CSV (`product_id,week_key,week_start,consumption`)
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for point in &self.points {
            csv_writer.serialize(point)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Read a series written by `write_csv`
    pub fn read_csv<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let points = csv_reader
            .deserialize()
            .collect::<std::result::Result<Vec<WeeklySeriesPoint>, csv::Error>>()?;
        Self::from_points(points)
    }
}

/// Output of an aggregation run
#[derive(Debug, Clone)]
pub struct AggregatedSeries {
    pub series: WeeklySeries,
    /// Scaler fitted on the densified raw consumption
    pub scaler: StandardScaler,
}

/// Builds the canonical weekly series from transaction records
#[derive(Debug, Clone, Default)]
pub struct TimeSeriesAggregator {
    config: AggregationConfig,
}

impl TimeSeriesAggregator {
    pub fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    pub fn week_start(&self) -> WeekStart {
        self.config.week_start
    }

    /// Raw weekly consumption per product: quantities summed per week
    pub fn weekly_totals(
        &self,
        records: &[TransactionRecord],
    ) -> BTreeMap<ProductId, HashMap<WeekKey, f64>> {
        let week_start = self.config.week_start;
        let mut totals: BTreeMap<ProductId, HashMap<WeekKey, f64>> = BTreeMap::new();

        for record in records {
            let key = WeekKey::for_date(record.date(), week_start);
            *totals
                .entry(record.product_id().clone())
                .or_default()
                .entry(key)
                .or_insert(0.0) += record.quantity();
        }

        totals
    }

    /// Aggregate, densify and scale
    pub fn aggregate(&self, records: &[TransactionRecord]) -> Result<AggregatedSeries> {
        if records.is_empty() {
            return Err(ForecastError::DataError(
                "No transaction records to aggregate".to_string(),
            ));
        }

        let week_start = self.config.week_start;
        let totals = self.weekly_totals(records);

        // Global week calendar, in date order
        let observed: BTreeSet<&WeekKey> = totals.values().flat_map(|weeks| weeks.keys()).collect();
        let mut calendar = observed
            .into_iter()
            .map(|key| Ok((key, key.week_start(week_start)?)))
            .collect::<Result<Vec<(&WeekKey, NaiveDate)>>>()?;
        calendar.sort_by_key(|(_, date)| *date);

        let mut rows = Vec::with_capacity(totals.len() * calendar.len());
        let mut raw = Vec::with_capacity(totals.len() * calendar.len());
        for (product_id, weeks) in &totals {
            for (key, date) in &calendar {
                rows.push((product_id, *key, *date));
                raw.push(weeks.get(*key).copied().unwrap_or(0.0));
            }
        }

        let (scaler, scaled) = StandardScaler::fit_transform(&raw)?;

        let points = rows
            .into_iter()
            .zip(scaled)
            .map(|((product_id, key, date), consumption)| WeeklySeriesPoint {
                product_id: product_id.clone(),
                week_key: key.clone(),
                week_start: date,
                consumption,
            })
            .collect();
        let series = WeeklySeries::from_points(points)?;

        info!(
            products = totals.len(),
            weeks = calendar.len(),
            points = series.len(),
            mean = scaler.mean(),
            scale = scaler.scale(),
            "Aggregated weekly consumption"
        );

        Ok(AggregatedSeries { series, scaler })
    }
}
