//! Fixtures shared by the integration tests
#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use std::io::Write;
use std::path::Path;
use stock_forecast::{
    PipelineConfig, ProductId, TransactionRecord, WeekKey, WeekStart, WeeklySeries,
    WeeklySeriesPoint,
};
use tempfile::NamedTempFile;

pub const HEADER: &str = "product_id,quantity,creation_timestamp";

/// A Sunday, so every `first_sunday() + n weeks` starts a Sunday bucket
pub fn first_sunday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 7).unwrap()
}

pub fn product(id: &str) -> ProductId {
    id.parse().unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn record(id: &str, date: NaiveDate, quantity: f64) -> TransactionRecord {
    TransactionRecord::new(product(id), date, quantity).unwrap()
}

/// One record per week, on the Wednesday of each week
pub fn weekly_records(id: &str, weekly: &[f64]) -> Vec<TransactionRecord> {
    weekly
        .iter()
        .enumerate()
        .map(|(i, &q)| record(id, first_sunday() + Duration::weeks(i as i64) + Duration::days(3), q))
        .collect()
}

/// Export-style CSV lines for `weekly_records`
pub fn weekly_rows(id: &str, weekly: &[f64]) -> Vec<String> {
    weekly_records(id, weekly)
        .iter()
        .map(|r| {
            format!(
                "{},{},\"{}, 10:15 AM\"",
                id,
                r.quantity(),
                r.date().format("%b %d, %Y")
            )
        })
        .collect()
}

pub fn write_csv(lines: &[String]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file.flush().unwrap();
    file
}

/// Hand-built series in the scaled domain, weeks starting at `first_sunday`
pub fn series(products: &[(&str, Vec<f64>)]) -> WeeklySeries {
    let mut points = Vec::new();
    for (id, values) in products {
        for (i, &value) in values.iter().enumerate() {
            let week_start = first_sunday() + Duration::weeks(i as i64);
            points.push(WeeklySeriesPoint {
                product_id: product(id),
                week_key: WeekKey::for_date(week_start, WeekStart::Sunday),
                week_start,
                consumption: value,
            });
        }
    }
    WeeklySeries::from_points(points).unwrap()
}

/// Seasonal pattern that a forest can learn from four lags
pub fn seasonal(n: usize, base: f64) -> Vec<f64> {
    (0..n).map(|i| base + ((i % 4) as f64) * 2.0).collect()
}

/// Small, fast configuration rooted at `data_dir`
pub fn test_config(data_dir: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default().with_data_dir(data_dir);
    config.training.forest.n_trees = 10;
    config
}
