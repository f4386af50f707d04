//! Raw transaction ingestion
//!
//! Reads a transaction export into `TransactionRecord`s. Rows that cannot be
//! used (unparsable timestamp, missing product id, invalid quantity) are
//! dropped and reported in the `IngestReport`, never silently.

use crate::config::ColumnNames;
use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

/// Product identifier (EAN)
///
/// Identifiers are compared as normalised text. Numeric ids that were
/// exported as floats (`5901234123457.0`) normalise to their integer form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Normalise a raw identifier; `None` when nothing usable remains
    pub fn normalize(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let Some((int_part, frac_part)) = trimmed.split_once('.') {
            let is_integral = !int_part.is_empty()
                && int_part.chars().all(|c| c.is_ascii_digit())
                && !frac_part.is_empty()
                && frac_part.chars().all(|c| c == '0');
            if is_integral {
                return Some(ProductId(int_part.to_string()));
            }
        }

        Some(ProductId(trimmed.to_string()))
    }

    fn from_float(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        if value.fract() == 0.0 && value.abs() < 1e16 {
            Some(ProductId(format!("{:.0}", value)))
        } else {
            Self::normalize(&value.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProductId {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        ProductId::normalize(s).ok_or_else(|| {
            ForecastError::InvalidParameter("Product id must not be empty".to_string())
        })
    }
}

/// One consumption event from the raw export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    product_id: ProductId,
    date: NaiveDate,
    quantity: f64,
}

impl TransactionRecord {
    /// Create a record; the quantity must be finite and non-negative
    pub fn new(product_id: ProductId, date: NaiveDate, quantity: f64) -> Result<Self> {
        if !quantity.is_finite() || quantity < 0.0 {
            return Err(ForecastError::ValidationError(format!(
                "Quantity must be a non-negative number, got {}",
                quantity
            )));
        }

        Ok(Self {
            product_id,
            date,
            quantity,
        })
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    /// Calendar date of the transaction
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }
}

/// Parse the free-text creation timestamp of an export row.
///
/// Accepts `<Month> <day>, <year>` with an abbreviated or full English month
/// name, followed by anything (usually a time of day), and ISO `yyyy-mm-dd`.
pub fn parse_transaction_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    NaiveDate::parse_and_remainder(text, "%B %d, %Y")
        .or_else(|_| NaiveDate::parse_and_remainder(text, "%Y-%m-%d"))
        .ok()
        .map(|(date, _)| date)
}

/// Outcome of reading a raw export
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Data rows in the file
    pub total_rows: usize,
    /// Rows turned into records
    pub accepted: usize,
    /// Rejected rows, always `ForecastError::MalformedRecord`
    pub malformed: Vec<ForecastError>,
}

impl IngestReport {
    pub fn malformed_count(&self) -> usize {
        self.malformed.len()
    }
}

/// Data loader for raw transaction exports
#[derive(Debug)]
pub struct TransactionLoader;

impl TransactionLoader {
    /// Load transactions from a CSV file
    pub fn from_csv<P: AsRef<Path>>(
        path: P,
        columns: &ColumnNames,
    ) -> Result<(Vec<TransactionRecord>, IngestReport)> {
        let file = File::open(path.as_ref())?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        info!(
            path = %path.as_ref().display(),
            rows = df.height(),
            "Read raw transaction export"
        );

        Self::from_dataframe(&df, columns)
    }

    /// Extract transactions from an existing DataFrame
    pub fn from_dataframe(
        df: &DataFrame,
        columns: &ColumnNames,
    ) -> Result<(Vec<TransactionRecord>, IngestReport)> {
        let product_column = Self::resolve_column(df, &columns.product_id, &["ean", "product"])?;
        let quantity_column = Self::resolve_column(df, &columns.quantity, &["quant", "qty"])?;
        let timestamp_column =
            Self::resolve_column(df, &columns.timestamp, &["date", "time", "created"])?;

        let product_ids = Self::product_ids(df.column(&product_column)?)?;
        let quantities = Self::quantities(df.column(&quantity_column)?)?;
        let timestamps = Self::text_values(df.column(&timestamp_column)?)?;

        let mut report = IngestReport {
            total_rows: df.height(),
            ..Default::default()
        };
        let mut records = Vec::with_capacity(df.height());

        for (idx, ((product_id, quantity), timestamp)) in product_ids
            .into_iter()
            .zip(quantities)
            .zip(timestamps)
            .enumerate()
        {
            // 1-based data row, header excluded
            let row = idx + 1;
            match Self::build_record(product_id, quantity, timestamp.as_deref()) {
                Ok(record) => records.push(record),
                Err(reason) => report
                    .malformed
                    .push(ForecastError::MalformedRecord { row, reason }),
            }
        }

        report.accepted = records.len();
        if !report.malformed.is_empty() {
            warn!(
                dropped = report.malformed_count(),
                total = report.total_rows,
                "Dropped malformed transaction rows"
            );
        }

        Ok((records, report))
    }

    fn build_record(
        product_id: Option<ProductId>,
        quantity: Option<f64>,
        timestamp: Option<&str>,
    ) -> std::result::Result<TransactionRecord, String> {
        let product_id = product_id.ok_or_else(|| "missing product id".to_string())?;
        let raw_timestamp = timestamp.unwrap_or_default();
        let date = parse_transaction_date(raw_timestamp)
            .ok_or_else(|| format!("unparsable timestamp '{}'", raw_timestamp))?;
        let quantity = quantity.ok_or_else(|| "missing quantity".to_string())?;

        TransactionRecord::new(product_id, date, quantity).map_err(|e| e.to_string())
    }

    /// Find a configured column, falling back to name detection
    fn resolve_column(df: &DataFrame, preferred: &str, hints: &[&str]) -> Result<String> {
        let column_names = df.get_column_names();

        if let Some(name) = column_names
            .iter()
            .find(|name| name.eq_ignore_ascii_case(preferred))
        {
            return Ok(name.to_string());
        }

        for name in &column_names {
            let lower_name = name.to_lowercase();
            if hints.iter().any(|hint| lower_name.contains(hint)) {
                return Ok(name.to_string());
            }
        }

        Err(ForecastError::DataError(format!(
            "Column '{}' not found in data (columns: {})",
            preferred,
            column_names.join(", ")
        )))
    }

    fn product_ids(col: &Series) -> Result<Vec<Option<ProductId>>> {
        match col.dtype() {
            DataType::Float32 | DataType::Float64 => {
                let cast = col.cast(&DataType::Float64)?;
                let values = cast
                    .f64()?
                    .into_iter()
                    .map(|v| v.and_then(ProductId::from_float))
                    .collect();
                Ok(values)
            }
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => {
                let cast = col.cast(&DataType::Int64)?;
                let values = cast
                    .i64()?
                    .into_iter()
                    .map(|v| v.and_then(|id| ProductId::normalize(&id.to_string())))
                    .collect();
                Ok(values)
            }
            _ => Ok(Self::text_values(col)?
                .into_iter()
                .map(|v| v.and_then(|text| ProductId::normalize(&text)))
                .collect()),
        }
    }

    fn quantities(col: &Series) -> Result<Vec<Option<f64>>> {
        let cast = match col.dtype() {
            DataType::Utf8 => {
                // Text quantities ("12", "3.5"); unparsable cells become missing
                let values: Vec<Option<f64>> = col
                    .utf8()?
                    .into_iter()
                    .map(|v| v.and_then(|text| text.trim().parse::<f64>().ok()))
                    .collect();
                return Ok(values);
            }
            _ => col.cast(&DataType::Float64)?,
        };

        Ok(cast.f64()?.into_iter().collect())
    }

    fn text_values(col: &Series) -> Result<Vec<Option<String>>> {
        let cast = col.cast(&DataType::Utf8)?;
        let values = cast
            .utf8()?
            .into_iter()
            .map(|v| v.map(|text| text.to_string()))
            .collect();
        Ok(values)
    }
}
