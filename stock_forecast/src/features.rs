//! Lagged feature construction
//!
//! Row `i` of a product's design matrix has `Lag_1..Lag_4` equal to the
//! consumption of weeks `i-1..i-4` and the consumption of week `i` as the
//! target. The series must be contiguous and gap-free, which the aggregator
//! guarantees, so a positional shift is a calendar shift.

use crate::aggregation::WeeklySeriesPoint;
use chrono::NaiveDate;

/// Number of lag features per row
pub const LAG_COUNT: usize = 4;

/// Shortest history that yields at least one training row
pub const MIN_HISTORY_WEEKS: usize = LAG_COUNT + 1;

/// One training row
#[derive(Debug, Clone, PartialEq)]
pub struct LagRow {
    /// Week of the target value
    pub week_start: NaiveDate,
    /// `lags[0]` is `Lag_1`, the week immediately before
    pub lags: [f64; LAG_COUNT],
    pub target: f64,
}

/// Design matrix of one product, in chronological order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
    rows: Vec<LagRow>,
}

impl FeatureMatrix {
    pub fn rows(&self) -> &[LagRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Feature vectors, `[Lag_1, Lag_2, Lag_3, Lag_4]` per row
    pub fn features(&self) -> Vec<Vec<f64>> {
        self.rows.iter().map(|row| row.lags.to_vec()).collect()
    }

    pub fn targets(&self) -> Vec<f64> {
        self.rows.iter().map(|row| row.target).collect()
    }
}

/// Sliding window of the four most recent values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LagWindow {
    lags: [f64; LAG_COUNT],
}

impl LagWindow {
    /// Window from `[Lag_1, Lag_2, Lag_3, Lag_4]`
    pub fn new(lags: [f64; LAG_COUNT]) -> Self {
        Self { lags }
    }

    /// Window ending at the last value of `values`, `None` when fewer than
    /// four values are available
    pub fn from_tail(values: &[f64]) -> Option<Self> {
        if values.len() < LAG_COUNT {
            return None;
        }
        let mut lags = [0.0; LAG_COUNT];
        for (k, lag) in lags.iter_mut().enumerate() {
            *lag = values[values.len() - 1 - k];
        }
        Some(Self { lags })
    }

    pub fn lags(&self) -> &[f64; LAG_COUNT] {
        &self.lags
    }

    /// `Lag_k`, 1-based
    pub fn lag(&self, k: usize) -> Option<f64> {
        k.checked_sub(1).and_then(|idx| self.lags.get(idx)).copied()
    }

    /// Advance one week: every lag moves back one slot and `value`
    /// becomes `Lag_1`.
    pub fn push(&mut self, value: f64) {
        self.lags[3] = self.lags[2];
        self.lags[2] = self.lags[1];
        self.lags[1] = self.lags[0];
        self.lags[0] = value;
    }
}

/// Builds lag features from a product's weekly series
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureBuilder;

impl FeatureBuilder {
    /// Lag rows over raw values. The first four values have no complete lag
    /// history and produce no row.
    pub fn from_values(values: &[f64], weeks: &[NaiveDate]) -> FeatureMatrix {
        let n = values.len().min(weeks.len());
        if n < MIN_HISTORY_WEEKS {
            return FeatureMatrix::default();
        }

        let rows = (LAG_COUNT..n)
            .filter_map(|i| {
                LagWindow::from_tail(&values[..i]).map(|window| LagRow {
                    week_start: weeks[i],
                    lags: window.lags,
                    target: values[i],
                })
            })
            .collect();

        FeatureMatrix { rows }
    }

    /// Lag rows of one product's ordered series
    pub fn build(points: &[WeeklySeriesPoint]) -> FeatureMatrix {
        let values: Vec<f64> = points.iter().map(|p| p.consumption).collect();
        let weeks: Vec<NaiveDate> = points.iter().map(|p| p.week_start).collect();
        Self::from_values(&values, &weeks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weeks(n: usize) -> Vec<NaiveDate> {
        let first = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        (0..n)
            .map(|i| first + chrono::Duration::weeks(i as i64))
            .collect()
    }

    #[test]
    fn test_lag_row_layout() {
        let values = [10.0, 0.0, 20.0, 30.0, 40.0];
        let matrix = FeatureBuilder::from_values(&values, &weeks(5));

        assert_eq!(matrix.len(), 1);
        let row = &matrix.rows()[0];
        assert_eq!(row.lags, [30.0, 20.0, 0.0, 10.0]);
        assert_eq!(row.target, 40.0);
        assert_eq!(row.week_start, weeks(5)[4]);
    }

    #[test]
    fn test_short_history_has_no_rows() {
        let matrix = FeatureBuilder::from_values(&[1.0, 2.0, 3.0, 4.0], &weeks(4));
        assert!(matrix.is_empty());
    }

    #[test]
    fn test_window_push_shifts_every_slot() {
        let mut window = LagWindow::new([4.0, 3.0, 2.0, 1.0]);
        window.push(5.0);
        assert_eq!(window.lags(), &[5.0, 4.0, 3.0, 2.0]);
        window.push(6.0);
        assert_eq!(window.lags(), &[6.0, 5.0, 4.0, 3.0]);
    }

    #[test]
    fn test_window_from_tail() {
        let window = LagWindow::from_tail(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(window.lag(1), Some(5.0));
        assert_eq!(window.lag(4), Some(2.0));
        assert_eq!(window.lag(0), None);
        assert_eq!(window.lag(5), None);
        assert!(LagWindow::from_tail(&[1.0, 2.0, 3.0]).is_none());
    }
}
