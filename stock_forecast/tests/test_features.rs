mod common;

use approx::assert_relative_eq;
use common::{product, series, weekly_records};
use rstest::rstest;
use stock_forecast::features::{LAG_COUNT, MIN_HISTORY_WEEKS};
use stock_forecast::{FeatureBuilder, LagWindow, TimeSeriesAggregator};

#[test]
fn test_five_weeks_give_one_row() {
    let records = weekly_records("111", &vec![10.0, 0.0, 20.0, 30.0, 40.0]);
    let output = TimeSeriesAggregator::default().aggregate(&records).unwrap();
    let points = output.series.product(&product("111")).unwrap();

    let matrix = FeatureBuilder::build(points);
    assert_eq!(matrix.len(), 1);

    let row = &matrix.rows()[0];
    let lags = output.scaler.inverse_transform_all(&row.lags);
    let expected = [30.0, 20.0, 0.0, 10.0];
    for (lag, want) in lags.iter().zip(expected) {
        assert_relative_eq!(*lag, want, epsilon = 1e-9);
    }
    assert_relative_eq!(output.scaler.inverse_transform(row.target), 40.0, epsilon = 1e-9);
    assert_eq!(row.week_start, points[4].week_start);
}

#[rstest]
#[case(0, 0)]
#[case(3, 0)]
#[case(4, 0)]
#[case(5, 1)]
#[case(12, 8)]
fn test_row_count(#[case] weeks: usize, #[case] rows: usize) {
    let values: Vec<f64> = (0..weeks).map(|i| i as f64).collect();
    let data = series(&[("111", values.clone())]);
    let points = data.product(&product("111")).unwrap_or(&[]);

    assert_eq!(FeatureBuilder::build(points).len(), rows);
}

#[test]
fn test_every_row_references_the_previous_four_weeks() {
    let values: Vec<f64> = (0..10).map(|i| (i * i) as f64).collect();
    let data = series(&[("111", values.clone())]);
    let matrix = FeatureBuilder::build(data.product(&product("111")).unwrap());

    for (offset, row) in matrix.rows().iter().enumerate() {
        let i = offset + LAG_COUNT;
        assert_eq!(row.target, values[i]);
        for k in 1..=LAG_COUNT {
            assert_eq!(row.lags[k - 1], values[i - k]);
        }
    }

    assert_eq!(matrix.features().len(), matrix.targets().len());
    assert!(matrix.features().iter().all(|f| f.len() == LAG_COUNT));
}

#[test]
fn test_window_shift_keeps_chain_intact() {
    let mut window = LagWindow::from_tail(&[1.0, 2.0, 3.0, 4.0]).unwrap();
    assert_eq!(window.lags(), &[4.0, 3.0, 2.0, 1.0]);

    for next in [5.0, 6.0, 7.0, 8.0] {
        let before = *window.lags();
        window.push(next);
        assert_eq!(window.lag(1), Some(next));
        assert_eq!(window.lag(2), Some(before[0]));
        assert_eq!(window.lag(3), Some(before[1]));
        assert_eq!(window.lag(4), Some(before[2]));
    }
    assert_eq!(window.lags(), &[8.0, 7.0, 6.0, 5.0]);
}

#[test]
fn test_minimum_history() {
    assert_eq!(MIN_HISTORY_WEEKS, 5);
}
