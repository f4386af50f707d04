mod common;

use common::{date, product, write_csv};
use pretty_assertions::assert_eq;
use stock_forecast::{ColumnNames, ForecastError, TransactionLoader};

fn lines(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_loader_reads_export() {
    let file = write_csv(&lines(&[
        "111,2,\"Jan 5, 2024, 10:42 AM\"",
        "111,3,\"January 6, 2024\"",
        "222,0,\"Feb 29, 2024, 08:00 PM\"",
    ]));

    let (records, report) = TransactionLoader::from_csv(file.path(), &ColumnNames::default()).unwrap();

    assert_eq!(report.total_rows, 3);
    assert_eq!(report.accepted, 3);
    assert_eq!(report.malformed_count(), 0);

    assert_eq!(records[0].product_id(), &product("111"));
    assert_eq!(records[0].date(), date(2024, 1, 5));
    assert_eq!(records[0].quantity(), 2.0);
    assert_eq!(records[1].date(), date(2024, 1, 6));
    assert_eq!(records[2].quantity(), 0.0);
}

#[test]
fn test_malformed_rows_are_reported() {
    let file = write_csv(&lines(&[
        "111,2,\"Jan 5, 2024\"",
        "111,3,\"Jan 6, 2024\"",
        ",1,\"Jan 7, 2024\"",
        "222,4,not a date",
        "222,-1,\"Jan 8, 2024\"",
    ]));

    let (records, report) = TransactionLoader::from_csv(file.path(), &ColumnNames::default()).unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(report.total_rows, 5);
    assert_eq!(report.accepted, 2);
    assert_eq!(report.malformed_count(), 3);

    let rows: Vec<usize> = report
        .malformed
        .iter()
        .map(|e| match e {
            ForecastError::MalformedRecord { row, .. } => *row,
            other => panic!("unexpected error {:?}", other),
        })
        .collect();
    assert_eq!(rows, vec![3, 4, 5]);
}

#[test]
fn test_float_product_ids_are_normalised() {
    let file = write_csv(&lines(&[
        "5901234123457.0,1,\"Mar 1, 2024\"",
        "4006381333931.0,2,\"Mar 2, 2024\"",
    ]));

    let (records, _) = TransactionLoader::from_csv(file.path(), &ColumnNames::default()).unwrap();

    assert_eq!(records[0].product_id(), &product("5901234123457"));
    assert_eq!(records[1].product_id(), &product("4006381333931"));
}

#[test]
fn test_columns_detected_by_name() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(
        &mut file,
        b"EAN,Quantity,Date\n111,4,\"Apr 1, 2024\"\n",
    )
    .unwrap();

    let (records, report) = TransactionLoader::from_csv(file.path(), &ColumnNames::default()).unwrap();

    assert_eq!(report.accepted, 1);
    assert_eq!(records[0].product_id(), &product("111"));
    assert_eq!(records[0].date(), date(2024, 4, 1));
}

#[test]
fn test_missing_columns_and_files() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(&mut file, b"foo,bar,baz\n1,2,3\n").unwrap();

    let result = TransactionLoader::from_csv(file.path(), &ColumnNames::default());
    assert!(matches!(result, Err(ForecastError::DataError(_))));

    let result = TransactionLoader::from_csv("nonexistent_file.csv", &ColumnNames::default());
    assert!(result.is_err());
}
