mod common;

use common::{product, seasonal, series, test_config, weekly_rows, write_csv};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use std::thread;
use stock_forecast::{
    BatchPipeline, ForecastError, Forecaster, PipelineStage, ProductOutcome, StandardScaler,
    WeeklySeries,
};
use tempfile::tempdir;

fn raw_export() -> tempfile::NamedTempFile {
    let mut lines = weekly_rows("111", &seasonal(20, 1.0));
    lines.extend(weekly_rows("222", &seasonal(20, 5.0)));
    lines.push("333,1,\"not a timestamp\"".to_string());
    write_csv(&lines)
}

#[test]
fn test_full_run() {
    let dir = tempdir().unwrap();
    let raw = raw_export();
    let pipeline = BatchPipeline::new(test_config(dir.path())).unwrap();

    let report = pipeline.run(raw.path()).unwrap();

    let ingest = report.ingest.as_ref().unwrap();
    assert_eq!(ingest.accepted, 40);
    assert_eq!(ingest.malformed_count(), 1);
    assert_eq!(report.manifest.products, 2);
    assert_eq!(report.manifest.weeks, 20);
    assert_eq!(report.training.trained_count(), 2);
    assert_eq!(report.rmse.len(), 2);

    // Persisted and live
    let store_manifest = pipeline.store().load_manifest().unwrap();
    assert_eq!(store_manifest, report.manifest);
    assert!(pipeline.artifacts().is_ready());

    let forecaster = Forecaster::new(pipeline.config().forecast.clone()).unwrap();
    let result = forecaster
        .forecast_latest(&product("111"), &pipeline.artifacts())
        .unwrap()
        .found()
        .unwrap();
    assert_eq!(result.forecast.len(), 4);
    assert_eq!(result.history.len(), 20);
    assert!(result.forecast.iter().all(|p| (0..=10).contains(&p.units)));

    let unknown = forecaster
        .forecast_latest(&product("999"), &pipeline.artifacts())
        .unwrap();
    assert!(unknown.is_not_found());
}

#[test]
fn test_new_pipeline_picks_up_committed_artifacts() {
    let dir = tempdir().unwrap();
    let raw = raw_export();
    let report = BatchPipeline::new(test_config(dir.path()))
        .unwrap()
        .run(raw.path())
        .unwrap();

    let reopened = BatchPipeline::new(test_config(dir.path())).unwrap();
    let live = reopened.artifacts().current().unwrap();
    assert_eq!(live.manifest.generation, report.manifest.generation);
    assert_eq!(live.registry.len(), 2);
}

#[test]
fn test_failed_training_keeps_previous_registry() {
    let dir = tempdir().unwrap();
    let raw = raw_export();
    let mut config = test_config(dir.path());
    config.training.abort_on_product_failure = true;
    let pipeline = BatchPipeline::new(config).unwrap();

    let first = pipeline.run(raw.path()).unwrap();
    let forecaster = Forecaster::default();
    let before = forecaster
        .forecast_latest(&product("111"), &pipeline.artifacts())
        .unwrap()
        .found()
        .unwrap();

    // Product 222 cannot be fitted
    let mut broken = seasonal(20, 5.0);
    broken[10] = f64::NAN;
    let data = series(&[("111", seasonal(20, 1.0)), ("222", broken)]);
    let scaler = StandardScaler::new(0.0, 1.0).unwrap();

    let result = pipeline.commit_series(data, scaler, None, |_| {});
    assert!(matches!(result, Err(ForecastError::BatchFailed(_))));

    // Disk and memory still hold the first generation
    assert_eq!(
        pipeline.store().current_generation().unwrap(),
        Some(first.manifest.generation.clone())
    );
    let live = pipeline.artifacts().current().unwrap();
    assert_eq!(live.manifest.generation, first.manifest.generation);

    let after = forecaster
        .forecast_latest(&product("111"), &pipeline.artifacts())
        .unwrap()
        .found()
        .unwrap();
    assert_eq!(after, before);
}

#[test]
fn test_failed_product_is_reported_without_abort() {
    let dir = tempdir().unwrap();
    let pipeline = BatchPipeline::new(test_config(dir.path())).unwrap();

    let mut broken = seasonal(20, 5.0);
    broken[10] = f64::NAN;
    let data = series(&[("111", seasonal(20, 1.0)), ("222", broken)]);
    let scaler = StandardScaler::new(0.0, 1.0).unwrap();

    let report = pipeline.commit_series(data, scaler, None, |_| {}).unwrap();

    assert_eq!(report.manifest.failed, 1);
    assert!(matches!(
        report.training.outcomes[&product("222")],
        ProductOutcome::Failed { .. }
    ));
    let live = pipeline.artifacts().current().unwrap();
    assert!(live.registry.contains(&product("111")));
    assert!(!live.registry.contains(&product("222")));
}

#[test]
fn test_unusable_export_leaves_artifacts_untouched() {
    let dir = tempdir().unwrap();
    let pipeline = BatchPipeline::new(test_config(dir.path())).unwrap();
    let first = pipeline.run(raw_export().path()).unwrap();

    let garbage = write_csv(&["111,1,\"never\"".to_string(), "222,2,\"\"".to_string()]);
    let result = pipeline.run(garbage.path());

    assert!(matches!(result, Err(ForecastError::BatchFailed(_))));
    assert_eq!(
        pipeline.store().load_manifest().unwrap().generation,
        first.manifest.generation
    );
}

#[test]
fn test_background_job_reports_stages() {
    let dir = tempdir().unwrap();
    let raw = raw_export();
    let pipeline = BatchPipeline::new(test_config(dir.path())).unwrap();

    let stages = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&stages);
    let job = pipeline
        .spawn(raw.path().to_path_buf(), move |stage| {
            sink.lock().unwrap().push(stage)
        })
        .unwrap();
    let report = job.join().unwrap();

    assert_eq!(
        *stages.lock().unwrap(),
        vec![
            PipelineStage::Ingesting,
            PipelineStage::Aggregating,
            PipelineStage::Training,
            PipelineStage::Persisting,
            PipelineStage::Done,
        ]
    );
    assert!(pipeline.artifacts().is_ready());
    assert_eq!(
        pipeline.artifacts().current().unwrap().manifest.generation,
        report.manifest.generation
    );
}

#[test]
fn test_retrain_from_persisted_series() {
    let dir = tempdir().unwrap();
    let pipeline = BatchPipeline::new(test_config(dir.path())).unwrap();

    let err = pipeline.retrain().unwrap_err();
    assert!(err.is_not_ready());

    let raw = raw_export();
    let first = pipeline.run(raw.path()).unwrap();
    let second = pipeline.retrain().unwrap();

    assert_ne!(second.manifest.generation, first.manifest.generation);
    assert_eq!(second.manifest.source_file, first.manifest.source_file);
    assert_eq!(second.manifest.weeks, 20);
    assert!(second.ingest.is_none());
    // Same data, same seed
    assert_eq!(second.rmse, first.rmse);
}

#[test]
fn test_short_export_commits_empty_registry() {
    let dir = tempdir().unwrap();
    let mut lines = weekly_rows("111", &[4.0, 2.0, 6.0]);
    lines.extend(weekly_rows("222", &[1.0, 0.0, 3.0]));
    let raw = write_csv(&lines);
    let pipeline = BatchPipeline::new(test_config(dir.path())).unwrap();

    let report = pipeline.run(raw.path()).unwrap();

    assert_eq!(report.manifest.products, 2);
    assert_eq!(report.manifest.weeks, 3);
    assert_eq!(report.manifest.trained, 0);
    assert_eq!(report.training.skipped_count(), 2);
    assert!(report.rmse.is_empty());

    let forecaster = Forecaster::default();
    let outcome = forecaster
        .forecast_latest(&product("111"), &pipeline.artifacts())
        .unwrap();
    assert!(outcome.is_not_found());

    // A fresh process sees the same committed generation
    let reopened = BatchPipeline::new(test_config(dir.path())).unwrap();
    let outcome = forecaster
        .forecast_latest(&product("222"), &reopened.artifacts())
        .unwrap();
    assert!(outcome.is_not_found());
}

#[test]
fn test_concurrent_commits_leave_consistent_store() {
    let dir = tempdir().unwrap();
    let pipeline = BatchPipeline::new(test_config(dir.path())).unwrap();
    let data: WeeklySeries = series(&[("111", seasonal(12, 1.0))]);
    let scaler = StandardScaler::new(0.0, 1.0).unwrap();

    for _ in 0..10 {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let pipeline = pipeline.clone();
                let data = data.clone();
                thread::spawn(move || pipeline.commit_series(data, scaler, None, |_| {}))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        let on_disk = pipeline.store().load().unwrap();
        let live = pipeline.artifacts().current().unwrap();
        assert_eq!(on_disk.manifest.generation, live.manifest.generation);
        assert!(on_disk.registry.contains(&product("111")));
    }
}
