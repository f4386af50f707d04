//! Batch pipeline: ingest, aggregate, train, persist, swap
//!
//! A run either commits a complete new artifact generation and swaps it
//! into the shared handle, or fails with a single `BatchFailed` error and
//! leaves the previous generation in place, on disk and in memory.
//! Commits from pipelines sharing one artifact handle never overlap.

use crate::aggregation::{TimeSeriesAggregator, WeeklySeries};
use crate::artifacts::{ArtifactManifest, ArtifactSet, ArtifactStore, SharedArtifacts};
use crate::config::PipelineConfig;
use crate::data::{IngestReport, TransactionLoader};
use crate::error::{ForecastError, Result};
use crate::training::{ModelTrainer, RmseMap, TrainingReport};
use forecast_math::StandardScaler;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info, instrument, warn};

/// Progress notifications of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Ingesting,
    Aggregating,
    Training,
    Persisting,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PipelineStage::Ingesting => "Reading transactions",
            PipelineStage::Aggregating => "Preprocessing dataset",
            PipelineStage::Training => "Training models",
            PipelineStage::Persisting => "Saving artifacts",
            PipelineStage::Done => "Done",
        };
        f.write_str(text)
    }
}

/// Outcome of a successful run
#[derive(Debug)]
pub struct PipelineReport {
    pub manifest: ArtifactManifest,
    /// Present when the run read a raw export
    pub ingest: Option<IngestReport>,
    pub training: TrainingReport,
    pub rmse: RmseMap,
}

/// Runs the batch pipeline against one data directory
#[derive(Debug, Clone)]
pub struct BatchPipeline {
    config: PipelineConfig,
    store: ArtifactStore,
    artifacts: Arc<SharedArtifacts>,
}

impl BatchPipeline {
    /// Pipeline over `config.data_dir`, loading the live generation if
    /// there is one
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let store = ArtifactStore::new(config.data_dir.clone());
        let artifacts = match SharedArtifacts::open(&store) {
            Ok(artifacts) => artifacts,
            Err(e) if e.is_not_ready() => {
                warn!(error = %e, "Ignoring unreadable artifacts");
                SharedArtifacts::new()
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            config,
            store,
            artifacts: Arc::new(artifacts),
        })
    }

    /// Pipeline that swaps results into an existing shared handle
    pub fn with_artifacts(config: PipelineConfig, artifacts: Arc<SharedArtifacts>) -> Result<Self> {
        config.validate()?;
        let store = ArtifactStore::new(config.data_dir.clone());
        Ok(Self {
            config,
            store,
            artifacts,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Handle readers use to see the live artifacts
    pub fn artifacts(&self) -> Arc<SharedArtifacts> {
        Arc::clone(&self.artifacts)
    }

    /// Full run over a raw transaction export
    pub fn run<P: AsRef<Path>>(&self, raw_path: P) -> Result<PipelineReport> {
        self.run_with_progress(raw_path.as_ref(), |_| {})
    }

    /// Full run, reporting each stage to `on_stage`
    #[instrument(skip(self, raw_path, on_stage), fields(path = %raw_path.display()))]
    pub fn run_with_progress<F>(&self, raw_path: &Path, mut on_stage: F) -> Result<PipelineReport>
    where
        F: FnMut(PipelineStage),
    {
        on_stage(PipelineStage::Ingesting);
        let (records, ingest) =
            TransactionLoader::from_csv(raw_path, &self.config.aggregation.columns)
                .map_err(|e| batch_failure(PipelineStage::Ingesting, e))?;
        info!(
            accepted = ingest.accepted,
            malformed = ingest.malformed_count(),
            "Loaded transactions"
        );
        if records.is_empty() {
            return Err(batch_failure(
                PipelineStage::Ingesting,
                ForecastError::DataError(format!(
                    "No usable transaction records in {}",
                    raw_path.display()
                )),
            ));
        }

        on_stage(PipelineStage::Aggregating);
        let aggregated = TimeSeriesAggregator::new(self.config.aggregation.clone())
            .aggregate(&records)
            .map_err(|e| batch_failure(PipelineStage::Aggregating, e))?;

        let source = raw_path.display().to_string();
        let mut report =
            self.commit_series(aggregated.series, aggregated.scaler, Some(source), on_stage)?;
        report.ingest = Some(ingest);
        Ok(report)
    }

    /// Retrain from the persisted series and scaler of the live generation.
    ///
    /// Fails with `MissingArtifact` when nothing has been committed yet.
    #[instrument(skip(self))]
    pub fn retrain(&self) -> Result<PipelineReport> {
        let live = self.store.load()?;
        self.commit_series(
            live.series,
            live.scaler,
            live.manifest.source_file,
            |_| {},
        )
    }

    /// Train on `series`, persist a new generation and swap it in
    pub fn commit_series<F>(
        &self,
        series: WeeklySeries,
        scaler: StandardScaler,
        source_file: Option<String>,
        mut on_stage: F,
    ) -> Result<PipelineReport>
    where
        F: FnMut(PipelineStage),
    {
        on_stage(PipelineStage::Training);
        let trained = ModelTrainer::new(self.config.training.clone())
            .and_then(|trainer| trainer.train_all(&series))
            .map_err(|e| batch_failure(PipelineStage::Training, e))?;

        on_stage(PipelineStage::Persisting);
        let mut manifest = ArtifactManifest::new(source_file);
        manifest.products = series.product_ids().len();
        manifest.weeks = series.week_keys().len();
        manifest.trained = trained.report.trained_count();
        manifest.skipped = trained.report.skipped_count();
        manifest.failed = trained.report.failed_count();

        let set = ArtifactSet {
            manifest: manifest.clone(),
            series,
            scaler,
            registry: trained.registry,
            rmse: trained.rmse.clone(),
        };
        {
            let _writer = self.artifacts.writer();
            self.store
                .commit(&set)
                .map_err(|e| batch_failure(PipelineStage::Persisting, e))?;
            self.artifacts.replace(set);
        }

        on_stage(PipelineStage::Done);
        info!(generation = %manifest.generation, "Pipeline run complete");

        Ok(PipelineReport {
            manifest,
            ingest: None,
            training: trained.report,
            rmse: trained.rmse,
        })
    }

    /// Run the full pipeline on a background thread
    pub fn spawn<F>(&self, raw_path: PathBuf, on_stage: F) -> Result<PipelineJob>
    where
        F: FnMut(PipelineStage) + Send + 'static,
    {
        let pipeline = self.clone();
        let handle = thread::Builder::new()
            .name("stockcast-pipeline".to_string())
            .spawn(move || pipeline.run_with_progress(&raw_path, on_stage))?;
        Ok(PipelineJob { handle })
    }
}

/// A pipeline run in progress on a background thread
#[derive(Debug)]
pub struct PipelineJob {
    handle: JoinHandle<Result<PipelineReport>>,
}

impl PipelineJob {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the run to finish
    pub fn join(self) -> Result<PipelineReport> {
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => Err(ForecastError::BatchFailed(
                "Pipeline thread panicked".to_string(),
            )),
        }
    }
}

fn batch_failure(stage: PipelineStage, err: ForecastError) -> ForecastError {
    error!(%stage, error = %err, "Pipeline run failed");
    match err {
        ForecastError::BatchFailed(_) => err,
        other => ForecastError::BatchFailed(format!("{}: {}", stage, other)),
    }
}
