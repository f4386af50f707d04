//! Persisted artifacts and their atomic replacement
//!
//! A generation is a directory holding the weekly series, the scaler, the
//! model registry, the RMSE map and a manifest. `CURRENT` names the live
//! generation. A commit writes a complete new generation first and only
//! then swaps `CURRENT`, so a reader that resolves `CURRENT` once always
//! reads one complete generation.
//!
//! ```text
//! data_dir/
//!   CURRENT
//!   generations/
//!     20240301T101500123456-9f3c2a1b/
//!       weekly_consumption.csv
//!       scaler.json
//!       models.json
//!       rmse.json
//!       manifest.json
//! ```
//!
//! Generation ids start with a microsecond UTC timestamp, so they sort in
//! creation order.

use crate::aggregation::WeeklySeries;
use crate::error::{ForecastError, Result};
use crate::training::{ModelRegistry, RmseMap};
use chrono::{DateTime, Utc};
use forecast_math::StandardScaler;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

pub const CURRENT_FILE: &str = "CURRENT";
pub const GENERATIONS_DIR: &str = "generations";
pub const SERIES_FILE: &str = "weekly_consumption.csv";
pub const SCALER_FILE: &str = "scaler.json";
pub const MODELS_FILE: &str = "models.json";
pub const RMSE_FILE: &str = "rmse.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Layout version written into every manifest
pub const FORMAT_VERSION: u32 = 1;

/// Summary of one artifact generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub format_version: u32,
    pub generation: String,
    pub created_at: DateTime<Utc>,
    /// Raw export the series was built from, if any
    pub source_file: Option<String>,
    pub products: usize,
    pub weeks: usize,
    pub trained: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ArtifactManifest {
    /// Manifest for a new generation created now
    pub fn new(source_file: Option<String>) -> Self {
        let created_at = Utc::now();
        let generation = format!(
            "{}-{:08x}",
            created_at.format("%Y%m%dT%H%M%S%6f"),
            rand::random::<u32>()
        );

        Self {
            format_version: FORMAT_VERSION,
            generation,
            created_at,
            source_file,
            products: 0,
            weeks: 0,
            trained: 0,
            skipped: 0,
            failed: 0,
        }
    }
}

/// Everything a forecast needs, from one generation
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    pub manifest: ArtifactManifest,
    pub series: WeeklySeries,
    pub scaler: StandardScaler,
    pub registry: ModelRegistry,
    pub rmse: RmseMap,
}

/// On-disk artifact storage under a data directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn generations_dir(&self) -> PathBuf {
        self.root.join(GENERATIONS_DIR)
    }

    /// Directory of a generation
    pub fn generation_dir(&self, generation: &str) -> PathBuf {
        self.generations_dir().join(generation)
    }

    /// Name of the live generation, `None` before the first commit
    pub fn current_generation(&self) -> Result<Option<String>> {
        match fs::read_to_string(self.root.join(CURRENT_FILE)) {
            Ok(text) => {
                let name = text.trim();
                if name.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(name.to_string()))
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn live_dir(&self) -> Result<PathBuf> {
        let generation = self
            .current_generation()?
            .ok_or_else(|| ForecastError::MissingArtifact(self.root.join(CURRENT_FILE)))?;
        Ok(self.generation_dir(&generation))
    }

    /// Manifest of the live generation
    pub fn load_manifest(&self) -> Result<ArtifactManifest> {
        let dir = self.live_dir()?;
        read_json(&dir.join(MANIFEST_FILE))
    }

    /// Load the complete live generation
    pub fn load(&self) -> Result<ArtifactSet> {
        let dir = self.live_dir()?;

        let manifest: ArtifactManifest = read_json(&dir.join(MANIFEST_FILE))?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(ForecastError::ArtifactCorrupt {
                path: dir.join(MANIFEST_FILE),
                reason: format!("unsupported format version {}", manifest.format_version),
            });
        }

        let series_path = dir.join(SERIES_FILE);
        let series = open(&series_path)
            .and_then(|file| WeeklySeries::read_csv(BufReader::new(file)))
            .and_then(|series| series.check_coverage().map(|_| series))
            .map_err(|e| corrupt_unless_missing(&series_path, e))?;

        let set = ArtifactSet {
            manifest,
            series,
            scaler: read_json(&dir.join(SCALER_FILE))?,
            registry: read_json(&dir.join(MODELS_FILE))?,
            rmse: read_json(&dir.join(RMSE_FILE))?,
        };

        debug!(
            generation = %set.manifest.generation,
            models = set.registry.len(),
            "Loaded artifacts"
        );
        Ok(set)
    }

    /// Persist a new generation and make it live.
    ///
    /// On error the previous generation stays live and no partial
    /// generation is left behind.
    pub fn commit(&self, set: &ArtifactSet) -> Result<()> {
        let generations = self.generations_dir();
        fs::create_dir_all(&generations)?;

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&generations)?;
        write_generation(staging.path(), set)?;

        let target = self.generation_dir(&set.manifest.generation);
        if target.exists() {
            return Err(ForecastError::ValidationError(format!(
                "Generation {} already exists",
                set.manifest.generation
            )));
        }
        fs::rename(staging.path(), &target)?;
        // The staging path no longer exists, so dropping it is a no-op
        drop(staging);

        let previous = self.current_generation()?;

        let mut pointer = NamedTempFile::new_in(&self.root)?;
        pointer.write_all(set.manifest.generation.as_bytes())?;
        pointer.as_file().sync_all()?;
        pointer
            .persist(self.root.join(CURRENT_FILE))
            .map_err(|e| ForecastError::Io(e.error))?;

        info!(
            generation = %set.manifest.generation,
            products = set.manifest.products,
            trained = set.manifest.trained,
            "Committed artifact generation"
        );

        let cutoff = previous.as_deref().unwrap_or(&set.manifest.generation);
        if let Err(e) = self.prune(cutoff, &set.manifest.generation) {
            warn!(error = %e, "Failed to prune old artifact generations");
        }

        Ok(())
    }

    /// Delete every generation older than `cutoff`, except `live`.
    ///
    /// `cutoff` itself and anything newer stays, which includes
    /// generations another writer has renamed into place but not yet
    /// pointed `CURRENT` at.
    fn prune(&self, cutoff: &str, live: &str) -> Result<()> {
        for entry in fs::read_dir(self.generations_dir())? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.')
                || name.as_str() >= cutoff
                || name == live
                || !entry.file_type()?.is_dir()
            {
                continue;
            }
            fs::remove_dir_all(entry.path())?;
            debug!(generation = %name, "Pruned artifact generation");
        }
        Ok(())
    }
}

fn write_generation(dir: &Path, set: &ArtifactSet) -> Result<()> {
    let mut writer = BufWriter::new(File::create(dir.join(SERIES_FILE))?);
    set.series.write_csv(&mut writer)?;
    finish(writer)?;

    write_json(&dir.join(SCALER_FILE), &set.scaler)?;
    write_json(&dir.join(MODELS_FILE), &set.registry)?;
    write_json(&dir.join(RMSE_FILE), &set.rmse)?;
    write_json(&dir.join(MANIFEST_FILE), &set.manifest)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    finish(writer)
}

fn finish(mut writer: BufWriter<File>) -> Result<()> {
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            ForecastError::MissingArtifact(path.to_path_buf())
        } else {
            e.into()
        }
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = open(path)?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| ForecastError::ArtifactCorrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn corrupt_unless_missing(path: &Path, err: ForecastError) -> ForecastError {
    match err {
        ForecastError::MissingArtifact(_) => err,
        other => ForecastError::ArtifactCorrupt {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

/// In-memory handle on the live artifact set.
///
/// Readers take an `Arc` snapshot and keep using it while a writer swaps
/// in a newer set. Writers hold [`SharedArtifacts::writer`] from the
/// on-disk commit until the swap, so disk and memory name the same
/// generation.
#[derive(Debug, Default)]
pub struct SharedArtifacts {
    inner: RwLock<Option<Arc<ArtifactSet>>>,
    writer: Mutex<()>,
}

impl SharedArtifacts {
    /// Empty handle; forecasts fail with `MissingArtifact` until a set is
    /// swapped in
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_set(set: ArtifactSet) -> Self {
        Self {
            inner: RwLock::new(Some(Arc::new(set))),
            writer: Mutex::new(()),
        }
    }

    /// Load the live generation of `store`, or start empty when nothing
    /// has been committed yet
    pub fn open(store: &ArtifactStore) -> Result<Self> {
        match store.load() {
            Ok(set) => Ok(Self::with_set(set)),
            Err(ForecastError::MissingArtifact(path)) => {
                debug!(path = %path.display(), "No artifacts yet");
                Ok(Self::new())
            }
            Err(e) => Err(e),
        }
    }

    pub fn snapshot(&self) -> Option<Arc<ArtifactSet>> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard.clone()
    }

    /// Live set, or `MissingArtifact` when none is loaded
    pub fn current(&self) -> Result<Arc<ArtifactSet>> {
        self.snapshot()
            .ok_or_else(|| ForecastError::MissingArtifact(PathBuf::from(CURRENT_FILE)))
    }

    pub fn is_ready(&self) -> bool {
        self.snapshot().is_some()
    }

    /// Exclusive writer access; released when the guard drops
    pub fn writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Swap in a complete new set
    pub fn replace(&self, set: ArtifactSet) -> Arc<ArtifactSet> {
        let set = Arc::new(set);
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(Arc::clone(&set));
        set
    }
}
