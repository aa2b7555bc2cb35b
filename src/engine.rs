//! # Engine
//!
//! Asynchronous facade over the archive writer, recursive reader and
//! bundle grouper. Each request is accepted immediately, runs on its own
//! blocking worker and resolves once the filesystem work completes.
//! Requests share no mutable state, so concurrent calls are independent;
//! there is no cancellation; once started, a request runs to completion
//! or failure.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::task::JoinError;
use tracing::debug;

use crate::archive::{self, ArchiveResult, ManifestEntry};
use crate::error::{PackError, Result};
use crate::extract::{self, ExtractedFile, DEFAULT_MAX_DEPTH};
use crate::naming;
use crate::progress::{Progress, ProgressCallback, ProgressOptions, DEFAULT_EMIT_INTERVAL};
use crate::shapefile;

/// Session workspace folder name under the documents root.
pub const SESSION_DIR_NAME: &str = "HSC-SESSIONS";

/// Default extraction destination under the documents root.
pub const EXTRACT_DIR_NAME: &str = "HSC-SESSIONS/FILES";

/// Filesystem layout and tuning for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Where produced `GIS-DATA …` archives land.
    pub export_dir: PathBuf,
    /// Destination for extraction when the caller gives none.
    pub extract_dir: PathBuf,
    /// Nested-archive recursion bound.
    pub max_depth: usize,
    /// Minimum delay between progress emissions.
    pub progress_interval: Duration,
}

impl EngineConfig {
    /// Layout rooted at a documents directory, mirroring the session
    /// workspace the file stager produces: exports land in the root
    /// itself, extraction defaults to `HSC-SESSIONS/FILES` beneath it.
    pub fn rooted_at(documents_root: impl Into<PathBuf>) -> Self {
        let root = documents_root.into();
        Self {
            extract_dir: root.join(EXTRACT_DIR_NAME),
            export_dir: root,
            max_depth: DEFAULT_MAX_DEPTH,
            progress_interval: DEFAULT_EMIT_INTERVAL,
        }
    }

    /// The conventional whole-session source directory under `root`.
    pub fn session_dir(documents_root: impl Into<PathBuf>) -> PathBuf {
        documents_root.into().join(SESSION_DIR_NAME)
    }
}

/// Archive engine: packs session folders and manifests, extracts and
/// regroups archives.
pub struct Engine {
    config: EngineConfig,
    progress: Option<Arc<ProgressCallback>>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            progress: None,
        }
    }

    /// Installs a progress callback for subsequent pack requests. Updates
    /// arrive no more often than the configured interval, plus one final
    /// emission on completion.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(Progress) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// Packages an entire session directory into one timestamped archive
    /// in the export directory. A pre-existing archive with the same
    /// generated name is replaced (last-writer-wins).
    pub async fn pack_folder(&self, source_dir: impl Into<PathBuf>) -> Result<ArchiveResult> {
        let source_dir = source_dir.into();
        let export_dir = self.config.export_dir.clone();
        let progress = self.progress_options();

        debug!(source = %source_dir.display(), "pack_folder request accepted");
        spawn_request(move || {
            ensure_dir(&export_dir)?;
            let dest_zip = export_dir.join(naming::archive_file_name(Local::now()));
            archive::write_folder_archive(&source_dir, &dest_zip, &progress)
        })
        .await
    }

    /// Packages an explicit manifest of files into one timestamped archive.
    ///
    /// An empty manifest fails before anything is written. A manifest whose
    /// entries have all vanished completes the write (leaving a valid empty
    /// zip on disk) but still reports [`PackError::NothingToArchive`].
    pub async fn pack_manifest(&self, entries: Vec<ManifestEntry>) -> Result<ArchiveResult> {
        if entries.is_empty() {
            return Err(PackError::NothingToArchive);
        }
        let export_dir = self.config.export_dir.clone();
        let progress = self.progress_options();

        debug!(entries = entries.len(), "pack_manifest request accepted");
        spawn_request(move || {
            ensure_dir(&export_dir)?;
            let dest_zip = export_dir.join(naming::archive_file_name(Local::now()));
            let outcome = archive::write_manifest_archive(&entries, &dest_zip, &progress)?;
            if outcome.files_added == 0 {
                return Err(PackError::NothingToArchive);
            }
            Ok(outcome.archive)
        })
        .await
    }

    /// Extracts an archive (recursively, depth-bounded) into `dest_dir`
    /// (or the configured default) and groups shapefile components into
    /// sub-archives before reporting the final typed file list.
    pub async fn extract(
        &self,
        zip_path: impl Into<PathBuf>,
        dest_dir: Option<PathBuf>,
    ) -> Result<Vec<ExtractedFile>> {
        let zip_path = zip_path.into();
        let dest_dir = dest_dir.unwrap_or_else(|| self.config.extract_dir.clone());
        let max_depth = self.config.max_depth;

        debug!(archive = %zip_path.display(), dest = %dest_dir.display(), "extract request accepted");
        spawn_request(move || {
            let files = extract::extract_archive(&zip_path, &dest_dir, max_depth)?;
            Ok(shapefile::group_shapefiles(files, &dest_dir))
        })
        .await
    }

    fn progress_options(&self) -> ProgressOptions {
        ProgressOptions {
            interval: self.config.progress_interval,
            callback: self.progress.clone(),
        }
    }
}

/// Runs one request on a dedicated blocking worker.
async fn spawn_request<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(worker_failed)?
}

fn worker_failed(err: JoinError) -> PackError {
    PackError::ArchiveWriteFailed {
        reason: format!("worker task failed: {err}"),
    }
}

fn ensure_dir(dir: &std::path::Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| PackError::DirectoryUnwritable {
        path: dir.to_path_buf(),
        source: e,
    })
}
