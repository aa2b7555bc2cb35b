//! # Recursive Archive Reader
//!
//! Walks a zip archive entry by entry, expanding nested zip entries
//! depth-first up to a bound, filtering everything against the extension
//! allow-list and writing survivors under collision-free names in a single
//! flat destination directory.
//!
//! Nested archives are staged as temporary files inside the destination,
//! recursed into, and removed on every exit path. When removal itself
//! fails the path is recorded for best-effort deferred cleanup instead of
//! failing the extraction over a stray temp file.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::{PackError, Result};
use crate::naming::{self, FileKind};

/// Default nesting bound; nested archives past it are dropped whole.
/// Bounds recursion against self-referential or deeply nested archives.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// A file produced by extraction, as reported to the caller.
///
/// The descriptor is a snapshot taken at creation time; it is not kept in
/// sync with later filesystem changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFile {
    pub absolute_path: PathBuf,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    pub size_bytes: u64,
}

/// Temp files whose deletion failed; retried at the start of later calls.
static DEFERRED_CLEANUP: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());

/// Extracts `zip_path` into `dest_dir`, expanding nested zip archives up to
/// `max_depth` levels deep.
///
/// The returned list is in stream order: for each top-level entry, either
/// its own descriptor or, for nested zips, the flattened descriptor list of
/// that nested archive spliced in at that position.
///
/// A missing archive fails with [`PackError::ArchiveNotFound`]; a corrupt
/// container or entry aborts the whole call with
/// [`PackError::ArchiveUnreadable`]. Partial-success handling lives in the
/// allow-list skip and in the bundle grouper, not here.
pub fn extract_archive(
    zip_path: &Path,
    dest_dir: &Path,
    max_depth: usize,
) -> Result<Vec<ExtractedFile>> {
    if !zip_path.is_file() {
        return Err(PackError::ArchiveNotFound {
            path: zip_path.to_path_buf(),
        });
    }
    fs::create_dir_all(dest_dir).map_err(|e| PackError::DirectoryUnwritable {
        path: dest_dir.to_path_buf(),
        source: e,
    })?;

    sweep_deferred_cleanup();
    extract_recursive(zip_path, dest_dir, 0, max_depth)
}

fn extract_recursive(
    zip_path: &Path,
    dest_dir: &Path,
    depth: usize,
    max_depth: usize,
) -> Result<Vec<ExtractedFile>> {
    let file = File::open(zip_path).map_err(|e| PackError::io(zip_path, e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| unreadable(zip_path, e))?;

    let mut extracted = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| unreadable(zip_path, e))?;
        if entry.is_dir() {
            continue;
        }

        // Embedded directory structure is discarded: extraction flattens
        // everything into dest_dir.
        let entry_name = entry.name().to_string();
        let file_name = naming::entry_file_name(&entry_name).to_string();

        if file_name.to_ascii_lowercase().ends_with(".zip") {
            if depth + 1 > max_depth {
                debug!(entry = %entry_name, depth, "nested archive past depth bound, dropped");
                continue;
            }

            let temp = stage_nested_archive(&mut entry, dest_dir, zip_path)?;
            let nested = extract_recursive(temp.path(), dest_dir, depth + 1, max_depth);
            release_temp(temp);
            extracted.extend(nested?);
            continue;
        }

        let Some(kind) = naming::file_extension(&file_name).and_then(naming::classify) else {
            debug!(entry = %entry_name, "extension not allow-listed, dropped");
            continue;
        };

        // Collision resolution runs per file, against directory state at
        // write time, so a second identical name lands as `name_1.ext`.
        let out_path = naming::resolve_collision(dest_dir, &file_name);
        let out = File::create(&out_path).map_err(|e| PackError::io(&out_path, e))?;
        let mut writer = BufWriter::new(out);
        io::copy(&mut entry, &mut writer).map_err(|e| unreadable(zip_path, e))?;
        writer.flush().map_err(|e| PackError::io(&out_path, e))?;

        let size_bytes = fs::metadata(&out_path)
            .map_err(|e| PackError::io(&out_path, e))?
            .len();
        let name = out_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(file_name);

        extracted.push(ExtractedFile {
            absolute_path: out_path,
            name,
            kind,
            size_bytes,
        });
    }

    Ok(extracted)
}

/// Copies a nested zip entry into a uniquely named temp file in `dest_dir`.
///
/// The temp lives in the destination directory (same filesystem, same
/// permissions) and carries a random per-call suffix, so concurrent
/// requests into one directory can never trample each other's staging
/// files.
fn stage_nested_archive(
    entry: &mut impl io::Read,
    dest_dir: &Path,
    zip_path: &Path,
) -> Result<NamedTempFile> {
    let temp = tempfile::Builder::new()
        .prefix("nested-")
        .suffix(".zip")
        .tempfile_in(dest_dir)
        .map_err(|e| PackError::io(dest_dir, e))?;

    {
        let mut writer = BufWriter::new(temp.as_file());
        io::copy(entry, &mut writer).map_err(|e| unreadable(zip_path, e))?;
        writer.flush().map_err(|e| PackError::io(temp.path(), e))?;
    }
    Ok(temp)
}

/// Removes a staged nested archive; a failed removal is deferred, never an
/// extraction error.
fn release_temp(temp: NamedTempFile) {
    let temp_path = temp.path().to_path_buf();
    if let Err(e) = temp.close() {
        warn!(
            path = %temp_path.display(),
            error = %e,
            "could not remove nested temp archive, deferring cleanup"
        );
        DEFERRED_CLEANUP.lock().unwrap().push(temp_path);
    }
}

/// Retries previously failed temp deletions. Missing files count as done.
fn sweep_deferred_cleanup() {
    let mut pending = DEFERRED_CLEANUP.lock().unwrap();
    pending.retain(|path| match fs::remove_file(path) {
        Ok(()) => false,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "deferred temp cleanup still failing");
            true
        }
    });
}

fn unreadable(zip_path: &Path, err: impl std::fmt::Display) -> PackError {
    PackError::ArchiveUnreadable {
        path: zip_path.to_path_buf(),
        reason: err.to_string(),
    }
}
