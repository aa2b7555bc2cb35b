//! # Archive Writer
//!
//! Builds a standard deflate zip from either a whole directory tree or an
//! explicit manifest of files. Both entry points share one bounded-buffer
//! copy routine that feeds the progress reporter.
//!
//! Writers are deliberately non-transactional: any pre-existing file at the
//! destination is deleted up front, bytes go straight to the final path, and
//! a mid-write failure leaves the partial file on disk for the caller.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{PackError, Result};
use crate::progress::{ProgressOptions, ProgressReporter};

// 1 MiB buffer keeps syscall overhead low on large rasters
const COPY_BUF_SIZE: usize = 1 << 20;

/// Describes a single produced zip archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveResult {
    pub absolute_path: PathBuf,
    pub file_name: String,
    pub size_bytes: u64,
}

/// One file requested by a manifest export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub absolute_path: PathBuf,
    pub original_name: String,
}

/// Outcome of a manifest export: the archive plus add/skip accounting.
#[derive(Debug, Clone)]
pub struct ManifestOutcome {
    pub archive: ArchiveResult,
    pub files_added: usize,
    pub files_skipped: usize,
}

/// Packages an entire directory tree into one zip archive.
///
/// Every regular file under `source_dir` becomes one entry named by its
/// forward-slash path relative to `source_dir`; directories are not stored.
/// An empty source fails with [`PackError::NothingToArchive`] before any
/// output is produced.
pub fn write_folder_archive(
    source_dir: &Path,
    dest_zip: &Path,
    progress: &ProgressOptions,
) -> Result<ArchiveResult> {
    let meta = fs::metadata(source_dir).map_err(|_| PackError::ArchiveNotFound {
        path: source_dir.to_path_buf(),
    })?;
    if !meta.is_dir() {
        return Err(PackError::ArchiveNotFound {
            path: source_dir.to_path_buf(),
        });
    }

    let mut top_level = fs::read_dir(source_dir).map_err(|e| PackError::io(source_dir, e))?;
    if top_level.next().is_none() {
        return Err(PackError::NothingToArchive);
    }

    // Collect the file list with sizes up front; the total feeds progress
    // reporting but does not gate the operation.
    let mut files: Vec<(PathBuf, String, u64)> = Vec::new();
    let mut total_bytes: u64 = 0;
    for entry in WalkDir::new(source_dir) {
        let entry = entry.map_err(|e| PackError::io(source_dir, e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel_name = match entry.path().strip_prefix(source_dir) {
            Ok(rel) => zip_entry_name(rel),
            Err(_) => continue,
        };
        let size = entry
            .metadata()
            .map_err(|e| PackError::io(entry.path(), e.into()))?
            .len();
        total_bytes += size;
        files.push((entry.into_path(), rel_name, size));
    }

    remove_stale_destination(dest_zip)?;
    let reporter = progress.reporter(total_bytes);

    let out = create_destination(dest_zip)?;
    let mut zip = ZipWriter::new(BufWriter::new(out));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut buf = vec![0u8; COPY_BUF_SIZE];

    for (abs_path, rel_name, _) in &files {
        zip.start_file(rel_name.clone(), options)
            .map_err(PackError::write_failed)?;
        let mut reader = File::open(abs_path).map_err(|e| PackError::io(abs_path, e))?;
        copy_bytes(&mut reader, &mut zip, &mut buf, &reporter).map_err(PackError::write_failed)?;
    }

    finish_zip(zip)?;
    reporter.finish();

    let result = describe_archive(dest_zip)?;
    info!(
        path = %result.absolute_path.display(),
        files = files.len(),
        bytes = result.size_bytes,
        "folder archive written"
    );
    Ok(result)
}

/// Packages an explicit list of files into one zip archive.
///
/// Entries are visited in order; sources that are missing or not regular
/// files are skipped with a warning, never aborting the archive. Entry
/// names are taken from `original_name` verbatim, not sanitized and not
/// deduplicated, so a manifest with duplicate names yields a zip with
/// duplicate entry names, which is accepted behavior.
///
/// An all-skipped manifest still completes and reports a valid empty zip;
/// deciding whether that counts as "nothing to archive" belongs to the
/// caller, which can see `files_added`.
pub fn write_manifest_archive(
    entries: &[ManifestEntry],
    dest_zip: &Path,
    progress: &ProgressOptions,
) -> Result<ManifestOutcome> {
    let total_bytes: u64 = entries
        .iter()
        .filter_map(|e| fs::metadata(&e.absolute_path).ok())
        .filter(|m| m.is_file())
        .map(|m| m.len())
        .sum();

    remove_stale_destination(dest_zip)?;
    let reporter = progress.reporter(total_bytes);

    let out = create_destination(dest_zip)?;
    let mut zip = ZipWriter::new(BufWriter::new(out));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut buf = vec![0u8; COPY_BUF_SIZE];

    let mut files_added = 0usize;
    let mut files_skipped = 0usize;

    for entry in entries {
        let meta = match fs::metadata(&entry.absolute_path) {
            Ok(meta) => meta,
            Err(_) => {
                warn!(path = %entry.absolute_path.display(), "manifest entry missing, skipped");
                files_skipped += 1;
                continue;
            }
        };
        if !meta.is_file() {
            warn!(path = %entry.absolute_path.display(), "manifest entry is not a regular file, skipped");
            files_skipped += 1;
            continue;
        }
        let mut reader = match File::open(&entry.absolute_path) {
            Ok(file) => file,
            Err(e) => {
                warn!(
                    path = %entry.absolute_path.display(),
                    error = %e,
                    "manifest entry unreadable, skipped"
                );
                files_skipped += 1;
                continue;
            }
        };

        zip.start_file(entry.original_name.clone(), options)
            .map_err(PackError::write_failed)?;
        copy_bytes(&mut reader, &mut zip, &mut buf, &reporter).map_err(PackError::write_failed)?;
        files_added += 1;
    }

    finish_zip(zip)?;
    reporter.finish();

    let archive = describe_archive(dest_zip)?;
    info!(
        path = %archive.absolute_path.display(),
        added = files_added,
        skipped = files_skipped,
        bytes = archive.size_bytes,
        "manifest archive written"
    );
    Ok(ManifestOutcome {
        archive,
        files_added,
        files_skipped,
    })
}

/// Normalizes a relative path into a forward-slash zip entry name.
fn zip_entry_name(rel: &Path) -> String {
    let name = rel.to_string_lossy().replace('\\', "/");
    name.strip_prefix("./").unwrap_or(&name).to_string()
}

/// Last-writer-wins: an existing file at the destination is removed first.
fn remove_stale_destination(dest_zip: &Path) -> Result<()> {
    match fs::remove_file(dest_zip) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PackError::io(dest_zip, e)),
    }
}

fn create_destination(dest_zip: &Path) -> Result<File> {
    File::create(dest_zip).map_err(|e| PackError::DirectoryUnwritable {
        path: dest_zip.to_path_buf(),
        source: e,
    })
}

fn finish_zip(mut zip: ZipWriter<BufWriter<File>>) -> Result<()> {
    let mut inner = zip.finish().map_err(PackError::write_failed)?;
    inner.flush().map_err(PackError::write_failed)
}

fn describe_archive(dest_zip: &Path) -> Result<ArchiveResult> {
    let size_bytes = fs::metadata(dest_zip)
        .map_err(|e| PackError::io(dest_zip, e))?
        .len();
    let file_name = dest_zip
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(ArchiveResult {
        absolute_path: dest_zip.to_path_buf(),
        file_name,
        size_bytes,
    })
}

/// Bounded-buffer copy that feeds the byte accumulator as it goes.
fn copy_bytes<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    buf: &mut [u8],
    progress: &ProgressReporter,
) -> io::Result<u64> {
    let mut copied: u64 = 0;
    loop {
        let n = reader.read(buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        progress.record_bytes(n as u64);
        copied += n as u64;
    }
    Ok(copied)
}
