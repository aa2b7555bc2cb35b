//! Deterministic archive names, collision-safe output names and extension
//! classification.
//!
//! Everything here is pure lookup or a probe against current directory
//! state; no function mutates the filesystem.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Raster/DEM formats the extraction path keeps.
pub const RASTER_EXTENSIONS: &[&str] = &["tif", "tiff", "hgt", "dett"];

/// Vector formats the extraction path keeps.
pub const VECTOR_EXTENSIONS: &[&str] = &["geojson", "json", "csv", "gpx", "kml", "kmz", "wkt"];

/// Shapefile component formats; grouped into a sub-archive after extraction.
pub const SHAPEFILE_EXTENSIONS: &[&str] = &["shp", "shx", "dbf", "prj"];

/// The kind of an extracted file, as reported to the caller.
///
/// `Tiff`, `Vector` and `ShapefileComponent` are provisional kinds assigned
/// during extraction; the bundle grouper may replace a set of components
/// with a single `Shapefile` entry, or promote stragglers to `Vector`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Tiff,
    Vector,
    ShapefileComponent,
    Shapefile,
}

/// Classifies a file extension against the fixed allow-list.
///
/// Returns `None` for anything outside the policy; such entries are neither
/// written nor reported by the extractor. The `zip` container extension is
/// intentionally absent here: nested archives are expanded by the reader,
/// never emitted as files.
pub fn classify(extension: &str) -> Option<FileKind> {
    let ext = extension.to_ascii_lowercase();
    let ext = ext.as_str();
    if RASTER_EXTENSIONS.contains(&ext) {
        Some(FileKind::Tiff)
    } else if VECTOR_EXTENSIONS.contains(&ext) {
        Some(FileKind::Vector)
    } else if SHAPEFILE_EXTENSIONS.contains(&ext) {
        Some(FileKind::ShapefileComponent)
    } else {
        None
    }
}

/// Generates the timestamped export archive name, e.g.
/// `GIS-DATA 12-16-2025 12-33-02.zip`.
///
/// Dashes keep the name free of `/` and `:`, which are illegal in
/// filenames on the target platforms.
pub fn archive_file_name(now: DateTime<Local>) -> String {
    format!("GIS-DATA {}.zip", now.format("%m-%d-%Y %H-%M-%S"))
}

/// Replaces every character outside `[A-Za-z0-9._-]` with `_`.
///
/// This is the naming contract of the external file stager; the archive
/// engine accepts its output unmodified, so the rule lives here where both
/// sides can see it.
pub fn sanitize_name(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Resolves a collision-free output path for `candidate` inside `dir`.
///
/// If the name is taken, `_1`, `_2`, … are appended before the extension
/// until a free name is found. Must be called once per file about to be
/// written, against directory state at write time.
pub fn resolve_collision(dir: &Path, candidate: &str) -> PathBuf {
    let path = dir.join(candidate);
    if !path.exists() {
        return path;
    }

    let (base, ext) = split_name(candidate);
    let mut counter: u32 = 1;
    loop {
        let attempt = dir.join(format!("{base}_{counter}{ext}"));
        if !attempt.exists() {
            return attempt;
        }
        counter += 1;
    }
}

/// Splits `name` into `(base, ".ext")` at the last dot.
///
/// A leading dot is part of the base, so `.hidden` has no extension.
fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// Returns the lowercase-comparable extension of a bare filename, if any.
///
/// Names with no dot, a leading dot only, or a trailing dot have no
/// extension and are rejected by the allow-list.
pub fn file_extension(name: &str) -> Option<&str> {
    let idx = name.rfind('.')?;
    if idx == 0 || idx + 1 == name.len() {
        return None;
    }
    Some(&name[idx + 1..])
}

/// Reduces a zip entry name to its final path segment.
///
/// Embedded directory structure is discarded on purpose: extraction
/// flattens everything into one destination directory.
pub fn entry_file_name(entry_name: &str) -> &str {
    entry_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(entry_name)
}
