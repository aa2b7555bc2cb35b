//! # Bundle Grouper
//!
//! Post-extraction pass that collapses complete shapefile component sets
//! (`.shp`/`.shx`/`.dbf`, optionally `.prj`) into one self-contained
//! sub-archive per base name, and promotes stragglers to plain vector
//! files so they remain usable downstream.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::Path;

use tracing::{info, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{PackError, Result};
use crate::extract::ExtractedFile;
use crate::naming::{self, FileKind};

/// Groups shapefile components out of an extraction result.
///
/// Components are partitioned by lowercased base name. A complete group
/// (at least one `.shp`, `.shx` and `.dbf`) is re-encoded into
/// `{base}.zip` in `dest_dir` and its loose files are deleted; an
/// incomplete group keeps its files and re-emits them as `Vector`.
/// Non-component entries pass through unchanged, in their original
/// relative order, after all grouped/regrouped shapefile entries.
///
/// This is a best-effort pass: a failed sub-archive write falls back to
/// the incomplete handling for that group and never aborts the others.
pub fn group_shapefiles(files: Vec<ExtractedFile>, dest_dir: &Path) -> Vec<ExtractedFile> {
    let mut groups: BTreeMap<String, Vec<ExtractedFile>> = BTreeMap::new();
    let mut passthrough: Vec<ExtractedFile> = Vec::new();

    for file in files {
        if file.kind == FileKind::ShapefileComponent {
            groups
                .entry(component_base_name(&file.name))
                .or_default()
                .push(file);
        } else {
            passthrough.push(file);
        }
    }

    let mut result: Vec<ExtractedFile> = Vec::new();
    for (base_name, components) in groups {
        if !is_complete(&components) {
            result.extend(components.into_iter().map(promote_to_vector));
            continue;
        }

        match write_group_archive(&base_name, &components, dest_dir) {
            Ok(entry) => {
                delete_components(&components);
                info!(
                    base = %base_name,
                    components = components.len(),
                    archive = %entry.name,
                    "shapefile group archived"
                );
                result.push(entry);
            }
            Err(e) => {
                // Originals stay on disk and the group degrades to loose
                // vector files; other groups are unaffected.
                warn!(base = %base_name, error = %e, "shapefile group archiving failed");
                result.extend(components.into_iter().map(promote_to_vector));
            }
        }
    }

    result.extend(passthrough);
    result
}

/// Base name used for grouping: lowercased, with the component extension
/// stripped. The on-disk casing of the files themselves is untouched.
fn component_base_name(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    for ext in naming::SHAPEFILE_EXTENSIONS {
        if let Some(base) = lower.strip_suffix(&format!(".{ext}")) {
            return base.to_string();
        }
    }
    lower
}

/// A group is complete with at least one `.shp`, `.shx` and `.dbf`;
/// `.prj` is optional. Evaluated once per base name, independent of
/// extraction order.
fn is_complete(components: &[ExtractedFile]) -> bool {
    let has = |ext: &str| {
        components
            .iter()
            .any(|c| c.name.to_ascii_lowercase().ends_with(ext))
    };
    has(".shp") && has(".shx") && has(".dbf")
}

fn promote_to_vector(mut file: ExtractedFile) -> ExtractedFile {
    file.kind = FileKind::Vector;
    file
}

/// Re-encodes one complete group into `{base}.zip` in `dest_dir`.
///
/// Entry names are the components' on-disk filenames. On failure the
/// partial sub-archive is removed so no half-written zip survives.
fn write_group_archive(
    base_name: &str,
    components: &[ExtractedFile],
    dest_dir: &Path,
) -> Result<ExtractedFile> {
    let out_path = naming::resolve_collision(dest_dir, &format!("{base_name}.zip"));
    match write_components(&out_path, components) {
        Ok(()) => {
            let size_bytes = fs::metadata(&out_path)
                .map_err(|e| PackError::io(&out_path, e))?
                .len();
            let name = out_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(ExtractedFile {
                absolute_path: out_path,
                name,
                kind: FileKind::Shapefile,
                size_bytes,
            })
        }
        Err(e) => {
            let _ = fs::remove_file(&out_path);
            Err(e)
        }
    }
}

fn write_components(out_path: &Path, components: &[ExtractedFile]) -> Result<()> {
    let out = File::create(out_path).map_err(|e| PackError::io(out_path, e))?;
    let mut zip = ZipWriter::new(BufWriter::new(out));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for component in components {
        // Components that vanished since extraction are skipped, not fatal.
        let reader = match File::open(&component.absolute_path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %component.absolute_path.display(), "component vanished before grouping");
                continue;
            }
            Err(e) => return Err(PackError::io(&component.absolute_path, e)),
        };

        zip.start_file(component.name.clone(), options)
            .map_err(PackError::write_failed)?;
        io::copy(&mut BufReader::new(reader), &mut zip).map_err(PackError::write_failed)?;
    }

    zip.finish().map_err(PackError::write_failed)?;
    Ok(())
}

fn delete_components(components: &[ExtractedFile]) {
    for component in components {
        if let Err(e) = fs::remove_file(&component.absolute_path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(
                    path = %component.absolute_path.display(),
                    error = %e,
                    "could not delete grouped component"
                );
            }
        }
    }
}
