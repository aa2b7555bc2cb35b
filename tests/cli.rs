use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn test_cli_pack_extract_cycle() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Setup: a session directory with allow-listed and junk files
    let session_dir = tempdir()?;
    fs::write(session_dir.path().join("points.geojson"), b"{\"type\":\"FeatureCollection\"}")?;
    let nested_dir = session_dir.path().join("rasters");
    fs::create_dir(&nested_dir)?;
    fs::write(nested_dir.join("dem.tif"), b"II*\x00elevation")?;
    fs::write(session_dir.path().join("debug.log"), b"not allow-listed")?;

    // 2. Pack the whole folder
    let export_dir = tempdir()?;
    let mut cmd = Command::cargo_bin("gispack")?;
    cmd.arg("pack")
        .arg(session_dir.path())
        .arg("--output")
        .arg(export_dir.path());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("GIS-DATA"));

    let archive_path = find_exported_zip(export_dir.path())?;

    // 3. Extract it into a fresh directory
    let extract_dir = tempdir()?;
    let dest = extract_dir.path().join("files");
    let mut cmd = Command::cargo_bin("gispack")?;
    cmd.arg("extract")
        .arg(&archive_path)
        .arg("--output")
        .arg(&dest);
    cmd.assert()
        .success()
        .stdout(
            predicate::str::contains("points.geojson")
                .and(predicate::str::contains("dem.tif"))
                .and(predicate::str::contains("\"type\": \"tiff\"")),
        );

    // 4. Verify the on-disk result: flattened, filtered
    assert_eq!(
        fs::read(dest.join("points.geojson"))?,
        fs::read(session_dir.path().join("points.geojson"))?
    );
    assert_eq!(
        fs::read(dest.join("dem.tif"))?,
        fs::read(nested_dir.join("dem.tif"))?
    );
    assert!(!dest.join("debug.log").exists());

    Ok(())
}

#[test]
fn test_cli_pack_empty_session_fails() -> Result<(), Box<dyn std::error::Error>> {
    let session_dir = tempdir()?;
    let export_dir = tempdir()?;

    let mut cmd = Command::cargo_bin("gispack")?;
    cmd.arg("pack")
        .arg(session_dir.path())
        .arg("--output")
        .arg(export_dir.path());
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("nothing to archive"));

    // no archive may be produced
    assert_eq!(fs::read_dir(export_dir.path())?.count(), 0);
    Ok(())
}

#[test]
fn test_cli_pack_manifest() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Two staged files, one of which is referenced twice under
    //    different names, plus one missing entry
    let staging = tempdir()?;
    let track = staging.path().join("stage_0001.gpx");
    fs::write(&track, b"<gpx/>")?;

    let manifest = serde_json::json!([
        { "absolutePath": track, "originalName": "morning run.gpx" },
        { "absolutePath": track, "originalName": "copy.gpx" },
        { "absolutePath": staging.path().join("gone.kml"), "originalName": "gone.kml" }
    ]);
    let manifest_path = staging.path().join("manifest.json");
    fs::write(&manifest_path, serde_json::to_vec(&manifest)?)?;

    // 2. Pack from the manifest
    let export_dir = tempdir()?;
    let mut cmd = Command::cargo_bin("gispack")?;
    cmd.arg("pack-manifest")
        .arg(&manifest_path)
        .arg("--output")
        .arg(export_dir.path());
    cmd.assert().success();

    // 3. The produced zip holds exactly the two resolvable entries
    let archive_path = find_exported_zip(export_dir.path())?;
    let mut zip = zip::ZipArchive::new(fs::File::open(&archive_path)?)?;
    assert_eq!(zip.len(), 2);
    assert!(zip.by_name("morning run.gpx").is_ok());
    Ok(())
}

#[test]
fn test_cli_extract_missing_archive_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let mut cmd = Command::cargo_bin("gispack")?;
    cmd.arg("extract").arg(dir.path().join("absent.zip"));
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
    Ok(())
}

fn find_exported_zip(export_dir: &std::path::Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let zip = fs::read_dir(export_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .find(|p| p.extension().is_some_and(|ext| ext == "zip"))
        .ok_or("no zip produced in export dir")?;
    Ok(zip)
}
