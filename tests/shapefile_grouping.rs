//! Integration tests for the bundle grouper: completeness, promotion,
//! sub-archive contents and ordering.

use gispack::extract::{extract_archive, DEFAULT_MAX_DEPTH};
use gispack::shapefile::group_shapefiles;
use gispack::FileKind;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

fn make_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    let options = FileOptions::default();
    for (name, bytes) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();
}

fn extract_and_group(
    archive: &Path,
    dest: &Path,
) -> Result<Vec<gispack::ExtractedFile>, gispack::PackError> {
    let files = extract_archive(archive, dest, DEFAULT_MAX_DEPTH)?;
    Ok(group_shapefiles(files, dest))
}

#[test]
fn complete_quartet_collapses_into_one_sub_archive() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let archive = dir.path().join("survey.zip");
    make_zip(
        &archive,
        &[
            ("roads.shp", b"shp bytes".as_slice()),
            ("roads.shx", b"shx bytes"),
            ("roads.dbf", b"dbf bytes"),
            ("roads.prj", b"prj bytes"),
            ("ortho.tif", b"II*\x00"),
        ],
    );

    let dest = dir.path().join("out");
    let files = extract_and_group(&archive, &dest)?;

    assert_eq!(files.len(), 2);
    assert_eq!(files[0].kind, FileKind::Shapefile);
    assert_eq!(files[0].name, "roads.zip");
    // passthrough entries come after the grouped ones
    assert_eq!(files[1].name, "ortho.tif");
    assert_eq!(files[1].kind, FileKind::Tiff);

    // the four loose components are gone from disk
    for ext in ["shp", "shx", "dbf", "prj"] {
        assert!(!dest.join(format!("roads.{ext}")).exists());
    }

    // the sub-archive holds exactly the original four files
    let mut zip = ZipArchive::new(File::open(dest.join("roads.zip"))?)?;
    assert_eq!(zip.len(), 4);
    for name in ["roads.shp", "roads.shx", "roads.dbf", "roads.prj"] {
        assert!(zip.by_name(name).is_ok(), "missing {name}");
    }
    Ok(())
}

#[test]
fn incomplete_trio_stays_loose_as_vectors() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let archive = dir.path().join("partial.zip");
    make_zip(
        &archive,
        &[
            ("cities.shp", b"shp".as_slice()),
            ("cities.shx", b"shx"),
            ("cities.prj", b"prj"),
        ],
    );

    let dest = dir.path().join("out");
    let files = extract_and_group(&archive, &dest)?;

    assert_eq!(files.len(), 3);
    for file in &files {
        assert_eq!(file.kind, FileKind::Vector);
        assert!(file.absolute_path.is_file(), "{} must survive", file.name);
    }
    assert!(!dest.join("cities.zip").exists());
    Ok(())
}

#[test]
fn grouping_key_ignores_case_but_keeps_on_disk_names(
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let archive = dir.path().join("case.zip");
    make_zip(
        &archive,
        &[
            ("Rivers.SHP", b"shp".as_slice()),
            ("rivers.shx", b"shx"),
            ("RIVERS.dbf", b"dbf"),
        ],
    );

    let dest = dir.path().join("out");
    let files = extract_and_group(&archive, &dest)?;

    assert_eq!(files.len(), 1);
    assert_eq!(files[0].kind, FileKind::Shapefile);
    assert_eq!(files[0].name, "rivers.zip");

    let mut zip = ZipArchive::new(File::open(&files[0].absolute_path)?)?;
    for name in ["Rivers.SHP", "rivers.shx", "RIVERS.dbf"] {
        assert!(zip.by_name(name).is_ok(), "original casing lost for {name}");
    }
    Ok(())
}

#[test]
fn separate_base_names_group_independently() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let archive = dir.path().join("multi.zip");
    make_zip(
        &archive,
        &[
            ("roads.shp", b"x".as_slice()),
            ("roads.shx", b"x"),
            ("roads.dbf", b"x"),
            ("rails.shp", b"x"),
            ("rails.shx", b"x"),
        ],
    );

    let dest = dir.path().join("out");
    let files = extract_and_group(&archive, &dest)?;

    // rails (incomplete) degrades to vectors, roads groups; groups come in
    // sorted base-name order
    let kinds: Vec<_> = files.iter().map(|f| (f.name.as_str(), f.kind)).collect();
    assert_eq!(
        kinds,
        vec![
            ("rails.shp", FileKind::Vector),
            ("rails.shx", FileKind::Vector),
            ("roads.zip", FileKind::Shapefile),
        ]
    );
    Ok(())
}

#[test]
fn sub_archive_name_avoids_existing_files() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let archive = dir.path().join("clash.zip");
    make_zip(
        &archive,
        &[
            ("parcels.shp", b"x".as_slice()),
            ("parcels.shx", b"x"),
            ("parcels.dbf", b"x"),
        ],
    );

    let dest = dir.path().join("out");
    fs::create_dir_all(&dest)?;
    // something unrelated already owns parcels.zip
    fs::write(dest.join("parcels.zip"), b"occupied")?;

    let files = extract_and_group(&archive, &dest)?;
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "parcels_1.zip");
    assert_eq!(fs::read(dest.join("parcels.zip"))?, b"occupied");
    Ok(())
}

#[test]
fn grouping_is_a_pure_pass_for_component_free_input() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let archive = dir.path().join("plain.zip");
    make_zip(
        &archive,
        &[
            ("a.geojson", b"{}".as_slice()),
            ("b.tif", b"II*\x00"),
            ("c.csv", b"1,2"),
        ],
    );

    let dest = dir.path().join("out");
    let files = extract_and_group(&archive, &dest)?;

    let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["a.geojson", "b.tif", "c.csv"]);
    Ok(())
}
