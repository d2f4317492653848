use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const SUMMARY_PREFIX: &str = "tse-acedjpsm-72030-20230512382920";

pub fn get_test_file_path(filename: &str) -> PathBuf {
    PathBuf::from("src/tdnet/parsing/tests/data").join(filename)
}

pub fn read_test_file(filename: &str) -> String {
    fs::read_to_string(get_test_file_path(filename))
        .unwrap_or_else(|e| panic!("Failed to read test file {}: {}", filename, e))
}

/// Cache root holding pre-downloaded copies of the remote taxonomy files the
/// fixtures reference.
pub fn taxonomy_cache_root() -> PathBuf {
    get_test_file_path("taxonomy")
}

/// Fixture names of a complete earnings summary bundle.
pub fn summary_bundle() -> Vec<String> {
    ["-ixbrl.htm", ".xsd", "-lab.xml", "-cal.xml", "-def.xml", "-pre.xml"]
        .iter()
        .map(|suffix| format!("{}{}", SUMMARY_PREFIX, suffix))
        .collect()
}

/// Writes a zip holding `(entry name, body)` pairs.
pub fn write_zip(path: &Path, entries: &[(String, String)]) {
    let file = File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (name, body) in entries {
        zip.start_file(name.as_str(), options).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

/// Zips fixture files under `XBRLData/Summary/`, the way TDnet lays out its
/// bundles.
pub fn write_fixture_zip(path: &Path, fixtures: &[String]) {
    let entries: Vec<(String, String)> = fixtures
        .iter()
        .map(|name| (format!("XBRLData/Summary/{}", name), read_test_file(name)))
        .collect();
    write_zip(path, &entries);
}
