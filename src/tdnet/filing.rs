use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

use super::classify;
use super::report::{DocumentKind, FileCategory, ReportType};
use crate::core::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Local,
    Remote,
}

/// One document that contributed rows to a filing's record sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    pub id: u32,
    pub name: String,
    pub origin: Origin,
    pub filing_id: String,
}

/// A document found in the extracted bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct FilingDocument {
    pub path: PathBuf,
    pub file_name: String,
    pub category: FileCategory,
    pub kind: DocumentKind,
}

/// An extracted filing bundle. The extraction directory lives exactly as long
/// as this value.
#[derive(Debug)]
pub struct Filing {
    pub id: String,
    pub archive: PathBuf,
    pub report_type: ReportType,
    root: TempDir,
    documents: Vec<FilingDocument>,
}

impl Filing {
    /// Unzips `archive` into a fresh temporary directory and classifies it.
    /// If classification fails the directory is removed before returning.
    pub fn open(archive: impl AsRef<Path>) -> Result<Self> {
        let archive = archive.as_ref();
        let id = filing_id(archive);
        let root = tempfile::Builder::new()
            .prefix(&format!("tdnet-{}-", id))
            .tempdir()?;

        info!("Extracting {} into {}", archive.display(), root.path().display());
        extract_zip(archive, root.path())?;

        let report_type = classify::classify(root.path())?;
        let documents = list_documents(root.path());
        debug!(
            "Filing {} classified as {} with {} documents",
            id,
            report_type,
            documents.len()
        );

        Ok(Self {
            id,
            archive: archive.to_path_buf(),
            report_type,
            root,
            documents,
        })
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn documents(&self) -> &[FilingDocument] {
        &self.documents
    }

    pub fn documents_of(&self, category: FileCategory) -> impl Iterator<Item = &FilingDocument> {
        self.documents.iter().filter(move |d| d.category == category)
    }
}

/// The archive file stem, e.g. `081220230512593540` for
/// `081220230512593540.zip`.
pub fn filing_id(archive: &Path) -> String {
    archive
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Extracts every entry of `archive` below `dest`. Entries whose names would
/// escape `dest` are skipped.
pub fn extract_zip(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let relative = match entry.enclosed_name() {
            Some(p) => p,
            None => {
                log::warn!("Skipping unsafe zip entry '{}'", entry.name());
                continue;
            }
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
    }

    Ok(())
}

/// Every categorised document under `root`, in sorted path order.
pub fn list_documents(root: &Path) -> Vec<FilingDocument> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let file_name = e.file_name().to_string_lossy().into_owned();
            let category = FileCategory::of(&file_name)?;
            Some(FilingDocument {
                path: e.path().to_path_buf(),
                kind: DocumentKind::of(&file_name),
                file_name,
                category,
            })
        })
        .collect()
}

/// First file named `file_name` anywhere below `root`. Duplicate names in
/// different directories are not disambiguated.
pub fn find_by_name(root: &Path, file_name: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_file() && e.file_name().to_string_lossy() == file_name)
        .map(|e| e.path().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::XbrlError;
    use std::io::Write;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, body) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_filing_id_is_archive_stem() {
        assert_eq!(filing_id(Path::new("/tmp/081220230512593540.zip")), "081220230512593540");
    }

    #[test]
    fn test_extract_zip_keeps_directory_layout() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bundle.zip");
        write_zip(
            &archive,
            &[
                ("XBRLData/Summary/tse-rvdf-1-ixbrl.htm", "<html/>"),
                ("XBRLData/Summary/tse-rvdf-1-def.xml", "<linkbase/>"),
            ],
        );
        let out = dir.path().join("out");
        extract_zip(&archive, &out).unwrap();
        assert!(out.join("XBRLData/Summary/tse-rvdf-1-ixbrl.htm").exists());

        let docs = list_documents(&out);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].category, FileCategory::Definition);
        assert!(find_by_name(&out, "tse-rvdf-1-def.xml").is_some());
        assert!(find_by_name(&out, "missing.xml").is_none());
    }

    #[test]
    fn test_failed_classification_removes_extraction_dir() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("empty.zip");
        write_zip(&archive, &[("readme.txt", "nothing here")]);

        let before: Vec<_> = std::fs::read_dir(std::env::temp_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("tdnet-empty-"))
            .collect();

        let err = Filing::open(&archive).unwrap_err();
        assert!(matches!(err, XbrlError::Classification(_)));

        let after: Vec<_> = std::fs::read_dir(std::env::temp_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("tdnet-empty-"))
            .collect();
        assert_eq!(before.len(), after.len());
    }
}
