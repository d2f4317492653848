use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::tdnet::report::FileCategory;

pub type Result<T> = std::result::Result<T, XbrlError>;

/// Reasons a filing bundle could not be typed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClassificationError {
    #[error("no instance document found under {0}")]
    NoInstance(PathBuf),
    #[error("{count} instance documents found and none is a summary")]
    AmbiguousInstances { count: usize },
    #[error("instance file name '{0}' does not carry a report-type token")]
    MalformedName(String),
    #[error("unknown report-type token '{0}'")]
    UnknownReportType(String),
    #[error("report type '{report_type}' is missing required documents: {missing:?}")]
    MissingCategories {
        report_type: String,
        missing: Vec<FileCategory>,
    },
}

#[derive(Debug, Error)]
pub enum XbrlError {
    #[error("classification failed: {0}")]
    Classification(#[from] ClassificationError),
    #[error("could not resolve '{href}': {reason}")]
    Resolution { href: String, reason: String },
    #[error("no <{tag}> declarations in {path}")]
    TagNotFound { tag: String, path: PathBuf },
    #[error("fetching {url} failed: {reason}")]
    Fetch { url: String, reason: String },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("malformed XML in {path}: {source}")]
    Xml {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },
    #[error("XML scan of {path} failed: {reason}")]
    XmlScan { path: PathBuf, reason: String },
    #[error("could not serialize record: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl XbrlError {
    pub fn resolution(href: impl Into<String>, reason: impl ToString) -> Self {
        XbrlError::Resolution {
            href: href.into(),
            reason: reason.to_string(),
        }
    }
}
