use std::collections::BTreeSet;
use std::path::Path;

use log::{debug, warn};

use super::filing::list_documents;
use super::report::{DocumentKind, FileCategory, ReportType};
use crate::core::error::{ClassificationError, Result};

/// Byte range of the report-type token inside a summary instance name,
/// e.g. `edjp` in `tse-acedjpsm-57210-...-ixbrl.htm`.
const SUMMARY_TOKEN: std::ops::Range<usize> = 6..10;
/// Hyphen segment holding the token of a lone instance, e.g. `rvdf` in
/// `tse-rvdf-57210-...-ixbrl.htm`.
const SINGLE_TOKEN_SEGMENT: usize = 1;

/// Types the filing extracted under `root` and checks that every document
/// category its report type requires is present.
pub fn classify(root: &Path) -> Result<ReportType> {
    let documents = list_documents(root);

    let instances: Vec<&str> = documents
        .iter()
        .filter(|d| d.category == FileCategory::Instance)
        .map(|d| d.file_name.as_str())
        .collect();

    let report_type = report_type_from_instances(&instances, root)?;

    let present: BTreeSet<FileCategory> = documents.iter().map(|d| d.category).collect();
    check_required(report_type, &present)?;

    Ok(report_type)
}

/// Reads the report-type token from the instance file names found in a bundle.
pub fn report_type_from_instances(
    instances: &[&str],
    root: &Path,
) -> std::result::Result<ReportType, ClassificationError> {
    let token = match instances {
        [] => return Err(ClassificationError::NoInstance(root.to_path_buf())),
        [single] if DocumentKind::of(single) == DocumentKind::Report => single
            .split('-')
            .nth(SINGLE_TOKEN_SEGMENT)
            .ok_or_else(|| ClassificationError::MalformedName(single.to_string()))?
            .to_string(),
        many => {
            let summary = many
                .iter()
                .find(|name| DocumentKind::of(name) == DocumentKind::Summary)
                .ok_or(ClassificationError::AmbiguousInstances { count: many.len() })?;
            if many.len() > 1 {
                debug!("{} instance documents, using summary {}", many.len(), summary);
            }
            summary
                .get(SUMMARY_TOKEN)
                .ok_or_else(|| ClassificationError::MalformedName(summary.to_string()))?
                .to_string()
        }
    };

    token
        .parse::<ReportType>()
        .map_err(|_| ClassificationError::UnknownReportType(token))
}

pub fn check_required(
    report_type: ReportType,
    present: &BTreeSet<FileCategory>,
) -> std::result::Result<(), ClassificationError> {
    let missing: Vec<FileCategory> = report_type
        .descriptor()
        .required
        .iter()
        .filter(|c| !present.contains(c))
        .copied()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        warn!("Report type {} is missing {:?}", report_type, missing);
        Err(ClassificationError::MissingCategories {
            report_type: report_type.to_string(),
            missing,
        })
    }
}
