//! Runs many filing archives through extraction and into a record sink.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use futures::stream::{self, StreamExt};
use log::{error, info, warn};
use serde::Serialize;
use walkdir::WalkDir;

use crate::core::config::ParserConfig;
use crate::storage::{RecordSet, RecordSink};
use crate::tdnet::filing::filing_id;
use crate::tdnet::{Filing, FilingModel};
use crate::utils::dirs;
use crate::utils::progress::BatchProgress;

pub const DEFAULT_CONCURRENCY: usize = 4;
pub const ERROR_LOG: &str = "errors.csv";
pub const TIMING_LOG: &str = "timings.csv";

const ERROR_HEADER: &[&str] = &["filing_id", "archive", "error"];
const TIMING_HEADER: &[&str] = &["filing_id", "archive", "started_at", "elapsed_ms", "status"];

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub parser: ParserConfig,
    /// Filings extracted at the same time.
    pub concurrency: usize,
    /// Directory receiving the error and timing logs.
    pub log_dir: PathBuf,
    pub show_progress: bool,
}

impl BatchConfig {
    pub fn new(parser: ParserConfig, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            parser,
            concurrency: DEFAULT_CONCURRENCY,
            log_dir: log_dir.into(),
            show_progress: false,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilingStatus {
    Success,
    Failed,
}

/// What happened to one archive.
#[derive(Debug, Clone)]
pub struct FilingOutcome {
    pub filing_id: String,
    pub archive: PathBuf,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub rows_written: u64,
    pub error: Option<String>,
}

impl FilingOutcome {
    pub fn status(&self) -> FilingStatus {
        match self.error {
            None => FilingStatus::Success,
            Some(_) => FilingStatus::Failed,
        }
    }
}

#[derive(Serialize)]
struct ErrorRecord<'a> {
    filing_id: &'a str,
    archive: String,
    error: &'a str,
}

#[derive(Serialize)]
struct TimingRecord<'a> {
    filing_id: &'a str,
    archive: String,
    started_at: String,
    elapsed_ms: u64,
    status: FilingStatus,
}

impl<'a> From<&'a FilingOutcome> for TimingRecord<'a> {
    fn from(outcome: &'a FilingOutcome) -> Self {
        TimingRecord {
            filing_id: &outcome.filing_id,
            archive: outcome.archive.display().to_string(),
            started_at: outcome.started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            elapsed_ms: outcome.elapsed_ms,
            status: outcome.status(),
        }
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<FilingOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status() == FilingStatus::Success)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn rows_written(&self) -> u64 {
        self.outcomes.iter().map(|o| o.rows_written).sum()
    }
}

fn is_zip(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("zip"))
        .unwrap_or(false)
}

/// Zip archives named directly or found anywhere under a named directory,
/// sorted and without duplicates.
pub fn collect_archives(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut archives = Vec::new();
    for input in inputs {
        if input.is_dir() {
            archives.extend(
                WalkDir::new(input)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .map(|e| e.into_path())
                    .filter(|p| is_zip(p)),
            );
        } else if is_zip(input) {
            archives.push(input.clone());
        } else {
            warn!("Skipping {}: not a zip archive", input.display());
        }
    }
    archives.sort();
    archives.dedup();
    archives
}

/// Opens one archive and builds all of its record sets. Blocking; the
/// extraction directory is gone by the time this returns.
pub fn extract_records(archive: &Path, config: &ParserConfig) -> Result<Vec<RecordSet>> {
    let filing = Filing::open(archive).with_context(|| format!("cannot open {}", archive.display()))?;
    let model = FilingModel::new(filing, config.clone())?;
    Ok(model.records()?)
}

async fn write_filing<S: RecordSink>(archive: &Path, config: ParserConfig, sink: &S) -> Result<u64> {
    let path = archive.to_path_buf();
    let sets = tokio::task::spawn_blocking(move || extract_records(&path, &config))
        .await
        .map_err(|e| anyhow!("extraction task failed: {}", e))??;

    // All tables of a filing land together or not at all.
    sink.write_all(&sets).await.context("cannot write records")
}

async fn process<S: RecordSink>(archive: PathBuf, config: ParserConfig, sink: &S) -> FilingOutcome {
    let id = filing_id(&archive);
    let started_at = Utc::now();
    let clock = Instant::now();

    let result = write_filing(&archive, config, sink).await;
    let elapsed_ms = clock.elapsed().as_millis() as u64;

    let (rows_written, error) = match result {
        Ok(rows) => {
            info!("Filing {} wrote {} rows in {} ms", id, rows, elapsed_ms);
            (rows, None)
        }
        Err(e) => {
            error!("Filing {} failed: {:#}", id, e);
            (0, Some(format!("{:#}", e)))
        }
    };

    FilingOutcome {
        filing_id: id,
        archive,
        started_at,
        elapsed_ms,
        rows_written,
        error,
    }
}

fn log_writer(path: &Path, header: &[&str]) -> Result<csv::Writer<std::fs::File>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("cannot create {}", path.display()))?;
    writer.write_record(header)?;
    Ok(writer)
}

/// Extracts every archive and writes its records to `sink`. A failing filing
/// is logged and recorded in the error log; the rest of the batch carries on.
pub async fn run_batch<S: RecordSink>(
    archives: Vec<PathBuf>,
    config: &BatchConfig,
    sink: &S,
) -> Result<BatchReport> {
    dirs::ensure_log_dir(&config.log_dir)?;
    let mut errors = log_writer(&config.log_dir.join(ERROR_LOG), ERROR_HEADER)?;
    let mut timings = log_writer(&config.log_dir.join(TIMING_LOG), TIMING_HEADER)?;

    info!(
        "Processing {} filings, {} at a time",
        archives.len(),
        config.concurrency
    );
    let progress = BatchProgress::new(archives.len() as u64, config.show_progress);

    let mut outcomes = stream::iter(archives)
        .map(|archive| process(archive, config.parser.clone(), sink))
        .buffer_unordered(config.concurrency.max(1));

    let mut report = BatchReport::default();
    while let Some(outcome) = outcomes.next().await {
        timings.serialize(TimingRecord::from(&outcome))?;
        if let Some(e) = &outcome.error {
            errors.serialize(ErrorRecord {
                filing_id: &outcome.filing_id,
                archive: outcome.archive.display().to_string(),
                error: e,
            })?;
        }
        progress.advance(&outcome.filing_id, outcome.error.is_none());
        report.outcomes.push(outcome);
    }

    errors.flush()?;
    timings.flush()?;
    progress.finish(report.succeeded(), report.failed());

    info!(
        "Batch done: {} succeeded, {} failed, {} rows written",
        report.succeeded(),
        report.failed(),
        report.rows_written()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{SqliteConfig, SqliteSink};
    use sqlx::sqlite::SqlitePoolOptions;
    use crate::tdnet::parsing::tests::{summary_bundle, taxonomy_cache_root, write_fixture_zip};
    use std::fs;

    async fn memory_sink() -> SqliteSink {
        let config = SqliteConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        };
        SqliteSink::new(config).await.unwrap()
    }

    #[test]
    fn test_collect_archives_walks_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("2023/05")).unwrap();
        fs::write(dir.path().join("b.zip"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::write(dir.path().join("2023/05/a.ZIP"), "").unwrap();

        let archives = collect_archives(&[dir.path().to_path_buf(), dir.path().join("b.zip")]);
        assert_eq!(
            archives,
            vec![dir.path().join("2023/05/a.ZIP"), dir.path().join("b.zip")]
        );
    }

    #[tokio::test]
    async fn test_failing_filing_does_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("081220230512582935.zip");
        write_fixture_zip(&good, &summary_bundle());
        let broken = dir.path().join("081220230512000000.zip");
        fs::write(&broken, "not a zip").unwrap();

        let logs = dir.path().join("logs");
        let parser = ParserConfig::new(taxonomy_cache_root()).offline(true);
        let config = BatchConfig::new(parser, &logs).with_concurrency(2);
        let sink = memory_sink().await;

        let report = run_batch(vec![good, broken], &config, &sink).await.unwrap();
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert!(report.rows_written() > 0);
        assert_eq!(sink.count("labels").await.unwrap(), 4);
        assert_eq!(sink.count("headers").await.unwrap(), 1);

        let errors = fs::read_to_string(logs.join(ERROR_LOG)).unwrap();
        let lines: Vec<&str> = errors.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "filing_id,archive,error");
        assert!(lines[1].starts_with("081220230512000000,"));

        let timings = fs::read_to_string(logs.join(TIMING_LOG)).unwrap();
        assert_eq!(timings.lines().count(), 3);
        assert!(timings.lines().any(|l| l.starts_with("081220230512582935,") && l.ends_with(",success")));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_rows_behind() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("081220230512582935.zip");
        write_fixture_zip(&archive, &summary_bundle());

        // A view cannot take new columns, so facts_numeric fails after the
        // earlier tables of the same filing have been written.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE VIEW facts_numeric AS SELECT 1 AS filing_id")
            .execute(&pool)
            .await
            .unwrap();
        let sink = SqliteSink::from_pool(pool.clone());

        let parser = ParserConfig::new(taxonomy_cache_root()).offline(true);
        let config = BatchConfig::new(parser, dir.path().join("logs"));
        let report = run_batch(vec![archive], &config, &sink).await.unwrap();
        assert_eq!(report.failed(), 1);
        assert_eq!(report.rows_written(), 0);

        let tables: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(tables, 0);
    }

    #[tokio::test]
    async fn test_rerunning_a_filing_inserts_nothing_new() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("081220230512582935.zip");
        write_fixture_zip(&archive, &summary_bundle());

        let parser = ParserConfig::new(taxonomy_cache_root()).offline(true);
        let config = BatchConfig::new(parser, dir.path().join("logs"));
        let sink = memory_sink().await;

        let first = run_batch(vec![archive.clone()], &config, &sink).await.unwrap();
        let second = run_batch(vec![archive], &config, &sink).await.unwrap();
        assert!(first.rows_written() > 0);
        assert_eq!(second.rows_written(), 0);
        assert_eq!(second.succeeded(), 1);
    }
}
