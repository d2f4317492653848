use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tdnet_xbrl::batch::{self, BatchConfig};
use tdnet_xbrl::storage::{RecordSink, SqliteConfig, SqliteSink};
use tdnet_xbrl::tdnet::parsing::LinkbaseKind;
use tdnet_xbrl::{Filing, FilingModel, ParserConfig, ReportType, XbrlError};
use tempfile::tempdir;

const DATA: &str = "src/tdnet/parsing/tests/data";
const PREFIX: &str = "tse-acedjpsm-72030-20230512382920";

fn offline_config() -> ParserConfig {
    ParserConfig::new(Path::new(DATA).join("taxonomy")).offline(true)
}

fn bundle(dir: &Path, name: &str, suffixes: &[&str]) -> PathBuf {
    let archive = dir.join(name);
    let mut zip = zip::ZipWriter::new(File::create(&archive).unwrap());
    let options = zip::write::SimpleFileOptions::default();
    for suffix in suffixes {
        let file = format!("{}{}", PREFIX, suffix);
        let body = fs::read(Path::new(DATA).join(&file)).unwrap();
        zip.start_file(format!("XBRLData/Summary/{}", file), options).unwrap();
        zip.write_all(&body).unwrap();
    }
    zip.finish().unwrap();
    archive
}

const FULL: &[&str] = &["-ixbrl.htm", ".xsd", "-lab.xml", "-cal.xml", "-def.xml", "-pre.xml"];

#[test]
fn test_earnings_summary_end_to_end() {
    let dir = tempdir().unwrap();
    let archive = bundle(dir.path(), "081220230512582935.zip", FULL);

    let filing = Filing::open(&archive).unwrap();
    let root = filing.root().to_path_buf();
    assert!(root.is_dir());
    assert_eq!(filing.id, "081220230512582935");
    assert_eq!(filing.report_type, ReportType::EarningsJapanGaap);

    let model = FilingModel::new(filing, offline_config()).unwrap();

    let numeric = model.numeric_facts().unwrap();
    let sales = numeric
        .iter()
        .find(|f| f.concept.as_deref() == Some("NetSales") && !f.nil)
        .unwrap();
    assert_eq!(sales.value.map(|v| v.to_string()).as_deref(), Some("37154298"));
    assert_eq!(sales.display_scale.as_deref(), Some("millions of yen"));
    assert!(numeric.iter().any(|f| f.context_missing));

    let header = model.header().unwrap();
    assert_eq!(header.company_name.as_deref(), Some("トヨタ自動車株式会社"));
    assert_eq!(header.filing_date.as_deref(), Some("2023-05-10"));

    // Locators are pruned to concepts with facts, arcs follow their locators.
    let locators = model.locators(LinkbaseKind::Calculation).unwrap();
    assert!(locators.iter().all(|l| l.concept.as_deref() != Some("OrdinaryIncome")));
    assert_eq!(model.arcs(LinkbaseKind::Calculation).unwrap().len(), 1);

    let sets = model.records().unwrap();
    assert_eq!(sets.len(), 14);
    drop(model);
    assert!(!root.exists());
}

#[test]
fn test_missing_required_document_fails_classification() {
    let dir = tempdir().unwrap();
    let archive = bundle(
        dir.path(),
        "081220230512582936.zip",
        &["-ixbrl.htm", ".xsd", "-lab.xml", "-def.xml", "-pre.xml"],
    );

    match Filing::open(&archive) {
        Err(XbrlError::Classification(e)) => assert!(e.to_string().contains("Calculation")),
        other => panic!("expected a classification error, got {:?}", other.map(|f| f.id)),
    }
}

#[test]
fn test_offline_cache_miss_empties_linkbase_tables() {
    let dir = tempdir().unwrap();
    let cache = tempdir().unwrap();
    let archive = bundle(dir.path(), "081220230512582935.zip", FULL);

    // The remote schema import cannot be followed, so none of the linkbase
    // tables can be complete.
    let config = ParserConfig::new(cache.path()).offline(true);
    let model = FilingModel::new(Filing::open(&archive).unwrap(), config).unwrap();

    match model.labels() {
        Err(XbrlError::Resolution { href, .. }) => assert!(href.ends_with("tse-ed-t-2014-01-12.xsd")),
        other => panic!("expected a resolution error, got {:?}", other.map(|l| l.len())),
    }
    assert!(model.calculations().is_err());

    let sets = model.records().unwrap();
    for name in ["roles", "locators", "arcs", "labels", "calculations", "definitions", "presentations"] {
        let set = sets.iter().find(|s| s.name == name).unwrap();
        assert!(set.is_empty(), "{} should be empty", name);
    }
    let facts = sets.iter().find(|s| s.name == "facts_numeric").unwrap();
    assert!(!facts.is_empty());

    let sources = sets.iter().find(|s| s.name == "source_files").unwrap();
    assert!(sources.rows.iter().all(|r| r["origin"] == "local"));
    assert_eq!(sources.len(), 6);
}

#[tokio::test]
async fn test_batch_into_sqlite() {
    let dir = tempdir().unwrap();
    let inputs = dir.path().join("inputs");
    fs::create_dir_all(&inputs).unwrap();
    bundle(&inputs, "081220230512582935.zip", FULL);
    fs::write(inputs.join("readme.txt"), "ignored").unwrap();

    let archives = batch::collect_archives(&[inputs]);
    assert_eq!(archives.len(), 1);

    let sink = SqliteSink::new(SqliteConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    })
    .await
    .unwrap();
    let config = BatchConfig::new(offline_config(), dir.path().join("logs"));

    let report = batch::run_batch(archives, &config, &sink).await.unwrap();
    assert_eq!(report.failed(), 0);
    assert_eq!(sink.count("calculations").await.unwrap(), 1);
    assert_eq!(sink.count("source_files").await.unwrap(), 8);
    assert_eq!(sink.count("units").await.unwrap(), 3);
}
