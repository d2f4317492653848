use anyhow::{anyhow, Result};
use std::path::PathBuf;
use structopt::StructOpt;
use tdnet_xbrl::{
    batch::{self, BatchConfig},
    core::config::{LabelLanguage, ParserConfig},
    storage::{RecordSink, SqliteConfig, SqliteSink},
    utils::dirs,
};

#[derive(StructOpt, Debug)]
struct ParserOpts {
    /// Overrides TDNET_CACHE_DIR
    #[structopt(long, parse(from_os_str))]
    cache_dir: Option<PathBuf>,

    /// Label language, `ja` or `en`
    #[structopt(long)]
    lang: Option<LabelLanguage>,

    /// Resolve taxonomy files from the cache only
    #[structopt(long)]
    offline: bool,
}

impl ParserOpts {
    fn config(&self) -> Result<ParserConfig> {
        let mut config = ParserConfig::from_env()?;
        if let Some(dir) = &self.cache_dir {
            config.cache_root = dir.clone();
        }
        if let Some(lang) = self.lang {
            config = config.with_label_language(lang);
        }
        if self.offline {
            config = config.offline(true);
        }
        Ok(config)
    }
}

#[derive(StructOpt, Debug)]
#[structopt(name = "tdnet-cli", about = "Extract tables from TDnet XBRL filings")]
enum Command {
    /// Print every record set of one filing as JSON
    Parse {
        #[structopt(parse(from_os_str))]
        archive: PathBuf,
        #[structopt(flatten)]
        parser: ParserOpts,
    },
    /// Extract many filings into a SQLite database
    Batch {
        /// Zip archives, or directories searched for them
        #[structopt(parse(from_os_str), required = true)]
        inputs: Vec<PathBuf>,
        #[structopt(long, default_value = "sqlite://data/tdnet.db")]
        db: String,
        #[structopt(long, default_value = "4")]
        concurrency: usize,
        /// Where the error and timing logs go
        #[structopt(long, parse(from_os_str), default_value = "data/logs")]
        log_dir: PathBuf,
        #[structopt(flatten)]
        parser: ParserOpts,
    },
}

async fn parse(archive: PathBuf, config: ParserConfig) -> Result<()> {
    if !archive.exists() {
        return Err(anyhow!("Input file does not exist: {:?}", archive));
    }
    dirs::ensure_cache_dir(&config)?;

    // The taxonomy cache downloads with a blocking client.
    let sets = tokio::task::spawn_blocking(move || batch::extract_records(&archive, &config)).await??;
    println!("{}", serde_json::to_string_pretty(&sets)?);
    Ok(())
}

async fn run_batch(inputs: Vec<PathBuf>, db: String, concurrency: usize, log_dir: PathBuf, config: ParserConfig) -> Result<()> {
    dirs::ensure_cache_dir(&config)?;
    let archives = batch::collect_archives(&inputs);
    if archives.is_empty() {
        return Err(anyhow!("No zip archives found in {:?}", inputs));
    }

    let sink = SqliteSink::new(SqliteConfig::new(db)).await?;
    let batch_config = BatchConfig::new(config, log_dir)
        .with_concurrency(concurrency)
        .with_progress(true);

    let report = batch::run_batch(archives, &batch_config, &sink).await?;
    println!(
        "{} filings processed: {} succeeded, {} failed, {} rows written",
        report.outcomes.len(),
        report.succeeded(),
        report.failed(),
        report.rows_written()
    );
    if report.failed() > 0 {
        println!(
            "See {} for details",
            batch_config.log_dir.join(batch::ERROR_LOG).display()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();
    log::debug!("Logger initialized");

    match Command::from_args() {
        Command::Parse { archive, parser } => parse(archive, parser.config()?).await,
        Command::Batch {
            inputs,
            db,
            concurrency,
            log_dir,
            parser,
        } => run_batch(inputs, db, concurrency, log_dir, parser.config()?).await,
    }
}
