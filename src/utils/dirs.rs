use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::core::config::ParserConfig;

// Base data directory
pub const DATA_DIR: &str = "data";

// Batch error and timing logs
pub const LOG_DIR: &str = "data/logs";

pub fn ensure_dir(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::create_dir_all(path).with_context(|| format!("cannot create directory {}", path.display()))?;
    Ok(())
}

pub fn ensure_cache_dir(config: &ParserConfig) -> Result<()> {
    ensure_dir(&config.cache_root)
}

pub fn ensure_log_dir(log_dir: &Path) -> Result<()> {
    ensure_dir(log_dir)
}
