use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{Result, XbrlError};

/// Smallest delay allowed between two taxonomy downloads.
pub const MIN_FETCH_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_FETCH_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_USER_AGENT: &str = "tdnet-xbrl/0.1 (software@example.com)";
pub const DEFAULT_CACHE_DIR: &str = "data/taxonomy";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LabelLanguage {
    Japanese,
    English,
}

impl LabelLanguage {
    /// `xml:lang` value carried by label resources in this language.
    pub fn code(&self) -> &'static str {
        match self {
            LabelLanguage::Japanese => "ja",
            LabelLanguage::English => "en",
        }
    }
}

impl FromStr for LabelLanguage {
    type Err = XbrlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ja" | "jp" | "japanese" => Ok(LabelLanguage::Japanese),
            "en" | "english" => Ok(LabelLanguage::English),
            other => Err(XbrlError::Config(format!("unknown label language '{}'", other))),
        }
    }
}

/// Immutable settings for one resolver/model instance. Changing any of them
/// means building a new `FilingModel`.
#[derive(Clone, Debug, PartialEq)]
pub struct ParserConfig {
    pub cache_root: PathBuf,
    pub fetch_interval: Duration,
    pub user_agent: String,
    pub label_language: LabelLanguage,
    /// Never touch the network; cache misses become resolution errors.
    pub offline: bool,
}

impl ParserConfig {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            fetch_interval: DEFAULT_FETCH_INTERVAL,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            label_language: LabelLanguage::Japanese,
            offline: false,
        }
    }

    /// Rejects intervals under `MIN_FETCH_INTERVAL` instead of clamping them.
    pub fn with_fetch_interval(mut self, interval: Duration) -> Result<Self> {
        if interval < MIN_FETCH_INTERVAL {
            return Err(XbrlError::Config(format!(
                "fetch interval {:?} is below the minimum of {:?}",
                interval, MIN_FETCH_INTERVAL
            )));
        }
        self.fetch_interval = interval;
        Ok(self)
    }

    pub fn with_label_language(mut self, language: LabelLanguage) -> Self {
        self.label_language = language;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn from_env() -> Result<Self> {
        let cache_root = PathBuf::from(
            std::env::var("TDNET_CACHE_DIR").unwrap_or_else(|_| DEFAULT_CACHE_DIR.to_string()),
        );

        let mut config = ParserConfig::new(cache_root);

        if let Ok(ms) = std::env::var("TDNET_FETCH_INTERVAL_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|_| XbrlError::Config(format!("TDNET_FETCH_INTERVAL_MS is not a number: {}", ms)))?;
            config = config.with_fetch_interval(Duration::from_millis(ms))?;
        }

        if let Ok(agent) = std::env::var("TDNET_USER_AGENT") {
            config = config.with_user_agent(agent);
        }

        if let Ok(lang) = std::env::var("TDNET_LABEL_LANG") {
            config = config.with_label_language(lang.parse()?);
        }

        let offline = std::env::var("TDNET_OFFLINE")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(config.offline(offline))
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_interval_below_minimum_is_rejected() {
        let result = ParserConfig::new("cache").with_fetch_interval(Duration::from_millis(200));
        assert!(matches!(result, Err(XbrlError::Config(_))));
    }

    #[test]
    fn test_fetch_interval_at_minimum_is_accepted() {
        let config = ParserConfig::new("cache")
            .with_fetch_interval(MIN_FETCH_INTERVAL)
            .unwrap();
        assert_eq!(config.fetch_interval, MIN_FETCH_INTERVAL);
    }

    #[test]
    fn test_label_language_parse() {
        assert_eq!("EN".parse::<LabelLanguage>().unwrap(), LabelLanguage::English);
        assert_eq!("ja".parse::<LabelLanguage>().unwrap(), LabelLanguage::Japanese);
        assert!("fr".parse::<LabelLanguage>().is_err());
    }
}
