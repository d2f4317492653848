use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use url::Url;

use crate::core::config::ParserConfig;
use crate::core::error::{Result, XbrlError};

/// Something that can download a taxonomy document.
pub trait RemoteSource: Send + Sync {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>>;
}

/// Blocking HTTP source for taxonomy distribution endpoints.
pub struct HttpSource {
    client: reqwest::blocking::Client,
}

impl HttpSource {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| XbrlError::Config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl RemoteSource for HttpSource {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        log::debug!("Fetching URL: {}", url);

        let response = self
            .client
            .get(url.as_str())
            .send()
            .map_err(|e| XbrlError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        log::debug!("Response status: {}", response.status());

        if !response.status().is_success() {
            return Err(XbrlError::Fetch {
                url: url.to_string(),
                reason: format!("HTTP request failed with status: {}", response.status()),
            });
        }

        let body = response.bytes().map_err(|e| XbrlError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        log::debug!("Received content length: {}", body.len());
        Ok(body.to_vec())
    }
}

/// Time of the last completed download, shared by every cache in the process.
/// Holding the lock for the whole download also serializes writers of the
/// same cache path.
static FETCH_GATE: Lazy<Mutex<Option<Instant>>> = Lazy::new(|| Mutex::new(None));

/// Local mirror of remote taxonomy files, laid out as `<root>/<host>/<path>`.
pub struct TaxonomyCache {
    root: PathBuf,
    interval: Duration,
    offline: bool,
    source: Box<dyn RemoteSource>,
}

impl TaxonomyCache {
    pub fn new(config: &ParserConfig) -> Result<Self> {
        let source = HttpSource::new(&config.user_agent)?;
        Ok(Self::with_source(config, Box::new(source)))
    }

    pub fn with_source(config: &ParserConfig, source: Box<dyn RemoteSource>) -> Self {
        Self {
            root: config.cache_root.clone(),
            interval: config.fetch_interval,
            offline: config.offline,
            source,
        }
    }

    /// Same remote source under new settings.
    pub fn reconfigure(self, config: &ParserConfig) -> Self {
        Self::with_source(config, self.source)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `url` lives in the cache.
    pub fn cache_path(&self, url: &Url) -> Result<PathBuf> {
        let host = url
            .host_str()
            .ok_or_else(|| XbrlError::resolution(url.as_str(), "URL has no host"))?;
        let mut path = self.root.join(host);
        for segment in url.path_segments().into_iter().flatten() {
            if segment.is_empty() || segment == "." || segment == ".." {
                continue;
            }
            path.push(segment);
        }
        Ok(path)
    }

    /// Local path for `url`, downloading it first on a cache miss.
    pub fn resolve(&self, url: &Url) -> Result<PathBuf> {
        let path = self.cache_path(url)?;
        if path.is_file() {
            log::debug!("Cache hit for {}", url);
            return Ok(path);
        }
        if self.offline {
            return Err(XbrlError::resolution(url.as_str(), "not cached and offline mode is on"));
        }

        let mut last = FETCH_GATE
            .lock()
            .map_err(|_| XbrlError::resolution(url.as_str(), "fetch gate poisoned"))?;

        // Another thread may have written it while we waited on the gate.
        if path.is_file() {
            return Ok(path);
        }

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                let wait = self.interval - elapsed;
                log::debug!("Throttling taxonomy fetch for {:?}", wait);
                std::thread::sleep(wait);
            }
        }

        log::info!("Downloading {}", url);
        let result = self.source.fetch(url);
        *last = Some(Instant::now());
        let body = result?;

        persist(&path, &body)?;
        log::debug!("Saved {} to {:?}", url, path);
        Ok(path)
    }
}

/// Writes through a sibling temp file and renames it into place.
fn persist(path: &Path, body: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| XbrlError::resolution(path.display().to_string(), "cache path has no parent"))?;
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(body)?;
    tmp.persist(path).map_err(|e| XbrlError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// In-memory remote that counts downloads.
    pub struct StubSource {
        pub files: HashMap<String, String>,
        pub calls: Arc<AtomicUsize>,
    }

    impl StubSource {
        pub fn new(files: &[(&str, &str)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl RemoteSource for StubSource {
        fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.files
                .get(url.as_str())
                .map(|s| s.as_bytes().to_vec())
                .ok_or_else(|| XbrlError::Fetch {
                    url: url.to_string(),
                    reason: "HTTP request failed with status: 404 Not Found".to_string(),
                })
        }
    }

    #[test]
    fn test_cache_path_mirrors_url() {
        let config = ParserConfig::new("/cache");
        let cache = TaxonomyCache::with_source(&config, Box::new(StubSource::new(&[])));
        let url = Url::parse("http://disclosure.edinet-fsa.go.jp/taxonomy/jppfs/2022-11-01/jppfs_cor_2022-11-01.xsd").unwrap();
        assert_eq!(
            cache.cache_path(&url).unwrap(),
            PathBuf::from("/cache/disclosure.edinet-fsa.go.jp/taxonomy/jppfs/2022-11-01/jppfs_cor_2022-11-01.xsd")
        );
    }

    #[test]
    fn test_miss_fetches_once_then_hits() {
        let dir = tempfile::tempdir().unwrap();
        let config = ParserConfig::new(dir.path());
        let url = "http://example.com/tax/a.xsd";
        let stub = StubSource::new(&[(url, "<schema/>")]);
        let calls = stub.calls.clone();
        let cache = TaxonomyCache::with_source(&config, Box::new(stub));

        let url = Url::parse(url).unwrap();
        let first = cache.resolve(&url).unwrap();
        let second = cache.resolve(&url).unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read_to_string(&first).unwrap(), "<schema/>");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fetch_failure_is_fatal_and_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let config = ParserConfig::new(dir.path());
        let stub = StubSource::new(&[]);
        let calls = stub.calls.clone();
        let cache = TaxonomyCache::with_source(&config, Box::new(stub));

        let url = Url::parse("http://example.com/missing.xsd").unwrap();
        assert!(matches!(cache.resolve(&url), Err(XbrlError::Fetch { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!cache.cache_path(&url).unwrap().exists());
    }

    #[test]
    fn test_offline_miss_is_resolution_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = ParserConfig::new(dir.path()).offline(true);
        let cache = TaxonomyCache::with_source(&config, Box::new(StubSource::new(&[])));
        let url = Url::parse("http://example.com/a.xsd").unwrap();
        assert!(matches!(cache.resolve(&url), Err(XbrlError::Resolution { .. })));
    }

    /// Remote that records when each download started.
    struct TimedSource {
        started: Arc<Mutex<Vec<Instant>>>,
    }

    impl RemoteSource for TimedSource {
        fn fetch(&self, _url: &Url) -> Result<Vec<u8>> {
            self.started.lock().unwrap().push(Instant::now());
            Ok(b"<schema/>".to_vec())
        }
    }

    #[test]
    fn test_consecutive_misses_wait_out_the_interval() {
        let dir = tempfile::tempdir().unwrap();
        let interval = Duration::from_secs(1);
        let config = ParserConfig::new(dir.path()).with_fetch_interval(interval).unwrap();
        let started = Arc::new(Mutex::new(Vec::new()));
        let source = TimedSource { started: started.clone() };
        let cache = TaxonomyCache::with_source(&config, Box::new(source));

        let clock = Instant::now();
        cache.resolve(&Url::parse("http://example.com/tax/a.xsd").unwrap()).unwrap();
        cache.resolve(&Url::parse("http://example.com/tax/b.xsd").unwrap()).unwrap();

        let started = started.lock().unwrap();
        assert_eq!(started.len(), 2);
        assert!(started[1].duration_since(started[0]) >= interval);
        assert!(clock.elapsed() >= interval);
    }
}
