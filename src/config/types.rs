use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for pdf-harvester
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Download behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FetcherConfig {
    /// Total attempts per document, including the final (possibly unverified) one
    pub max_attempts: u32,

    /// Connect/read timeout for a single attempt (seconds)
    pub timeout_secs: u64,

    /// Fixed backoff between attempts (milliseconds)
    pub retry_delay_ms: u64,

    /// Minimum time between two downloads started by the pipeline (milliseconds)
    pub request_delay_ms: u64,

    /// Whether the final attempt may run without certificate verification
    /// after a certificate failure
    pub certificate_fallback: bool,

    /// Domain patterns (e.g., "*.nic.in") whose final attempt always runs
    /// without certificate verification
    pub trusted_domains: Vec<String>,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout_secs: 30,
            retry_delay_ms: 2000,
            request_delay_ms: 1000,
            certificate_fallback: true,
            trusted_domains: Vec::new(),
            user_agent: format!("pdf-harvester/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl FetcherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

/// How local filenames are derived from manifest entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilenameScheme {
    /// `pdf01.pdf`, `pdf02.pdf`, ... in manifest order
    Sequential,
    /// `<manifest id>.pdf`
    ManifestId,
}

/// What to do with a file whose fingerprint matches another document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Process it as an independent document
    Store,
    /// Reuse the stored results of the completed document with the same content
    Skip,
}

/// Pipeline behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PipelineConfig {
    /// Number of documents processed concurrently
    pub workers: u32,

    /// Maximum number of ranked keywords kept per document
    pub max_keywords: usize,

    /// Number of leading characters of the text kept as summary
    pub summary_chars: usize,

    pub filename_scheme: FilenameScheme,

    pub duplicate_policy: DuplicatePolicy,

    /// Process documents again even when they are already completed
    pub reprocess_completed: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_keywords: 10,
            summary_chars: 500,
            filename_scheme: FilenameScheme::Sequential,
            duplicate_policy: DuplicatePolicy::Store,
            reprocess_completed: false,
        }
    }
}

/// Storage locations
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    pub database_path: String,

    /// Directory downloaded PDFs are written to
    pub download_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "./pdf_harvest.db".to_string(),
            download_dir: "./pdf_downloads".to_string(),
        }
    }
}
