use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Article-Relay
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub reddit: RedditConfig,
    #[serde(default)]
    pub discover: DiscoverConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    pub process: ProcessConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

/// Cadence shared by every stage worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTiming {
    /// Sleep after a successful cycle
    pub interval: Duration,
    /// Sleep after a failed cycle
    pub error_interval: Duration,
}

impl LoopTiming {
    pub fn from_secs(interval: u64, error_interval: u64) -> Self {
        Self {
            interval: Duration::from_secs(interval),
            error_interval: Duration::from_secs(error_interval),
        }
    }
}

/// Persistent store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Maximum number of items leased per stage cycle
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: u32,
}

/// Reddit account and subreddit configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RedditConfig {
    #[serde(rename = "client-id")]
    pub client_id: String,

    #[serde(rename = "client-secret")]
    pub client_secret: String,

    pub username: String,

    pub password: String,

    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Subreddits whose new submissions are mirrored
    pub subreddits: Vec<String>,

    /// Subreddits where the bot may pin its first reply
    #[serde(default)]
    pub distinguishable: Vec<String>,

    /// Admission filter patterns ("example.com", "*.example.com", "*.pdf")
    #[serde(rename = "banned-domains", default)]
    pub banned_domains: Vec<String>,

    #[serde(rename = "api-base", default = "default_api_base")]
    pub api_base: String,

    #[serde(rename = "auth-base", default = "default_auth_base")]
    pub auth_base: String,
}

/// Discover stage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverConfig {
    #[serde(rename = "interval-secs", default = "default_discover_interval")]
    pub interval_secs: u64,

    #[serde(rename = "error-interval-secs", default = "default_error_interval")]
    pub error_interval_secs: u64,

    /// Candidates created longer ago than this are skipped
    #[serde(rename = "max-age-hours", default = "default_max_age_hours")]
    pub max_age_hours: u64,

    /// Ignore submissions that already exist when the source starts
    #[serde(rename = "skip-existing", default = "default_true")]
    pub skip_existing: bool,
}

/// Fetch stage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(rename = "interval-secs", default = "default_stage_interval")]
    pub interval_secs: u64,

    #[serde(rename = "error-interval-secs", default = "default_error_interval")]
    pub error_interval_secs: u64,

    /// Delay before a failed fetch is attempted again
    #[serde(rename = "retry-delay-secs", default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Failed attempts tolerated before the item is evicted
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(rename = "timeout-secs", default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(rename = "user-agent", default = "default_fetch_user_agent")]
    pub user_agent: String,
}

/// Process stage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessConfig {
    #[serde(rename = "interval-secs", default = "default_stage_interval")]
    pub interval_secs: u64,

    #[serde(rename = "error-interval-secs", default = "default_error_interval")]
    pub error_interval_secs: u64,

    /// Markdown block appended to every formatted article
    pub signature: String,
}

/// Publish stage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PublishConfig {
    #[serde(rename = "interval-secs", default = "default_stage_interval")]
    pub interval_secs: u64,

    #[serde(rename = "error-interval-secs", default = "default_error_interval")]
    pub error_interval_secs: u64,

    /// Maximum length of a single reply
    #[serde(rename = "max-length", default = "default_max_length")]
    pub max_length: usize,

    /// Pause between chained replies (milliseconds)
    #[serde(rename = "chunk-pause-ms", default = "default_chunk_pause")]
    pub chunk_pause_ms: u64,

    /// Subreddits whose last reply gets the coverage trailer
    #[serde(default)]
    pub coverage: Vec<String>,

    #[serde(rename = "coverage-trailer", default)]
    pub coverage_trailer: String,
}

/// Cleanup stage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    #[serde(rename = "interval-secs", default = "default_cleanup_interval")]
    pub interval_secs: u64,

    #[serde(rename = "error-interval-secs", default = "default_error_interval")]
    pub error_interval_secs: u64,

    /// Published items older than this are purged
    #[serde(rename = "max-age-hours", default = "default_max_age_hours")]
    pub max_age_hours: u64,
}

impl DiscoverConfig {
    pub fn timing(&self) -> LoopTiming {
        LoopTiming::from_secs(self.interval_secs, self.error_interval_secs)
    }

    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::hours(self.max_age_hours as i64)
    }
}

impl FetchConfig {
    pub fn timing(&self) -> LoopTiming {
        LoopTiming::from_secs(self.interval_secs, self.error_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ProcessConfig {
    pub fn timing(&self) -> LoopTiming {
        LoopTiming::from_secs(self.interval_secs, self.error_interval_secs)
    }
}

impl PublishConfig {
    pub fn timing(&self) -> LoopTiming {
        LoopTiming::from_secs(self.interval_secs, self.error_interval_secs)
    }

    pub fn chunk_pause(&self) -> Duration {
        Duration::from_millis(self.chunk_pause_ms)
    }
}

impl CleanupConfig {
    pub fn timing(&self) -> LoopTiming {
        LoopTiming::from_secs(self.interval_secs, self.error_interval_secs)
    }

    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::hours(self.max_age_hours as i64)
    }
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_discover_interval(),
            error_interval_secs: default_error_interval(),
            max_age_hours: default_max_age_hours(),
            skip_existing: true,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_stage_interval(),
            error_interval_secs: default_error_interval(),
            retry_delay_secs: default_retry_delay(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout(),
            user_agent: default_fetch_user_agent(),
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_stage_interval(),
            error_interval_secs: default_error_interval(),
            max_length: default_max_length(),
            chunk_pause_ms: default_chunk_pause(),
            coverage: Vec::new(),
            coverage_trailer: String::new(),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_cleanup_interval(),
            error_interval_secs: default_error_interval(),
            max_age_hours: default_max_age_hours(),
        }
    }
}

fn default_batch_size() -> u32 {
    crate::storage::DEFAULT_BATCH_SIZE
}

fn default_api_base() -> String {
    "https://oauth.reddit.com".to_string()
}

fn default_auth_base() -> String {
    "https://www.reddit.com".to_string()
}

fn default_discover_interval() -> u64 {
    300
}

fn default_stage_interval() -> u64 {
    60
}

fn default_error_interval() -> u64 {
    60
}

fn default_cleanup_interval() -> u64 {
    3600
}

fn default_max_age_hours() -> u64 {
    24
}

fn default_retry_delay() -> u64 {
    600
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout() -> u64 {
    30
}

fn default_max_length() -> usize {
    10_000
}

fn default_chunk_pause() -> u64 {
    2_000
}

fn default_true() -> bool {
    true
}

fn default_fetch_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/110.0.0.0 Safari/537.36"
        .to_string()
}
