//! Configuration for proxy rotation and retries.

use std::path::PathBuf;
use std::time::Duration;

/// Default cooldown applied to a banned proxy.
pub const DEFAULT_BAN_DURATION: Duration = Duration::from_secs(180);

/// Default credentials endpoint of the search playground.
pub const DEFAULT_CREDENTIALS_URL: &str =
    "https://playground.netnut.io/_next/static/chunks/5396-fb805b9d40b0a4c9.js";

/// Default search endpoint of the search playground.
pub const DEFAULT_SEARCH_URL: &str = "https://netnut-api.netnut.io/api/v1/playground/search";

/// Configuration for a rotation run.
#[derive(Debug, Clone)]
pub struct RotationConfig {
    /// Path or URL of the newline-delimited proxy list.
    pub proxy_source: String,
    /// How long a failing proxy stays out of rotation.
    pub ban_duration: Duration,
    /// Attempts made to acquire a proxy before giving up on one task attempt.
    pub acquire_attempts: u32,
    /// Total executions of a task body (first try plus retries).
    pub task_attempts: u32,
    /// Number of concurrent workers.
    pub worker_count: usize,
    /// Timeout for each proxied request and for fetching a URL proxy source.
    pub request_timeout: Duration,
    /// Keep at most this many failure records per task.
    pub max_failures_per_task: Option<usize>,
    /// Directory the result files are written to.
    pub output_dir: PathBuf,
    /// URL the access keys are scraped from.
    pub credentials_url: String,
    /// URL search requests are posted to.
    pub search_url: String,
}

impl RotationConfig {
    /// Create a new configuration builder.
    pub fn builder() -> RotationConfigBuilder {
        RotationConfigBuilder::new()
    }
}

impl Default for RotationConfig {
    fn default() -> Self {
        RotationConfigBuilder::new().build()
    }
}

/// Worker count used when none is configured: `max(10, cpus * 5 / 2)`.
pub fn default_worker_count() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cpus * 5 / 2).max(10)
}

/// Builder for `RotationConfig`.
pub struct RotationConfigBuilder {
    proxy_source: Option<String>,
    ban_duration: Option<Duration>,
    acquire_attempts: Option<u32>,
    task_attempts: Option<u32>,
    worker_count: Option<usize>,
    request_timeout: Option<Duration>,
    max_failures_per_task: Option<usize>,
    output_dir: Option<PathBuf>,
    credentials_url: Option<String>,
    search_url: Option<String>,
}

impl RotationConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            proxy_source: None,
            ban_duration: None,
            acquire_attempts: None,
            task_attempts: None,
            worker_count: None,
            request_timeout: None,
            max_failures_per_task: None,
            output_dir: None,
            credentials_url: None,
            search_url: None,
        }
    }

    /// Set the path or URL of the proxy list.
    pub fn proxy_source(mut self, source: impl Into<String>) -> Self {
        self.proxy_source = Some(source.into());
        self
    }

    /// Set how long a failing proxy is banned.
    pub fn ban_duration(mut self, duration: Duration) -> Self {
        self.ban_duration = Some(duration);
        self
    }

    /// Set the number of proxy acquisition attempts per task attempt.
    pub fn acquire_attempts(mut self, attempts: u32) -> Self {
        self.acquire_attempts = Some(attempts);
        self
    }

    /// Set the total number of executions of a task.
    pub fn task_attempts(mut self, attempts: u32) -> Self {
        self.task_attempts = Some(attempts);
        self
    }

    /// Set the number of concurrent workers.
    pub fn worker_count(mut self, count: usize) -> Self {
        self.worker_count = Some(count);
        self
    }

    /// Set the timeout of each proxied request.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Cap the failure history kept per task.
    pub fn max_failures_per_task(mut self, cap: usize) -> Self {
        self.max_failures_per_task = Some(cap);
        self
    }

    /// Set the directory result files are written to.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Set the URL access keys are scraped from.
    pub fn credentials_url(mut self, url: impl Into<String>) -> Self {
        self.credentials_url = Some(url.into());
        self
    }

    /// Set the URL search requests are posted to.
    pub fn search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = Some(url.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> RotationConfig {
        RotationConfig {
            proxy_source: self.proxy_source.unwrap_or_else(|| "proxies.txt".to_string()),
            ban_duration: self.ban_duration.unwrap_or(DEFAULT_BAN_DURATION),
            acquire_attempts: self.acquire_attempts.unwrap_or(3).max(1),
            task_attempts: self.task_attempts.unwrap_or(11).max(1),
            worker_count: self.worker_count.unwrap_or_else(default_worker_count).max(1),
            request_timeout: self.request_timeout.unwrap_or(Duration::from_secs(5)),
            max_failures_per_task: self.max_failures_per_task,
            output_dir: self.output_dir.unwrap_or_else(|| PathBuf::from(".")),
            credentials_url: self
                .credentials_url
                .unwrap_or_else(|| DEFAULT_CREDENTIALS_URL.to_string()),
            search_url: self.search_url.unwrap_or_else(|| DEFAULT_SEARCH_URL.to_string()),
        }
    }
}

impl Default for RotationConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
