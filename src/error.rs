//! Error types for the reqwest-proxy-rotation crate.

use crate::tracker::FailureRecord;
use thiserror::Error;

/// Error returned when the proxy source yields no usable endpoints.
#[derive(Debug, Error)]
#[error("No proxies loaded from {origin}: {reason}")]
pub struct NoProxiesLoaded {
    /// The path or URL the pool was loaded from.
    pub origin: String,
    /// Why nothing was loaded.
    pub reason: String,
}

/// Error returned when every proxy in the pool is currently banned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("No available proxies")]
pub struct NoAvailableProxies;

/// Failure of a single task attempt.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Proxy acquisition failed after the inner retry loop gave up.
    #[error(transparent)]
    NoAvailableProxies(#[from] NoAvailableProxies),

    /// Access keys could not be obtained through the proxy.
    #[error("Access keys not found for proxy {proxy}")]
    CredentialExtractionFailed { proxy: String },

    /// The service answered with something other than a JSON object.
    #[error("Unexpected response format from proxy {proxy}")]
    ResponseFormatInvalid { proxy: String },

    /// Network failure, timeout or undecodable body.
    #[error("Request through proxy {proxy} failed: {source}")]
    RequestTransport {
        proxy: String,
        #[source]
        source: reqwest_middleware::Error,
    },

    /// The result could not be written to the sink.
    #[error("Failed to persist result: {0}")]
    Persist(#[from] std::io::Error),

    /// The task stopped without producing a result (e.g. it panicked).
    #[error("Task aborted: {reason}")]
    Aborted { reason: String },
}

impl TaskError {
    /// Wrap a transport error raised while talking through `proxy`.
    pub fn transport(proxy: impl Into<String>, source: impl Into<reqwest_middleware::Error>) -> Self {
        TaskError::RequestTransport {
            proxy: proxy.into(),
            source: source.into(),
        }
    }
}

/// Returned once a task has used up every outer-loop attempt.
#[derive(Debug, Error)]
#[error("All {attempts} attempts failed for task '{task}'")]
pub struct RetryExhausted {
    /// Identity of the task that failed.
    pub task: String,
    /// Number of attempts made.
    pub attempts: u32,
    /// Every recorded failure for the task, oldest first.
    pub history: Vec<FailureRecord>,
    /// Error of the final attempt.
    #[source]
    pub last: TaskError,
}
