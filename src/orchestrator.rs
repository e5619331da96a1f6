//! Nested retry loops around proxy acquisition and whole-task execution.

use crate::backoff::{DelayProvider, UnbanBackoff};
use crate::config::RotationConfig;
use crate::error::{NoAvailableProxies, RetryExhausted, TaskError};
use crate::pool::ProxyPool;
use crate::proxy::ProxyHandle;
use crate::retry::RetryPolicy;
use crate::task::{ResultSink, SearchBackend, Task};
use crate::tracker::FailureTracker;

use log::{error, info, warn};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Runs tasks against a shared pool.
///
/// The inner loop retries `ProxyPool::acquire` with backoff derived from the
/// pool's ban state. The outer loop re-runs the whole task body, recording
/// every failure in the tracker, and never sleeps itself.
pub struct RetryOrchestrator {
    pool: Arc<ProxyPool>,
    tracker: Arc<FailureTracker>,
    backend: Arc<dyn SearchBackend>,
    sink: Arc<dyn ResultSink>,
    acquire_policy: RetryPolicy,
    task_policy: RetryPolicy,
    ban_duration: Duration,
}

impl RetryOrchestrator {
    /// Create an orchestrator with the attempt caps and cooldown from `config`.
    pub fn new(
        config: &RotationConfig,
        pool: Arc<ProxyPool>,
        tracker: Arc<FailureTracker>,
        backend: Arc<dyn SearchBackend>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        let backoff = UnbanBackoff::new(Arc::clone(&pool));
        Self {
            acquire_policy: RetryPolicy::new(config.acquire_attempts, backoff),
            task_policy: RetryPolicy::immediate(config.task_attempts),
            ban_duration: config.ban_duration,
            pool,
            tracker,
            backend,
            sink,
        }
    }

    /// Replace the wait used between acquisition attempts.
    pub fn with_acquire_backoff(mut self, delay: impl DelayProvider + 'static) -> Self {
        self.acquire_policy = RetryPolicy::new(self.acquire_policy.max_attempts(), delay);
        self
    }

    /// The shared proxy pool.
    pub fn pool(&self) -> &Arc<ProxyPool> {
        &self.pool
    }

    /// The shared failure tracker.
    pub fn tracker(&self) -> &Arc<FailureTracker> {
        &self.tracker
    }

    /// Run `task` until it succeeds or every outer attempt has failed.
    pub async fn run_task(&self, task: &Task) -> Result<Value, RetryExhausted> {
        let attempts = self.task_policy.max_attempts();

        let result = self
            .task_policy
            .run(
                move |_| self.attempt(task),
                move |attempt, err: &TaskError| {
                    self.tracker.record(task.id(), attempt, err);
                    if attempt < attempts {
                        warn!(
                            "Attempt {}/{} failed for '{}': {}. Retrying...",
                            attempt, attempts, task, err
                        );
                    }
                },
            )
            .await;

        result.map_err(|last| {
            let history = self.tracker.report(task.id());
            error!("All {} attempts failed for search '{}'", attempts, task);
            error!("Failure history:");
            for failure in &history {
                error!("{}", failure);
            }
            RetryExhausted {
                task: task.id().to_string(),
                attempts,
                history,
                last,
            }
        })
    }

    /// One pass of the task body: acquire, authenticate, search, persist.
    async fn attempt(&self, task: &Task) -> Result<Value, TaskError> {
        let proxy = self.acquire_proxy().await?;

        let credentials = self.backend.derive_credentials(&proxy).await?;
        let response = self.backend.execute(task, &credentials, &proxy).await?;

        if !response.is_object() {
            self.pool.ban_for(proxy.id(), self.ban_duration);
            return Err(TaskError::ResponseFormatInvalid {
                proxy: proxy.id().to_string(),
            });
        }

        self.sink.persist(task, &response).await?;
        info!("Saved results for '{}' using proxy: {}", task, proxy);
        self.pool.touch(proxy.id());
        Ok(response)
    }

    async fn acquire_proxy(&self) -> Result<ProxyHandle, NoAvailableProxies> {
        let pool = &self.pool;
        self.acquire_policy
            .run(
                move |_| async move { pool.acquire() },
                |attempt, err| {
                    error!("{} (acquire attempt {})", err, attempt);
                },
            )
            .await
    }
}
