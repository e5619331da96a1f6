//! Delay providers consulted between retry attempts.

use crate::pool::ProxyPool;
use std::sync::Arc;
use std::time::Duration;

/// Source of the wait before the next retry attempt.
///
/// Called once per retry, so providers backed by shared state see changes
/// made by other workers in the meantime.
pub trait DelayProvider: Send + Sync {
    /// Wait to apply before the next attempt.
    fn next_delay(&self) -> Duration;
}

impl<F> DelayProvider for F
where
    F: Fn() -> Duration + Send + Sync,
{
    fn next_delay(&self) -> Duration {
        self()
    }
}

/// Retry immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl DelayProvider for NoDelay {
    fn next_delay(&self) -> Duration {
        Duration::ZERO
    }
}

/// Wait until the soonest banned proxy in the pool comes back.
///
/// Uses the pool-wide earliest unban, regardless of which proxy the failed
/// attempt was waiting for.
#[derive(Clone)]
pub struct UnbanBackoff {
    pool: Arc<ProxyPool>,
}

impl UnbanBackoff {
    /// Create a backoff reading the ban state of `pool`.
    pub fn new(pool: Arc<ProxyPool>) -> Self {
        Self { pool }
    }
}

impl DelayProvider for UnbanBackoff {
    fn next_delay(&self) -> Duration {
        self.pool.min_wait_until_unban()
    }
}
