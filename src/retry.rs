//! Bounded retry loop with a pluggable delay source.

use crate::backoff::{DelayProvider, NoDelay};
use log::debug;
use std::future::Future;
use std::sync::Arc;

/// Runs an operation up to `max_attempts` times, sleeping for the delay
/// provider's current answer between attempts.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Arc<dyn DelayProvider>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("delay", &"<delay provider>")
            .finish()
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the first try and is at least 1.
    pub fn new(max_attempts: u32, delay: impl DelayProvider + 'static) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Arc::new(delay),
        }
    }

    /// Retry without waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, NoDelay)
    }

    /// Attempts made before the last error is returned.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `operation` until it succeeds or attempts run out.
    ///
    /// `operation` receives the 1-based attempt number. `on_failure` sees every
    /// failed attempt, including the last one, before the loop decides whether
    /// to go on. The final error is returned unchanged.
    pub async fn run<T, E, Op, Fut, F>(&self, mut operation: Op, mut on_failure: F) -> Result<T, E>
    where
        Op: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        F: FnMut(u32, &E),
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    on_failure(attempt, &err);
                    if attempt >= self.max_attempts {
                        return Err(err);
                    }

                    let delay = self.delay.next_delay();
                    if !delay.is_zero() {
                        debug!("Attempt {} failed. Retrying in {:.2?}", attempt, delay);
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}
