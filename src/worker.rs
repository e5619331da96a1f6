//! Fixed-size worker pool dispatching tasks to the orchestrator.

use crate::config::RotationConfig;
use crate::error::{NoProxiesLoaded, RetryExhausted, TaskError};
use crate::orchestrator::RetryOrchestrator;
use crate::pool::ProxyPool;
use crate::task::{ResultSink, SearchBackend, Task};
use crate::tracker::FailureTracker;

use futures::future::{self, FutureExt};
use log::{error, info};
use parking_lot::Mutex;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Final state of one dispatched task.
#[derive(Debug)]
pub struct TaskOutcome {
    /// The task as dispatched.
    pub task: Task,
    /// Its result, or why it gave up.
    pub result: Result<Value, RetryExhausted>,
}

/// Outcomes of a whole run, in input order.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<TaskOutcome>,
}

impl RunSummary {
    /// Number of tasks that produced a result.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    /// Number of tasks that ended without a result.
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Tasks that used up all their attempts or were aborted.
    pub fn failures(&self) -> impl Iterator<Item = &RetryExhausted> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().err())
    }
}

/// A fixed number of workers pulling tasks off a shared queue.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    size: usize,
}

impl WorkerPool {
    /// Create a pool of `size` workers (at least one).
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    /// Number of workers.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Run every task and wait for all of them.
    ///
    /// A task that exhausts its retries or panics is reported as failed in
    /// the summary; it never stops the other workers.
    pub async fn run(&self, tasks: Vec<Task>, orchestrator: Arc<RetryOrchestrator>) -> RunSummary {
        let total = tasks.len();
        let tasks: Arc<[Task]> = tasks.into();
        let next = Arc::new(AtomicUsize::new(0));
        let slots: Arc<Mutex<Vec<Option<TaskResult>>>> =
            Arc::new(Mutex::new((0..total).map(|_| None).collect()));
        let workers = self.size.min(total.max(1));

        info!("Using a worker pool with {} workers for {} tasks.", workers, total);

        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let tasks = Arc::clone(&tasks);
                let next = Arc::clone(&next);
                let slots = Arc::clone(&slots);
                let orchestrator = Arc::clone(&orchestrator);
                tokio::spawn(async move {
                    loop {
                        let idx = next.fetch_add(1, Ordering::Relaxed);
                        let Some(task) = tasks.get(idx) else {
                            break;
                        };
                        let result = match AssertUnwindSafe(orchestrator.run_task(task))
                            .catch_unwind()
                            .await
                        {
                            Ok(result) => result,
                            Err(payload) => {
                                let reason = panic_reason(payload.as_ref());
                                error!("Task '{}' panicked: {}", task, reason);
                                Err(aborted(&orchestrator, task, reason))
                            }
                        };
                        slots.lock()[idx] = Some(result);
                    }
                })
            })
            .collect();

        for joined in future::join_all(handles).await {
            if let Err(e) = joined {
                error!("Worker terminated abnormally: {}", e);
            }
        }

        let slots = std::mem::take(&mut *slots.lock());
        let outcomes = tasks
            .iter()
            .zip(slots)
            .map(|(task, slot)| TaskOutcome {
                task: task.clone(),
                result: slot.unwrap_or_else(|| {
                    Err(aborted(&orchestrator, task, "task never completed".to_string()))
                }),
            })
            .collect();
        RunSummary { outcomes }
    }
}

type TaskResult = Result<Value, RetryExhausted>;

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Failure outcome for a task that stopped without a result.
fn aborted(orchestrator: &RetryOrchestrator, task: &Task, reason: String) -> RetryExhausted {
    let history = orchestrator.tracker().report(task.id());
    RetryExhausted {
        task: task.id().to_string(),
        attempts: history.len() as u32,
        history,
        last: TaskError::Aborted { reason },
    }
}

/// Load the pool from `config.proxy_source` and run every task.
///
/// Nothing is dispatched when the pool cannot be loaded.
pub async fn run_tasks(
    config: &RotationConfig,
    tasks: Vec<Task>,
    backend: Arc<dyn SearchBackend>,
    sink: Arc<dyn ResultSink>,
) -> Result<RunSummary, NoProxiesLoaded> {
    let pool = match ProxyPool::load_with_timeout(&config.proxy_source, config.request_timeout).await {
        Ok(pool) => Arc::new(pool.with_ban_duration(config.ban_duration)),
        Err(e) => {
            error!("{}. Exiting.", e);
            return Err(e);
        }
    };

    let tracker = Arc::new(match config.max_failures_per_task {
        Some(cap) => FailureTracker::with_cap(cap),
        None => FailureTracker::new(),
    });
    let orchestrator = Arc::new(RetryOrchestrator::new(config, pool, tracker, backend, sink));

    let summary = WorkerPool::new(config.worker_count)
        .run(tasks, orchestrator)
        .await;
    info!(
        "Run finished: {} succeeded, {} failed",
        summary.succeeded(),
        summary.failed()
    );
    Ok(summary)
}
