//! # reqwest-proxy-rotation
//!
//! Shares a small, fixed set of proxies between many concurrent workers.
//!
//! Proxies are handed out least-recently-used first, failing proxies are
//! banned for a cooldown, and two nested bounded retry loops (proxy
//! acquisition inside, whole task outside) keep every task going until it
//! succeeds or runs out of attempts. Each failed attempt is kept in a
//! per-task failure history.

pub mod backoff;
pub mod client;
pub mod config;
pub mod error;
pub mod middleware;
pub mod orchestrator;
pub mod pool;
pub mod proxy;
pub mod retry;
pub mod sink;
pub mod task;
pub mod tracker;
mod utils;
pub mod worker;

pub use backoff::{DelayProvider, NoDelay, UnbanBackoff};
pub use client::PlaygroundClient;
pub use config::{RotationConfig, RotationConfigBuilder};
pub use error::{NoAvailableProxies, NoProxiesLoaded, RetryExhausted, TaskError};
pub use middleware::UserAgentRotation;
pub use orchestrator::RetryOrchestrator;
pub use pool::ProxyPool;
pub use proxy::{Proxy, ProxyHandle};
pub use retry::RetryPolicy;
pub use sink::JsonFileSink;
pub use task::{Credentials, ResultSink, SearchBackend, Task};
pub use tracker::{FailureRecord, FailureTracker};
pub use worker::{run_tasks, RunSummary, TaskOutcome, WorkerPool};
