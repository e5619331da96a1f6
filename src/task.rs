//! Units of work and the collaborators that carry them out.

use crate::error::TaskError;
use crate::proxy::ProxyHandle;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// One independent unit of work, identified by its search term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Task {
    id: String,
}

impl Task {
    /// Create a task identified by `id`.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// The search term identifying this task.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl From<&str> for Task {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Task {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Access keys required by the search service.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// The proxied external service a task talks to.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Obtain access keys through `proxy`.
    async fn derive_credentials(&self, proxy: &ProxyHandle) -> Result<Credentials, TaskError>;

    /// Run `task` through `proxy` and return the decoded response body.
    async fn execute(
        &self,
        task: &Task,
        credentials: &Credentials,
        proxy: &ProxyHandle,
    ) -> Result<Value, TaskError>;
}

/// Destination for completed task results.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Store the result of `task`.
    async fn persist(&self, task: &Task, result: &Value) -> std::io::Result<()>;
}
