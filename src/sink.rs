//! Result sink writing one JSON file per task.

use crate::task::{ResultSink, Task};

use async_trait::async_trait;
use log::info;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Writes `<dir>/<task>.txt` containing the pretty-printed result.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    /// Create a sink writing into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Where the result of `task` is stored.
    pub fn path_for(&self, task: &Task) -> PathBuf {
        let name: String = task
            .id()
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
            .collect();
        self.dir.join(format!("{}.txt", name))
    }

    /// The output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn to_pretty_json(value: &Value) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    Ok(buf)
}

#[async_trait]
impl ResultSink for JsonFileSink {
    async fn persist(&self, task: &Task, result: &Value) -> std::io::Result<()> {
        let path = self.path_for(task);
        let body = to_pretty_json(result)?;
        tokio::fs::write(&path, body).await?;
        info!("Saved results to {}", path.display());
        Ok(())
    }
}
