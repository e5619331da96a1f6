use async_trait::async_trait;
use reqwest_proxy_rotation::{
    run_tasks, Credentials, FailureTracker, JsonFileSink, ProxyHandle, ProxyPool,
    RetryOrchestrator, RotationConfig, SearchBackend, Task, TaskError, WorkerPool,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Succeeds for every task except those whose id starts with "bad".
#[derive(Default)]
struct FakeSearch {
    credential_calls: AtomicUsize,
}

#[async_trait]
impl SearchBackend for FakeSearch {
    async fn derive_credentials(&self, _proxy: &ProxyHandle) -> Result<Credentials, TaskError> {
        self.credential_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Credentials {
            client_id: "id".into(),
            client_secret: "secret".into(),
        })
    }

    async fn execute(
        &self,
        task: &Task,
        _credentials: &Credentials,
        proxy: &ProxyHandle,
    ) -> Result<Value, TaskError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        if task.id().starts_with("bad") {
            return Err(TaskError::CredentialExtractionFailed {
                proxy: proxy.id().to_string(),
            });
        }
        Ok(json!({"q": task.id(), "proxy": proxy.id()}))
    }
}

fn proxy_file(lines: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", lines).unwrap();
    file
}

#[tokio::test]
async fn missing_source_dispatches_nothing() {
    let backend = Arc::new(FakeSearch::default());
    let out = tempfile::tempdir().unwrap();
    let config = RotationConfig::builder()
        .proxy_source("/no/such/dir/proxies.txt")
        .build();

    let result = run_tasks(
        &config,
        vec![Task::new("nana0")],
        backend.clone(),
        Arc::new(JsonFileSink::new(out.path())),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(backend.credential_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_source_dispatches_nothing() {
    let file = proxy_file("\n\n   \n");
    let backend = Arc::new(FakeSearch::default());
    let out = tempfile::tempdir().unwrap();
    let config = RotationConfig::builder()
        .proxy_source(file.path().to_str().unwrap())
        .build();

    let err = run_tasks(
        &config,
        vec![Task::new("nana0")],
        backend.clone(),
        Arc::new(JsonFileSink::new(out.path())),
    )
    .await
    .err()
    .unwrap();

    assert!(err.to_string().starts_with("No proxies loaded"));
    assert_eq!(backend.credential_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn exhausted_tasks_do_not_stop_siblings() {
    let file = proxy_file("10.0.0.1:8080\n10.0.0.2:8080\n\n10.0.0.3:8080\n");
    let out = tempfile::tempdir().unwrap();
    let backend = Arc::new(FakeSearch::default());
    let config = RotationConfig::builder()
        .proxy_source(file.path().to_str().unwrap())
        .task_attempts(3)
        .worker_count(4)
        .output_dir(out.path())
        .build();

    let tasks: Vec<Task> = (0..12)
        .map(|i| {
            if i % 4 == 0 {
                Task::new(format!("bad{}", i))
            } else {
                Task::new(format!("nana{}", i))
            }
        })
        .collect();
    let expected: Vec<String> = tasks.iter().map(|t| t.id().to_string()).collect();

    let summary = run_tasks(
        &config,
        tasks,
        backend.clone(),
        Arc::new(JsonFileSink::new(&config.output_dir)),
    )
    .await
    .unwrap();

    let order: Vec<String> = summary.outcomes.iter().map(|o| o.task.id().to_string()).collect();
    assert_eq!(order, expected);
    assert_eq!(summary.succeeded(), 9);
    assert_eq!(summary.failed(), 3);
    for failure in summary.failures() {
        assert!(failure.task.starts_with("bad"));
        assert_eq!(failure.attempts, 3);
        assert_eq!(failure.history.len(), 3);
    }
    // 9 successes once each, 3 failures three times each.
    assert_eq!(backend.credential_calls.load(Ordering::SeqCst), 9 + 3 * 3);

    assert!(out.path().join("nana1.txt").exists());
    assert!(!out.path().join("bad0.txt").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 3)]
async fn concurrent_workers_receive_distinct_proxies() {
    let pool = Arc::new(ProxyPool::from_endpoints(["a:1", "b:2", "c:3"]).unwrap());
    let barrier = Arc::new(tokio::sync::Barrier::new(3));

    let start = tokio::time::Instant::now();
    let handles: Vec<_> = (0..3)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                pool.acquire().unwrap().id().to_string()
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        ids.insert(handle.await.unwrap());
    }
    let end = tokio::time::Instant::now();
    assert_eq!(ids.len(), 3);

    let snapshot = pool.snapshot();
    for proxy in &snapshot {
        let stamp = proxy.last_used.unwrap();
        assert!(start <= stamp && stamp <= end);
    }

    let oldest = snapshot.iter().min_by_key(|p| p.last_used).unwrap();
    assert_eq!(pool.acquire().unwrap().id(), oldest.endpoint);
}

/// Panics while searching for "boom", succeeds otherwise.
struct PanickyBackend;

#[async_trait]
impl SearchBackend for PanickyBackend {
    async fn derive_credentials(&self, _proxy: &ProxyHandle) -> Result<Credentials, TaskError> {
        Ok(Credentials {
            client_id: "id".into(),
            client_secret: "secret".into(),
        })
    }

    async fn execute(
        &self,
        task: &Task,
        _credentials: &Credentials,
        _proxy: &ProxyHandle,
    ) -> Result<Value, TaskError> {
        if task.id() == "boom" {
            panic!("backend bug on {}", task);
        }
        Ok(json!({"q": task.id()}))
    }
}

#[tokio::test]
async fn panicking_task_is_reported_and_siblings_still_run() {
    let out = tempfile::tempdir().unwrap();
    let pool = Arc::new(ProxyPool::from_endpoints(["a:1", "b:2"]).unwrap());
    let orchestrator = Arc::new(RetryOrchestrator::new(
        &RotationConfig::builder().worker_count(1).build(),
        pool,
        Arc::new(FailureTracker::new()),
        Arc::new(PanickyBackend),
        Arc::new(JsonFileSink::new(out.path())),
    ));
    let tasks: Vec<Task> = ["ok0", "boom", "ok2", "ok3"].into_iter().map(Task::from).collect();

    let summary = WorkerPool::new(1).run(tasks, orchestrator).await;

    let order: Vec<&str> = summary.outcomes.iter().map(|o| o.task.id()).collect();
    assert_eq!(order, vec!["ok0", "boom", "ok2", "ok3"]);
    assert_eq!(summary.succeeded(), 3);
    assert_eq!(summary.failed(), 1);

    let failure = summary.failures().next().unwrap();
    assert_eq!(failure.task, "boom");
    assert!(matches!(&failure.last, TaskError::Aborted { reason } if reason.contains("backend bug")));
    assert!(out.path().join("ok3.txt").exists());
}

#[tokio::test(start_paused = true)]
async fn banned_proxy_returns_after_cooldown() {
    let pool = ProxyPool::from_endpoints(["A", "B"]).unwrap();
    pool.ban("A");

    assert_eq!(pool.acquire().unwrap().id(), "B");
    tokio::time::advance(Duration::from_secs(181)).await;
    pool.touch("B");
    assert_eq!(pool.acquire().unwrap().id(), "A");
}
