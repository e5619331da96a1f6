//! Scrape 50 search terms through the proxies listed in `proxies.txt`.

use reqwest_proxy_rotation::{run_tasks, JsonFileSink, PlaygroundClient, RotationConfig, Task};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = RotationConfig::builder()
        .proxy_source("proxies.txt")
        .output_dir(".")
        .build();

    let tasks: Vec<Task> = (0..50).map(|i| Task::new(format!("nana{}", i))).collect();
    let backend = Arc::new(PlaygroundClient::new(&config));
    let sink = Arc::new(JsonFileSink::new(&config.output_dir));

    let summary = run_tasks(&config, tasks, backend, sink).await?;

    println!(
        "Finished: {} succeeded, {} failed",
        summary.succeeded(),
        summary.failed()
    );
    for failure in summary.failures() {
        println!("{} ({} attempts): {}", failure.task, failure.attempts, failure.last);
    }
    Ok(())
}
