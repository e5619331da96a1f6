//! Per-task history of failed attempts.

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;

/// One failed attempt of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub task_id: String,
    /// 1-based outer-loop attempt number.
    pub attempt: u32,
    pub timestamp: DateTime<Local>,
    pub error: String,
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Attempt {}: {} at {}",
            self.attempt,
            self.error,
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f")
        )
    }
}

/// Append-only failure log shared by all workers.
///
/// History is kept for the tracker's lifetime unless a per-task cap is set,
/// in which case the oldest records of a task are dropped first.
#[derive(Debug, Default)]
pub struct FailureTracker {
    failures: Mutex<HashMap<String, Vec<FailureRecord>>>,
    max_per_task: Option<usize>,
}

impl FailureTracker {
    /// Create a tracker that keeps every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `cap` records per task.
    pub fn with_cap(cap: usize) -> Self {
        Self {
            failures: Mutex::default(),
            max_per_task: Some(cap.max(1)),
        }
    }

    /// Append a failure for `task_id`.
    pub fn record(&self, task_id: &str, attempt: u32, error: &dyn fmt::Display) {
        let record = FailureRecord {
            task_id: task_id.to_string(),
            attempt,
            timestamp: Local::now(),
            error: error.to_string(),
        };

        let mut failures = self.failures.lock();
        let history = failures.entry(record.task_id.clone()).or_default();
        history.push(record);
        if let Some(cap) = self.max_per_task {
            if history.len() > cap {
                let excess = history.len() - cap;
                history.drain(0..excess);
            }
        }
    }

    /// Failures of one task, oldest first.
    pub fn report(&self, task_id: &str) -> Vec<FailureRecord> {
        self.failures
            .lock()
            .get(task_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Failures of every task that has failed at least once.
    pub fn report_all(&self) -> HashMap<String, Vec<FailureRecord>> {
        self.failures.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order_per_task() {
        let tracker = FailureTracker::new();
        tracker.record("nana1", 1, &"timeout");
        tracker.record("nana2", 1, &"refused");
        tracker.record("nana1", 2, &"bad format");

        let report = tracker.report("nana1");
        let attempts: Vec<_> = report.iter().map(|r| r.attempt).collect();
        assert_eq!(attempts, vec![1, 2]);
        assert_eq!(report[1].error, "bad format");
        assert_eq!(tracker.report_all().len(), 2);
    }

    #[test]
    fn unknown_task_has_empty_report() {
        assert!(FailureTracker::new().report("never-failed").is_empty());
    }

    #[test]
    fn cap_drops_oldest_records() {
        let tracker = FailureTracker::with_cap(2);
        for attempt in 1..=4 {
            tracker.record("t", attempt, &"boom");
        }
        let attempts: Vec<_> = tracker.report("t").iter().map(|r| r.attempt).collect();
        assert_eq!(attempts, vec![3, 4]);
    }

    #[test]
    fn record_display_names_attempt_and_error() {
        let tracker = FailureTracker::new();
        tracker.record("t", 7, &"No available proxies");
        let line = tracker.report("t")[0].to_string();
        assert!(line.starts_with("Attempt 7: No available proxies at "));
    }
}
