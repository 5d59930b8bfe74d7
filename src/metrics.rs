//! Dispatch metrics tracking.
//!
//! Records per-task wall time and restart counts for one dispatch run and
//! renders them to `.axiom/memory/evolution/metrics.md`. Active timers are an
//! instance field: each run owns its tracker, so timings never leak between
//! runs.

use crate::error::Result;
use crate::fs::atomic_write;
use crate::prd::TaskStatus;
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

/// One finished task measurement.
#[derive(Debug, Clone)]
pub struct TaskMetric {
    pub task_id: String,
    pub duration: Duration,
    pub restarts: u32,
    pub outcome: TaskStatus,
}

/// Per-run metrics accumulator.
#[derive(Debug, Default)]
pub struct MetricsTracker {
    active: HashMap<String, Instant>,
    records: Vec<TaskMetric>,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing a task. Restarting an already-active timer resets it.
    pub fn start(&mut self, task_id: &str) {
        self.active.insert(task_id.to_string(), Instant::now());
    }

    /// Stop timing a task and record the measurement.
    ///
    /// Returns the measured duration, or `None` when no timer was running
    /// for the task.
    pub fn stop(&mut self, task_id: &str, restarts: u32, outcome: TaskStatus) -> Option<Duration> {
        let started = self.active.remove(task_id)?;
        let duration = started.elapsed();
        self.records.push(TaskMetric {
            task_id: task_id.to_string(),
            duration,
            restarts,
            outcome,
        });
        Some(duration)
    }

    /// Finished measurements, in completion order.
    pub fn records(&self) -> &[TaskMetric] {
        &self.records
    }

    /// Render the metrics report as Markdown.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("# Dispatch Metrics\n\n");
        out.push_str(&format!(
            "Generated: {}\n\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        ));

        if self.records.is_empty() {
            out.push_str("No tasks were executed.\n");
            return out;
        }

        out.push_str("| Task | Outcome | Duration | Restarts |\n");
        out.push_str("|------|---------|----------|----------|\n");
        for record in &self.records {
            out.push_str(&format!(
                "| {} | {} | {:.1}s | {} |\n",
                record.task_id,
                record.outcome,
                record.duration.as_secs_f64(),
                record.restarts
            ));
        }

        let total: Duration = self.records.iter().map(|r| r.duration).sum();
        let total_restarts: u32 = self.records.iter().map(|r| r.restarts).sum();
        out.push_str(&format!(
            "\nTotal: {} task(s), {:.1}s, {} restart(s)\n",
            self.records.len(),
            total.as_secs_f64(),
            total_restarts
        ));

        out
    }

    /// Write the report file atomically.
    pub fn write_report<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        atomic_write(path, &self.render_report())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn stop_without_start_returns_none() {
        let mut tracker = MetricsTracker::new();
        assert!(tracker.stop("T-001", 0, TaskStatus::Done).is_none());
        assert!(tracker.records().is_empty());
    }

    #[test]
    fn start_stop_records_measurement() {
        let mut tracker = MetricsTracker::new();
        tracker.start("T-001");
        let duration = tracker.stop("T-001", 2, TaskStatus::Done).unwrap();

        assert_eq!(tracker.records().len(), 1);
        let record = &tracker.records()[0];
        assert_eq!(record.task_id, "T-001");
        assert_eq!(record.restarts, 2);
        assert_eq!(record.outcome, TaskStatus::Done);
        assert_eq!(record.duration, duration);
    }

    #[test]
    fn timers_are_instance_scoped() {
        let mut first = MetricsTracker::new();
        first.start("T-001");

        // A second tracker has no knowledge of the first one's timers.
        let mut second = MetricsTracker::new();
        assert!(second.stop("T-001", 0, TaskStatus::Done).is_none());

        assert!(first.stop("T-001", 0, TaskStatus::Done).is_some());
    }

    #[test]
    fn timer_is_consumed_on_stop() {
        let mut tracker = MetricsTracker::new();
        tracker.start("T-001");
        tracker.stop("T-001", 0, TaskStatus::Done);
        assert!(tracker.stop("T-001", 0, TaskStatus::Done).is_none());
    }

    #[test]
    fn report_lists_all_records() {
        let mut tracker = MetricsTracker::new();
        tracker.start("T-001");
        tracker.stop("T-001", 0, TaskStatus::Done);
        tracker.start("T-002");
        tracker.stop("T-002", 3, TaskStatus::Failed);

        let report = tracker.render_report();
        assert!(report.contains("| T-001 | DONE |"));
        assert!(report.contains("| T-002 | FAILED |"));
        assert!(report.contains("2 task(s)"));
        assert!(report.contains("3 restart(s)"));
    }

    #[test]
    fn empty_report_says_so() {
        let report = MetricsTracker::new().render_report();
        assert!(report.contains("No tasks were executed."));
    }

    #[test]
    fn write_report_creates_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("evolution").join("metrics.md");

        let mut tracker = MetricsTracker::new();
        tracker.start("T-001");
        tracker.stop("T-001", 1, TaskStatus::Done);
        tracker.write_report(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Dispatch Metrics"));
        assert!(content.contains("T-001"));
    }
}
