//! PRD task table parsing and status write-back.
//!
//! The PRD is a Markdown file containing a pipe-delimited task table:
//!
//! ```text
//! | ID    | Name            | Status     | Description | Estimate | Dependencies | Acceptance |
//! | T-101 | **Worker core** | ⏳ PENDING | Wrap the CLI | 3h      | -            | ...        |
//! ```
//!
//! The table is the source of truth for task state. Parsing extracts PENDING
//! rows into [`TaskSpec`]s; after dispatch, [`PrdUpdater`] rewrites the status
//! marker in place. Status markers are matched by containment only: the
//! Markdown text is documentation, never validated state.

use crate::error::{AxiomError, Result};
use crate::fs::atomic_write;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Task lifecycle states with their PRD table markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskStatus {
    Pending,
    InProgress,
    Done,
    Blocked,
    Retry,
    Failed,
    Skipped,
}

/// All statuses, in marker-scan order.
pub const ALL_STATUSES: &[TaskStatus] = &[
    TaskStatus::Pending,
    TaskStatus::InProgress,
    TaskStatus::Done,
    TaskStatus::Blocked,
    TaskStatus::Retry,
    TaskStatus::Failed,
    TaskStatus::Skipped,
];

impl TaskStatus {
    /// The emoji + keyword marker used in PRD tables.
    pub fn marker(self) -> &'static str {
        match self {
            TaskStatus::Pending => "⏳ PENDING",
            TaskStatus::InProgress => "🔄 IN_PROGRESS",
            TaskStatus::Done => "✅ DONE",
            TaskStatus::Blocked => "🚫 BLOCKED",
            TaskStatus::Retry => "🔁 RETRY",
            TaskStatus::Failed => "❌ FAILED",
            TaskStatus::Skipped => "⏭️ SKIPPED",
        }
    }

    /// The keyword half of the marker (used for containment checks).
    pub fn keyword(self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Done => "DONE",
            TaskStatus::Blocked => "BLOCKED",
            TaskStatus::Retry => "RETRY",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Skipped => "SKIPPED",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// One task parsed from a PRD table row.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    /// Task identifier (e.g. "T-101").
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Task description from the table row.
    pub description: String,
    /// IDs of tasks this one depends on.
    pub dependencies: Vec<String>,
    /// Current status (always Pending for parsed tasks).
    pub status: TaskStatus,
    /// Subprocess timeout derived from the estimate column.
    pub timeout_seconds: u64,
}

/// Default timeout when the estimate column yields nothing (10 minutes).
pub const DEFAULT_TASK_TIMEOUT: u64 = 600;

/// Matches one task table row:
/// `| T-101 | Name | Status | Description | Estimate | Dependencies | Criteria |`
static ROW_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\|\s*(T-\d+)\s*\|([^|]*)\|([^|]*)\|([^|]*)\|([^|]*)\|([^|]*)\|([^|]*)\|")
        .expect("Invalid PRD row regex")
});

/// Matches task ID tokens inside a dependency cell.
static TASK_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"T-\d+").expect("Invalid task ID regex"));

static HOURS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*h").expect("Invalid hours regex"));

static MINUTES_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*min").expect("Invalid minutes regex"));

/// Parse the PENDING tasks out of a PRD Markdown table, in file order.
///
/// Rows whose status cell does not contain `PENDING` are ignored. Bold
/// markers around the name are stripped; dependencies are the `T-NNN` tokens
/// found in the dependency cell.
pub fn parse_pending_tasks(content: &str) -> Vec<TaskSpec> {
    let mut tasks = Vec::new();

    for caps in ROW_REGEX.captures_iter(content) {
        let status_cell = caps[3].trim();
        if !status_cell.contains("PENDING") {
            continue;
        }

        let id = caps[1].trim().to_string();
        let name = caps[2].trim().trim_matches('*').trim().to_string();
        let description = caps[4].trim().to_string();
        let estimate = caps[5].trim();
        let deps_cell = caps[6].trim();

        let dependencies = if deps_cell.is_empty() || deps_cell == "-" {
            Vec::new()
        } else {
            TASK_ID_REGEX
                .find_iter(deps_cell)
                .map(|m| m.as_str().to_string())
                .collect()
        };

        tasks.push(TaskSpec {
            id,
            name,
            description,
            dependencies,
            status: TaskStatus::Pending,
            timeout_seconds: estimate_timeout(estimate),
        });
    }

    tasks
}

/// Derive a subprocess timeout from an estimate cell.
///
/// `N h` gives N x 3 hours plus a 10-minute base; `N min` gives N x 3 minutes
/// plus the base; anything else falls back to the 10-minute default.
pub fn estimate_timeout(estimate: &str) -> u64 {
    if let Some(caps) = HOURS_REGEX.captures(estimate)
        && let Ok(hours) = caps[1].parse::<f64>()
    {
        return (hours * 3.0 * 3600.0) as u64 + DEFAULT_TASK_TIMEOUT;
    }

    if let Some(caps) = MINUTES_REGEX.captures(estimate)
        && let Ok(minutes) = caps[1].parse::<u64>()
    {
        return minutes * 3 * 60 + DEFAULT_TASK_TIMEOUT;
    }

    DEFAULT_TASK_TIMEOUT
}

/// Count task rows per status marker, for the dashboard.
pub fn status_counts(content: &str) -> BTreeMap<TaskStatus, usize> {
    let mut counts = BTreeMap::new();
    for caps in ROW_REGEX.captures_iter(content) {
        let status_cell = &caps[3];
        for &status in ALL_STATUSES {
            if status_cell.contains(status.keyword()) {
                *counts.entry(status).or_insert(0) += 1;
                break;
            }
        }
    }
    counts
}

/// Result of one PRD status write-back.
#[derive(Debug, Clone)]
pub struct UpdateResult {
    pub success: bool,
    pub task_id: String,
    pub old_status: Option<TaskStatus>,
    pub new_status: TaskStatus,
    pub line_number: Option<usize>,
    pub message: String,
}

/// Rewrites status markers in a PRD file.
///
/// Write-backs are soft: a missing file or unknown task returns a failed
/// [`UpdateResult`], never an error, so the dispatch loop is never aborted by
/// a PRD problem.
#[derive(Debug, Clone)]
pub struct PrdUpdater {
    prd_path: PathBuf,
}

impl PrdUpdater {
    pub fn new<P: AsRef<Path>>(prd_path: P) -> Self {
        Self {
            prd_path: prd_path.as_ref().to_path_buf(),
        }
    }

    /// Replace the status marker on the line carrying `task_id`.
    pub fn update_task_status(&self, task_id: &str, new_status: TaskStatus) -> UpdateResult {
        let content = match std::fs::read_to_string(&self.prd_path) {
            Ok(content) => content,
            Err(e) => {
                return UpdateResult {
                    success: false,
                    task_id: task_id.to_string(),
                    old_status: None,
                    new_status,
                    line_number: None,
                    message: format!("PRD file not readable: {}", e),
                };
            }
        };

        let (new_content, old_status, line_number) =
            replace_status(&content, task_id, new_status);

        if new_content == content {
            return UpdateResult {
                success: false,
                task_id: task_id.to_string(),
                old_status,
                new_status,
                line_number,
                message: format!("Task {} not found in PRD or status unchanged", task_id),
            };
        }

        if let Err(e) = atomic_write(&self.prd_path, &new_content) {
            return UpdateResult {
                success: false,
                task_id: task_id.to_string(),
                old_status,
                new_status,
                line_number,
                message: format!("failed to write PRD: {}", e),
            };
        }

        UpdateResult {
            success: true,
            task_id: task_id.to_string(),
            old_status,
            new_status,
            line_number,
            message: format!(
                "Updated {}: {} -> {}",
                task_id,
                old_status.map(|s| s.marker()).unwrap_or("unknown"),
                new_status.marker()
            ),
        }
    }

    /// Current status of a task, by containment scan.
    pub fn task_status(&self, task_id: &str) -> Result<Option<TaskStatus>> {
        let content = std::fs::read_to_string(&self.prd_path).map_err(|e| {
            AxiomError::UserError(format!(
                "failed to read PRD '{}': {}",
                self.prd_path.display(),
                e
            ))
        })?;

        for line in content.lines() {
            if !line.contains(task_id) {
                continue;
            }
            for &status in ALL_STATUSES {
                if line.contains(status.marker()) {
                    return Ok(Some(status));
                }
            }
        }
        Ok(None)
    }
}

/// Replace the first status marker on the first line containing `task_id`.
fn replace_status(
    content: &str,
    task_id: &str,
    new_status: TaskStatus,
) -> (String, Option<TaskStatus>, Option<usize>) {
    let mut old_status = None;
    let mut line_number = None;
    let mut out = String::with_capacity(content.len());

    for (i, line) in content.split_inclusive('\n').enumerate() {
        if old_status.is_none() && line.contains(task_id) {
            for &status in ALL_STATUSES {
                if line.contains(status.marker()) {
                    old_status = Some(status);
                    line_number = Some(i + 1);
                    out.push_str(&line.replacen(status.marker(), new_status.marker(), 1));
                    break;
                }
            }
            if old_status.is_some() {
                continue;
            }
        }
        out.push_str(line);
    }

    (out, old_status, line_number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PRD: &str = "\
# Dev Plan

| ID | Name | Status | Description | Estimate | Dependencies | Acceptance |
|----|------|--------|-------------|----------|--------------|------------|
| T-101 | **Worker core** | ⏳ PENDING | Wrap the provider CLI | 3h | - | Events stream |
| T-102 | Event parser | ⏳ PENDING | Parse JSONL output | 30min | T-101 | Questions detected |
| T-103 | Injection loop | ✅ DONE | Restart with answers | 2h | T-101 T-102 | Ceiling enforced |
| T-104 | Decision rules | 🚫 BLOCKED | Rule tables | 1h | - | Blocked first |
";

    #[test]
    fn parses_only_pending_rows_in_order() {
        let tasks = parse_pending_tasks(PRD);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, "T-101");
        assert_eq!(tasks[1].id, "T-102");
    }

    #[test]
    fn strips_bold_markers_from_name() {
        let tasks = parse_pending_tasks(PRD);
        assert_eq!(tasks[0].name, "Worker core");
        assert_eq!(tasks[0].description, "Wrap the provider CLI");
    }

    #[test]
    fn parses_dependency_tokens() {
        let tasks = parse_pending_tasks(PRD);
        assert!(tasks[0].dependencies.is_empty());
        assert_eq!(tasks[1].dependencies, vec!["T-101"]);
    }

    #[test]
    fn dash_dependency_cell_means_none() {
        let tasks = parse_pending_tasks(
            "| T-001 | A | ⏳ PENDING | desc | 1h | - | ok |\n",
        );
        assert!(tasks[0].dependencies.is_empty());
    }

    #[test]
    fn dependencies_allow_comma_and_space_separators() {
        let tasks = parse_pending_tasks(
            "| T-003 | C | ⏳ PENDING | desc | 1h | T-001, T-002 | ok |\n",
        );
        assert_eq!(tasks[0].dependencies, vec!["T-001", "T-002"]);
    }

    #[test]
    fn timeout_from_hours_estimate() {
        // 3h -> 3 * 3 * 3600 + 600
        assert_eq!(estimate_timeout("3h"), 3 * 3 * 3600 + 600);
        assert_eq!(estimate_timeout("1.5 h"), (1.5 * 3.0 * 3600.0) as u64 + 600);
    }

    #[test]
    fn timeout_from_minutes_estimate() {
        assert_eq!(estimate_timeout("30min"), 30 * 3 * 60 + 600);
        assert_eq!(estimate_timeout("45 min"), 45 * 3 * 60 + 600);
    }

    #[test]
    fn timeout_defaults_without_estimate() {
        assert_eq!(estimate_timeout(""), DEFAULT_TASK_TIMEOUT);
        assert_eq!(estimate_timeout("soon"), DEFAULT_TASK_TIMEOUT);
    }

    #[test]
    fn status_counts_cover_all_rows() {
        let counts = status_counts(PRD);
        assert_eq!(counts.get(&TaskStatus::Pending), Some(&2));
        assert_eq!(counts.get(&TaskStatus::Done), Some(&1));
        assert_eq!(counts.get(&TaskStatus::Blocked), Some(&1));
        assert_eq!(counts.get(&TaskStatus::Failed), None);
    }

    #[test]
    fn markers_roundtrip_with_keywords() {
        for &status in ALL_STATUSES {
            assert!(status.marker().contains(status.keyword()));
        }
    }

    fn write_prd(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("prd.md");
        std::fs::write(&path, PRD).unwrap();
        path
    }

    #[test]
    fn update_task_status_rewrites_marker() {
        let dir = TempDir::new().unwrap();
        let path = write_prd(&dir);
        let updater = PrdUpdater::new(&path);

        let result = updater.update_task_status("T-101", TaskStatus::Done);
        assert!(result.success);
        assert_eq!(result.old_status, Some(TaskStatus::Pending));
        assert_eq!(result.line_number, Some(5));

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("| T-101 | **Worker core** | ✅ DONE |"));
        assert_eq!(updater.task_status("T-101").unwrap(), Some(TaskStatus::Done));
    }

    #[test]
    fn update_only_touches_target_row() {
        let dir = TempDir::new().unwrap();
        let path = write_prd(&dir);
        let updater = PrdUpdater::new(&path);

        updater.update_task_status("T-102", TaskStatus::Failed);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("| T-101 | **Worker core** | ⏳ PENDING |"));
        assert!(content.contains("| T-102 | Event parser | ❌ FAILED |"));
    }

    #[test]
    fn update_unknown_task_is_soft_failure() {
        let dir = TempDir::new().unwrap();
        let path = write_prd(&dir);
        let updater = PrdUpdater::new(&path);

        let result = updater.update_task_status("T-999", TaskStatus::Done);
        assert!(!result.success);
        assert!(result.message.contains("not found"));
    }

    #[test]
    fn update_missing_file_is_soft_failure() {
        let updater = PrdUpdater::new("/nonexistent/prd.md");
        let result = updater.update_task_status("T-101", TaskStatus::Done);
        assert!(!result.success);
        assert!(result.message.contains("not readable"));
    }

    #[test]
    fn task_status_of_unknown_task_is_none() {
        let dir = TempDir::new().unwrap();
        let path = write_prd(&dir);
        let updater = PrdUpdater::new(&path);
        assert_eq!(updater.task_status("T-999").unwrap(), None);
    }
}
