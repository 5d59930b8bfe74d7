//! Append-only audit log for axiom.
//!
//! Every state-changing operation (dispatch lifecycle, knowledge mutations,
//! checkpoints) appends one JSON object per line to
//! `.axiom/events/events.ndjson`. The log is best-effort: commands warn and
//! continue when a write fails, so auditing never blocks the work itself.

use crate::context::WorkspaceContext;
use crate::error::{AxiomError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;

/// Actions recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Workspace scaffolding created
    Init,
    /// Dispatch run started
    Dispatch,
    /// Task completed successfully
    TaskDone,
    /// Task blocked on an unanswerable or risky question
    TaskBlocked,
    /// Task failed (timeout, error events, restart ceiling)
    TaskFailed,
    /// Task skipped due to unmet dependencies
    TaskSkipped,
    /// Worker restarted with injected answers
    Restart,
    /// Auto-commit after a completed task
    AutoCommit,
    /// Checkpoint tag created
    Checkpoint,
    /// Knowledge entry created
    KnowledgeAdd,
    /// Knowledge confidence adjusted
    ConfidenceAdjust,
    /// Knowledge index regenerated
    IndexRebuild,
    /// Watchdog reported a stale session
    GuardAlert,
}

/// One audit record, serialized as a single NDJSON line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// RFC3339 timestamp when the event occurred.
    pub ts: DateTime<Utc>,

    /// The action that was performed.
    pub action: AuditAction,

    /// Who performed the action (`user@host`).
    pub actor: String,

    /// Task ID for task-scoped events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,

    /// Action-specific details.
    pub details: Value,
}

impl AuditEvent {
    /// Create a new event with the given action, stamped with the current
    /// time and the `user@host` actor string.
    pub fn new(action: AuditAction) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: actor_string(),
            task: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    /// Attach a task ID.
    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task = Some(task_id.into());
        self
    }

    /// Attach a details object.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

fn actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    format!("{}@{}", user, host)
}

/// Append an event to the audit log, creating the events directory and file
/// on first use.
pub fn append_event(ctx: &WorkspaceContext, event: &AuditEvent) -> Result<()> {
    let line = serde_json::to_string(event)
        .map_err(|e| AxiomError::UserError(format!("failed to serialize audit event: {}", e)))?;

    let events_dir = ctx.events_dir();
    if !events_dir.exists() {
        fs::create_dir_all(&events_dir).map_err(|e| {
            AxiomError::UserError(format!(
                "failed to create events directory '{}': {}",
                events_dir.display(),
                e
            ))
        })?;
    }

    let events_file = ctx.events_file();
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&events_file)
        .map_err(|e| {
            AxiomError::UserError(format!(
                "failed to open audit log '{}': {}",
                events_file.display(),
                e
            ))
        })?;

    writeln!(file, "{}", line).map_err(|e| {
        AxiomError::UserError(format!(
            "failed to append to audit log '{}': {}",
            events_file.display(),
            e
        ))
    })?;

    Ok(())
}

/// Append an event, downgrading failures to a stderr warning.
///
/// Used by commands where audit logging must never abort the operation.
pub fn append_event_soft(ctx: &WorkspaceContext, event: &AuditEvent) {
    if let Err(e) = append_event(ctx, event) {
        eprintln!("Warning: failed to record audit event: {}", e);
    }
}
