//! Git command runner and auto-commit helpers for axiom.
//!
//! Low-level commands go through [`run_git`], which captures stdout/stderr and
//! maps non-zero exits to [`AxiomError::GitError`]. The high-level operations
//! the dispatch loop uses ([`auto_commit`], [`create_checkpoint`]) fail
//! softly: they return a [`GitOutcome`] and never propagate an error, so a
//! git failure skips the commit step for that task without aborting the run.

use crate::error::{AxiomError, Result};
use chrono::Local;
use std::path::Path;
use std::process::{Command, Output};

/// Result of a successful git command execution.
#[derive(Debug, Clone)]
pub struct GitOutput {
    /// Standard output from the command (trimmed).
    pub stdout: String,
    /// Standard error from the command (trimmed).
    pub stderr: String,
}

impl GitOutput {
    fn from_output(output: &Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }

    /// Returns true if stdout is empty.
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty()
    }
}

/// Outcome of a soft-failing git operation.
///
/// `success: false` means the operation was skipped or failed; the message
/// carries the reason. Nothing is ever raised past these helpers.
#[derive(Debug, Clone)]
pub struct GitOutcome {
    pub success: bool,
    pub message: String,
    pub commit_hash: Option<String>,
}

/// Run a git command in the given working directory.
///
/// Returns `GitError` on a non-zero exit code, with stderr (or stdout when
/// stderr is empty) in the message.
pub fn run_git<P: AsRef<Path>>(cwd: P, args: &[&str]) -> Result<GitOutput> {
    let cwd = cwd.as_ref();

    let output = Command::new("git")
        .current_dir(cwd)
        .args(args)
        .output()
        .map_err(|e| {
            AxiomError::GitError(format!(
                "failed to execute git {}: {}",
                args.first().unwrap_or(&""),
                e
            ))
        })?;

    let git_output = GitOutput::from_output(&output);

    if output.status.success() {
        Ok(git_output)
    } else {
        let error_msg = if git_output.stderr.is_empty() {
            git_output.stdout.clone()
        } else {
            git_output.stderr.clone()
        };

        Err(AxiomError::GitError(format!(
            "git {} failed (exit code {}): {}",
            args.first().unwrap_or(&""),
            output.status.code().unwrap_or(-1),
            error_msg
        )))
    }
}

/// Get the repository root directory using `git rev-parse --show-toplevel`.
///
/// Not being inside a git repository is a clean user error (exit 1), not a
/// git error (exit 3).
pub fn get_repo_root<P: AsRef<Path>>(cwd: P) -> Result<std::path::PathBuf> {
    let cwd = cwd.as_ref();

    let output = Command::new("git")
        .current_dir(cwd)
        .args(["rev-parse", "--show-toplevel"])
        .output()
        .map_err(|e| {
            AxiomError::UserError(format!("failed to execute git: {} (is git installed?)", e))
        })?;

    if output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(std::path::PathBuf::from(stdout))
    } else {
        Err(AxiomError::UserError(
            "not inside a git repository. Run this command from within a git repository."
                .to_string(),
        ))
    }
}

/// Check whether the working tree has any uncommitted changes.
///
/// Soft-failing: a git error is treated as "no changes" so the dispatch loop
/// never aborts on it.
pub fn has_changes<P: AsRef<Path>>(cwd: P) -> bool {
    match run_git(cwd, &["status", "--porcelain"]) {
        Ok(output) => !output.is_empty(),
        Err(_) => false,
    }
}

/// Stage everything and commit with a `feat(T-NNN): name` message.
///
/// A clean working tree is a successful no-op. All failures are reported in
/// the returned [`GitOutcome`] and never raised.
pub fn auto_commit<P: AsRef<Path>>(cwd: P, task_id: &str, task_name: &str) -> GitOutcome {
    let cwd = cwd.as_ref();

    if !has_changes(cwd) {
        return GitOutcome {
            success: true,
            message: "No changes to commit".to_string(),
            commit_hash: None,
        };
    }

    let commit_msg = format!("feat({}): {}", task_id, task_name);
    let result = run_git(cwd, &["add", "-A"])
        .and_then(|_| run_git(cwd, &["commit", "-m", &commit_msg]))
        .and_then(|_| run_git(cwd, &["rev-parse", "--short", "HEAD"]));

    match result {
        Ok(output) => GitOutcome {
            success: true,
            message: format!("Committed: {}", commit_msg),
            commit_hash: Some(output.stdout),
        },
        Err(err) => GitOutcome {
            success: false,
            message: err.to_string(),
            commit_hash: None,
        },
    }
}

/// Create a checkpoint tag, auto-naming it from the local time when no name
/// is given. Soft-failing like [`auto_commit`].
pub fn create_checkpoint<P: AsRef<Path>>(cwd: P, tag_name: Option<&str>) -> GitOutcome {
    let generated;
    let tag = match tag_name {
        Some(name) => name,
        None => {
            generated = format!("checkpoint-{}", Local::now().format("%Y%m%d-%H%M%S"));
            &generated
        }
    };

    match run_git(cwd, &["tag", tag]) {
        Ok(_) => GitOutcome {
            success: true,
            message: format!("Tag: {}", tag),
            commit_hash: None,
        },
        Err(err) => GitOutcome {
            success: false,
            message: err.to_string(),
            commit_hash: None,
        },
    }
}

/// Subject line of the most recent commit, if any.
pub fn last_commit_message<P: AsRef<Path>>(cwd: P) -> Option<String> {
    run_git(cwd, &["log", "-1", "--format=%s"])
        .ok()
        .map(|o| o.stdout)
}
