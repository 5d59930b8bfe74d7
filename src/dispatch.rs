//! PRD-driven dispatch loop.
//!
//! Processes PENDING tasks strictly in file order, one at a time. Dependency
//! checking is a single-pass skip: a task whose dependency id is not yet in
//! the completed set is marked SKIPPED and never deferred, so a dependency
//! that appears later in the file (or failed) skips all its transitive
//! dependents. This is intentional; there is no scheduler here.
//!
//! Per task: execute through the restart injector (questions answered by the
//! decision engine), then on success auto-commit and write DONE back to the
//! PRD. Git and PRD write-backs are soft; their failures are reported and the
//! loop moves on.

use crate::audit::{AuditAction, AuditEvent, append_event_soft};
use crate::context::WorkspaceContext;
use crate::decision::DecisionEngine;
use crate::error::{AxiomError, Result};
use crate::git;
use crate::injector::RestartInjector;
use crate::metrics::MetricsTracker;
use crate::prd::{self, PrdUpdater, TaskStatus};
use crate::worker::{TaskRunner, Worker, WorkerConfig, WorkerResult};
use serde_json::json;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Final report of one dispatch run.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub total_tasks: usize,
    pub done: usize,
    pub failed: usize,
    pub blocked: usize,
    pub skipped: usize,
    pub results: Vec<WorkerResult>,
}

impl DispatchReport {
    /// Fraction of tasks that completed successfully.
    pub fn success_rate(&self) -> f64 {
        if self.total_tasks == 0 {
            return 0.0;
        }
        self.done as f64 / self.total_tasks as f64
    }

    /// Whether every dispatched task succeeded (skips alone do not fail a
    /// run; failed or blocked tasks do).
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.blocked == 0
    }

    /// Render the report block printed at the end of a run.
    pub fn summary(&self) -> String {
        let bar = "=".repeat(50);
        let mut out = String::new();
        out.push('\n');
        out.push_str(&bar);
        out.push_str("\n📊 Dispatch Report\n");
        out.push_str(&bar);
        out.push('\n');
        out.push_str(&format!("  Total:      {}\n", self.total_tasks));
        out.push_str(&format!("  ✅ Done:    {}\n", self.done));
        out.push_str(&format!("  ❌ Failed:  {}\n", self.failed));
        out.push_str(&format!("  🚫 Blocked: {}\n", self.blocked));
        out.push_str(&format!("  ⏭️ Skipped: {}\n", self.skipped));
        out.push_str(&format!(
            "  Success Rate: {:.0}%\n",
            self.success_rate() * 100.0
        ));
        out.push_str(&bar);
        out.push('\n');
        out
    }
}

/// Options for one dispatch run.
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    /// Parse and report without executing anything.
    pub dry_run: bool,
}

/// PRD-driven task dispatcher.
pub struct Dispatcher<R: TaskRunner> {
    prd_path: PathBuf,
    repo_root: PathBuf,
    injector: RestartInjector<R>,
    engine: DecisionEngine,
    updater: PrdUpdater,
    metrics: MetricsTracker,
    /// Workspace for audit/metrics output; `None` runs without either.
    ctx: Option<WorkspaceContext>,
    options: DispatchOptions,
}

impl Dispatcher<Worker> {
    /// Dispatcher backed by a real provider subprocess worker.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        prd_path: P,
        repo_root: Q,
        worker_config: WorkerConfig,
        max_restarts: u32,
        ctx: Option<WorkspaceContext>,
        options: DispatchOptions,
    ) -> Self {
        Self::with_runner(
            prd_path,
            repo_root,
            Worker::new(worker_config),
            max_restarts,
            ctx,
            options,
        )
    }
}

impl<R: TaskRunner> Dispatcher<R> {
    /// Dispatcher over any [`TaskRunner`] (tests use scripted runners).
    pub fn with_runner<P: AsRef<Path>, Q: AsRef<Path>>(
        prd_path: P,
        repo_root: Q,
        runner: R,
        max_restarts: u32,
        ctx: Option<WorkspaceContext>,
        options: DispatchOptions,
    ) -> Self {
        let prd_path = prd_path.as_ref().to_path_buf();
        Self {
            updater: PrdUpdater::new(&prd_path),
            prd_path,
            repo_root: repo_root.as_ref().to_path_buf(),
            injector: RestartInjector::with_max_restarts(runner, max_restarts),
            engine: DecisionEngine::new(),
            metrics: MetricsTracker::new(),
            ctx,
            options,
        }
    }

    /// Execute the full dispatch flow and return the report.
    pub fn run(&mut self) -> Result<DispatchReport> {
        let content = std::fs::read_to_string(&self.prd_path).map_err(|e| {
            AxiomError::UserError(format!(
                "failed to read PRD '{}': {}",
                self.prd_path.display(),
                e
            ))
        })?;

        let tasks = prd::parse_pending_tasks(&content);
        let mut report = DispatchReport {
            total_tasks: tasks.len(),
            ..Default::default()
        };

        if tasks.is_empty() {
            println!("No PENDING tasks found in PRD");
            return Ok(report);
        }

        self.audit(
            AuditEvent::new(AuditAction::Dispatch).with_details(json!({
                "prd": self.prd_path.display().to_string(),
                "pending_tasks": tasks.len(),
                "dry_run": self.options.dry_run,
            })),
        );

        let mut completed: HashSet<String> = HashSet::new();

        for task in &tasks {
            let unmet: Vec<&str> = task
                .dependencies
                .iter()
                .filter(|dep| !completed.contains(*dep))
                .map(String::as_str)
                .collect();

            if !unmet.is_empty() {
                println!(
                    "⏭️ Skipping {}: unmet dependencies [{}]",
                    task.id,
                    unmet.join(", ")
                );
                report.skipped += 1;
                self.audit(
                    AuditEvent::new(AuditAction::TaskSkipped)
                        .with_task(&task.id)
                        .with_details(json!({"unmet_dependencies": unmet})),
                );
                continue;
            }

            if self.options.dry_run {
                println!("[dry-run] Would execute {}: {}", task.id, task.name);
                report.skipped += 1;
                continue;
            }

            println!("▶ Executing {}: {}", task.id, task.name);
            self.metrics.start(&task.id);

            let engine = &mut self.engine;
            let mut answer_fn =
                |task_id: &str, question: &str| engine.decide(task_id, question).answer;
            let result = self
                .injector
                .execute_with_injection(task, &mut answer_fn, None)?;

            if result.restart_count > 0 {
                self.audit(
                    AuditEvent::new(AuditAction::Restart)
                        .with_task(&task.id)
                        .with_details(json!({"restarts": result.restart_count})),
                );
            }

            if result.success {
                report.done += 1;
                completed.insert(task.id.clone());
                self.metrics
                    .stop(&task.id, result.restart_count, TaskStatus::Done);

                let git_outcome = git::auto_commit(&self.repo_root, &task.id, &task.name);
                if git_outcome.success {
                    println!("  git: {}", git_outcome.message);
                } else {
                    eprintln!("  Warning: auto-commit failed: {}", git_outcome.message);
                }
                self.audit(
                    AuditEvent::new(AuditAction::AutoCommit)
                        .with_task(&task.id)
                        .with_details(json!({
                            "success": git_outcome.success,
                            "commit": git_outcome.commit_hash,
                        })),
                );

                let update = self.updater.update_task_status(&task.id, TaskStatus::Done);
                if !update.success {
                    eprintln!("  Warning: PRD write-back failed: {}", update.message);
                }

                println!("  ✅ {} done ({:.1}s)", task.id, result.duration.as_secs_f64());
                self.audit(
                    AuditEvent::new(AuditAction::TaskDone)
                        .with_task(&task.id)
                        .with_details(json!({
                            "duration_seconds": result.duration.as_secs_f64(),
                            "restarts": result.restart_count,
                        })),
                );
            } else if result
                .error_message
                .as_deref()
                .is_some_and(|m| m.contains("BLOCKED"))
            {
                report.blocked += 1;
                self.metrics
                    .stop(&task.id, result.restart_count, TaskStatus::Blocked);
                self.updater.update_task_status(&task.id, TaskStatus::Blocked);
                eprintln!(
                    "  🚫 {} blocked: {}",
                    task.id,
                    result.error_message.as_deref().unwrap_or("")
                );
                self.audit(
                    AuditEvent::new(AuditAction::TaskBlocked)
                        .with_task(&task.id)
                        .with_details(json!({
                            "message": result.error_message,
                            "restarts": result.restart_count,
                        })),
                );
            } else {
                report.failed += 1;
                self.metrics
                    .stop(&task.id, result.restart_count, TaskStatus::Failed);
                self.updater.update_task_status(&task.id, TaskStatus::Failed);
                eprintln!(
                    "  ❌ {} failed: {}",
                    task.id,
                    result.error_message.as_deref().unwrap_or("unknown error")
                );
                self.audit(
                    AuditEvent::new(AuditAction::TaskFailed)
                        .with_task(&task.id)
                        .with_details(json!({
                            "message": result.error_message,
                            "restarts": result.restart_count,
                        })),
                );
            }

            report.results.push(result);
        }

        if let Some(ctx) = &self.ctx
            && let Err(e) = self.metrics.write_report(ctx.metrics_path())
        {
            eprintln!("Warning: failed to write metrics report: {}", e);
        }

        Ok(report)
    }

    /// Metrics collected so far.
    pub fn metrics(&self) -> &MetricsTracker {
        &self.metrics
    }

    /// Decision log from the rule engine.
    pub fn decisions(&self) -> &DecisionEngine {
        &self.engine
    }

    #[cfg(test)]
    fn injector_runner(&self) -> &R {
        self.injector.runner()
    }

    fn audit(&self, event: AuditEvent) {
        if let Some(ctx) = &self.ctx {
            append_event_soft(ctx, &event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injector::MAX_RESTARTS;
    use crate::prd::TaskSpec;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::TempDir;

    fn ok_result(task_id: &str) -> WorkerResult {
        WorkerResult {
            task_id: task_id.to_string(),
            success: true,
            output: "done".to_string(),
            events: Vec::new(),
            questions: Vec::new(),
            duration: Duration::from_millis(10),
            restart_count: 0,
            error_message: None,
        }
    }

    fn failed_result(task_id: &str, message: &str) -> WorkerResult {
        WorkerResult {
            task_id: task_id.to_string(),
            success: false,
            output: String::new(),
            events: Vec::new(),
            questions: Vec::new(),
            duration: Duration::from_millis(10),
            restart_count: 0,
            error_message: Some(message.to_string()),
        }
    }

    fn question_result(task_id: &str, question: &str) -> WorkerResult {
        WorkerResult {
            task_id: task_id.to_string(),
            success: false,
            output: String::new(),
            events: Vec::new(),
            questions: vec![question.to_string()],
            duration: Duration::from_millis(10),
            restart_count: 0,
            error_message: None,
        }
    }

    /// Runner that replays scripted results per task and records invocations.
    struct ScriptedRunner {
        scripts: RefCell<HashMap<String, Vec<WorkerResult>>>,
        invocations: RefCell<Vec<String>>,
    }

    impl ScriptedRunner {
        fn new(scripts: Vec<(&str, Vec<WorkerResult>)>) -> Self {
            let map = scripts
                .into_iter()
                .map(|(id, mut results)| {
                    results.reverse();
                    (id.to_string(), results)
                })
                .collect();
            Self {
                scripts: RefCell::new(map),
                invocations: RefCell::new(Vec::new()),
            }
        }

        fn invocations_for(&self, task_id: &str) -> usize {
            self.invocations
                .borrow()
                .iter()
                .filter(|id| id.as_str() == task_id)
                .count()
        }
    }

    impl TaskRunner for ScriptedRunner {
        fn execute(&self, task: &TaskSpec, _prompt: &str) -> crate::error::Result<WorkerResult> {
            self.invocations.borrow_mut().push(task.id.clone());
            let result = self
                .scripts
                .borrow_mut()
                .get_mut(&task.id)
                .and_then(Vec::pop)
                .unwrap_or_else(|| failed_result(&task.id, "no scripted result"));
            Ok(result)
        }
    }

    const THREE_TASK_PRD: &str = "\
# Plan

| ID | Name | Status | Description | Estimate | Dependencies | Acceptance |
|----|------|--------|-------------|----------|--------------|------------|
| T-001 | First | ⏳ PENDING | First task | 1h | - | ok |
| T-002 | Second | ⏳ PENDING | Second task | 1h | - | ok |
| T-003 | Third | ⏳ PENDING | Third task | 1h | T-001, T-002 | ok |
";

    fn write_prd(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("prd.md");
        std::fs::write(&path, content).unwrap();
        path
    }

    fn dispatcher(
        prd_path: &Path,
        repo_root: &Path,
        runner: ScriptedRunner,
        dry_run: bool,
    ) -> Dispatcher<ScriptedRunner> {
        Dispatcher::with_runner(
            prd_path,
            repo_root,
            runner,
            MAX_RESTARTS,
            None,
            DispatchOptions { dry_run },
        )
    }

    #[test]
    fn all_tasks_succeed_and_prd_is_updated() {
        let dir = TempDir::new().unwrap();
        let prd_path = write_prd(&dir, THREE_TASK_PRD);

        let runner = ScriptedRunner::new(vec![
            ("T-001", vec![ok_result("T-001")]),
            ("T-002", vec![ok_result("T-002")]),
            ("T-003", vec![ok_result("T-003")]),
        ]);
        let mut dispatcher = dispatcher(&prd_path, dir.path(), runner, false);

        let report = dispatcher.run().unwrap();

        assert_eq!(report.total_tasks, 3);
        assert_eq!(report.done, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(report.blocked, 0);
        assert_eq!(report.skipped, 0);
        assert!(report.all_succeeded());

        let content = std::fs::read_to_string(&prd_path).unwrap();
        assert!(!content.contains("PENDING"));
        assert_eq!(content.matches("✅ DONE").count(), 3);
    }

    #[test]
    fn unmet_dependency_skips_without_invoking_worker() {
        let dir = TempDir::new().unwrap();
        // T-002 depends on a task that appears later: single-pass skip.
        let prd = "\
| T-002 | Dependent | ⏳ PENDING | needs later task | 1h | T-001 | ok |
| T-001 | Base | ⏳ PENDING | base task | 1h | - | ok |
";
        let prd_path = write_prd(&dir, prd);

        let runner = ScriptedRunner::new(vec![
            ("T-001", vec![ok_result("T-001")]),
            ("T-002", vec![ok_result("T-002")]),
        ]);
        let mut dispatcher = dispatcher(&prd_path, dir.path(), runner, false);

        let report = dispatcher.run().unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.done, 1);
        // The skipped task's worker was never invoked.
        assert_eq!(dispatcher.injector_runner().invocations_for("T-002"), 0);
        assert_eq!(dispatcher.injector_runner().invocations_for("T-001"), 1);
    }

    #[test]
    fn failed_dependency_skips_transitive_dependents() {
        let dir = TempDir::new().unwrap();
        let prd_path = write_prd(&dir, THREE_TASK_PRD);

        let runner = ScriptedRunner::new(vec![
            ("T-001", vec![failed_result("T-001", "timeout after 600s")]),
            ("T-002", vec![ok_result("T-002")]),
            ("T-003", vec![ok_result("T-003")]),
        ]);
        let mut dispatcher = dispatcher(&prd_path, dir.path(), runner, false);

        let report = dispatcher.run().unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.done, 1);
        // T-003 depends on the failed T-001 and is skipped, never executed.
        assert_eq!(report.skipped, 1);
        assert_eq!(dispatcher.injector_runner().invocations_for("T-003"), 0);

        let content = std::fs::read_to_string(&prd_path).unwrap();
        assert!(content.contains("| T-001 | First | ❌ FAILED |"));
        assert!(content.contains("| T-002 | Second | ✅ DONE |"));
        // Skipped tasks keep their PENDING marker (report-only skip).
        assert!(content.contains("| T-003 | Third | ⏳ PENDING |"));
    }

    #[test]
    fn blocked_question_marks_task_blocked() {
        let dir = TempDir::new().unwrap();
        let prd = "| T-001 | Risky | ⏳ PENDING | asks about secrets | 1h | - | ok |\n";
        let prd_path = write_prd(&dir, prd);

        // The question matches the security blocked rule, so the decision
        // engine returns no answer and the injector blocks the task.
        let runner = ScriptedRunner::new(vec![(
            "T-001",
            vec![question_result(
                "T-001",
                "Where should the secret token be stored?",
            )],
        )]);
        let mut dispatcher = dispatcher(&prd_path, dir.path(), runner, false);

        let report = dispatcher.run().unwrap();

        assert_eq!(report.blocked, 1);
        assert_eq!(report.done, 0);
        let content = std::fs::read_to_string(&prd_path).unwrap();
        assert!(content.contains("🚫 BLOCKED"));
    }

    #[test]
    fn auto_answered_question_leads_to_done() {
        let dir = TempDir::new().unwrap();
        let prd = "| T-001 | Layout | ⏳ PENDING | asks about layout | 1h | - | ok |\n";
        let prd_path = write_prd(&dir, prd);

        let runner = ScriptedRunner::new(vec![(
            "T-001",
            vec![
                question_result("T-001", "Which folder should the parser live in?"),
                ok_result("T-001"),
            ],
        )]);
        let mut dispatcher = dispatcher(&prd_path, dir.path(), runner, false);

        let report = dispatcher.run().unwrap();

        assert_eq!(report.done, 1);
        assert_eq!(dispatcher.injector_runner().invocations_for("T-001"), 2);
        assert_eq!(report.results[0].restart_count, 1);
    }

    #[test]
    fn dry_run_invokes_nothing() {
        let dir = TempDir::new().unwrap();
        let prd_path = write_prd(&dir, THREE_TASK_PRD);

        let runner = ScriptedRunner::new(vec![]);
        let mut dispatcher = dispatcher(&prd_path, dir.path(), runner, true);

        let report = dispatcher.run().unwrap();

        assert_eq!(report.skipped, 3);
        assert_eq!(report.done, 0);
        assert!(dispatcher.injector_runner().invocations.borrow().is_empty());

        // PRD untouched.
        let content = std::fs::read_to_string(&prd_path).unwrap();
        assert_eq!(content, THREE_TASK_PRD);
    }

    #[test]
    fn missing_prd_is_a_user_error() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner::new(vec![]);
        let mut dispatcher = dispatcher(
            &dir.path().join("missing.md"),
            dir.path(),
            runner,
            false,
        );

        let result = dispatcher.run();
        assert!(matches!(result, Err(AxiomError::UserError(_))));
    }

    #[test]
    fn empty_prd_yields_empty_report() {
        let dir = TempDir::new().unwrap();
        let prd_path = write_prd(&dir, "# No tasks here\n");

        let runner = ScriptedRunner::new(vec![]);
        let mut dispatcher = dispatcher(&prd_path, dir.path(), runner, false);

        let report = dispatcher.run().unwrap();
        assert_eq!(report.total_tasks, 0);
        assert!(report.all_succeeded());
    }

    #[test]
    fn metrics_record_each_executed_task() {
        let dir = TempDir::new().unwrap();
        let prd_path = write_prd(&dir, THREE_TASK_PRD);

        let runner = ScriptedRunner::new(vec![
            ("T-001", vec![ok_result("T-001")]),
            ("T-002", vec![failed_result("T-002", "error event")]),
            ("T-003", vec![ok_result("T-003")]),
        ]);
        let mut dispatcher = dispatcher(&prd_path, dir.path(), runner, false);

        let report = dispatcher.run().unwrap();

        // T-003 skipped (T-002 failed), so two metrics records exist.
        assert_eq!(report.skipped, 1);
        let records = dispatcher.metrics().records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].outcome, TaskStatus::Done);
        assert_eq!(records[1].outcome, TaskStatus::Failed);
    }

    #[test]
    fn report_summary_shows_counts() {
        let report = DispatchReport {
            total_tasks: 4,
            done: 2,
            failed: 1,
            blocked: 0,
            skipped: 1,
            results: Vec::new(),
        };
        let summary = report.summary();
        assert!(summary.contains("Total:      4"));
        assert!(summary.contains("Success Rate: 50%"));
        assert!(!report.all_succeeded());
    }

    #[test]
    fn success_rate_of_empty_report_is_zero() {
        assert_eq!(DispatchReport::default().success_rate(), 0.0);
    }
}
