//! Worker subprocess wrapper.
//!
//! Each execution launches one provider CLI subprocess and one reader thread.
//! The reader parses stdout lines into JSONL events behind a mutex; the
//! calling thread polls the wall-clock deadline at one-second granularity.
//! On deadline expiry the child receives a termination signal, then a forced
//! kill after a short grace window.
//!
//! Success requires observing a `session_end` event with no `error` events;
//! a run that raised questions is not a success even when the session ended.

pub mod jsonl;
pub mod prompt;

use crate::error::{AxiomError, Result};
use crate::prd::TaskSpec;
use jsonl::{EventSummary, JsonlEvent};
use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Grace window between the termination signal and the forced kill.
const KILL_GRACE: Duration = Duration::from_secs(5);

/// Deadline poll granularity.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Anything that can execute a task with a prompt.
///
/// [`Worker`] is the real subprocess-backed implementation; tests drive the
/// injector and dispatcher with scripted runners.
pub trait TaskRunner {
    fn execute(&self, task: &TaskSpec, prompt: &str) -> Result<WorkerResult>;
}

/// Worker runtime configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Provider command template (see [`prompt::build_argv`]).
    pub command_template: String,
    /// Timeout applied when the task carries none.
    pub default_timeout: u64,
    /// Working directory for the subprocess.
    pub working_dir: Option<PathBuf>,
    /// Extra environment variables.
    pub env: HashMap<String, String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            command_template: "codex exec --json --dangerously-bypass-approvals-and-sandbox"
                .to_string(),
            default_timeout: 600,
            working_dir: None,
            env: HashMap::new(),
        }
    }
}

/// Outcome of one subprocess invocation. Immutable once returned, except for
/// the restart counter the injector stamps on.
#[derive(Debug, Clone)]
pub struct WorkerResult {
    pub task_id: String,
    pub success: bool,
    /// Concatenated agent messages.
    pub output: String,
    /// All decoded events, in arrival order.
    pub events: Vec<JsonlEvent>,
    /// Questions detected in agent messages.
    pub questions: Vec<String>,
    pub duration: Duration,
    /// Restart index this result was produced at.
    pub restart_count: u32,
    pub error_message: Option<String>,
}

impl WorkerResult {
    pub fn has_questions(&self) -> bool {
        !self.questions.is_empty()
    }
}

/// Subprocess-backed task runner.
#[derive(Debug, Clone)]
pub struct Worker {
    config: WorkerConfig,
}

impl Worker {
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Spawn the subprocess and collect its JSONL events until exit or
    /// deadline. Returns the events and whether the deadline was hit.
    fn run_subprocess(
        &self,
        argv: &[String],
        timeout: Duration,
    ) -> Result<(Vec<JsonlEvent>, bool)> {
        let mut command = Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }
        for (key, value) in &self.config.env {
            command.env(key, value);
        }

        // Own process group, so termination reaches grandchildren that would
        // otherwise keep the stdout pipe open past the deadline.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(|e| {
            AxiomError::UserError(format!(
                "failed to execute provider command '{}': {}\n\
                 Fix: ensure the command is installed and in PATH.",
                argv[0], e
            ))
        })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            AxiomError::UserError("provider subprocess has no stdout pipe".to_string())
        })?;

        let events: Arc<Mutex<Vec<JsonlEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let reader_events = Arc::clone(&events);

        let reader = thread::spawn(move || {
            let buffered = BufReader::new(stdout);
            for line in buffered.lines() {
                let Ok(line) = line else { break };
                if let Some(event) = jsonl::parse_line(&line) {
                    let mut guard = reader_events
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    guard.push(event);
                }
            }
        });

        let deadline = Instant::now() + timeout;
        let timed_out = loop {
            match child.try_wait() {
                Ok(Some(_)) => break false,
                Ok(None) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        terminate_child(&mut child);
                        break true;
                    }
                    thread::sleep(remaining.min(POLL_INTERVAL));
                }
                Err(e) => {
                    terminate_child(&mut child);
                    return Err(AxiomError::UserError(format!(
                        "failed to check provider process status: {}",
                        e
                    )));
                }
            }
        };

        // The child has exited (or been killed); the reader drains buffered
        // output and finishes at EOF.
        let _ = reader.join();

        let events = match Arc::try_unwrap(events) {
            Ok(mutex) => mutex
                .into_inner()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
            Err(arc) => arc
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone(),
        };

        Ok((events, timed_out))
    }
}

impl TaskRunner for Worker {
    fn execute(&self, task: &TaskSpec, prompt: &str) -> Result<WorkerResult> {
        let timeout_secs = if task.timeout_seconds > 0 {
            task.timeout_seconds
        } else {
            self.config.default_timeout
        };

        let argv = prompt::build_argv(&self.config.command_template, &task.id, prompt)?;

        let started = Instant::now();
        let (events, timed_out) = self.run_subprocess(&argv, Duration::from_secs(timeout_secs))?;
        let duration = started.elapsed();

        if timed_out {
            return Ok(WorkerResult {
                task_id: task.id.clone(),
                success: false,
                output: String::new(),
                events,
                questions: Vec::new(),
                duration,
                restart_count: 0,
                error_message: Some(format!("timeout after {}s", timeout_secs)),
            });
        }

        let summary = EventSummary::analyze(&events);
        let error_message = if summary.errors.is_empty() {
            None
        } else {
            Some(summary.errors.join("; "))
        };

        Ok(WorkerResult {
            task_id: task.id.clone(),
            success: summary.success && summary.questions.is_empty(),
            output: summary.messages.join("\n"),
            questions: summary.questions,
            events,
            duration,
            restart_count: 0,
            error_message,
        })
    }
}

/// Terminate a child process group: SIGTERM, grace window, then SIGKILL.
#[cfg(unix)]
fn terminate_child(child: &mut Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let pgid = Pid::from_raw(child.id() as i32);
    if killpg(pgid, Signal::SIGTERM).is_ok() {
        let grace_deadline = Instant::now() + KILL_GRACE;
        while Instant::now() < grace_deadline {
            if let Ok(Some(_)) = child.try_wait() {
                return;
            }
            thread::sleep(Duration::from_millis(100));
        }
    }

    let _ = killpg(pgid, Signal::SIGKILL);
    let _ = child.wait();
}

/// Platforms without signals go straight to the forced kill.
#[cfg(not(unix))]
fn terminate_child(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use crate::prd::TaskStatus;

    fn test_task(timeout_seconds: u64) -> TaskSpec {
        TaskSpec {
            id: "T-001".to_string(),
            name: "Test task".to_string(),
            description: "Run the script".to_string(),
            dependencies: vec![],
            status: TaskStatus::Pending,
            timeout_seconds,
        }
    }

    /// Worker whose provider is `sh -c`, so the prompt becomes the script.
    fn script_worker() -> Worker {
        Worker::new(WorkerConfig {
            command_template: "sh -c".to_string(),
            default_timeout: 10,
            working_dir: None,
            env: HashMap::new(),
        })
    }

    #[test]
    fn successful_session_with_messages() {
        let worker = script_worker();
        let script = concat!(
            r#"echo '{"type": "agent_message", "message": "Implemented the module."}'; "#,
            r#"echo '{"type": "session_end"}'"#,
        );

        let result = worker.execute(&test_task(10), script).unwrap();

        assert!(result.success);
        assert_eq!(result.output, "Implemented the module.");
        assert_eq!(result.events.len(), 2);
        assert!(result.questions.is_empty());
        assert!(result.error_message.is_none());
    }

    #[test]
    fn error_event_marks_failure() {
        let worker = script_worker();
        let script = concat!(
            r#"echo '{"type": "error", "message": "compile failed"}'; "#,
            r#"echo '{"type": "session_end"}'"#,
        );

        let result = worker.execute(&test_task(10), script).unwrap();

        assert!(!result.success);
        assert_eq!(result.error_message.as_deref(), Some("compile failed"));
    }

    #[test]
    fn missing_session_end_marks_failure() {
        let worker = script_worker();
        let script = r#"echo '{"type": "agent_message", "message": "partial work"}'"#;

        let result = worker.execute(&test_task(10), script).unwrap();

        assert!(!result.success);
        assert!(result.error_message.is_none());
    }

    #[test]
    fn question_prevents_success() {
        let worker = script_worker();
        let script = concat!(
            r#"echo '{"type": "agent_message", "message": "Should I use the staging config?"}'; "#,
            r#"echo '{"type": "session_end"}'"#,
        );

        let result = worker.execute(&test_task(10), script).unwrap();

        assert!(!result.success);
        assert!(result.has_questions());
        assert_eq!(result.questions.len(), 1);
        assert!(result.questions[0].contains("staging config"));
    }

    #[test]
    fn non_json_lines_are_skipped() {
        let worker = script_worker();
        let script = concat!(
            "echo 'plain log line'; ",
            r#"echo '{"type": "session_end"}'"#,
        );

        let result = worker.execute(&test_task(10), script).unwrap();

        assert!(result.success);
        assert_eq!(result.events.len(), 1);
    }

    #[test]
    fn deadline_expiry_terminates_subprocess() {
        let worker = script_worker();
        let started = Instant::now();

        let result = worker.execute(&test_task(1), "sleep 30").unwrap();

        assert!(!result.success);
        assert!(result.error_message.as_deref().unwrap().contains("timeout"));
        // Terminated well before the 30s sleep would have finished.
        assert!(started.elapsed() < Duration::from_secs(15));
    }

    #[test]
    fn events_before_timeout_are_preserved() {
        let worker = script_worker();
        let script = concat!(
            r#"echo '{"type": "agent_message", "message": "starting work now"}'; "#,
            "sleep 30",
        );

        let result = worker.execute(&test_task(1), script).unwrap();

        assert!(!result.success);
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events[0].kind, "agent_message");
    }

    #[test]
    fn missing_binary_is_a_user_error() {
        let worker = Worker::new(WorkerConfig {
            command_template: "axiom-no-such-binary-xyz".to_string(),
            ..WorkerConfig::default()
        });

        let result = worker.execute(&test_task(5), "prompt");
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("failed to execute provider command")
        );
    }

    #[test]
    fn task_timeout_overrides_default() {
        let worker = Worker::new(WorkerConfig {
            command_template: "sh -c".to_string(),
            default_timeout: 1,
            working_dir: None,
            env: HashMap::new(),
        });

        // Task-level timeout of 10s outlives the 2s script.
        let script = concat!("sleep 2; ", r#"echo '{"type": "session_end"}'"#);
        let result = worker.execute(&test_task(10), script).unwrap();
        assert!(result.success);
    }

    #[test]
    fn environment_is_passed_to_subprocess() {
        let mut env = HashMap::new();
        env.insert("AXIOM_TEST_MARKER".to_string(), "marker-value".to_string());
        let worker = Worker::new(WorkerConfig {
            command_template: "sh -c".to_string(),
            default_timeout: 10,
            working_dir: None,
            env,
        });

        let script = r#"printf '{"type": "agent_message", "message": "%s"}\n{"type": "session_end"}\n' "$AXIOM_TEST_MARKER""#;
        let result = worker.execute(&test_task(10), script).unwrap();

        assert!(result.success);
        assert!(result.output.contains("marker-value"));
    }
}
