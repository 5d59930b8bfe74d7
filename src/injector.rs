//! Restart/injection loop for question-bearing worker runs.
//!
//! When a worker run surfaces a question, the answer is appended to the
//! original prompt and the worker is re-invoked with the accumulated Q&A
//! context. A task gets at most [`MAX_RESTARTS`] restarts; questions that
//! match the risk keyword denylist terminate the loop immediately regardless
//! of remaining budget.
//!
//! Rebuilt prompts are bounded: past [`MAX_PROMPT_CHARS`] characters the
//! middle is discarded, keeping the task-description head and the most recent
//! Q&A tail.

use crate::error::Result;
use crate::prd::TaskSpec;
use crate::worker::{TaskRunner, WorkerResult};
use std::collections::HashMap;

/// Restart ceiling per task.
pub const MAX_RESTARTS: u32 = 3;

/// Character budget before prompt compression kicks in.
pub const MAX_PROMPT_CHARS: usize = 16_000;

/// Characters of recent context retained by compression.
pub const COMPRESSED_TAIL_CHARS: usize = 8_000;

/// Characters of the head (task description) retained by compression.
const HEAD_CHARS: usize = 2_000;

/// Questions touching these operations are never auto-answered.
const RISK_KEYWORDS: &[&str] = &[
    "drop database",
    "delete the database",
    "rm -rf",
    "force push",
    "production",
    "secret",
    "password",
    "credential",
    "api key",
    "payment",
    "transfer funds",
    "wire transfer",
];

/// One asked-and-answered question.
#[derive(Debug, Clone)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
    /// Restart index this pair was produced at.
    pub restart_index: u32,
}

/// Per-task accumulator for the retry sequence. Discarded once the task
/// resolves.
#[derive(Debug, Clone)]
pub struct InjectionContext {
    pub task_id: String,
    pub original_prompt: String,
    pub qa_pairs: Vec<QaPair>,
    pub restart_count: u32,
}

impl InjectionContext {
    fn new(task_id: &str, original_prompt: String) -> Self {
        Self {
            task_id: task_id.to_string(),
            original_prompt,
            qa_pairs: Vec::new(),
            restart_count: 0,
        }
    }
}

/// Callback that produces an answer for a detected question, or `None` when
/// the question cannot be answered (the task is then blocked).
pub type AnswerFn<'a> = dyn FnMut(&str, &str) -> Option<String> + 'a;

/// Drives the execute → detect question → answer → re-execute cycle.
pub struct RestartInjector<R: TaskRunner> {
    runner: R,
    max_restarts: u32,
    contexts: HashMap<String, InjectionContext>,
}

impl<R: TaskRunner> RestartInjector<R> {
    pub fn new(runner: R) -> Self {
        Self::with_max_restarts(runner, MAX_RESTARTS)
    }

    pub fn with_max_restarts(runner: R, max_restarts: u32) -> Self {
        Self {
            runner,
            max_restarts,
            contexts: HashMap::new(),
        }
    }

    /// Execute a task, restarting with injected answers while questions keep
    /// coming and the budget allows.
    ///
    /// `Err` is reserved for configuration-level problems (bad command
    /// template, missing binary); every run-level failure comes back as an
    /// unsuccessful [`WorkerResult`].
    pub fn execute_with_injection(
        &mut self,
        task: &TaskSpec,
        answer_fn: &mut AnswerFn<'_>,
        initial_prompt: Option<String>,
    ) -> Result<WorkerResult> {
        let prompt =
            initial_prompt.unwrap_or_else(|| crate::worker::prompt::build_prompt(task));
        let mut ctx = InjectionContext::new(&task.id, prompt);

        loop {
            let effective_prompt = build_injected_prompt(&ctx.original_prompt, &ctx.qa_pairs);

            let mut result = self.runner.execute(task, &effective_prompt)?;
            result.restart_count = ctx.restart_count;

            if !result.has_questions() {
                self.contexts.insert(task.id.clone(), ctx);
                return Ok(result);
            }

            let question = result.questions[0].clone();

            // The ceiling bounds question-handling cycles: with a ceiling of
            // 3, the third question-bearing result ends the task and no
            // further execution is attempted.
            if ctx.restart_count + 1 >= self.max_restarts || is_risk_question(&question) {
                result.success = false;
                result.error_message = Some(format!(
                    "exceeded max restarts ({}) or risk keyword detected",
                    self.max_restarts
                ));
                self.contexts.insert(task.id.clone(), ctx);
                return Ok(result);
            }

            let answer = answer_fn(&task.id, &question);
            let Some(answer) = answer else {
                result.success = false;
                result.error_message = Some(format!(
                    "BLOCKED: unanswered question: {}",
                    truncate_chars(&question, 100)
                ));
                self.contexts.insert(task.id.clone(), ctx);
                return Ok(result);
            };

            ctx.qa_pairs.push(QaPair {
                question,
                answer,
                restart_index: ctx.restart_count,
            });
            ctx.restart_count += 1;
        }
    }

    /// Injection context of the most recent run for a task.
    pub fn context(&self, task_id: &str) -> Option<&InjectionContext> {
        self.contexts.get(task_id)
    }

    /// The wrapped runner.
    pub fn runner(&self) -> &R {
        &self.runner
    }
}

/// Append the accumulated Q&A pairs to the original prompt.
///
/// With zero pairs the original prompt is returned unchanged. The combined
/// prompt is compressed when it exceeds the character budget.
pub fn build_injected_prompt(original_prompt: &str, qa_pairs: &[QaPair]) -> String {
    if qa_pairs.is_empty() {
        return original_prompt.to_string();
    }

    let mut combined = String::with_capacity(original_prompt.len() + 256 * qa_pairs.len());
    combined.push_str(original_prompt);
    combined.push_str("\n\n---\n## Injected context\n");
    for (i, qa) in qa_pairs.iter().enumerate() {
        combined.push_str(&format!(
            "\n[Answer {}] Regarding \"{}\":\n{}\n",
            i + 1,
            truncate_chars(&qa.question, 200),
            qa.answer
        ));
    }

    compress_prompt(&combined)
}

/// Head/tail compression for oversized prompts.
///
/// Prompts at or below [`MAX_PROMPT_CHARS`] characters are returned
/// unmodified. Above the budget, the first [`HEAD_CHARS`] characters (task
/// description) and the last [`COMPRESSED_TAIL_CHARS`] characters (most
/// recent Q&A) are kept, with an elision marker between.
pub fn compress_prompt(prompt: &str) -> String {
    let char_count = prompt.chars().count();
    if char_count <= MAX_PROMPT_CHARS {
        return prompt.to_string();
    }

    let head = take_chars(prompt, HEAD_CHARS);
    let tail = take_last_chars(prompt, COMPRESSED_TAIL_CHARS);

    format!(
        "{}\n\n[... context compressed, most recent {} characters retained ...]\n\n{}",
        head, COMPRESSED_TAIL_CHARS, tail
    )
}

/// Whether a question touches a denylisted risky operation.
pub fn is_risk_question(question: &str) -> bool {
    let lower = question.to_lowercase();
    RISK_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// First `n` characters of a string (UTF-8 boundary safe).
fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Last `n` characters of a string (UTF-8 boundary safe).
fn take_last_chars(s: &str, n: usize) -> &str {
    let char_count = s.chars().count();
    if char_count <= n {
        return s;
    }
    match s.char_indices().nth(char_count - n) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

/// Truncate to `n` characters for display in messages.
fn truncate_chars(s: &str, n: usize) -> &str {
    take_chars(s, n)
}
