//! JSONL event stream parsing for provider CLIs.
//!
//! Providers are invoked with JSON-lines streaming output: each stdout line
//! is a JSON object with at least a `type` field. Five types matter here:
//!
//! - `agent_message`: free-text message from the agent
//! - `tool_call` / `tool_result`: tool activity
//! - `error`: a reported failure
//! - `session_end`: the session finished
//!
//! Anything else is preserved under its own type tag. Non-JSON lines and
//! non-object values are silently skipped, since provider CLIs interleave
//! plain log lines with the event stream.
//!
//! Question detection is a fixed regex heuristic over `agent_message` text:
//! interrogative endings, confirmation/choice requests, option markers, and
//! blocked/stuck declarations, gated by an exclusion list of completion
//! phrases that would otherwise false-positive.

use chrono::Utc;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// One decoded line of provider output.
#[derive(Debug, Clone)]
pub struct JsonlEvent {
    /// Event type tag (`agent_message`, `tool_call`, `tool_result`, `error`,
    /// `session_end`, or whatever else the provider emits).
    pub kind: String,
    /// Event timestamp (seconds since epoch); stamped locally when absent.
    pub timestamp: f64,
    /// The raw decoded object.
    pub payload: Value,
}

impl JsonlEvent {
    /// The `message` field of the payload, when present.
    pub fn message(&self) -> Option<&str> {
        self.payload.get("message").and_then(Value::as_str)
    }
}

/// Patterns that indicate the agent is asking a question.
static QUESTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Interrogative ending
        r"\?\s*$",
        // Confirmation / choice requests
        r"(?i)\b(please confirm|please choose|please specify|let me know which|which do you prefer)\b",
        r"(?i)\b(should i|do you want|would you like|can i|shall i|may i)\b",
        // Wh-question ending in a question mark
        r"(?i)\b(which|what|how|where|when|why)\b.*\?\s*$",
        // Option lists
        r"(?i)\boption\s*[A-D1-9]\b",
        r"\b(A\)|B\)|C\)|1\)|2\)|3\))",
        // Blocked / stuck declarations
        r"(?i)(cannot proceed|can't proceed|unable to determine|not sure how to|blocked|stuck|need (your |more )?input)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid question pattern"))
    .collect()
});

/// Exceptions that suppress question detection (completed/negated phrasing).
static QUESTION_EXCLUDE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(already (done|completed|fixed|resolved)|resolved|completed successfully|no issues?|no problems?)\b",
        r"(?i)\b(not needed|no need|skipping|skipped)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid question exclude pattern"))
    .collect()
});

/// Parse a single JSONL line. Returns `None` for blank lines, non-JSON
/// content, and non-object values; never an error.
pub fn parse_line(line: &str) -> Option<JsonlEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let payload: Value = serde_json::from_str(line).ok()?;
    if !payload.is_object() {
        return None;
    }

    let kind = payload
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let timestamp = payload
        .get("timestamp")
        .and_then(Value::as_f64)
        .unwrap_or_else(|| Utc::now().timestamp_millis() as f64 / 1000.0);

    Some(JsonlEvent {
        kind,
        timestamp,
        payload,
    })
}

/// Detect a question in an `agent_message` event.
///
/// Returns the full message text when a question pattern matches and no
/// exclusion pattern does. Messages shorter than 3 characters are ignored.
pub fn detect_question(event: &JsonlEvent) -> Option<String> {
    if event.kind != "agent_message" {
        return None;
    }

    let message = event.message()?;
    if message.trim().len() < 3 {
        return None;
    }

    for exclude in QUESTION_EXCLUDE_PATTERNS.iter() {
        if exclude.is_match(message) {
            return None;
        }
    }

    for pattern in QUESTION_PATTERNS.iter() {
        if pattern.is_match(message) {
            return Some(message.to_string());
        }
    }

    None
}

/// Extract the error message from an `error` event.
pub fn detect_error(event: &JsonlEvent) -> Option<String> {
    if event.kind != "error" {
        return None;
    }
    Some(
        event
            .message()
            .map(str::to_string)
            .unwrap_or_else(|| event.payload.to_string()),
    )
}

/// Aggregate analysis of one run's event stream.
#[derive(Debug, Clone, Default)]
pub struct EventSummary {
    pub total_events: usize,
    pub type_counts: BTreeMap<String, usize>,
    pub messages: Vec<String>,
    pub questions: Vec<String>,
    pub errors: Vec<String>,
    pub tool_calls: Vec<String>,
    /// A `session_end` event was observed.
    pub completed: bool,
    /// Completed with zero error events.
    pub success: bool,
}

impl EventSummary {
    /// Analyze a full event stream.
    pub fn analyze(events: &[JsonlEvent]) -> Self {
        let mut summary = EventSummary::default();

        for event in events {
            *summary.type_counts.entry(event.kind.clone()).or_insert(0) += 1;

            if let Some(question) = detect_question(event) {
                summary.questions.push(question);
            }
            if event.kind == "session_end" {
                summary.completed = true;
            }
            if let Some(error) = detect_error(event) {
                summary.errors.push(error);
            }
            if event.kind == "agent_message"
                && let Some(msg) = event.message()
                && !msg.is_empty()
            {
                summary.messages.push(msg.to_string());
            }
            if event.kind == "tool_call" {
                let tool = event
                    .payload
                    .get("tool")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                summary.tool_calls.push(tool.to_string());
            }
        }

        summary.total_events = events.len();
        summary.success = summary.completed && summary.errors.is_empty();
        summary
    }

    pub fn has_questions(&self) -> bool {
        !self.questions.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
