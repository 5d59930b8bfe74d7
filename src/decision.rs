//! Decision rule engine for worker questions.
//!
//! Classifies a question with two priority-ordered regex tables: blocked
//! rules first (anything touching requirements, security, cost, user data,
//! scope, architecture, or third-party services needs a human), then
//! auto-decision rules with canned engineering answers. Unmatched questions
//! fall back to a keyword heuristic: code-ish questions get a generic
//! technical answer, everything else blocks.
//!
//! Decisions are stateless per call; an in-memory log is kept for
//! introspection only.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// What the engine decided to do with a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionKind {
    /// Answer autonomously with a canned response.
    AutoDecide,
    /// Needs human input; the task is blocked.
    Blocked,
    /// Postpone (reserved; the current rules never defer).
    Defer,
}

/// Outcome of classifying one question.
#[derive(Debug, Clone)]
pub struct Decision {
    pub kind: DecisionKind,
    /// Present for `AutoDecide`.
    pub answer: Option<String>,
    pub reason: String,
    /// Heuristic confidence in [0, 1].
    pub confidence: f64,
    pub category: String,
}

struct BlockedRule {
    pattern: Regex,
    category: &'static str,
    reason: &'static str,
}

struct AutoRule {
    pattern: Regex,
    category: &'static str,
    answer: &'static str,
}

/// Questions in these categories always need human confirmation.
static BLOCKED_RULES: LazyLock<Vec<BlockedRule>> = LazyLock::new(|| {
    [
        (
            r"(?i)\b(requirement|feature request|user story|acceptance criteria|intended behavior)\b",
            "requirements",
            "touches requirement definitions; needs user confirmation",
        ),
        (
            r"(?i)\b(security|secret|token|credential|authentication|encrypt|privacy)\b",
            "security",
            "touches security-sensitive decisions; needs user confirmation",
        ),
        (
            r"(?i)\b(cost|pricing|billing|budget|paid plan|quota)\b",
            "cost",
            "touches cost or resource allocation; needs user confirmation",
        ),
        (
            r"(?i)\b(user data|personal (data|information)|pii|gdpr|data migration)\b",
            "user-data",
            "touches user data handling; needs user confirmation",
        ),
        (
            r"(?i)\b(scope|out of scope|additional feature|change request)\b",
            "scope",
            "touches project scope; needs user confirmation",
        ),
        (
            r"(?i)\b(architecture|microservices?|monolith|database choice|storage engine)\b",
            "architecture",
            "touches architecture-level decisions; needs user confirmation",
        ),
        (
            r"(?i)\b(third.party|external service|vendor|saas|api key)\b",
            "third-party",
            "touches third-party integration; needs user confirmation",
        ),
    ]
    .iter()
    .map(|&(pattern, category, reason)| BlockedRule {
        pattern: Regex::new(pattern).expect("Invalid blocked rule pattern"),
        category,
        reason,
    })
    .collect()
});

/// Safe-to-decide categories with canned answers.
static AUTO_RULES: LazyLock<Vec<AutoRule>> = LazyLock::new(|| {
    [
        (
            r"(?i)\b(naming|rename|name (it|this|the)|identifier|variable name|file name)\b",
            "naming",
            "Follow the existing naming conventions in the repository: modules and files in \
             snake_case, types in PascalCase, constants in UPPER_SNAKE_CASE.",
        ),
        (
            r"(?i)\b(directory|folder|where should|which file|file layout|path for)\b",
            "layout",
            "Place new files according to the layout the PRD describes. A new module belongs \
             next to the closest related existing code.",
        ),
        (
            r"(?i)\b(code style|coding style|format(ting)?|indent|lint|quotes?|semicolons?)\b",
            "style",
            "Match the formatting already enforced in the repository and keep the linter clean.",
        ),
        (
            r"(?i)\b(tests?|unit test|test coverage|fixture)\b",
            "testing",
            "Write unit tests for the core logic alongside the code, using the project's \
             existing test tooling. Cover the main paths and the edge cases the PRD names.",
        ),
        (
            r"(?i)\b(error handling|exceptions?|failure mode|panic|fallback)\b",
            "error-handling",
            "Handle errors explicitly and propagate them to the caller. Log unexpected \
             failures instead of swallowing them.",
        ),
        (
            r"(?i)\b(log(ging|s)?|debug output|print statements?)\b",
            "logging",
            "Use the project's logging facility rather than ad-hoc printing. Reserve warnings \
             and errors for genuinely unexpected conditions.",
        ),
        (
            r"(?i)\b(dependency|dependencies|library|package|import|crate)\b",
            "dependencies",
            "Prefer what the project already depends on. Introducing a new dependency needs a \
             stated reason.",
        ),
        (
            r"(?i)\b(encoding|utf-?8|charset|unicode)\b",
            "encoding",
            "Use UTF-8 everywhere.",
        ),
        (
            r"(?i)\b(comments?|docstring|documentation|readme)\b",
            "documentation",
            "Document public APIs briefly. Add inline comments only where the logic is not \
             obvious from the code.",
        ),
        (
            r"(?i)\b(default value|timeout|threshold|config(uration)? option)\b",
            "defaults",
            "Pick a sensible default and make it overridable. Reuse defaults the PRD already \
             specifies.",
        ),
        (
            r"(?i)\b(approach|implementation|implement (it|this)|simplest way|design option)\b",
            "implementation",
            "Choose the simplest maintainable implementation. Optimize for readability first, \
             performance second.",
        ),
    ]
    .iter()
    .map(|&(pattern, category, answer)| AutoRule {
        pattern: Regex::new(pattern).expect("Invalid auto rule pattern"),
        category,
        answer,
    })
    .collect()
});

/// Keywords suggesting a question is about implementation details.
const TECH_HINTS: &[&str] = &[
    "code",
    "function",
    "class",
    "method",
    "variable",
    "parameter",
    "return",
    "type",
    "interface",
    "struct",
    "trait",
    "module",
];

/// Classifies questions and keeps a log of decisions made.
#[derive(Debug, Default)]
pub struct DecisionEngine {
    /// Per-category project conventions appended to canned answers.
    project_conventions: BTreeMap<String, String>,
    log: Vec<Decision>,
}

impl DecisionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine with project-specific conventions keyed by rule category.
    pub fn with_conventions(project_conventions: BTreeMap<String, String>) -> Self {
        Self {
            project_conventions,
            log: Vec::new(),
        }
    }

    /// Classify a question and record the decision.
    pub fn decide(&mut self, _task_id: &str, question: &str) -> Decision {
        let decision = self.classify(question);
        self.log.push(decision.clone());
        decision
    }

    /// Decisions made so far.
    pub fn log(&self) -> &[Decision] {
        &self.log
    }

    fn classify(&self, question: &str) -> Decision {
        if question.trim().len() < 3 {
            return Decision {
                kind: DecisionKind::AutoDecide,
                answer: Some("Please continue.".to_string()),
                reason: "question is empty or too short; continuing by default".to_string(),
                confidence: 0.5,
                category: "empty".to_string(),
            };
        }

        for rule in BLOCKED_RULES.iter() {
            if rule.pattern.is_match(question) {
                return Decision {
                    kind: DecisionKind::Blocked,
                    answer: None,
                    reason: rule.reason.to_string(),
                    confidence: 0.9,
                    category: rule.category.to_string(),
                };
            }
        }

        for rule in AUTO_RULES.iter() {
            if rule.pattern.is_match(question) {
                let mut answer = rule.answer.to_string();
                if let Some(convention) = self.project_conventions.get(rule.category) {
                    answer.push_str("\n\nProject convention: ");
                    answer.push_str(convention);
                }
                return Decision {
                    kind: DecisionKind::AutoDecide,
                    answer: Some(answer),
                    reason: format!("matched auto-decision rule: {}", rule.category),
                    confidence: 0.8,
                    category: rule.category.to_string(),
                };
            }
        }

        self.fallback(question)
    }

    /// No rule matched: technical-looking questions get a generic answer,
    /// everything else blocks.
    fn fallback(&self, question: &str) -> Decision {
        let lower = question.to_lowercase();
        let is_technical = TECH_HINTS.iter().any(|hint| lower.contains(hint));

        if is_technical {
            Decision {
                kind: DecisionKind::AutoDecide,
                answer: Some(
                    "Decide the implementation detail yourself following standard engineering \
                     practice; keep the code readable, testable, and maintainable."
                        .to_string(),
                ),
                reason: "fallback: question mentions implementation vocabulary".to_string(),
                confidence: 0.6,
                category: "general-technical".to_string(),
            }
        } else {
            Decision {
                kind: DecisionKind::Blocked,
                answer: None,
                reason: "fallback: could not classify question; needs user confirmation"
                    .to_string(),
                confidence: 0.4,
                category: "unclassified".to_string(),
            }
        }
    }
}
