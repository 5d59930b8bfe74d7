//! Prompt and command construction for worker subprocesses.
//!
//! The provider command template is split with shell rules first and
//! placeholders are substituted per token afterwards, so a prompt containing
//! spaces, quotes, or newlines always stays a single argument. When the
//! template has no `{prompt}` placeholder, the prompt is appended as the
//! final argument (the common shape for `codex exec ... <prompt>`).

use crate::error::{AxiomError, Result};
use crate::prd::TaskSpec;
use regex::Regex;
use std::sync::LazyLock;

static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").expect("Invalid placeholder regex"));

/// Build the default execution prompt for a task.
pub fn build_prompt(task: &TaskSpec) -> String {
    format!(
        "Complete the following task:\n\n\
         ## Task {}: {}\n\n\
         {}\n\n\
         ---\n\
         Requirements:\n\
         1. Follow the description exactly.\n\
         2. Print a short summary when finished.\n\
         3. If a decision cannot be made autonomously, ask a clear question.\n",
        task.id, task.name, task.description
    )
}

/// Build the subprocess argv from a command template.
///
/// Supported placeholders: `{task_id}`, `{prompt}`. An unknown placeholder is
/// an error rather than a silent empty substitution.
pub fn build_argv(template: &str, task_id: &str, prompt: &str) -> Result<Vec<String>> {
    let tokens = shell_words::split(template).map_err(|e| {
        AxiomError::UserError(format!(
            "failed to parse provider command '{}': {}\n\
             Fix: check for unmatched quotes or invalid escape sequences.",
            template, e
        ))
    })?;

    if tokens.is_empty() {
        return Err(AxiomError::UserError(format!(
            "provider command is empty after parsing: '{}'",
            template
        )));
    }

    let mut argv = Vec::with_capacity(tokens.len() + 1);
    let mut prompt_used = false;

    for token in &tokens {
        argv.push(render_token(token, task_id, prompt, &mut prompt_used)?);
    }

    if !prompt_used {
        argv.push(prompt.to_string());
    }

    Ok(argv)
}

/// Substitute placeholders inside one token.
fn render_token(
    token: &str,
    task_id: &str,
    prompt: &str,
    prompt_used: &mut bool,
) -> Result<String> {
    let mut result = String::with_capacity(token.len());
    let mut last_end = 0;

    for whole in PLACEHOLDER_REGEX.find_iter(token) {
        result.push_str(&token[last_end..whole.start()]);

        // The capture is the match without its surrounding braces.
        match &token[whole.start() + 1..whole.end() - 1] {
            "task_id" => result.push_str(task_id),
            "prompt" => {
                result.push_str(prompt);
                *prompt_used = true;
            }
            name => {
                return Err(AxiomError::UserError(format!(
                    "provider command references undefined placeholder '{{{}}}'\n\
                     Supported placeholders: {{task_id}}, {{prompt}}",
                    name
                )));
            }
        }
        last_end = whole.end();
    }

    result.push_str(&token[last_end..]);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prd::TaskStatus;

    fn task() -> TaskSpec {
        TaskSpec {
            id: "T-101".to_string(),
            name: "Worker core".to_string(),
            description: "Wrap the provider CLI.".to_string(),
            dependencies: vec![],
            status: TaskStatus::Pending,
            timeout_seconds: 600,
        }
    }

    #[test]
    fn default_prompt_includes_id_name_and_description() {
        let prompt = build_prompt(&task());
        assert!(prompt.contains("## Task T-101: Worker core"));
        assert!(prompt.contains("Wrap the provider CLI."));
        assert!(prompt.contains("ask a clear question"));
    }

    #[test]
    fn prompt_is_appended_when_no_placeholder() {
        let argv = build_argv("codex exec --json", "T-101", "do the thing").unwrap();
        assert_eq!(argv, vec!["codex", "exec", "--json", "do the thing"]);
    }

    #[test]
    fn prompt_placeholder_is_substituted_in_place() {
        let argv = build_argv("./agent.sh {prompt} --task {task_id}", "T-101", "fix it").unwrap();
        assert_eq!(argv, vec!["./agent.sh", "fix it", "--task", "T-101"]);
    }

    #[test]
    fn multiline_prompt_stays_one_argument() {
        let prompt = "line one\nline two \"quoted\"";
        let argv = build_argv("codex exec", "T-101", prompt).unwrap();
        assert_eq!(argv.len(), 3);
        assert_eq!(argv[2], prompt);
    }

    #[test]
    fn quoted_template_tokens_are_preserved() {
        let argv = build_argv(r#"sh -c "echo hi""#, "T-101", "p").unwrap();
        assert_eq!(argv, vec!["sh", "-c", "echo hi", "p"]);
    }

    #[test]
    fn unknown_placeholder_is_an_error() {
        let result = build_argv("run {worktree}", "T-101", "p");
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("undefined placeholder '{worktree}'")
        );
    }

    #[test]
    fn unmatched_quote_is_an_error() {
        let result = build_argv("echo \"unmatched", "T-101", "p");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("failed to parse"));
    }

    #[test]
    fn empty_template_is_an_error() {
        let result = build_argv("   ", "T-101", "p");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("empty"));
    }
}
