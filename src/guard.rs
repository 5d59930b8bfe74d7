//! Session watchdog and status dashboard.
//!
//! The watchdog polls the heartbeat file (`.axiom/memory/active_context.md`)
//! mtime and reports staleness once it exceeds the configured threshold. The
//! dashboard renders a Markdown status report combining PRD task counts,
//! knowledge statistics, and the heartbeat age.

use crate::config::ProvidersConfig;
use crate::context::WorkspaceContext;
use crate::error::{AxiomError, Result};
use crate::knowledge::{KnowledgeStore, confidence::ConfidenceEngine};
use crate::prd::{self, ALL_STATUSES};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::SystemTime;

/// Default staleness threshold in minutes.
pub const DEFAULT_TIMEOUT_MINUTES: u64 = 30;

/// Default poll interval in minutes.
pub const DEFAULT_INTERVAL_MINUTES: u64 = 5;

/// Result of one heartbeat check.
#[derive(Debug, Clone)]
pub struct HeartbeatStatus {
    pub exists: bool,
    pub stale: bool,
    /// Minutes since the last heartbeat update, when the file exists.
    pub age_minutes: Option<u64>,
    pub message: String,
}

/// Check the heartbeat file against a staleness threshold. A missing file
/// reports stale.
pub fn check_heartbeat<P: AsRef<Path>>(path: P, timeout_minutes: u64) -> HeartbeatStatus {
    let path = path.as_ref();

    let Ok(metadata) = std::fs::metadata(path) else {
        return HeartbeatStatus {
            exists: false,
            stale: true,
            age_minutes: None,
            message: format!("heartbeat file '{}' does not exist", path.display()),
        };
    };

    let age_minutes = metadata
        .modified()
        .ok()
        .and_then(|mtime| SystemTime::now().duration_since(mtime).ok())
        .map(|age| age.as_secs() / 60);

    match age_minutes {
        Some(age) if age >= timeout_minutes => HeartbeatStatus {
            exists: true,
            stale: true,
            age_minutes: Some(age),
            message: format!(
                "no heartbeat update for {} minutes (threshold {} minutes)",
                age, timeout_minutes
            ),
        },
        Some(age) => HeartbeatStatus {
            exists: true,
            stale: false,
            age_minutes: Some(age),
            message: format!("heartbeat updated {} minutes ago", age),
        },
        None => HeartbeatStatus {
            exists: true,
            stale: true,
            age_minutes: None,
            message: "heartbeat mtime is not readable".to_string(),
        },
    }
}

/// Touch the heartbeat file, creating it with a stub header on first use.
pub fn touch_heartbeat<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            AxiomError::UserError(format!(
                "failed to create directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let content = format!(
        "# Active Context\n\nLast update: {}\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );
    std::fs::write(path, content).map_err(|e| {
        AxiomError::UserError(format!(
            "failed to write heartbeat file '{}': {}",
            path.display(),
            e
        ))
    })
}

/// Render the status dashboard as Markdown.
pub fn render_dashboard(ctx: &WorkspaceContext, prd_path: Option<&Path>) -> Result<String> {
    let mut out = String::new();
    out.push_str("# Axiom Status Dashboard\n\n");

    // System state
    let heartbeat = check_heartbeat(ctx.heartbeat_path(), DEFAULT_TIMEOUT_MINUTES);
    let providers = ProvidersConfig::load_or_builtin(ctx.providers_path())?;
    let provider = providers
        .select(None)
        .map(|(id, _)| id.to_string())
        .unwrap_or_else(|_| "none".to_string());

    out.push_str("## System State\n\n");
    out.push_str("| Key | Value |\n|-----|-------|\n");
    out.push_str(&format!("| Provider | {} |\n", provider));
    out.push_str(&format!(
        "| Heartbeat | {} |\n",
        match heartbeat.age_minutes {
            Some(age) => format!("{} min since last update", age),
            None => "missing".to_string(),
        }
    ));
    out.push_str(&format!(
        "| Session | {} |\n",
        if heartbeat.stale { "STALE" } else { "active" }
    ));

    // Task progress
    out.push_str("\n## Task Progress\n\n");
    match prd_path {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(content) => {
                let counts = prd::status_counts(&content);
                let total: usize = counts.values().sum();
                out.push_str(&format!("{} task(s) in {}\n\n", total, path.display()));
                for &status in ALL_STATUSES {
                    if let Some(count) = counts.get(&status) {
                        out.push_str(&format!("- {}: {}\n", status.marker(), count));
                    }
                }
            }
            Err(e) => out.push_str(&format!("PRD not readable: {}\n", e)),
        },
        None => out.push_str("No PRD supplied.\n"),
    }

    // Knowledge stats
    let store = KnowledgeStore::new(ctx.knowledge_dir());
    let entries = store.scan()?;
    let mut categories: BTreeMap<String, usize> = BTreeMap::new();
    for (_, file) in &entries {
        *categories
            .entry(file.frontmatter.category.clone())
            .or_insert(0) += 1;
    }
    let deprecated = ConfidenceEngine::new(store).deprecated_entries()?;

    out.push_str("\n## Knowledge\n\n");
    out.push_str(&format!("- Entries: {}\n", entries.len()));
    for (category, count) in &categories {
        out.push_str(&format!("  - {}: {}\n", category, count));
    }
    out.push_str(&format!("- Deprecated (confidence < 0.5): {}\n", deprecated.len()));

    out.push_str(&format!(
        "\nGenerated: {}\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));

    Ok(out)
}
