//! Knowledge index regeneration.
//!
//! `knowledge_base.md` aggregates entry metadata into summary tables. It is
//! regenerated from a full directory scan on every mutation; there is no
//! incremental consistency beyond last-writer-wins.

use super::KnowledgeStore;
use crate::error::Result;
use crate::fs::atomic_write;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::Path;

/// Regenerate the index file from a full store scan. Returns the rendered
/// content.
pub fn rebuild_index(store: &KnowledgeStore, index_path: &Path) -> Result<String> {
    let entries = store.scan()?;

    let mut out = String::new();
    out.push_str("# Knowledge Base\n\n");
    out.push_str(&format!(
        "Regenerated: {} · {} entries\n\n",
        Utc::now().format("%Y-%m-%d %H:%M UTC"),
        entries.len()
    ));

    out.push_str("## Entries\n\n");
    if entries.is_empty() {
        out.push_str("No knowledge entries yet.\n");
    } else {
        out.push_str("| ID | Title | Category | Confidence | Created | Status |\n");
        out.push_str("|----|-------|----------|------------|---------|--------|\n");
        for (_, file) in &entries {
            let fm = &file.frontmatter;
            let status = if file.is_deprecated() {
                "deprecated"
            } else {
                fm.status.as_str()
            };
            out.push_str(&format!(
                "| {} | {} | {} | {:.2} | {} | {} |\n",
                fm.id, fm.title, fm.category, fm.confidence, fm.created, status
            ));
        }
    }

    let mut categories: BTreeMap<&str, usize> = BTreeMap::new();
    let mut tags: BTreeMap<&str, usize> = BTreeMap::new();
    for (_, file) in &entries {
        *categories.entry(&file.frontmatter.category).or_insert(0) += 1;
        for tag in &file.frontmatter.tags {
            *tags.entry(tag).or_insert(0) += 1;
        }
    }

    out.push_str("\n## Categories\n\n");
    if categories.is_empty() {
        out.push_str("None.\n");
    } else {
        for (category, count) in &categories {
            out.push_str(&format!("- {}: {}\n", category, count));
        }
    }

    out.push_str("\n## Tags\n\n");
    if tags.is_empty() {
        out.push_str("None.\n");
    } else {
        for (tag, count) in &tags {
            out.push_str(&format!("- {}: {}\n", tag, count));
        }
    }

    atomic_write(index_path, &out)?;
    Ok(out)
}
