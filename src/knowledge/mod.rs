//! Flat-file knowledge store.
//!
//! Each knowledge item is one Markdown file with YAML frontmatter followed by
//! a body of fixed sections:
//!
//! ```text
//! ---
//! id: k-006
//! title: Prefer worktrees for task isolation
//! category: workflow
//! tags:
//!   - git
//! created: 2026-08-05
//! confidence: 0.7
//! ---
//!
//! ## Summary
//! One reusable lesson.
//!
//! ## Details
//! Longer explanation.
//! ```
//!
//! Files live in `.axiom/memory/knowledge/` as `k-NNN-slug.md`. There is no
//! locking; the store assumes a single caller process and last writer wins.

pub mod confidence;
pub mod index;

use crate::error::{AxiomError, Result};
use crate::fs::atomic_write;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Valid knowledge categories.
pub const CATEGORIES: &[&str] = &["architecture", "debugging", "pattern", "workflow", "tooling"];

/// Confidence assigned to freshly harvested entries.
pub const INITIAL_CONFIDENCE: f64 = 0.7;

/// Knowledge entry frontmatter. Unknown fields are preserved for forward
/// compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeFrontmatter {
    /// Entry identifier (e.g. "k-006").
    pub id: String,

    /// Entry title.
    pub title: String,

    /// Category (one of [`CATEGORIES`]).
    pub category: String,

    /// Tags for the index tag cloud.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Creation date, also the decay reference point.
    pub created: NaiveDate,

    /// Bounded confidence score in [0, 1].
    #[serde(default = "default_confidence")]
    pub confidence: f64,

    /// Source references (task ids, URLs).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,

    /// Lifecycle status ("active"; deprecation is advisory and derived from
    /// confidence, never written destructively).
    #[serde(default = "default_status")]
    pub status: String,

    /// Unknown fields preserved for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

fn default_confidence() -> f64 {
    INITIAL_CONFIDENCE
}

fn default_status() -> String {
    "active".to_string()
}

/// A parsed knowledge file: frontmatter plus Markdown body.
#[derive(Debug, Clone)]
pub struct KnowledgeFile {
    pub frontmatter: KnowledgeFrontmatter,
    pub body: String,
}

impl KnowledgeFile {
    /// Parse a knowledge file from its content string.
    pub fn parse(content: &str) -> Result<Self> {
        let normalized = content.replace("\r\n", "\n");

        let rest = normalized.strip_prefix("---\n").ok_or_else(|| {
            AxiomError::UserError(
                "knowledge file must start with a '---' frontmatter delimiter".to_string(),
            )
        })?;

        let end = rest.find("\n---").ok_or_else(|| {
            AxiomError::UserError(
                "knowledge file is missing the closing '---' frontmatter delimiter".to_string(),
            )
        })?;

        let frontmatter: KnowledgeFrontmatter =
            serde_yaml::from_str(&rest[..end]).map_err(|e| {
                AxiomError::UserError(format!("failed to parse knowledge frontmatter: {}", e))
            })?;

        let body = rest[end + 4..].trim_start_matches('\n').to_string();

        Ok(Self { frontmatter, body })
    }

    /// Load a knowledge file from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AxiomError::UserError(format!(
                "failed to read knowledge file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&content)
    }

    /// Serialize the file back to frontmatter + body.
    pub fn to_string(&self) -> Result<String> {
        let yaml = serde_yaml::to_string(&self.frontmatter).map_err(|e| {
            AxiomError::UserError(format!("failed to serialize knowledge frontmatter: {}", e))
        })?;

        Ok(format!("---\n{}---\n\n{}", yaml, self.body))
    }

    /// Atomically save the file to disk.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        atomic_write(path, &self.to_string()?)
    }

    /// Whether this entry is below the advisory deprecation threshold.
    pub fn is_deprecated(&self) -> bool {
        self.frontmatter.confidence < confidence::DEPRECATION_THRESHOLD
    }
}

/// Filesystem-backed knowledge store.
#[derive(Debug, Clone)]
pub struct KnowledgeStore {
    knowledge_dir: PathBuf,
}

impl KnowledgeStore {
    pub fn new<P: AsRef<Path>>(knowledge_dir: P) -> Self {
        Self {
            knowledge_dir: knowledge_dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.knowledge_dir
    }

    /// Scan the store, returning entries with their paths, sorted by
    /// filename (and therefore by id).
    pub fn scan(&self) -> Result<Vec<(PathBuf, KnowledgeFile)>> {
        let mut entries = Vec::new();
        if !self.knowledge_dir.exists() {
            return Ok(entries);
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.knowledge_dir)
            .map_err(|e| {
                AxiomError::UserError(format!(
                    "failed to read knowledge directory '{}': {}",
                    self.knowledge_dir.display(),
                    e
                ))
            })?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| is_entry_filename(path))
            .collect();
        paths.sort();

        for path in paths {
            // Unparseable entries are skipped, not fatal: the store is
            // hand-editable Markdown.
            match KnowledgeFile::load(&path) {
                Ok(file) => entries.push((path, file)),
                Err(e) => eprintln!("Warning: skipping '{}': {}", path.display(), e),
            }
        }

        Ok(entries)
    }

    /// Find an entry by id (filename prefix match).
    pub fn find(&self, id: &str) -> Result<Option<(PathBuf, KnowledgeFile)>> {
        if !self.knowledge_dir.exists() {
            return Ok(None);
        }

        let prefix = format!("{}-", id);
        let candidate = std::fs::read_dir(&self.knowledge_dir)
            .map_err(|e| {
                AxiomError::UserError(format!(
                    "failed to read knowledge directory '{}': {}",
                    self.knowledge_dir.display(),
                    e
                ))
            })?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .find(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix) && n.ends_with(".md"))
            });

        match candidate {
            Some(path) => {
                let file = KnowledgeFile::load(&path)?;
                Ok(Some((path, file)))
            }
            None => Ok(None),
        }
    }

    /// Allocate the next free id by scanning existing filenames.
    pub fn next_id(&self) -> Result<String> {
        let max = self
            .scan()?
            .iter()
            .filter_map(|(_, file)| {
                file.frontmatter
                    .id
                    .strip_prefix("k-")
                    .and_then(|n| n.parse::<u32>().ok())
            })
            .max()
            .unwrap_or(0);
        Ok(format!("k-{:03}", max + 1))
    }

    /// Create a new knowledge entry file and return its id and path.
    pub fn add(&self, entry: NewEntry<'_>) -> Result<(String, PathBuf)> {
        if !CATEGORIES.contains(&entry.category) {
            return Err(AxiomError::UserError(format!(
                "invalid category '{}'. Valid categories: {}",
                entry.category,
                CATEGORIES.join(", ")
            )));
        }

        let id = self.next_id()?;
        let filename = format!("{}-{}.md", id, slugify(entry.title));
        let path = self.knowledge_dir.join(filename);

        let mut body = String::new();
        body.push_str("## Summary\n");
        body.push_str(entry.summary);
        body.push_str("\n\n## Details\n");
        body.push_str(entry.details);
        body.push('\n');
        if let Some(code) = entry.code_example {
            body.push_str("\n## Code Example\n```\n");
            body.push_str(code);
            body.push_str("\n```\n");
        }
        if !entry.related.is_empty() {
            body.push_str("\n## Related Knowledge\n");
            for related in entry.related {
                body.push_str(&format!("- {}\n", related));
            }
        }

        let file = KnowledgeFile {
            frontmatter: KnowledgeFrontmatter {
                id: id.clone(),
                title: entry.title.to_string(),
                category: entry.category.to_string(),
                tags: entry.tags.iter().map(|t| t.to_string()).collect(),
                created: Utc::now().date_naive(),
                confidence: INITIAL_CONFIDENCE,
                references: Vec::new(),
                status: "active".to_string(),
                extra: BTreeMap::new(),
            },
            body,
        };
        file.save(&path)?;

        Ok((id, path))
    }
}

/// Input for [`KnowledgeStore::add`].
#[derive(Debug, Clone, Default)]
pub struct NewEntry<'a> {
    pub title: &'a str,
    pub category: &'a str,
    pub tags: Vec<&'a str>,
    pub summary: &'a str,
    pub details: &'a str,
    pub code_example: Option<&'a str>,
    pub related: Vec<&'a str>,
}

/// Whether a path looks like a knowledge entry file (`k-NNN-*.md`).
fn is_entry_filename(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| {
            name.ends_with(".md")
                && name
                    .strip_prefix("k-")
                    .is_some_and(|rest| rest.chars().next().is_some_and(|c| c.is_ascii_digit()))
        })
}

/// Turn a title into a filename slug (lowercase, dash-separated, <= 60 chars).
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    let mut last_dash = true;
    for c in title.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_dash = false;
        } else if (c.is_whitespace() || c == '-' || c == '_') && !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-');
    slug.chars().take(60).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ENTRY: &str = r#"---
id: k-001
title: Worktrees isolate agent edits
category: workflow
tags:
  - git
  - isolation
created: 2026-07-01
confidence: 0.7
---

## Summary
Use one worktree per task.

## Details
Parallel agents never collide on the working tree.
"#;

    #[test]
    fn parse_reads_frontmatter_and_body() {
        let file = KnowledgeFile::parse(ENTRY).unwrap();
        assert_eq!(file.frontmatter.id, "k-001");
        assert_eq!(file.frontmatter.category, "workflow");
        assert_eq!(file.frontmatter.tags, vec!["git", "isolation"]);
        assert_eq!(file.frontmatter.confidence, 0.7);
        assert_eq!(file.frontmatter.status, "active");
        assert!(file.body.starts_with("## Summary"));
        assert!(file.body.contains("never collide"));
    }

    #[test]
    fn parse_requires_frontmatter_delimiters() {
        assert!(KnowledgeFile::parse("no frontmatter").is_err());
        assert!(KnowledgeFile::parse("---\nid: k-001\nno closing").is_err());
    }

    #[test]
    fn unknown_frontmatter_fields_survive_roundtrip() {
        let content = r#"---
id: k-001
title: Entry
category: pattern
created: 2026-07-01
source_session: abc123
---

Body.
"#;
        let file = KnowledgeFile::parse(content).unwrap();
        assert!(file.frontmatter.extra.contains_key("source_session"));

        let reparsed = KnowledgeFile::parse(&file.to_string().unwrap()).unwrap();
        assert!(reparsed.frontmatter.extra.contains_key("source_session"));
        assert_eq!(reparsed.body, file.body);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("k-001-test.md");

        let file = KnowledgeFile::parse(ENTRY).unwrap();
        file.save(&path).unwrap();

        let loaded = KnowledgeFile::load(&path).unwrap();
        assert_eq!(loaded.frontmatter.id, "k-001");
        assert_eq!(loaded.frontmatter.created, file.frontmatter.created);
    }

    #[test]
    fn slugify_normalizes_titles() {
        assert_eq!(slugify("Worktrees isolate agent edits"), "worktrees-isolate-agent-edits");
        assert_eq!(slugify("Fix: the (strange) bug!"), "fix-the-strange-bug");
        assert_eq!(slugify("  spaced   out  "), "spaced-out");
    }

    #[test]
    fn slugify_caps_length() {
        let long = "word ".repeat(40);
        assert!(slugify(&long).len() <= 60);
    }

    #[test]
    fn add_creates_entry_with_sequential_id() {
        let temp = TempDir::new().unwrap();
        let store = KnowledgeStore::new(temp.path());

        let (id, path) = store
            .add(NewEntry {
                title: "First lesson",
                category: "debugging",
                tags: vec!["ci"],
                summary: "A summary.",
                details: "The details.",
                ..Default::default()
            })
            .unwrap();

        assert_eq!(id, "k-001");
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("k-001-first-lesson"));

        let (id2, _) = store
            .add(NewEntry {
                title: "Second lesson",
                category: "pattern",
                summary: "s",
                details: "d",
                ..Default::default()
            })
            .unwrap();
        assert_eq!(id2, "k-002");
    }

    #[test]
    fn add_rejects_invalid_category() {
        let temp = TempDir::new().unwrap();
        let store = KnowledgeStore::new(temp.path());

        let result = store.add(NewEntry {
            title: "Bad",
            category: "nonsense",
            summary: "s",
            details: "d",
            ..Default::default()
        });
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("invalid category"));
    }

    #[test]
    fn add_writes_optional_sections() {
        let temp = TempDir::new().unwrap();
        let store = KnowledgeStore::new(temp.path());

        let (_, path) = store
            .add(NewEntry {
                title: "With code",
                category: "tooling",
                summary: "s",
                details: "d",
                code_example: Some("cargo tree -d"),
                related: vec!["k-001"],
                ..Default::default()
            })
            .unwrap();

        let file = KnowledgeFile::load(&path).unwrap();
        assert!(file.body.contains("## Code Example"));
        assert!(file.body.contains("cargo tree -d"));
        assert!(file.body.contains("## Related Knowledge"));
        assert!(file.body.contains("- k-001"));
    }

    #[test]
    fn scan_returns_entries_sorted_and_skips_non_entries() {
        let temp = TempDir::new().unwrap();
        let store = KnowledgeStore::new(temp.path());

        store
            .add(NewEntry {
                title: "B entry",
                category: "workflow",
                summary: "s",
                details: "d",
                ..Default::default()
            })
            .unwrap();
        store
            .add(NewEntry {
                title: "A entry",
                category: "workflow",
                summary: "s",
                details: "d",
                ..Default::default()
            })
            .unwrap();
        std::fs::write(temp.path().join("README.md"), "not an entry").unwrap();

        let entries = store.scan().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].1.frontmatter.id, "k-001");
        assert_eq!(entries[1].1.frontmatter.id, "k-002");
    }

    #[test]
    fn scan_of_missing_directory_is_empty() {
        let store = KnowledgeStore::new("/nonexistent/knowledge");
        assert!(store.scan().unwrap().is_empty());
    }

    #[test]
    fn find_locates_entry_by_id() {
        let temp = TempDir::new().unwrap();
        let store = KnowledgeStore::new(temp.path());

        store
            .add(NewEntry {
                title: "Findable",
                category: "pattern",
                summary: "s",
                details: "d",
                ..Default::default()
            })
            .unwrap();

        let found = store.find("k-001").unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().1.frontmatter.title, "Findable");

        assert!(store.find("k-999").unwrap().is_none());
    }

    #[test]
    fn deprecation_flag_follows_confidence() {
        let mut file = KnowledgeFile::parse(ENTRY).unwrap();
        assert!(!file.is_deprecated());
        file.frontmatter.confidence = 0.4;
        assert!(file.is_deprecated());
    }
}
