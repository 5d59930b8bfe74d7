//! Workspace context resolution for axiom.
//!
//! Finds the Git repository root from any working directory and derives the
//! fixed `.axiom/` state layout. All commands go through this module so state
//! paths are consistent regardless of where the CLI is invoked from.
//!
//! Layout:
//!
//! ```text
//! {repo_root}/.axiom/
//!   providers.yaml                     provider configuration
//!   events/events.ndjson               append-only audit log
//!   memory/active_context.md           session heartbeat file
//!   memory/knowledge/k-NNN-slug.md     knowledge entries
//!   memory/evolution/knowledge_base.md regenerated knowledge index
//!   memory/evolution/metrics.md        dispatch metrics report
//! ```

use crate::error::{AxiomError, Result};
use crate::git;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// State directory name relative to the repository root.
pub const STATE_DIR: &str = ".axiom";

/// Resolved paths for the axiom workspace. All paths are absolute.
#[derive(Debug, Clone)]
pub struct WorkspaceContext {
    /// Absolute path to the Git repository root.
    pub repo_root: PathBuf,

    /// Absolute path to the state directory (`{repo_root}/.axiom`).
    pub state_dir: PathBuf,
}

impl WorkspaceContext {
    /// Resolve the workspace context from the current working directory.
    pub fn resolve() -> Result<Self> {
        let cwd = env::current_dir().map_err(|e| {
            AxiomError::UserError(format!("failed to get current working directory: {}", e))
        })?;
        Self::resolve_from(&cwd)
    }

    /// Resolve the workspace context from a specific directory.
    pub fn resolve_from<P: AsRef<Path>>(cwd: P) -> Result<Self> {
        let repo_root = git::get_repo_root(cwd)?;
        let state_dir = repo_root.join(STATE_DIR);
        Ok(Self {
            repo_root,
            state_dir,
        })
    }

    /// Path to the provider configuration file.
    pub fn providers_path(&self) -> PathBuf {
        self.state_dir.join("providers.yaml")
    }

    /// Directory holding the audit log.
    pub fn events_dir(&self) -> PathBuf {
        self.state_dir.join("events")
    }

    /// Path to the append-only audit log.
    pub fn events_file(&self) -> PathBuf {
        self.events_dir().join("events.ndjson")
    }

    /// Memory root (`.axiom/memory`).
    pub fn memory_dir(&self) -> PathBuf {
        self.state_dir.join("memory")
    }

    /// Session heartbeat file watched by the guard.
    pub fn heartbeat_path(&self) -> PathBuf {
        self.memory_dir().join("active_context.md")
    }

    /// Directory holding knowledge entry files.
    pub fn knowledge_dir(&self) -> PathBuf {
        self.memory_dir().join("knowledge")
    }

    /// Evolution directory (index, metrics).
    pub fn evolution_dir(&self) -> PathBuf {
        self.memory_dir().join("evolution")
    }

    /// Regenerated knowledge index file.
    pub fn knowledge_index_path(&self) -> PathBuf {
        self.evolution_dir().join("knowledge_base.md")
    }

    /// Dispatch metrics report file.
    pub fn metrics_path(&self) -> PathBuf {
        self.evolution_dir().join("metrics.md")
    }

    /// Whether `axiom init` has been run here.
    pub fn is_initialized(&self) -> bool {
        self.state_dir.is_dir()
    }

    /// Create the full state directory tree. Idempotent.
    pub fn create_layout(&self) -> Result<()> {
        for dir in [
            self.state_dir.clone(),
            self.events_dir(),
            self.knowledge_dir(),
            self.evolution_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(|e| {
                AxiomError::UserError(format!(
                    "failed to create directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}
