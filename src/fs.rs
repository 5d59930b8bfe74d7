//! Atomic filesystem operations for axiom.
//!
//! Every state file axiom owns (PRD updates, knowledge entries, index,
//! metrics) is written with the temp-file-then-rename pattern so a crash
//! mid-write never leaves a half-written file behind. The temporary file is
//! created in the same directory as the target so the rename stays on one
//! filesystem.

use crate::error::{AxiomError, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Atomically write a string to a file.
///
/// Creates missing parent directories, writes the content to a sibling
/// `.{name}.tmp` file, fsyncs it, and renames it over the target.
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            AxiomError::UserError(format!(
                "failed to create directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let temp_path = temp_path_for(path)?;

    let mut file = File::create(&temp_path).map_err(|e| {
        AxiomError::UserError(format!(
            "failed to create temp file '{}': {}",
            temp_path.display(),
            e
        ))
    })?;
    file.write_all(content.as_bytes()).map_err(|e| {
        AxiomError::UserError(format!(
            "failed to write temp file '{}': {}",
            temp_path.display(),
            e
        ))
    })?;
    file.sync_all().map_err(|e| {
        AxiomError::UserError(format!(
            "failed to sync temp file '{}': {}",
            temp_path.display(),
            e
        ))
    })?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|e| {
        // Leave no temp file behind on failure.
        let _ = fs::remove_file(&temp_path);
        AxiomError::UserError(format!(
            "failed to replace '{}' atomically: {}",
            path.display(),
            e
        ))
    })?;

    Ok(())
}

/// Read a file to a string with a user-actionable error message.
pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    fs::read_to_string(path).map_err(|e| {
        AxiomError::UserError(format!("failed to read '{}': {}", path.display(), e))
    })
}

/// Sibling temp path for an atomic write (`.{filename}.tmp`).
fn temp_path_for(target: &Path) -> Result<PathBuf> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let name = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AxiomError::UserError(format!("invalid path '{}'", target.display())))?;
    Ok(parent.join(format!(".{}.tmp", name)))
}
