//! Implementation of the `axiom init` command.
//!
//! Scaffolds the `.axiom/` workspace: the state directory tree, a default
//! `providers.yaml`, and the session heartbeat file. Running it again on an
//! initialized workspace reports what already exists and changes nothing.

use crate::audit::{AuditAction, AuditEvent, append_event_soft};
use crate::config::ProvidersConfig;
use crate::context::WorkspaceContext;
use crate::error::Result;
use crate::fs::atomic_write;
use crate::guard;
use serde_json::json;

/// Execute the `axiom init` command.
pub fn cmd_init() -> Result<()> {
    let ctx = WorkspaceContext::resolve()?;
    init_workspace(&ctx)
}

/// Scaffold the workspace for a resolved context.
pub fn init_workspace(ctx: &WorkspaceContext) -> Result<()> {
    let already_initialized = ctx.is_initialized();
    ctx.create_layout()?;

    let mut created = Vec::new();

    let providers_path = ctx.providers_path();
    if !providers_path.exists() {
        atomic_write(&providers_path, &ProvidersConfig::builtin().to_yaml()?)?;
        created.push(providers_path.display().to_string());
    }

    let heartbeat_path = ctx.heartbeat_path();
    if !heartbeat_path.exists() {
        guard::touch_heartbeat(&heartbeat_path)?;
        created.push(heartbeat_path.display().to_string());
    }

    append_event_soft(
        ctx,
        &AuditEvent::new(AuditAction::Init).with_details(json!({
            "state_dir": ctx.state_dir.display().to_string(),
            "already_initialized": already_initialized,
        })),
    );

    if created.is_empty() {
        println!(
            "Workspace already initialized at {}",
            ctx.state_dir.display()
        );
    } else {
        println!("Initialized axiom workspace at {}", ctx.state_dir.display());
        for path in created {
            println!("  created {}", path);
        }
    }

    Ok(())
}
