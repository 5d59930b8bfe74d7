//! Command implementations for axiom.
//!
//! This module routes CLI commands to their handlers. The larger commands
//! (`init`, `run`, `knowledge`) live in their own modules; the small ones are
//! implemented here.

mod init;
mod knowledge;
mod run;

use crate::audit::{AuditAction, AuditEvent, append_event_soft};
use crate::cli::{
    CheckpointArgs, Command, GuardArgs, ProvidersAction, ProvidersCommand, StatusArgs,
};
use crate::config::ProvidersConfig;
use crate::context::WorkspaceContext;
use crate::error::{AxiomError, Result};
use crate::fs::atomic_write;
use crate::git;
use crate::guard;
use serde_json::json;

/// Dispatch a command to its implementation.
pub fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Init => init::cmd_init(),
        Command::Run(args) => run::cmd_run(args),
        Command::Status(args) => cmd_status(args),
        Command::Knowledge(cmd) => knowledge::cmd_knowledge(cmd),
        Command::Checkpoint(args) => cmd_checkpoint(args),
        Command::Providers(cmd) => dispatch_providers(cmd),
        Command::Guard(args) => cmd_guard(args),
    }
}

fn dispatch_providers(cmd: ProvidersCommand) -> Result<()> {
    match cmd.action {
        ProvidersAction::List => cmd_providers_list(),
    }
}

fn cmd_status(args: StatusArgs) -> Result<()> {
    let ctx = WorkspaceContext::resolve()?;
    let dashboard = guard::render_dashboard(&ctx, args.prd.as_deref())?;

    if let Some(path) = &args.write {
        atomic_write(path, &dashboard)?;
        println!("Dashboard written to {}", path.display());
    } else {
        println!("{}", dashboard);
    }

    Ok(())
}

fn cmd_checkpoint(args: CheckpointArgs) -> Result<()> {
    let ctx = WorkspaceContext::resolve()?;

    let outcome = git::create_checkpoint(&ctx.repo_root, args.tag.as_deref());
    if !outcome.success {
        return Err(AxiomError::GitError(outcome.message));
    }

    append_event_soft(
        &ctx,
        &AuditEvent::new(AuditAction::Checkpoint).with_details(json!({
            "message": outcome.message,
        })),
    );
    println!("Checkpoint created. {}", outcome.message);
    Ok(())
}

fn cmd_providers_list() -> Result<()> {
    let ctx = WorkspaceContext::resolve()?;
    let config = ProvidersConfig::load_or_builtin(ctx.providers_path())?;

    println!("Configured providers ({}):", config.providers.len());
    println!();

    for (id, profile) in &config.providers {
        let marker = if profile.default { " (default)" } else { "" };
        println!("  {}{}", id, marker);
        if !profile.name.is_empty() {
            println!("    Name:     {}", profile.name);
        }
        println!("    Command:  {}", profile.command);
        println!(
            "    Timeout:  {}s",
            profile.effective_timeout(&config.defaults)
        );
        if let Some(window) = profile.context_window {
            println!("    Context:  {} tokens", window);
        }
        println!();
    }

    Ok(())
}

fn cmd_guard(args: GuardArgs) -> Result<()> {
    let ctx = WorkspaceContext::resolve()?;
    let heartbeat_path = ctx.heartbeat_path();

    if args.once {
        let status = guard::check_heartbeat(&heartbeat_path, args.timeout_minutes);
        println!("{}", status.message);
        return if status.stale {
            Err(AxiomError::StaleSession(status.message))
        } else {
            Ok(())
        };
    }

    println!(
        "Watching {} (threshold {} min, interval {} min). Ctrl-C to stop.",
        heartbeat_path.display(),
        args.timeout_minutes,
        args.interval_minutes
    );

    loop {
        let status = guard::check_heartbeat(&heartbeat_path, args.timeout_minutes);
        if status.stale {
            eprintln!("⚠ {}", status.message);
            append_event_soft(
                &ctx,
                &AuditEvent::new(AuditAction::GuardAlert).with_details(json!({
                    "message": status.message,
                    "age_minutes": status.age_minutes,
                })),
            );
        } else {
            println!("{}", status.message);
        }
        std::thread::sleep(std::time::Duration::from_secs(args.interval_minutes * 60));
    }
}
