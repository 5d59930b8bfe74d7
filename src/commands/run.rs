//! Implementation of the `axiom run` command.
//!
//! Resolves the workspace, selects the provider, and hands the PRD to the
//! dispatcher. The command fails (exit 1) when any task finished failed or
//! blocked; skipped tasks alone do not fail the run.

use crate::cli::RunArgs;
use crate::config::ProvidersConfig;
use crate::context::WorkspaceContext;
use crate::dispatch::{DispatchOptions, Dispatcher};
use crate::error::{AxiomError, Result};
use crate::worker::WorkerConfig;

/// Execute the `axiom run` command.
pub fn cmd_run(args: RunArgs) -> Result<()> {
    let ctx = match &args.repo {
        Some(repo) => WorkspaceContext::resolve_from(repo)?,
        None => WorkspaceContext::resolve()?,
    };

    let providers = ProvidersConfig::load_or_builtin(ctx.providers_path())?;
    let (provider_id, profile) = providers.select(args.provider.as_deref())?;

    println!(
        "Dispatching {} via provider '{}'{}",
        args.prd.display(),
        provider_id,
        if args.dry_run { " (dry run)" } else { "" }
    );

    let worker_config = WorkerConfig {
        command_template: profile.command.clone(),
        default_timeout: profile.effective_timeout(&providers.defaults),
        working_dir: Some(ctx.repo_root.clone()),
        env: profile.environment.clone(),
    };

    let mut dispatcher = Dispatcher::new(
        &args.prd,
        &ctx.repo_root,
        worker_config,
        providers.defaults.max_restarts,
        Some(ctx.clone()),
        DispatchOptions {
            dry_run: args.dry_run,
        },
    );

    let report = dispatcher.run()?;

    if args.verbose {
        for result in &report.results {
            if !result.output.is_empty() {
                println!("\n--- {} output ---\n{}", result.task_id, result.output);
            }
        }
    }

    println!("{}", report.summary());

    if report.all_succeeded() {
        Ok(())
    } else {
        Err(AxiomError::DispatchIncomplete {
            failed: report.failed,
            blocked: report.blocked,
        })
    }
}
