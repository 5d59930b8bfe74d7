//! Implementation of the `axiom knowledge` commands.
//!
//! Every mutation rebuilds the index afterwards, so `knowledge_base.md`
//! always reflects the last writer.

use crate::audit::{AuditAction, AuditEvent, append_event_soft};
use crate::cli::{
    KnowledgeAction, KnowledgeAddArgs, KnowledgeCommand, KnowledgeDecayArgs, KnowledgeIdArgs,
};
use crate::context::WorkspaceContext;
use crate::error::{AxiomError, Result};
use crate::knowledge::confidence::ConfidenceEngine;
use crate::knowledge::{KnowledgeStore, NewEntry, index};
use serde_json::json;

/// Execute an `axiom knowledge` subcommand.
pub fn cmd_knowledge(cmd: KnowledgeCommand) -> Result<()> {
    let ctx = WorkspaceContext::resolve()?;
    match cmd.action {
        KnowledgeAction::Add(args) => knowledge_add(&ctx, &args),
        KnowledgeAction::List => knowledge_list(&ctx),
        KnowledgeAction::Verify(args) => adjust(&ctx, &args, "verified"),
        KnowledgeAction::Reference(args) => adjust(&ctx, &args, "referenced"),
        KnowledgeAction::Misleading(args) => adjust(&ctx, &args, "misleading"),
        KnowledgeAction::Decay(args) => knowledge_decay(&ctx, &args),
        KnowledgeAction::Deprecated => knowledge_deprecated(&ctx),
    }
}

fn store(ctx: &WorkspaceContext) -> KnowledgeStore {
    KnowledgeStore::new(ctx.knowledge_dir())
}

fn rebuild(ctx: &WorkspaceContext, store: &KnowledgeStore) -> Result<()> {
    index::rebuild_index(store, &ctx.knowledge_index_path())?;
    append_event_soft(ctx, &AuditEvent::new(AuditAction::IndexRebuild));
    Ok(())
}

pub fn knowledge_add(ctx: &WorkspaceContext, args: &KnowledgeAddArgs) -> Result<()> {
    let store = store(ctx);
    let (id, path) = store.add(NewEntry {
        title: &args.title,
        category: &args.category,
        tags: args.tags.iter().map(String::as_str).collect(),
        summary: &args.summary,
        details: &args.details,
        ..Default::default()
    })?;

    rebuild(ctx, &store)?;
    append_event_soft(
        ctx,
        &AuditEvent::new(AuditAction::KnowledgeAdd).with_details(json!({
            "id": id,
            "category": args.category,
        })),
    );

    println!("Created {} at {}", id, path.display());
    Ok(())
}

pub fn knowledge_list(ctx: &WorkspaceContext) -> Result<()> {
    let store = store(ctx);
    let content = index::rebuild_index(&store, &ctx.knowledge_index_path())?;
    println!("{}", content);
    Ok(())
}

fn adjust(ctx: &WorkspaceContext, args: &KnowledgeIdArgs, event: &str) -> Result<()> {
    let store = store(ctx);
    let engine = ConfidenceEngine::new(store.clone());

    let new_confidence = match event {
        "verified" => engine.on_verified(&args.id)?,
        "referenced" => engine.on_referenced(&args.id)?,
        _ => engine.on_misleading(&args.id)?,
    };

    let Some(new_confidence) = new_confidence else {
        return Err(AxiomError::UserError(format!(
            "knowledge entry '{}' not found",
            args.id
        )));
    };

    rebuild(ctx, &store)?;
    append_event_soft(
        ctx,
        &AuditEvent::new(AuditAction::ConfidenceAdjust).with_details(json!({
            "id": args.id,
            "event": event,
            "confidence": new_confidence,
        })),
    );

    println!("{} {}: confidence -> {:.2}", args.id, event, new_confidence);
    Ok(())
}

pub fn knowledge_decay(ctx: &WorkspaceContext, args: &KnowledgeDecayArgs) -> Result<()> {
    let store = store(ctx);
    let engine = ConfidenceEngine::new(store.clone());

    let decayed = engine.decay_unused(args.days)?;
    if decayed.is_empty() {
        println!("No entries unused for {} days.", args.days);
        return Ok(());
    }

    for record in &decayed {
        let flag = if record.deprecated { " [deprecated]" } else { "" };
        println!(
            "{}: {:.2} -> {:.2}{}",
            record.id, record.old_confidence, record.new_confidence, flag
        );
    }

    rebuild(ctx, &store)?;
    append_event_soft(
        ctx,
        &AuditEvent::new(AuditAction::ConfidenceAdjust).with_details(json!({
            "event": "decay",
            "days": args.days,
            "decayed": decayed.len(),
        })),
    );

    Ok(())
}

pub fn knowledge_deprecated(ctx: &WorkspaceContext) -> Result<()> {
    let engine = ConfidenceEngine::new(store(ctx));
    let deprecated = engine.deprecated_entries()?;

    if deprecated.is_empty() {
        println!("No deprecated entries.");
        return Ok(());
    }

    println!("Deprecated entries (confidence < 0.5):");
    for (id, title, confidence) in deprecated {
        println!("  {} {:.2} {}", id, confidence, title);
    }
    Ok(())
}
