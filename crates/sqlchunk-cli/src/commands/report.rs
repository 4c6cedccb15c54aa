use anyhow::{Context, Result};
use sqlchunk_application::SessionCoordinator;
use sqlchunk_core::session::SessionPhase;
use std::fs;
use std::path::Path;

pub async fn status(coordinator: &SessionCoordinator) {
    let session = coordinator.snapshot().await;
    let counts = session.registry.counts();
    let phase = match session.phase() {
        SessionPhase::Unlocked => "unlocked",
        SessionPhase::PromptPending => "locked, prompt pending",
        SessionPhase::PromptReady => "locked, prompt ready",
    };

    println!("Session:  {}", session.id);
    println!("State:    {phase}");
    println!(
        "Params:   {} -> {} (schema: {}, dialect: {}, merge_n: {}, concurrency: {})",
        session.params.source_format,
        session.params.destination_format,
        session.params.target_schema,
        session.params.destination_sql_language,
        session.params.merge_n,
        session.params.concurrency
    );
    println!("Source:   {}", session.source.name);
    println!(
        "Chunks:   {} total, {} waiting, {} running, {} succeeded, {} failed",
        counts.total(),
        counts.waiting,
        counts.running,
        counts.succeeded,
        counts.failed
    );

    for chunk in session.chunks() {
        let marker = if chunk.prompt_override.trim().is_empty() {
            ""
        } else {
            " [override]"
        };
        println!(
            "  {:<40} {:<10} {}{}",
            chunk.id,
            chunk.status.to_string(),
            chunk.name,
            marker
        );
        if !chunk.error.is_empty() {
            println!("      error: {}", chunk.error.lines().next().unwrap_or_default());
        }
    }
}

pub async fn export(coordinator: &SessionCoordinator, out: &Path) -> Result<()> {
    let file = coordinator.export().await?;
    fs::create_dir_all(out).with_context(|| format!("Failed to create {}", out.display()))?;
    let path = out.join(&file.file_name);
    fs::write(&path, &file.content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Exported {}", path.display());
    Ok(())
}
