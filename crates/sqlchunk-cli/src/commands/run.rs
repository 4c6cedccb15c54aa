use super::read_text;
use anyhow::Result;
use sqlchunk_application::{RunSummary, SessionCoordinator};
use std::path::PathBuf;

const NOT_READY: &str = "Nothing to do: generate the shared prompt first.";

pub fn print_summary(summary: &RunSummary) {
    println!(
        "Dispatched {}: {} succeeded, {} failed.",
        summary.dispatched, summary.succeeded, summary.failed
    );
}

fn report(summary: Option<RunSummary>) {
    match summary {
        Some(summary) => print_summary(&summary),
        None => println!("{NOT_READY}"),
    }
}

pub async fn convert(coordinator: &SessionCoordinator) -> Result<()> {
    report(coordinator.convert_all().await?);
    Ok(())
}

pub async fn redo_failed(coordinator: &SessionCoordinator) -> Result<()> {
    report(coordinator.redo_failed().await?);
    Ok(())
}

pub async fn redo(
    coordinator: &SessionCoordinator,
    chunk_id: &str,
    prompt_file: Option<PathBuf>,
) -> Result<()> {
    let prompt_override = prompt_file.map(|path| read_text(&path)).transpose()?;
    report(coordinator.redo_one(chunk_id, prompt_override).await?);
    Ok(())
}
