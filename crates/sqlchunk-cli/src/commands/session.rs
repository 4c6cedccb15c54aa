use super::{file_name, read_text};
use crate::ConfirmArgs;
use anyhow::{Context, Result};
use sqlchunk_application::SessionCoordinator;
use sqlchunk_core::config::AppConfig;
use sqlchunk_core::session::{ConversionParameters, SessionStore, SourceDocument};
use sqlchunk_infrastructure::TomlSessionStore;
use std::path::PathBuf;

pub async fn confirm(coordinator: &SessionCoordinator, args: ConfirmArgs) -> Result<()> {
    let current = coordinator.snapshot().await;
    if current.params_locked {
        coordinator.edit_parameters().await?;
    }

    let params = ConversionParameters {
        source_format: args.source_format,
        destination_format: args.destination_format,
        target_schema: args.target_schema,
        destination_sql_language: args.dialect,
        merge_n: args.merge_n.unwrap_or(current.params.merge_n),
        concurrency: args.concurrency.unwrap_or(current.params.concurrency),
    };
    coordinator.set_parameters(params).await?;

    let source = SourceDocument::new(file_name(&args.source), read_text(&args.source)?);
    coordinator.load_source(source).await?;
    if let Some(path) = &args.template {
        let template = SourceDocument::new(file_name(path), read_text(path)?);
        coordinator.load_template(Some(template)).await?;
    }
    if let Some(path) = &args.user_prompt_file {
        coordinator.set_user_prompt(read_text(path)?).await?;
    }

    let chunks = coordinator
        .confirm_parameters()
        .await
        .context("Failed to confirm parameters")?;
    println!("Parameters locked: {chunks} chunk(s) ready for prompt generation.");
    Ok(())
}

pub async fn prompt(
    coordinator: &SessionCoordinator,
    text: Option<String>,
    file: Option<PathBuf>,
    auto_convert: bool,
) -> Result<()> {
    let user_prompt = match (text, file) {
        (Some(text), _) => Some(text),
        (None, Some(path)) => Some(read_text(&path)?),
        (None, None) => None,
    };
    if auto_convert {
        coordinator.set_auto_dispatch(true).await?;
    }

    let generated = coordinator.generate_prompt(user_prompt).await?;
    if generated.prompt_text.trim().is_empty() {
        println!(
            "The service returned an empty prompt ({} chunk(s)); run `sqlchunk prompt` again.",
            generated.chunks
        );
        return Ok(());
    }
    println!("Shared prompt ready ({} chunk(s)):", generated.chunks);
    println!("{}", generated.prompt_text);
    if let Some(run) = generated.run {
        super::run::print_summary(&run);
    }
    Ok(())
}

pub async fn reset(config: &AppConfig) -> Result<()> {
    let store = TomlSessionStore::default_location(config.storage.snapshot_path.clone())?;
    store.clear().await?;
    println!("Session snapshot removed: {}", store.path().display());
    Ok(())
}
