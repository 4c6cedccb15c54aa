use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sqlchunk_application::SessionCoordinator;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "sqlchunk")]
#[command(about = "SQLCHUNK - chunked, resumable SQL dialect conversion", long_about = None)]
struct Cli {
    /// Config file (defaults to <config dir>/sqlchunk/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Session(SessionCommand),
    /// Delete the persisted session
    Reset,
}

/// Commands that run against the restored session.
#[derive(Subcommand)]
enum SessionCommand {
    /// Load documents and parameters, then lock them and split the source
    Confirm(ConfirmArgs),
    /// Generate the shared prompt
    Prompt {
        /// User prompt text
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,
        /// Read the user prompt from a file
        #[arg(long)]
        file: Option<PathBuf>,
        /// Convert every chunk once the prompt is ready
        #[arg(long)]
        auto_convert: bool,
    },
    /// Convert every chunk that has not succeeded yet
    Convert,
    /// Convert the failed chunks again
    RedoFailed,
    /// Convert one chunk again
    Redo {
        chunk_id: String,
        /// Per-chunk prompt replacing the shared one
        #[arg(long)]
        prompt_file: Option<PathBuf>,
    },
    /// Show the session state and every chunk
    Status,
    /// Write the converted SQL once every chunk succeeded
    Export {
        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[derive(Args)]
pub struct ConfirmArgs {
    /// Source SQL file
    #[arg(long)]
    source: PathBuf,
    /// Reference template file used for prompt generation
    #[arg(long)]
    template: Option<PathBuf>,
    #[arg(long)]
    source_format: String,
    #[arg(long)]
    destination_format: String,
    #[arg(long, default_value = "")]
    target_schema: String,
    /// Destination SQL dialect
    #[arg(long, default_value = "")]
    dialect: String,
    /// Number of statements merged into one chunk
    #[arg(long)]
    merge_n: Option<usize>,
    /// Maximum concurrent conversion calls
    #[arg(long)]
    concurrency: Option<usize>,
    /// Read the user prompt from a file
    #[arg(long)]
    user_prompt_file: Option<PathBuf>,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = sqlchunk_infrastructure::load_config(cli.config.as_deref())
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Reset => commands::session::reset(&config).await?,
        Commands::Session(command) => {
            let coordinator = commands::open(&config).await?;
            execute(&coordinator, command).await?;
        }
    }

    Ok(())
}

async fn execute(coordinator: &SessionCoordinator, command: SessionCommand) -> Result<()> {
    match command {
        SessionCommand::Confirm(args) => commands::session::confirm(coordinator, args).await?,
        SessionCommand::Prompt {
            text,
            file,
            auto_convert,
        } => commands::session::prompt(coordinator, text, file, auto_convert).await?,
        SessionCommand::Convert => commands::run::convert(coordinator).await?,
        SessionCommand::RedoFailed => commands::run::redo_failed(coordinator).await?,
        SessionCommand::Redo {
            chunk_id,
            prompt_file,
        } => commands::run::redo(coordinator, &chunk_id, prompt_file).await?,
        SessionCommand::Status => commands::report::status(coordinator).await,
        SessionCommand::Export { out } => commands::report::export(coordinator, &out).await?,
    }
    Ok(())
}
