//! docqa CLI entry point.

use anyhow::Result;
use clap::Parser;
use docqa::cli::{commands, Cli, Commands};
use docqa::config::Settings;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.as_ref().map(PathBuf::from);
    let settings = Settings::load_from(config_path.as_ref())?;

    // Initialize logging; -v flags override the configured level
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("docqa={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Ensure the data directory exists
    std::fs::create_dir_all(settings.data_dir())?;

    // Execute command
    match &cli.command {
        Commands::Ingest {
            path,
            chunk_size,
            overlap,
            id,
        } => {
            commands::run_ingest(path, *chunk_size, *overlap, id.clone(), settings).await?;
        }

        Commands::Ask {
            question,
            top_k,
            min_score,
        } => {
            commands::run_ask(question, *top_k, *min_score, settings).await?;
        }

        Commands::Search {
            query,
            top_k,
            min_score,
        } => {
            commands::run_search(query, *top_k, *min_score, settings).await?;
        }

        Commands::Remove { document_id } => {
            commands::run_remove(document_id, settings).await?;
        }

        Commands::Reset { yes } => {
            commands::run_reset(*yes, settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host.clone(), *port, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, config_path, settings)?;
        }
    }

    Ok(())
}
