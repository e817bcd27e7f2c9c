//! Ingest command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::loader;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use std::path::Path;

/// Run the ingest command.
pub async fn run_ingest(
    path: &Path,
    chunk_size: Option<usize>,
    overlap: Option<usize>,
    id: Option<String>,
    mut settings: Settings,
) -> Result<()> {
    if let Some(size) = chunk_size {
        settings.chunking.chunk_size = size;
    }
    if let Some(overlap) = overlap {
        settings.chunking.overlap = overlap;
    }

    // Pre-flight checks
    let warnings = match preflight::check_document(path)
        .and_then(|_| preflight::check(Operation::Ingest, &settings))
    {
        Ok(warnings) => warnings,
        Err(e) => {
            Output::error(&e.to_string());
            return Err(e.into());
        }
    };
    for warning in &warnings {
        Output::warning(warning);
    }

    let mut document = loader::load_document(path)?;
    if let Some(id) = id {
        document.id = id;
    }
    if document.text.trim().is_empty() {
        Output::warning(&format!("No text could be extracted from {}", path.display()));
        return Ok(());
    }

    let orchestrator = Orchestrator::new(settings.clone())?;
    orchestrator.initialize().await?;

    let spinner = Output::spinner(&format!(
        "Indexing {} ({} characters)...",
        document.id,
        document.char_count()
    ));
    let result = orchestrator
        .ingest(&document, &settings.chunking.to_config())
        .await;
    spinner.finish_and_clear();

    match result {
        Ok(summary) => {
            Output::success(&format!(
                "Indexed {} chunks from '{}'",
                summary.chunks_written, summary.document_id
            ));
            Ok(())
        }
        Err(e) => {
            Output::error(&e.to_string());
            Err(e.into())
        }
    }
}
