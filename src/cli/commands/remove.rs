//! Remove command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the remove command.
pub async fn run_remove(document_id: &str, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    let removed = orchestrator.remove_document(document_id).await?;
    if removed == 0 {
        Output::warning(&format!("No chunks found for '{}'", document_id));
    } else {
        Output::success(&format!("Removed {} chunks of '{}'", removed, document_id));
    }

    Ok(())
}
