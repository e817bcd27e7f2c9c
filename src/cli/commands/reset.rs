//! Reset command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use std::io::{self, BufRead, Write};

/// Run the reset command.
pub async fn run_reset(yes: bool, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    let count = orchestrator.count().await?;

    if !yes && !confirm(&format!("Delete all {} indexed chunks?", count))? {
        Output::info("Aborted.");
        return Ok(());
    }

    orchestrator.reset().await?;
    Output::success(&format!("Removed {} chunks", count));

    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
