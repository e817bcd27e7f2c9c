//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::rag::Query;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    query: &str,
    top_k: Option<usize>,
    min_score: Option<f32>,
    settings: Settings,
) -> Result<()> {
    for warning in preflight::check(Operation::Search, &settings)? {
        Output::warning(&warning);
    }

    let orchestrator = Orchestrator::new(settings)?;

    let mut request = Query::new(query);
    if let Some(k) = top_k {
        request = request.with_top_k(k);
    }
    if let Some(score) = min_score {
        request = request.with_score_threshold(score);
    }

    let spinner = Output::spinner("Searching...");
    let results = orchestrator.search(&request).await;
    spinner.finish_and_clear();

    match results {
        Ok(sources) => {
            if sources.is_empty() {
                Output::warning("No results found matching your query.");
            } else {
                Output::success(&format!("Found {} results", sources.len()));
                for (i, source) in sources.iter().enumerate() {
                    Output::source(i + 1, source, 300);
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
