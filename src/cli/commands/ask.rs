//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::rag::Query;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(
    question: &str,
    top_k: Option<usize>,
    min_score: Option<f32>,
    settings: Settings,
) -> Result<()> {
    // Pre-flight checks
    match preflight::check(Operation::Ask, &settings) {
        Ok(warnings) => warnings.iter().for_each(|w| Output::warning(w)),
        Err(e) => {
            Output::error(&e.to_string());
            return Err(e.into());
        }
    }

    let orchestrator = Orchestrator::new(settings)?;

    let mut query = Query::new(question);
    if let Some(k) = top_k {
        query = query.with_top_k(k);
    }
    if let Some(score) = min_score {
        query = query.with_score_threshold(score);
    }

    let spinner = Output::spinner("Searching knowledge base...");
    let result = orchestrator.answer(&query).await;
    spinner.finish_and_clear();

    match result {
        Ok(answer) => {
            println!("\n{}\n", answer.answer);

            if answer.grounded {
                Output::header("Sources");
                for (i, source) in answer.sources.iter().enumerate() {
                    Output::source(i + 1, source, 100);
                }
            } else {
                Output::warning("No indexed passage matched this question.");
            }
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Failed to generate answer: {}", e));
            Err(e.into())
        }
    }
}
