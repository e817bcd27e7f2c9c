//! Context building for RAG responses.

use super::Source;
use tracing::debug;

/// Packs ranked sources into a character budget.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    budget_chars: usize,
}

impl ContextBuilder {
    /// Create a new context builder with a budget in characters of source text.
    pub fn new(budget_chars: usize) -> Self {
        Self {
            budget_chars: budget_chars.max(1),
        }
    }

    pub fn budget_chars(&self) -> usize {
        self.budget_chars
    }

    /// Keep the longest prefix of `sources` that fits the budget.
    ///
    /// Sources must be in rank order; lower-ranked ones are dropped first. The
    /// top source is always kept, cut to the budget if it alone exceeds it.
    pub fn build(&self, sources: Vec<Source>) -> Vec<Source> {
        let total = sources.len();
        let mut used = 0;
        let mut packed = Vec::with_capacity(total);

        for mut source in sources {
            let len = source.text.chars().count();

            if packed.is_empty() && len > self.budget_chars {
                source.text = source.text.chars().take(self.budget_chars).collect();
                packed.push(source);
                break;
            }
            if used + len > self.budget_chars {
                break;
            }

            used += len;
            packed.push(source);
        }

        if packed.len() < total {
            debug!(
                "Context budget of {} chars kept {} of {} sources",
                self.budget_chars,
                packed.len(),
                total
            );
        }
        packed
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(4000)
    }
}

/// Format sources for the prompt, labelled with their origin.
pub fn format_context_for_prompt(sources: &[Source]) -> String {
    sources
        .iter()
        .enumerate()
        .map(|(i, source)| {
            let mut label = format!("[Source {}", i + 1);
            if let Some(name) = source.source_name() {
                label.push_str(&format!(" - {}", name));
            }
            if let Some(page) = source.page() {
                label.push_str(&format!(", Page {}", page));
            }
            format!("{}]\n{}", label, source.text)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
