//! Answer generation from a grounding prompt.
//!
//! A [`Generator`] turns a rendered [`Prompt`] into completion text. Hosted
//! providers send the system and user messages; the offline
//! [`ExtractiveGenerator`] works from the question and context passages.

mod extractive;
mod gemini;
mod openai;

pub use extractive::{ExtractiveGenerator, NO_CONTEXT_ANSWER};
pub use gemini::{GeminiGenerator, DEFAULT_GEMINI_MODEL};
pub use openai::{OpenAIGenerator, DEFAULT_MISTRAL_MODEL, DEFAULT_OPENAI_MODEL};

use crate::error::Result;
use async_trait::async_trait;

/// A fully rendered grounding prompt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prompt {
    /// System instruction.
    pub system: String,
    /// User message with the question and context substituted.
    pub user: String,
    /// The question as asked.
    pub question: String,
    /// Context passages in rank order. Empty when retrieval found nothing.
    pub passages: Vec<String>,
}

impl Prompt {
    /// Whether any retrieved context backs this prompt.
    pub fn has_context(&self) -> bool {
        !self.passages.is_empty()
    }
}

/// Trait for answer generation.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce completion text for `prompt`.
    async fn generate(&self, prompt: &Prompt) -> Result<String>;

    /// Provider and model, for logs and diagnostics.
    fn name(&self) -> String;
}
