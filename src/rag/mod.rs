//! RAG (Retrieval-Augmented Generation) for question answering with sources.
//!
//! Retrieval types shared by the [`Retriever`], the [`ContextBuilder`] and the
//! orchestrator.

pub mod context;
mod retriever;

pub use context::{format_context_for_prompt, ContextBuilder};
pub use retriever::Retriever;

use crate::document::Metadata;
use crate::vector_store::{MetadataFilter, ScoredRecord};
use serde::{Deserialize, Serialize};

/// A question to answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub question: String,
    /// Sources to retrieve. `None` uses the configured default.
    #[serde(default)]
    pub top_k: Option<usize>,
    /// Drop sources scoring below this value.
    #[serde(default)]
    pub score_threshold: Option<f32>,
    /// Restrict retrieval to matching chunks.
    #[serde(default)]
    pub filter: Option<MetadataFilter>,
}

impl Query {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }

    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// A retrieved chunk cited in an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    /// Cosine similarity to the question.
    pub score: f32,
}

impl Source {
    /// The `source` metadata entry, usually the file name.
    pub fn source_name(&self) -> Option<&str> {
        self.metadata.get("source").and_then(|v| v.as_str())
    }

    /// The page the chunk came from, if known.
    pub fn page(&self) -> Option<u64> {
        self.metadata.get("page").and_then(|v| v.as_u64())
    }
}

impl From<ScoredRecord> for Source {
    fn from(result: ScoredRecord) -> Self {
        Self {
            id: result.record.id,
            text: result.record.text,
            metadata: result.record.metadata,
            score: result.score,
        }
    }
}

/// A generated answer with the sources placed in its prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<Source>,
    /// False when no retrieved source backed the prompt.
    pub grounded: bool,
}
