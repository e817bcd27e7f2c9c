//! Source documents handed to the ingestion pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form metadata attached to documents, chunks and stored records.
///
/// Ordered so serialized records and prompts are deterministic.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A document ready to be chunked and indexed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Caller-chosen identifier, usually the file name.
    pub id: String,
    /// Plain text content.
    pub text: String,
    /// Metadata inherited by every chunk of this document.
    pub metadata: Metadata,
}

impl Document {
    /// Create a document with a `source` metadata entry equal to its id.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        let id = id.into();
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), serde_json::Value::String(id.clone()));
        Self {
            id,
            text: text.into(),
            metadata,
        }
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Number of characters in the document text.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}
