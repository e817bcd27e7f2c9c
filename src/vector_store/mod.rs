//! Vector store abstraction for docqa.
//!
//! Provides a trait-based interface for different vector database backends.

mod endee;
mod memory;
mod retry;
mod sqlite;

pub use endee::{EndeeConfig, EndeeVectorStore, DEFAULT_COLLECTION, DEFAULT_ENDEE_URL};
pub use memory::MemoryVectorStore;
pub use retry::RetryPolicy;
pub use sqlite::SqliteVectorStore;

use crate::document::Metadata;
use crate::error::{DocqaError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Namespace for deterministic record ids.
const RECORD_NAMESPACE: Uuid = Uuid::from_u128(0x6f1d_2b8e_3c4a_4e0f_9a51_7d2c_8b3e_1f40);

/// Derive the record id for a chunk.
///
/// The same document id and chunk index always produce the same id, so
/// re-ingesting a document overwrites its records instead of duplicating them.
pub fn record_id(document_id: &str, chunk_index: usize) -> String {
    Uuid::new_v5(
        &RECORD_NAMESPACE,
        format!("{}#{}", document_id, chunk_index).as_bytes(),
    )
    .to_string()
}

/// Metadata key naming the embedder that produced a record's vector.
pub const EMBEDDING_MODEL_KEY: &str = "embedding_model";

/// The unit persisted in a vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Unique record id.
    pub id: String,
    /// Document this record was cut from.
    pub document_id: String,
    /// Position of the chunk within its document.
    pub chunk_index: usize,
    /// Chunk text.
    pub text: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// Chunk metadata.
    pub metadata: Metadata,
    /// When this record was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl VectorRecord {
    /// Create a record with its deterministic id.
    pub fn new(
        document_id: &str,
        chunk_index: usize,
        text: String,
        embedding: Vec<f32>,
        metadata: Metadata,
    ) -> Self {
        Self {
            id: record_id(document_id, chunk_index),
            document_id: document_id.to_string(),
            chunk_index,
            text,
            embedding,
            metadata,
            indexed_at: Utc::now(),
        }
    }
}

/// A query hit with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    /// The matched record.
    pub record: VectorRecord,
    /// Cosine similarity (higher is better).
    pub score: f32,
}

/// Conjunction of metadata equality predicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    pub equals: Metadata,
}

impl MetadataFilter {
    /// Create an empty filter (matches everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to equal `value`.
    pub fn eq(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.equals.insert(key.to_string(), value.into());
        self
    }

    /// Whether `metadata` satisfies every predicate.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.equals
            .iter()
            .all(|(key, expected)| metadata.get(key) == Some(expected))
    }

    /// Whether `record` satisfies every predicate.
    ///
    /// `document_id` is also matched against the record's own field.
    pub fn matches_record(&self, record: &VectorRecord) -> bool {
        self.equals.iter().all(|(key, expected)| {
            if key == "document_id" && expected.as_str() == Some(record.document_id.as_str()) {
                return true;
            }
            record.metadata.get(key) == Some(expected)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.equals.is_empty()
    }
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Prepare the backing collection. No-op for local stores.
    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    /// Insert or overwrite records by id. Returns the number written.
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize>;

    /// Return the `top_k` records most similar to `embedding`.
    ///
    /// Ordered by descending score, ties broken by ascending id.
    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredRecord>>;

    /// Delete every record of a document. Returns the number removed.
    async fn delete_document(&self, document_id: &str) -> Result<usize>;

    /// Delete the records of a document whose chunk index is `keep` or
    /// higher, left over from a longer earlier version. Returns the number
    /// removed.
    async fn delete_stale(&self, document_id: &str, keep: usize) -> Result<usize>;

    /// Total number of stored records.
    async fn count(&self) -> Result<usize>;

    /// Remove all records.
    async fn reset(&self) -> Result<()>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

pub(crate) fn validate_top_k(top_k: usize) -> Result<()> {
    if top_k == 0 {
        return Err(DocqaError::InvalidArgument(
            "top_k must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

/// Sort by descending score then ascending id, and keep the first `top_k`.
pub(crate) fn rank(mut results: Vec<ScoredRecord>, top_k: usize) -> Vec<ScoredRecord> {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.record.id.cmp(&b.record.id))
    });
    results.truncate(top_k);
    results
}

/// Score `records` against `embedding` by brute force.
pub(crate) fn scan<'a>(
    records: impl Iterator<Item = &'a VectorRecord>,
    embedding: &[f32],
    top_k: usize,
    filter: Option<&MetadataFilter>,
) -> Vec<ScoredRecord> {
    let scored = records
        .filter(|r| filter.map_or(true, |f| f.matches_record(r)))
        .filter(|r| r.embedding.len() == embedding.len())
        .map(|r| ScoredRecord {
            score: cosine_similarity(embedding, &r.embedding),
            record: r.clone(),
        })
        .collect();

    rank(scored, top_k)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn record(document_id: &str, index: usize, text: &str, embedding: Vec<f32>) -> VectorRecord {
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), document_id.into());
        VectorRecord::new(document_id, index, text.to_string(), embedding, metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::record;
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);

        assert_eq!(cosine_similarity(&a, &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_record_id_is_deterministic() {
        assert_eq!(record_id("doc.txt", 3), record_id("doc.txt", 3));
        assert_ne!(record_id("doc.txt", 3), record_id("doc.txt", 4));
        assert_ne!(record_id("doc.txt", 3), record_id("other.txt", 3));
        assert!(Uuid::parse_str(&record_id("doc.txt", 0)).is_ok());
    }

    #[test]
    fn test_rank_breaks_ties_by_id() {
        let a = record("a", 0, "a", vec![1.0]);
        let b = record("b", 0, "b", vec![1.0]);
        let (low, high) = if a.id < b.id { (a, b) } else { (b, a) };

        let ranked = rank(
            vec![
                ScoredRecord { record: high.clone(), score: 0.5 },
                ScoredRecord { record: low.clone(), score: 0.5 },
            ],
            10,
        );
        assert_eq!(ranked[0].record.id, low.id);
        assert_eq!(ranked[1].record.id, high.id);
    }

    #[test]
    fn test_metadata_filter() {
        let r = record("manual.pdf", 0, "text", vec![1.0]);
        assert!(MetadataFilter::new().matches_record(&r));
        assert!(MetadataFilter::new().eq("source", "manual.pdf").matches_record(&r));
        assert!(MetadataFilter::new().eq("document_id", "manual.pdf").matches_record(&r));
        assert!(!MetadataFilter::new().eq("source", "other.pdf").matches_record(&r));
        assert!(!MetadataFilter::new().eq("page", 2).matches_record(&r));
    }
}
