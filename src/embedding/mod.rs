//! Embedding generation for semantic search and retrieval.

mod hashing;
mod openai;

pub use hashing::HashingEmbedder;
pub use openai::OpenAIEmbedder;

use crate::error::{DocqaError, Result};
use async_trait::async_trait;
use tracing::warn;

/// Stand-in for empty inputs so near-empty chunks still get a vector.
pub(crate) const EMPTY_PLACEHOLDER: &str = " ";

/// Trait for embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Identifies the vector space: vectors from embedders with different
    /// ids must never be compared.
    fn model_id(&self) -> String;
}

/// Replace empty or whitespace-only inputs with a placeholder.
pub(crate) fn coerce_inputs(texts: &[String]) -> Vec<String> {
    texts
        .iter()
        .map(|t| {
            if t.trim().is_empty() {
                EMPTY_PLACEHOLDER.to_string()
            } else {
                t.clone()
            }
        })
        .collect()
}

/// Embed a batch, retrying once on failure.
///
/// Also checks the embedder honoured the one-vector-per-input contract.
pub async fn embed_batch_with_retry(
    embedder: &dyn Embedder,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let embeddings = match embedder.embed_batch(texts).await {
        Ok(embeddings) => embeddings,
        Err(e) => {
            warn!("Embedding batch of {} failed, retrying once: {}", texts.len(), e);
            embedder.embed_batch(texts).await?
        }
    };

    if embeddings.len() != texts.len() {
        return Err(DocqaError::Encoding(format!(
            "Expected {} embeddings, got {}",
            texts.len(),
            embeddings.len()
        )));
    }

    Ok(embeddings)
}

/// Embed a single text, retrying once on failure.
pub async fn embed_with_retry(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    match embedder.embed(text).await {
        Ok(embedding) => Ok(embedding),
        Err(e) => {
            warn!("Embedding failed, retrying once: {}", e);
            embedder.embed(text).await
        }
    }
}

/// Scale a vector to unit length. Zero vectors are left unchanged.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}
