//! Deterministic offline embedder based on feature hashing.
//!
//! No model download and no network: each lower-cased word token is hashed
//! into one of `dimensions` buckets with a hash-derived sign, and the result is
//! L2-normalized. Texts sharing vocabulary land close together, which is
//! enough for offline use and tests.

use super::{l2_normalize, Embedder};
use crate::error::Result;
use async_trait::async_trait;

/// Default vector size, matching common small sentence-embedding models.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Feature-hashing embedder.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    /// Create an embedder with [`DEFAULT_DIMENSIONS`].
    pub fn new() -> Self {
        Self::with_dimensions(DEFAULT_DIMENSIONS)
    }

    /// Create an embedder producing `dimensions`-long vectors.
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Compute the embedding synchronously.
    pub fn encode(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for token in tokenize(text) {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        l2_normalize(&mut vector);
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.encode(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.encode(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> String {
        format!("hashing@{}", self.dimensions)
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

/// 64-bit FNV-1a, stable across platforms and compiler versions.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;

    bytes.iter().fold(OFFSET, |hash, b| (hash ^ *b as u64).wrapping_mul(PRIME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::cosine_similarity;

    #[tokio::test]
    async fn test_deterministic_and_normalized() {
        let embedder = HashingEmbedder::new();
        let a = embedder.embed("The sky is blue").await.unwrap();
        let b = embedder.embed("the SKY is blue!").await.unwrap();

        assert_eq!(a.len(), DEFAULT_DIMENSIONS);
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_shared_vocabulary_scores_higher() {
        let embedder = HashingEmbedder::new();
        let query = embedder.embed("What color is the sky?").await.unwrap();
        let sky = embedder.embed("The sky is blue.").await.unwrap();
        let grass = embedder.embed("Grass is green.").await.unwrap();

        assert!(cosine_similarity(&query, &sky) > cosine_similarity(&query, &grass));
    }

    #[tokio::test]
    async fn test_empty_text_yields_zero_vector() {
        let embedder = HashingEmbedder::with_dimensions(8);
        let batch = embedder.embed_batch(&["".to_string()]).await.unwrap();
        assert_eq!(batch, vec![vec![0.0; 8]]);
    }
}
