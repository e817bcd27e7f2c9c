//! Similarity retrieval with threshold and dedup policy.

use super::Source;
use crate::error::Result;
use crate::vector_store::{MetadataFilter, VectorStore};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Finds the stored chunks most relevant to a query vector.
#[derive(Clone)]
pub struct Retriever {
    vector_store: Arc<dyn VectorStore>,
}

impl Retriever {
    pub fn new(vector_store: Arc<dyn VectorStore>) -> Self {
        Self { vector_store }
    }

    /// Return up to `top_k` sources in descending score order.
    ///
    /// Sources scoring below `score_threshold` are dropped. An empty store is
    /// not an error.
    pub async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<Source>> {
        self.search_filtered(query_vector, top_k, score_threshold, None)
            .await
    }

    /// Like [`Retriever::search`], restricted to chunks matching `filter`.
    #[instrument(skip(self, query_vector, filter))]
    pub async fn search_filtered(
        &self,
        query_vector: &[f32],
        top_k: usize,
        score_threshold: Option<f32>,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Source>> {
        let results = self.vector_store.query(query_vector, top_k, filter).await?;
        let found = results.len();

        let mut seen = HashSet::new();
        let sources: Vec<Source> = results
            .into_iter()
            .filter(|r| score_threshold.map_or(true, |t| r.score >= t))
            .filter(|r| seen.insert(r.record.id.clone()))
            .map(Source::from)
            .collect();

        debug!("Retrieved {} of {} candidates", sources.len(), found);
        Ok(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DocqaError;
    use crate::vector_store::test_support::record;
    use crate::vector_store::MemoryVectorStore;

    async fn store() -> Arc<dyn VectorStore> {
        let store = MemoryVectorStore::new();
        store
            .upsert(&[
                record("a.txt", 0, "exact", vec![1.0, 0.0]),
                record("a.txt", 1, "close", vec![0.9, 0.1]),
                record("b.txt", 0, "orthogonal", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_identical_vector_ranks_first() {
        let retriever = Retriever::new(store().await);
        let sources = retriever.search(&[1.0, 0.0], 3, None).await.unwrap();

        assert_eq!(sources.len(), 3);
        assert_eq!(sources[0].text, "exact");
        assert!(sources.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_threshold_filters_without_reordering() {
        let retriever = Retriever::new(store().await);
        let sources = retriever.search(&[1.0, 0.0], 3, Some(0.5)).await.unwrap();

        let texts: Vec<&str> = sources.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["exact", "close"]);
        assert!(sources.iter().all(|s| s.score >= 0.5));
    }

    #[tokio::test]
    async fn test_empty_store_returns_nothing() {
        let retriever = Retriever::new(Arc::new(MemoryVectorStore::new()));
        assert!(retriever.search(&[1.0, 0.0], 4, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_filter_and_invalid_top_k() {
        let retriever = Retriever::new(store().await);
        let filter = MetadataFilter::new().eq("source", "b.txt");
        let sources = retriever
            .search_filtered(&[1.0, 0.0], 3, None, Some(&filter))
            .await
            .unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].source_name(), Some("b.txt"));

        assert!(matches!(
            retriever.search(&[1.0, 0.0], 0, None).await,
            Err(DocqaError::InvalidArgument(_))
        ));
    }
}
