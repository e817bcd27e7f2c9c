//! Pipeline orchestrator for docqa.
//!
//! Coordinates ingestion (chunk, embed, upsert) and answering (embed, retrieve,
//! pack context, generate). Every collaborator call runs under a deadline;
//! dropping a returned future cancels the work in flight.

use crate::chunking::{chunk_document, ChunkingConfig};
use crate::config::{Prompts, Settings};
use crate::document::Document;
use crate::embedding::{embed_batch_with_retry, embed_with_retry, Embedder};
use crate::error::{DocqaError, Result};
use crate::generation::{Generator, Prompt};
use crate::providers::{create_embedder, create_generator, create_vector_store, ApiKeys};
use crate::rag::{format_context_for_prompt, Answer, ContextBuilder, Query, Retriever, Source};
use crate::vector_store::{VectorRecord, VectorStore, EMBEDDING_MODEL_KEY};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Outcome of ingesting one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub document_id: String,
    pub chunks_written: usize,
}

/// Per-collaborator call deadlines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deadlines {
    pub embedding: Duration,
    pub vector_store: Duration,
    pub generation: Duration,
}

impl Deadlines {
    fn from_settings(settings: &Settings) -> Self {
        Self {
            embedding: settings.timeouts.embedding(),
            vector_store: settings.timeouts.vector_store(),
            generation: settings.timeouts.generation(),
        }
    }
}

/// The main orchestrator for the docqa pipeline.
pub struct Orchestrator {
    settings: Settings,
    prompts: Prompts,
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    generator: Arc<dyn Generator>,
    retriever: Retriever,
    context_builder: ContextBuilder,
    deadlines: Deadlines,
}

impl Orchestrator {
    /// Create an orchestrator from settings, with API keys from the environment.
    pub fn new(settings: Settings) -> Result<Self> {
        // Load prompts (with optional custom directory and variables)
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let keys = ApiKeys::from_env();
        let embedder = create_embedder(&settings, &keys)?;
        let vector_store = create_vector_store(&settings, &keys, embedder.dimensions())?;
        let generator = create_generator(&settings, &keys)?;

        Ok(Self::with_components(
            settings,
            prompts,
            embedder,
            vector_store,
            generator,
        ))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let retriever = Retriever::new(vector_store.clone());
        let context_builder = ContextBuilder::new(settings.rag.context_budget_chars);
        let deadlines = Deadlines::from_settings(&settings);

        Self {
            settings,
            prompts,
            embedder,
            vector_store,
            generator,
            retriever,
            context_builder,
            deadlines,
        }
    }

    /// Override the collaborator deadlines.
    pub fn with_deadlines(mut self, deadlines: Deadlines) -> Self {
        self.deadlines = deadlines;
        self
    }

    /// Get a reference to the vector store.
    pub fn vector_store(&self) -> Arc<dyn VectorStore> {
        self.vector_store.clone()
    }

    /// Get a reference to the embedder.
    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    /// Get a reference to the generator.
    pub fn generator(&self) -> Arc<dyn Generator> {
        self.generator.clone()
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Prepare the vector store (creates the remote collection if missing).
    pub async fn initialize(&self) -> Result<()> {
        self.store_call(self.vector_store.ensure_ready()).await
    }

    /// Chunk, embed and index a document.
    ///
    /// Record ids derive from the document id and chunk index, so ingesting the
    /// same document again overwrites its records; chunks a shorter new version
    /// no longer has are removed once every record is written. Any failure is
    /// reported as [`DocqaError::Ingestion`] carrying the document id.
    #[instrument(skip(self, document, config), fields(document_id = %document.id))]
    pub async fn ingest(&self, document: &Document, config: &ChunkingConfig) -> Result<IngestSummary> {
        match self.index_document(document, config).await {
            Ok(summary) => {
                info!(
                    "Indexed {} chunks from '{}'",
                    summary.chunks_written, summary.document_id
                );
                Ok(summary)
            }
            Err(e) => {
                error!("Ingestion of '{}' failed: {}", document.id, e);
                Err(DocqaError::ingestion(&document.id, e))
            }
        }
    }

    async fn index_document(
        &self,
        document: &Document,
        config: &ChunkingConfig,
    ) -> Result<IngestSummary> {
        let chunks = chunk_document(document, config)?;
        if chunks.is_empty() {
            return Ok(IngestSummary {
                document_id: document.id.clone(),
                chunks_written: 0,
            });
        }

        // Generate embeddings in batch
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self
            .embedding_call(embed_batch_with_retry(self.embedder.as_ref(), &texts))
            .await?;

        let model = self.embedder.model_id();
        let records: Vec<VectorRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                let mut metadata = chunk.metadata;
                metadata.insert(EMBEDDING_MODEL_KEY.to_string(), model.clone().into());
                VectorRecord::new(&document.id, chunk.index, chunk.text, embedding, metadata)
            })
            .collect();

        let chunks_written = self.write_records(&records).await?;

        let stale = self
            .store_call(self.vector_store.delete_stale(&document.id, records.len()))
            .await?;
        if stale > 0 {
            debug!("Removed {} stale chunk(s) of '{}'", stale, document.id);
        }

        Ok(IngestSummary {
            document_id: document.id.clone(),
            chunks_written,
        })
    }

    /// Upsert records, resending only the ids a partial write rejected.
    async fn write_records(&self, records: &[VectorRecord]) -> Result<usize> {
        let policy = self.settings.vector_store.retry_policy();
        let mut retry_batch: Option<Vec<VectorRecord>> = None;
        let mut written = 0;
        let mut attempt = 1;

        loop {
            let batch = retry_batch.as_deref().unwrap_or(records);

            match self.store_call(self.vector_store.upsert(batch)).await {
                Ok(count) => return Ok(written + count),
                Err(DocqaError::PartialWrite {
                    written: accepted,
                    failed_ids,
                }) => {
                    written += accepted;
                    if attempt >= policy.max_attempts {
                        return Err(DocqaError::PartialWrite {
                            written,
                            failed_ids,
                        });
                    }

                    let remaining: Vec<VectorRecord> = batch
                        .iter()
                        .filter(|r| failed_ids.contains(&r.id))
                        .cloned()
                        .collect();
                    if remaining.is_empty() {
                        return Ok(written);
                    }

                    let delay = policy.backoff(attempt);
                    warn!(
                        "{} record(s) rejected, retrying them in {:?}",
                        remaining.len(),
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    retry_batch = Some(remaining);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Retrieve the sources for a query without generating an answer.
    #[instrument(skip(self, query), fields(question = %query.question))]
    pub async fn search(&self, query: &Query) -> Result<Vec<Source>> {
        let question = validate_question(&query.question)?;
        self.retrieve(query, question)
            .await
            .map_err(|e| e.for_question(question))
    }

    async fn retrieve(&self, query: &Query, question: &str) -> Result<Vec<Source>> {
        let query_vector = self
            .embedding_call(embed_with_retry(self.embedder.as_ref(), question))
            .await?;

        let top_k = query.top_k.unwrap_or(self.settings.rag.top_k);
        let threshold = query.score_threshold.or(self.settings.rag.score_threshold);

        // Only vectors from this embedder are comparable with the query.
        let model = self.embedder.model_id();
        let filter = query
            .filter
            .clone()
            .unwrap_or_default()
            .eq(EMBEDDING_MODEL_KEY, model.as_str());

        let sources = self
            .store_call(
                self.retriever
                    .search_filtered(&query_vector, top_k, threshold, Some(&filter)),
            )
            .await?;

        if sources.is_empty() {
            self.check_embedding_model(&query_vector, &model).await?;
        }
        Ok(sources)
    }

    /// Fail if the index holds vectors from an embedder other than `model`.
    async fn check_embedding_model(&self, query_vector: &[f32], model: &str) -> Result<()> {
        let nearest = self
            .store_call(self.vector_store.query(query_vector, 1, None))
            .await?;
        let Some(hit) = nearest.first() else {
            return Ok(());
        };

        let indexed_with = hit
            .record
            .metadata
            .get(EMBEDDING_MODEL_KEY)
            .and_then(|v| v.as_str())
            .unwrap_or("an unknown embedder");
        if indexed_with == model {
            return Ok(());
        }

        Err(DocqaError::InvalidConfiguration(format!(
            "the index was built with {} but the current embedder is {}; \
             re-ingest the documents or reset the store",
            indexed_with, model
        )))
    }

    /// Answer a question from the indexed documents.
    ///
    /// When nothing relevant is found the generator still runs, against an
    /// explicit no-context marker, and the answer is marked ungrounded.
    #[instrument(skip(self, query), fields(question = %query.question))]
    pub async fn answer(&self, query: &Query) -> Result<Answer> {
        let retrieved = self.search(query).await?;
        let question = query.question.trim();
        let sources = self.context_builder.build(retrieved);
        let prompt = self.build_prompt(question, &sources);

        debug!(
            "Generating with {} using {} source(s)",
            self.generator.name(),
            sources.len()
        );

        let text = self
            .generation_call(self.generator.generate(&prompt))
            .await
            .map_err(|e| e.for_question(question))?;
        let text = text.trim();
        if text.is_empty() {
            return Err(
                DocqaError::Generation("Empty response from LLM".to_string()).for_question(question),
            );
        }

        let grounded = !sources.is_empty();
        Ok(Answer {
            answer: text.to_string(),
            sources,
            grounded,
        })
    }

    fn build_prompt(&self, question: &str, sources: &[Source]) -> Prompt {
        let context = if sources.is_empty() {
            self.prompts.rag.no_context.clone()
        } else {
            format_context_for_prompt(sources)
        };

        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("context".to_string(), context);

        Prompt {
            system: self
                .prompts
                .render_with_custom(&self.prompts.rag.system, &vars),
            user: self.prompts.render_with_custom(&self.prompts.rag.user, &vars),
            question: question.to_string(),
            passages: sources.iter().map(|s| s.text.clone()).collect(),
        }
    }

    /// Delete every chunk of a document. Returns the number removed.
    #[instrument(skip(self))]
    pub async fn remove_document(&self, document_id: &str) -> Result<usize> {
        let removed = self
            .store_call(self.vector_store.delete_document(document_id))
            .await?;
        info!("Removed {} chunks of '{}'", removed, document_id);
        Ok(removed)
    }

    /// Remove everything from the vector store.
    pub async fn reset(&self) -> Result<()> {
        self.store_call(self.vector_store.reset()).await
    }

    /// Number of indexed chunks.
    pub async fn count(&self) -> Result<usize> {
        self.store_call(self.vector_store.count()).await
    }

    async fn embedding_call<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        with_deadline(self.deadlines.embedding, "Embedding", DocqaError::Encoding, call).await
    }

    async fn store_call<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        with_deadline(
            self.deadlines.vector_store,
            "Vector store call",
            DocqaError::StoreUnavailable,
            call,
        )
        .await
    }

    async fn generation_call<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        with_deadline(self.deadlines.generation, "Generation", DocqaError::Generation, call)
            .await
            .map_err(|e| match e {
                DocqaError::Generation(_) => e,
                other => DocqaError::Generation(other.to_string()),
            })
    }
}

fn validate_question(question: &str) -> Result<&str> {
    let question = question.trim();
    if question.is_empty() {
        return Err(DocqaError::InvalidArgument(
            "question must not be empty".to_string(),
        ));
    }
    Ok(question)
}

/// Run `call`, failing with `on_timeout` if it outlives `limit`.
async fn with_deadline<T>(
    limit: Duration,
    what: &str,
    on_timeout: fn(String) -> DocqaError,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(format!("{} timed out after {:?}", what, limit))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::generation::ExtractiveGenerator;
    use crate::vector_store::{MemoryVectorStore, MetadataFilter, ScoredRecord};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn orchestrator_with(
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn Generator>,
    ) -> Orchestrator {
        let mut settings = Settings::default();
        settings.vector_store.retry_initial_backoff_ms = 1;
        settings.vector_store.retry_max_backoff_ms = 2;
        Orchestrator::with_components(
            settings,
            Prompts::default(),
            Arc::new(HashingEmbedder::new()),
            store,
            generator,
        )
    }

    fn orchestrator() -> Orchestrator {
        orchestrator_with(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(ExtractiveGenerator::new()),
        )
    }

    fn sky_document() -> Document {
        Document::new("colors.txt", "The sky is blue. Grass is green.")
    }

    /// Records every prompt and answers with a fixed string.
    struct RecordingGenerator {
        reply: String,
        prompts: Mutex<Vec<Prompt>>,
    }

    impl RecordingGenerator {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Generator for RecordingGenerator {
        async fn generate(&self, prompt: &Prompt) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.clone());
            Ok(self.reply.clone())
        }

        fn name(&self) -> String {
            "recording".to_string()
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl Generator for FailingGenerator {
        async fn generate(&self, _prompt: &Prompt) -> Result<String> {
            Err(DocqaError::Config("invalid API key".to_string()))
        }

        fn name(&self) -> String {
            "failing".to_string()
        }
    }

    struct SlowGenerator;

    #[async_trait]
    impl Generator for SlowGenerator {
        async fn generate(&self, _prompt: &Prompt) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".to_string())
        }

        fn name(&self) -> String {
            "slow".to_string()
        }
    }

    /// Rejects the first record of the first upsert, then behaves.
    struct PartiallyFailingStore {
        inner: MemoryVectorStore,
        batches: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl VectorStore for PartiallyFailingStore {
        async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
            let first_call = {
                let mut batches = self.batches.lock().unwrap();
                batches.push(records.len());
                batches.len() == 1
            };

            if first_call && records.len() > 1 {
                let written = self.inner.upsert(&records[1..]).await?;
                return Err(DocqaError::PartialWrite {
                    written,
                    failed_ids: vec![records[0].id.clone()],
                });
            }
            self.inner.upsert(records).await
        }

        async fn query(
            &self,
            embedding: &[f32],
            top_k: usize,
            filter: Option<&MetadataFilter>,
        ) -> Result<Vec<ScoredRecord>> {
            self.inner.query(embedding, top_k, filter).await
        }

        async fn delete_document(&self, document_id: &str) -> Result<usize> {
            self.inner.delete_document(document_id).await
        }

        async fn delete_stale(&self, document_id: &str, keep: usize) -> Result<usize> {
            self.inner.delete_stale(document_id, keep).await
        }

        async fn count(&self) -> Result<usize> {
            self.inner.count().await
        }

        async fn reset(&self) -> Result<()> {
            self.inner.reset().await
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl Embedder for BrokenEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(DocqaError::Encoding("model offline".to_string()))
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(DocqaError::Encoding("model offline".to_string()))
        }

        fn dimensions(&self) -> usize {
            4
        }

        fn model_id(&self) -> String {
            "broken".to_string()
        }
    }

    /// Same vectors as [`HashingEmbedder`], reported under another model.
    struct RenamedEmbedder(HashingEmbedder);

    #[async_trait]
    impl Embedder for RenamedEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.0.embed(text).await
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.0.embed_batch(texts).await
        }

        fn dimensions(&self) -> usize {
            self.0.dimensions()
        }

        fn model_id(&self) -> String {
            format!("renamed@{}", self.0.dimensions())
        }
    }

    #[tokio::test]
    async fn test_ingest_and_answer_end_to_end() {
        let orchestrator = orchestrator();

        let summary = orchestrator
            .ingest(&sky_document(), &ChunkingConfig::new(20, 5))
            .await
            .unwrap();
        assert_eq!(summary.document_id, "colors.txt");
        assert!((2..=3).contains(&summary.chunks_written));
        assert_eq!(orchestrator.count().await.unwrap(), summary.chunks_written);

        let answer = orchestrator
            .answer(&Query::new("What color is the sky?"))
            .await
            .unwrap();

        assert!(answer.grounded);
        assert!(answer.answer.contains("blue"));
        assert!(answer
            .sources
            .iter()
            .any(|s| s.text.contains("The sky is blue.")));
        assert!(answer.sources.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(answer.sources[0].source_name(), Some("colors.txt"));
    }

    #[tokio::test]
    async fn test_answer_on_empty_store_is_ungrounded() {
        let generator = Arc::new(RecordingGenerator::new("I cannot tell from the documents."));
        let orchestrator = orchestrator_with(Arc::new(MemoryVectorStore::new()), generator.clone());

        let answer = orchestrator.answer(&Query::new("Anything?")).await.unwrap();
        assert!(!answer.grounded);
        assert!(answer.sources.is_empty());
        assert_eq!(answer.answer, "I cannot tell from the documents.");

        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].user.contains(&Prompts::default().rag.no_context));
        assert!(!prompts[0].has_context());
    }

    #[tokio::test]
    async fn test_reingest_overwrites() {
        let orchestrator = orchestrator();
        let config = ChunkingConfig::new(20, 5);

        let first = orchestrator.ingest(&sky_document(), &config).await.unwrap();
        let second = orchestrator.ingest(&sky_document(), &config).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(orchestrator.count().await.unwrap(), first.chunks_written);
    }

    #[tokio::test]
    async fn test_reingest_of_shorter_document_drops_old_chunks() {
        let orchestrator = orchestrator();
        let config = ChunkingConfig::new(20, 5);

        let facts = Document::new(
            "facts.txt",
            "The sky is blue. Grass is green. Coal is black. Snow is white.",
        );
        let first = orchestrator.ingest(&facts, &config).await.unwrap();
        assert!(first.chunks_written >= 3);

        let shorter = Document::new("facts.txt", "The sky is red.");
        let second = orchestrator.ingest(&shorter, &config).await.unwrap();
        assert_eq!(second.chunks_written, 1);
        assert_eq!(orchestrator.count().await.unwrap(), 1);

        let answer = orchestrator
            .answer(&Query::new("What color is coal?").with_top_k(10))
            .await
            .unwrap();
        assert!(answer.sources.iter().all(|s| !s.text.contains("Coal")));
        assert!(answer.sources.iter().any(|s| s.text.contains("red")));
    }

    #[tokio::test]
    async fn test_records_are_stamped_with_embedding_model() {
        let store = Arc::new(MemoryVectorStore::new());
        let orchestrator = orchestrator_with(store.clone(), Arc::new(ExtractiveGenerator::new()));
        orchestrator
            .ingest(&sky_document(), &ChunkingConfig::new(20, 5))
            .await
            .unwrap();

        let hits = store.query(&vec![1.0; 384], 10, None).await.unwrap();
        assert!(!hits.is_empty());
        assert!(hits
            .iter()
            .all(|h| h.record.metadata[EMBEDDING_MODEL_KEY] == "hashing@384"));
    }

    #[tokio::test]
    async fn test_query_with_different_embedder_is_rejected() {
        let store = Arc::new(MemoryVectorStore::new());
        orchestrator_with(store.clone(), Arc::new(ExtractiveGenerator::new()))
            .ingest(&sky_document(), &ChunkingConfig::new(20, 5))
            .await
            .unwrap();

        let other = Orchestrator::with_components(
            Settings::default(),
            Prompts::default(),
            Arc::new(RenamedEmbedder(HashingEmbedder::new())),
            store,
            Arc::new(ExtractiveGenerator::new()),
        );
        let err = other
            .answer(&Query::new("What color is the sky?"))
            .await
            .unwrap_err();
        match err {
            DocqaError::InvalidConfiguration(msg) => {
                assert!(msg.contains("hashing@384"), "{}", msg);
                assert!(msg.contains("renamed@384"), "{}", msg);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_partial_write_retries_only_failed_ids() {
        let store = Arc::new(PartiallyFailingStore {
            inner: MemoryVectorStore::new(),
            batches: Mutex::new(Vec::new()),
        });
        let orchestrator = orchestrator_with(store.clone(), Arc::new(ExtractiveGenerator::new()));

        let summary = orchestrator
            .ingest(&sky_document(), &ChunkingConfig::new(20, 5))
            .await
            .unwrap();

        let batches = store.batches.lock().unwrap().clone();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1], 1);
        assert_eq!(summary.chunks_written, batches[0]);
        assert_eq!(store.count().await.unwrap(), batches[0]);
    }

    #[tokio::test]
    async fn test_encoding_failure_is_wrapped_with_document_id() {
        let orchestrator = Orchestrator::with_components(
            Settings::default(),
            Prompts::default(),
            Arc::new(BrokenEmbedder),
            Arc::new(MemoryVectorStore::new()),
            Arc::new(ExtractiveGenerator::new()),
        );

        let err = orchestrator
            .ingest(&sky_document(), &ChunkingConfig::default())
            .await
            .unwrap_err();
        match err {
            DocqaError::Ingestion { document_id, source } => {
                assert_eq!(document_id, "colors.txt");
                assert!(matches!(*source, DocqaError::Encoding(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_chunking_config_is_wrapped() {
        let err = orchestrator()
            .ingest(&sky_document(), &ChunkingConfig::new(10, 10))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DocqaError::Ingestion { ref source, .. } if matches!(**source, DocqaError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_document_writes_nothing() {
        let orchestrator = orchestrator();
        let summary = orchestrator
            .ingest(&Document::new("blank.txt", "   \n  "), &ChunkingConfig::default())
            .await
            .unwrap();
        assert_eq!(summary.chunks_written, 0);
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let result = orchestrator().answer(&Query::new("   ")).await;
        assert!(matches!(result, Err(DocqaError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_generator_failure_yields_generation_error() {
        let orchestrator = orchestrator_with(Arc::new(MemoryVectorStore::new()), Arc::new(FailingGenerator));
        orchestrator
            .ingest(&sky_document(), &ChunkingConfig::new(20, 5))
            .await
            .unwrap();

        let result = orchestrator.answer(&Query::new("What color is the sky?")).await;
        assert!(matches!(
            result,
            Err(DocqaError::Generation(ref msg)) if msg.contains("invalid API key") && msg.contains("What color is the sky?")
        ));
    }

    #[tokio::test]
    async fn test_embedding_failure_names_the_question() {
        let orchestrator = Orchestrator::with_components(
            Settings::default(),
            Prompts::default(),
            Arc::new(BrokenEmbedder),
            Arc::new(MemoryVectorStore::new()),
            Arc::new(ExtractiveGenerator::new()),
        );

        let err = orchestrator
            .search(&Query::new("  Where is the manual?  "))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DocqaError::Encoding(ref msg) if msg.contains("model offline") && msg.contains("\"Where is the manual?\"")
        ));
    }

    #[tokio::test]
    async fn test_empty_completion_is_generation_error() {
        let orchestrator = orchestrator_with(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(RecordingGenerator::new("  ")),
        );
        let result = orchestrator.answer(&Query::new("Why?")).await;
        assert!(matches!(result, Err(DocqaError::Generation(_))));
    }

    #[tokio::test]
    async fn test_generation_timeout() {
        let orchestrator = orchestrator_with(Arc::new(MemoryVectorStore::new()), Arc::new(SlowGenerator))
            .with_deadlines(Deadlines {
                embedding: Duration::from_secs(5),
                vector_store: Duration::from_secs(5),
                generation: Duration::from_millis(20),
            });

        let err = orchestrator.answer(&Query::new("Why?")).await.unwrap_err();
        assert!(matches!(err, DocqaError::Generation(ref msg) if msg.contains("timed out")));
    }

    #[tokio::test]
    async fn test_context_budget_limits_sources() {
        let generator = Arc::new(RecordingGenerator::new("ok"));
        let mut settings = Settings::default();
        settings.rag.context_budget_chars = 25;
        let orchestrator = Orchestrator::with_components(
            settings,
            Prompts::default(),
            Arc::new(HashingEmbedder::new()),
            Arc::new(MemoryVectorStore::new()),
            generator.clone(),
        );
        orchestrator
            .ingest(&sky_document(), &ChunkingConfig::new(20, 5))
            .await
            .unwrap();

        let answer = orchestrator
            .answer(&Query::new("What color is the sky?"))
            .await
            .unwrap();

        // Both chunks are retrieved but only the top one fits in 25 chars.
        assert_eq!(answer.sources.len(), 1);
        assert!(answer.sources[0].text.contains("The sky is blue."));
        assert_eq!(generator.prompts.lock().unwrap()[0].passages.len(), 1);
    }

    #[tokio::test]
    async fn test_search_filter_and_remove() {
        let orchestrator = orchestrator();
        let config = ChunkingConfig::default();
        orchestrator.ingest(&sky_document(), &config).await.unwrap();
        orchestrator
            .ingest(&Document::new("sea.txt", "The sea is blue too."), &config)
            .await
            .unwrap();

        let query = Query::new("blue")
            .with_top_k(10)
            .with_filter(MetadataFilter::new().eq("source", "sea.txt"));
        let sources = orchestrator.search(&query).await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].source_name(), Some("sea.txt"));

        assert_eq!(orchestrator.remove_document("sea.txt").await.unwrap(), 1);
        assert_eq!(orchestrator.count().await.unwrap(), 1);

        orchestrator.reset().await.unwrap();
        assert_eq!(orchestrator.count().await.unwrap(), 0);
    }
}
