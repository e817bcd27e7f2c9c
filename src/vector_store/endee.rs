//! Client for the Endee hosted vector database.
//!
//! Records are stored as `{id, vector, metadata}` documents where the chunk
//! text, document id and chunk index travel inside `metadata`. Every call
//! goes through the store's [`RetryPolicy`].

use super::{
    rank, record_id, validate_top_k, MetadataFilter, RetryPolicy, ScoredRecord, VectorRecord,
    VectorStore,
};
use crate::document::Metadata;
use crate::error::{DocqaError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Default Endee API endpoint.
pub const DEFAULT_ENDEE_URL: &str = "https://api.endee.io";

/// Default collection name.
pub const DEFAULT_COLLECTION: &str = "rag_documents";

/// Metadata keys reserved for record fields.
const TEXT_KEY: &str = "text";
const DOCUMENT_ID_KEY: &str = "document_id";
const CHUNK_INDEX_KEY: &str = "chunk_index";
const INDEXED_AT_KEY: &str = "indexed_at";

/// Connection settings for [`EndeeVectorStore`].
#[derive(Debug, Clone)]
pub struct EndeeConfig {
    pub base_url: String,
    pub api_key: String,
    pub collection: String,
    /// Vector dimension used when the collection has to be created.
    pub dimension: usize,
    /// Per-request timeout.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl EndeeConfig {
    pub fn new(api_key: impl Into<String>, dimension: usize) -> Self {
        Self {
            base_url: DEFAULT_ENDEE_URL.to_string(),
            api_key: api_key.into(),
            collection: DEFAULT_COLLECTION.to_string(),
            dimension,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// Remote vector store backed by the Endee HTTP API.
pub struct EndeeVectorStore {
    client: Client,
    config: EndeeConfig,
}

#[derive(Serialize)]
struct EndeeDocument<'a> {
    id: &'a str,
    vector: &'a [f32],
    metadata: Metadata,
}

#[derive(Debug, Default, Deserialize)]
struct UpsertResponse {
    #[serde(default)]
    failed_ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    vector: Vec<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct DeleteResponse {
    #[serde(default)]
    deleted: usize,
}

#[derive(Debug, Default, Deserialize)]
struct CollectionInfo {
    #[serde(default, alias = "document_count", alias = "vectors_count")]
    count: usize,
}

impl EndeeVectorStore {
    /// Create a client. Fails if the HTTP client cannot be built.
    pub fn new(config: EndeeConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        let auth = header::HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| DocqaError::Config(format!("Invalid Endee API key: {}", e)))?;
        headers.insert(header::AUTHORIZATION, auth);

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| DocqaError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &EndeeConfig {
        &self.config
    }

    fn collections_url(&self) -> String {
        format!("{}/collections", self.config.base_url.trim_end_matches('/'))
    }

    fn collection_url(&self, suffix: &str) -> String {
        let mut url = format!("{}/{}", self.collections_url(), self.config.collection);
        if !suffix.is_empty() {
            url.push('/');
            url.push_str(suffix);
        }
        url
    }

    async fn create_collection(&self) -> Result<()> {
        let payload = json!({
            "name": self.config.collection,
            "dimension": self.config.dimension,
            "metric": "cosine",
        });
        let response = self
            .client
            .post(self.collections_url())
            .json(&payload)
            .send()
            .await?;
        check_status(response).await?;
        info!("Created Endee collection: {}", self.config.collection);
        Ok(())
    }

    async fn upsert_once(&self, records: &[VectorRecord]) -> Result<usize> {
        let documents: Vec<EndeeDocument<'_>> = records.iter().map(to_document).collect();
        let response = self
            .client
            .post(self.collection_url("documents"))
            .json(&json!({ "documents": documents }))
            .send()
            .await?;
        let body: UpsertResponse = parse_body(check_status(response).await?).await?;

        if body.failed_ids.is_empty() {
            return Ok(records.len());
        }

        let written = records.len().saturating_sub(body.failed_ids.len());
        warn!(
            "Endee rejected {} of {} records",
            body.failed_ids.len(),
            records.len()
        );
        Err(DocqaError::PartialWrite {
            written,
            failed_ids: body.failed_ids,
        })
    }

    async fn query_once(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredRecord>> {
        let mut payload = json!({
            "vector": embedding,
            "top_k": top_k,
            "include_metadata": true,
        });
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            payload["filter"] = serde_json::to_value(&filter.equals)?;
        }

        let response = self
            .client
            .post(self.collection_url("search"))
            .json(&payload)
            .send()
            .await?;
        let body: SearchResponse = parse_body(check_status(response).await?).await?;

        let hits = body
            .results
            .into_iter()
            .map(from_hit)
            .filter(|hit| filter.map_or(true, |f| f.matches_record(&hit.record)))
            .collect();

        Ok(rank(hits, top_k))
    }

    async fn ensure_collection_once(&self) -> Result<()> {
        let response = self.client.get(self.collection_url("")).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return self.create_collection().await;
        }
        check_status(response).await?;
        Ok(())
    }

    async fn delete_once(&self, document_id: &str) -> Result<usize> {
        let payload = json!({ "filter": { DOCUMENT_ID_KEY: document_id } });
        let response = self
            .client
            .post(self.collection_url("delete"))
            .json(&payload)
            .send()
            .await?;
        let body: DeleteResponse = parse_body(check_status(response).await?).await?;
        Ok(body.deleted)
    }

    /// Range filters use the `$gte` operator of the Endee filter syntax.
    async fn delete_stale_once(&self, document_id: &str, keep: usize) -> Result<usize> {
        let payload = json!({
            "filter": {
                DOCUMENT_ID_KEY: document_id,
                CHUNK_INDEX_KEY: { "$gte": keep },
            }
        });
        let response = self
            .client
            .post(self.collection_url("delete"))
            .json(&payload)
            .send()
            .await?;
        let body: DeleteResponse = parse_body(check_status(response).await?).await?;
        Ok(body.deleted)
    }

    async fn count_once(&self) -> Result<usize> {
        let response = self.client.get(self.collection_url("")).send().await?;
        let info: CollectionInfo = parse_body(check_status(response).await?).await?;
        Ok(info.count)
    }

    async fn drop_collection_once(&self) -> Result<()> {
        let response = self.client.delete(self.collection_url("")).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for EndeeVectorStore {
    #[instrument(skip(self), fields(collection = %self.config.collection))]
    async fn ensure_ready(&self) -> Result<()> {
        self.config
            .retry
            .run("Endee collection check", || self.ensure_collection_once())
            .await?;

        info!("Collection '{}' ready", self.config.collection);
        Ok(())
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let written = self
            .config
            .retry
            .run("Endee upsert", || self.upsert_once(records))
            .await?;
        debug!("Added {} documents to Endee", written);
        Ok(written)
    }

    #[instrument(skip(self, embedding, filter))]
    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredRecord>> {
        validate_top_k(top_k)?;

        let results = self
            .config
            .retry
            .run("Endee search", || self.query_once(embedding, top_k, filter))
            .await?;
        debug!("Endee search returned {} results", results.len());
        Ok(results)
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize> {
        self.config
            .retry
            .run("Endee delete", || self.delete_once(document_id))
            .await
    }

    async fn delete_stale(&self, document_id: &str, keep: usize) -> Result<usize> {
        self.config
            .retry
            .run("Endee stale delete", || self.delete_stale_once(document_id, keep))
            .await
    }

    async fn count(&self) -> Result<usize> {
        self.config
            .retry
            .run("Endee collection info", || self.count_once())
            .await
    }

    async fn reset(&self) -> Result<()> {
        self.config
            .retry
            .run("Endee collection delete", || self.drop_collection_once())
            .await?;
        info!("Deleted Endee collection: {}", self.config.collection);

        self.ensure_ready().await
    }
}

fn to_document(record: &VectorRecord) -> EndeeDocument<'_> {
    let mut metadata = record.metadata.clone();
    metadata.insert(TEXT_KEY.to_string(), record.text.clone().into());
    metadata.insert(DOCUMENT_ID_KEY.to_string(), record.document_id.clone().into());
    metadata.insert(CHUNK_INDEX_KEY.to_string(), record.chunk_index.into());
    metadata.insert(INDEXED_AT_KEY.to_string(), record.indexed_at.to_rfc3339().into());

    EndeeDocument {
        id: &record.id,
        vector: &record.embedding,
        metadata,
    }
}

/// Rebuild a record from a search hit, moving reserved keys out of metadata.
fn from_hit(hit: SearchHit) -> ScoredRecord {
    let mut metadata = hit.metadata;

    let text = take_string(&mut metadata, TEXT_KEY).unwrap_or_default();
    let document_id = take_string(&mut metadata, DOCUMENT_ID_KEY)
        .or_else(|| metadata.get("source").and_then(Value::as_str).map(String::from))
        .unwrap_or_default();
    let chunk_index = metadata
        .remove(CHUNK_INDEX_KEY)
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as usize;
    let indexed_at = take_string(&mut metadata, INDEXED_AT_KEY)
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let id = hit
        .id
        .unwrap_or_else(|| record_id(&document_id, chunk_index));

    ScoredRecord {
        score: hit.score,
        record: VectorRecord {
            id,
            document_id,
            chunk_index,
            text,
            embedding: hit.vector,
            metadata,
            indexed_at,
        },
    }
}

fn take_string(metadata: &mut Metadata, key: &str) -> Option<String> {
    match metadata.remove(key) {
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
        None => None,
    }
}

/// Map a non-success status to the store error taxonomy.
///
/// 429 and 5xx are transient (`StoreUnavailable`); other failures are
/// rejections that retrying cannot fix.
fn classify_status(status: StatusCode, body: &str) -> DocqaError {
    let message = if body.is_empty() {
        format!("Endee returned {}", status)
    } else {
        format!("Endee returned {}: {}", status, body)
    };

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        DocqaError::StoreUnavailable(message)
    } else {
        DocqaError::VectorStore(message)
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, body.trim()))
}

/// Decode a JSON body, treating an empty body as the type's default.
async fn parse_body<T>(response: Response) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Default,
{
    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(&bytes).map_err(|e| {
        DocqaError::VectorStore(format!("Unexpected Endee response: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::record;
    use super::*;

    fn store(base_url: &str) -> EndeeVectorStore {
        let mut config = EndeeConfig::new("secret", 384);
        config.base_url = base_url.to_string();
        EndeeVectorStore::new(config).unwrap()
    }

    #[test]
    fn test_urls() {
        let store = store("https://api.endee.io/");
        assert_eq!(store.collections_url(), "https://api.endee.io/collections");
        assert_eq!(
            store.collection_url(""),
            "https://api.endee.io/collections/rag_documents"
        );
        assert_eq!(
            store.collection_url("search"),
            "https://api.endee.io/collections/rag_documents/search"
        );
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
            DocqaError::StoreUnavailable(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, "upstream"),
            DocqaError::StoreUnavailable(_)
        ));
        let err = classify_status(StatusCode::BAD_REQUEST, "dimension mismatch");
        assert!(matches!(err, DocqaError::VectorStore(_)));
        assert!(err.to_string().contains("dimension mismatch"));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_document_carries_text_in_metadata() {
        let r = record("guide.md", 2, "chunk body", vec![0.5, 0.5]);
        let doc = serde_json::to_value(to_document(&r)).unwrap();

        assert_eq!(doc["id"], r.id.as_str());
        assert_eq!(doc["vector"], json!([0.5, 0.5]));
        assert_eq!(doc["metadata"]["text"], "chunk body");
        assert_eq!(doc["metadata"]["document_id"], "guide.md");
        assert_eq!(doc["metadata"]["chunk_index"], 2);
        assert_eq!(doc["metadata"]["source"], "guide.md");
    }

    #[test]
    fn test_search_hit_is_rebuilt_into_record() {
        let body = json!({
            "results": [
                {
                    "score": 0.42,
                    "metadata": {"text": "later", "document_id": "a.txt", "chunk_index": 1, "source": "a.txt"}
                },
                {
                    "id": "explicit",
                    "score": 0.9,
                    "metadata": {"text": "The sky is blue.", "source": "sky.txt", "page": 1}
                }
            ]
        });
        let parsed: SearchResponse = serde_json::from_value(body).unwrap();
        let hits: Vec<ScoredRecord> = parsed.results.into_iter().map(from_hit).collect();
        let ranked = rank(hits, 10);

        assert_eq!(ranked[0].record.id, "explicit");
        assert_eq!(ranked[0].record.text, "The sky is blue.");
        assert_eq!(ranked[0].record.document_id, "sky.txt");
        assert!(!ranked[0].record.metadata.contains_key("text"));
        assert_eq!(ranked[0].record.metadata["page"], 1);

        assert_eq!(ranked[1].record.id, record_id("a.txt", 1));
        assert_eq!(ranked[1].record.chunk_index, 1);
    }

    #[test]
    fn test_upsert_response_defaults() {
        let parsed: UpsertResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.failed_ids.is_empty());

        let parsed: UpsertResponse =
            serde_json::from_str(r#"{"failed_ids": ["x", "y"]}"#).unwrap();
        assert_eq!(parsed.failed_ids, vec!["x", "y"]);

        let info: CollectionInfo = serde_json::from_str(r#"{"document_count": 12}"#).unwrap();
        assert_eq!(info.count, 12);
    }

    #[tokio::test]
    async fn test_empty_upsert_makes_no_request() {
        // Unroutable address: any request would fail.
        let store = store("http://127.0.0.1:9");
        assert_eq!(store.upsert(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_store_exhausts_retries() {
        let mut config = EndeeConfig::new("secret", 384);
        config.base_url = "http://127.0.0.1:9".to_string();
        config.timeout = Duration::from_secs(2);
        config.retry = RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        };
        let store = EndeeVectorStore::new(config).unwrap();

        match store.query(&[1.0], 5, None).await {
            Err(DocqaError::StoreUnavailable(msg)) => {
                assert!(msg.contains("Endee search"), "{}", msg);
                assert!(msg.contains("3 attempt"), "{}", msg);
            }
            other => panic!("expected StoreUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_top_k_rejected_before_io() {
        let store = store("http://127.0.0.1:9");
        assert!(matches!(
            store.query(&[1.0], 0, None).await,
            Err(DocqaError::InvalidArgument(_))
        ));
    }
}
