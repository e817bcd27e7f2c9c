//! Error types for docqa.

use thiserror::Error;

/// Library-level error type for docqa operations.
#[derive(Error, Debug)]
pub enum DocqaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Embedding generation failed: {0}")]
    Encoding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Vector store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Partial write: {written} record(s) written, {} rejected ({})", .failed_ids.len(), .failed_ids.join(", "))]
    PartialWrite {
        /// Number of records the store acknowledged.
        written: usize,
        /// Ids the store did not acknowledge. Safe to retry.
        failed_ids: Vec<String>,
    },

    #[error("Ingestion of '{document_id}' failed: {source}")]
    Ingestion {
        document_id: String,
        #[source]
        source: Box<DocqaError>,
    },

    #[error("Answer generation failed: {0}")]
    Generation(String),

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl DocqaError {
    /// Wrap an error raised while ingesting `document_id`.
    pub fn ingestion(document_id: &str, source: DocqaError) -> Self {
        DocqaError::Ingestion {
            document_id: document_id.to_string(),
            source: Box::new(source),
        }
    }

    /// Tag an embedding, store or generation error with the question being
    /// answered. Other variants are returned unchanged.
    pub fn for_question(self, question: &str) -> Self {
        let tag = |msg: String| format!("{} (question: \"{}\")", msg, question_excerpt(question));
        match self {
            DocqaError::Encoding(msg) => DocqaError::Encoding(tag(msg)),
            DocqaError::VectorStore(msg) => DocqaError::VectorStore(tag(msg)),
            DocqaError::StoreUnavailable(msg) => DocqaError::StoreUnavailable(tag(msg)),
            DocqaError::Generation(msg) => DocqaError::Generation(tag(msg)),
            other => other,
        }
    }

    /// Whether a store operation failing with this error may be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            DocqaError::StoreUnavailable(_) | DocqaError::PartialWrite { .. } => true,
            DocqaError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}

/// Longest question prefix quoted in error messages, in characters.
const QUESTION_EXCERPT_CHARS: usize = 60;

fn question_excerpt(question: &str) -> String {
    let question = question.trim();
    match question.char_indices().nth(QUESTION_EXCERPT_CHARS) {
        Some((end, _)) => format!("{}...", &question[..end]),
        None => question.to_string(),
    }
}

/// Result type alias for docqa operations.
pub type Result<T> = std::result::Result<T, DocqaError>;
