//! Pre-flight checks before expensive operations.
//!
//! Validates input and configuration up front so an ingest or question
//! does not fail midway, and reports which offline fallbacks will be used.

use crate::config::{EmbeddingProvider, GenerationProvider, Settings, VectorStoreProvider};
use crate::error::{DocqaError, Result};
use crate::loader;
use crate::providers::{
    resolve_embedding_provider, resolve_generation_provider, resolve_vector_store_provider,
    ApiKeys,
};
use std::path::Path;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operation {
    /// Ingestion embeds and writes to the store.
    Ingest,
    /// Asking embeds, retrieves and generates.
    Ask,
    /// Search embeds and retrieves.
    Search,
}

/// Check that `path` is a readable document in a supported format.
pub fn check_document(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(DocqaError::InvalidArgument(format!(
            "{} does not exist or is not a file",
            path.display()
        )));
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if !loader::is_supported(&name) {
        return Err(DocqaError::UnsupportedFormat(format!(
            "{} (supported: {})",
            name,
            loader::SUPPORTED_EXTENSIONS.join(", ")
        )));
    }
    Ok(())
}

/// Fallbacks the given operation will run with, as human-readable notes.
pub fn fallback_warnings(operation: Operation, settings: &Settings, keys: &ApiKeys) -> Vec<String> {
    let mut warnings = Vec::new();

    if settings.embedding.provider == EmbeddingProvider::OpenAI
        && resolve_embedding_provider(settings.embedding.provider, keys) == EmbeddingProvider::Hashing
    {
        warnings.push(
            "OPENAI_API_KEY not set: using offline hashing embeddings. \
             Documents indexed now must be re-ingested after setting the key."
                .to_string(),
        );
    }

    if settings.vector_store.provider == VectorStoreProvider::Endee
        && resolve_vector_store_provider(settings.vector_store.provider, keys)
            == VectorStoreProvider::Memory
    {
        warnings.push(
            "ENDEE_API_KEY not set: using an in-memory store, nothing will persist after exit."
                .to_string(),
        );
    }

    if operation == Operation::Ask
        && settings.generation.provider != GenerationProvider::Extractive
        && resolve_generation_provider(settings.generation.provider, keys)
            == GenerationProvider::Extractive
    {
        warnings.push(
            "No LLM API key set (OPENAI_API_KEY, GEMINI_API_KEY or MISTRAL_API_KEY): \
             answers are extracted from the retrieved passages."
                .to_string(),
        );
    }

    warnings
}

/// Run pre-flight checks for the given operation.
///
/// Returns the fallback warnings to show, or an error for configuration
/// that cannot work at all.
pub fn check(operation: Operation, settings: &Settings) -> Result<Vec<String>> {
    if operation == Operation::Ingest {
        settings.chunking.to_config().validate()?;
    }
    if settings.rag.top_k == 0 {
        return Err(DocqaError::InvalidConfiguration(
            "rag.top_k must be greater than 0".to_string(),
        ));
    }
    Ok(fallback_warnings(operation, settings, &ApiKeys::from_env()))
}
