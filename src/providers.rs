//! Construction of the embedder, vector store and generator from settings.
//!
//! Providers whose API key is missing fall back to an offline counterpart
//! with a warning, so a fresh install still answers questions.

use crate::config::{EmbeddingProvider, GenerationProvider, Settings, VectorStoreProvider};
use crate::embedding::{Embedder, HashingEmbedder, OpenAIEmbedder};
use crate::error::Result;
use crate::generation::{
    ExtractiveGenerator, GeminiGenerator, Generator, OpenAIGenerator, DEFAULT_GEMINI_MODEL,
    DEFAULT_MISTRAL_MODEL, DEFAULT_OPENAI_MODEL,
};
use crate::openai::{api_key_from_env, create_client_with};
use crate::vector_store::{
    EndeeConfig, EndeeVectorStore, MemoryVectorStore, SqliteVectorStore, VectorStore,
};
use std::sync::Arc;
use tracing::{info, warn};

/// API keys read from the environment.
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    pub openai: Option<String>,
    pub mistral: Option<String>,
    pub gemini: Option<String>,
    pub endee: Option<String>,
}

impl ApiKeys {
    pub fn from_env() -> Self {
        Self {
            openai: api_key_from_env("OPENAI_API_KEY"),
            mistral: api_key_from_env("MISTRAL_API_KEY"),
            gemini: api_key_from_env("GEMINI_API_KEY"),
            endee: api_key_from_env("ENDEE_API_KEY"),
        }
    }
}

/// The embedding provider that will actually be used.
pub fn resolve_embedding_provider(requested: EmbeddingProvider, keys: &ApiKeys) -> EmbeddingProvider {
    match requested {
        EmbeddingProvider::OpenAI if keys.openai.is_none() => {
            warn!("OPENAI_API_KEY not set, using the offline hashing embedder");
            EmbeddingProvider::Hashing
        }
        other => other,
    }
}

/// The vector store provider that will actually be used.
pub fn resolve_vector_store_provider(
    requested: VectorStoreProvider,
    keys: &ApiKeys,
) -> VectorStoreProvider {
    match requested {
        VectorStoreProvider::Endee if keys.endee.is_none() => {
            warn!("ENDEE_API_KEY not set, using an in-memory vector store");
            VectorStoreProvider::Memory
        }
        other => other,
    }
}

/// The generation provider that will actually be used.
///
/// `Auto` picks the first provider with a key: OpenAI, Gemini, then Mistral.
pub fn resolve_generation_provider(
    requested: GenerationProvider,
    keys: &ApiKeys,
) -> GenerationProvider {
    let available = |provider: GenerationProvider| match provider {
        GenerationProvider::OpenAI => keys.openai.is_some(),
        GenerationProvider::Gemini => keys.gemini.is_some(),
        GenerationProvider::Mistral => keys.mistral.is_some(),
        GenerationProvider::Auto | GenerationProvider::Extractive => true,
    };

    let resolved = match requested {
        GenerationProvider::Auto => [
            GenerationProvider::OpenAI,
            GenerationProvider::Gemini,
            GenerationProvider::Mistral,
        ]
        .into_iter()
        .find(|p| available(*p))
        .unwrap_or(GenerationProvider::Extractive),
        other if available(other) => other,
        _ => GenerationProvider::Extractive,
    };

    if resolved == GenerationProvider::Extractive && requested != GenerationProvider::Extractive {
        warn!("No LLM API key found for '{}', using extractive answers", requested);
    }
    resolved
}

/// Build the configured embedder.
pub fn create_embedder(settings: &Settings, keys: &ApiKeys) -> Result<Arc<dyn Embedder>> {
    let dimensions = settings.embedding.dimensions as usize;

    let embedder: Arc<dyn Embedder> = match resolve_embedding_provider(settings.embedding.provider, keys) {
        EmbeddingProvider::OpenAI => {
            let client = create_client_with(
                keys.openai.as_deref(),
                None,
                settings.timeouts.embedding(),
            )?;
            Arc::new(
                OpenAIEmbedder::with_client(client, &settings.embedding.model, dimensions)
                    .with_max_concurrent(settings.embedding.max_concurrent),
            )
        }
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedder::with_dimensions(dimensions)),
    };

    info!("Embedding provider ready ({} dimensions)", embedder.dimensions());
    Ok(embedder)
}

/// Build the configured vector store. `dimensions` sizes a new remote collection.
pub fn create_vector_store(
    settings: &Settings,
    keys: &ApiKeys,
    dimensions: usize,
) -> Result<Arc<dyn VectorStore>> {
    let provider = resolve_vector_store_provider(settings.vector_store.provider, keys);

    let store: Arc<dyn VectorStore> = match provider {
        VectorStoreProvider::Sqlite => Arc::new(SqliteVectorStore::new(&settings.sqlite_path())?),
        VectorStoreProvider::Memory => Arc::new(MemoryVectorStore::new()),
        VectorStoreProvider::Endee => {
            let mut config = EndeeConfig::new(keys.endee.clone().unwrap_or_default(), dimensions);
            config.base_url = settings.vector_store.endee_url.clone();
            config.collection = settings.vector_store.collection.clone();
            config.timeout = settings.timeouts.vector_store();
            config.retry = settings.vector_store.retry_policy();
            Arc::new(EndeeVectorStore::new(config)?)
        }
    };

    info!("Vector store provider: {}", provider);
    Ok(store)
}

/// Build the configured generator.
pub fn create_generator(settings: &Settings, keys: &ApiKeys) -> Result<Arc<dyn Generator>> {
    let generation = &settings.generation;
    let timeout = settings.timeouts.generation();

    let generator: Arc<dyn Generator> = match resolve_generation_provider(generation.provider, keys) {
        GenerationProvider::OpenAI => {
            let client = create_client_with(keys.openai.as_deref(), None, timeout)?;
            Arc::new(
                OpenAIGenerator::with_client(client, "openai", generation.model_or(DEFAULT_OPENAI_MODEL))
                    .with_temperature(generation.temperature)
                    .with_max_tokens(generation.max_tokens),
            )
        }
        GenerationProvider::Mistral => Arc::new(
            OpenAIGenerator::mistral(
                keys.mistral.as_deref().unwrap_or_default(),
                generation.model_or(DEFAULT_MISTRAL_MODEL),
                timeout,
            )?
            .with_temperature(generation.temperature)
            .with_max_tokens(generation.max_tokens),
        ),
        GenerationProvider::Gemini => Arc::new(
            GeminiGenerator::new(
                keys.gemini.as_deref().unwrap_or_default(),
                generation.model_or(DEFAULT_GEMINI_MODEL),
                timeout,
            )?
            .with_temperature(generation.temperature)
            .with_max_tokens(generation.max_tokens),
        ),
        GenerationProvider::Auto | GenerationProvider::Extractive => {
            Arc::new(ExtractiveGenerator::new())
        }
    };

    info!("Generator: {}", generator.name());
    Ok(generator)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(openai: bool, gemini: bool, mistral: bool, endee: bool) -> ApiKeys {
        let key = |present: bool| present.then(|| "key".to_string());
        ApiKeys {
            openai: key(openai),
            gemini: key(gemini),
            mistral: key(mistral),
            endee: key(endee),
        }
    }

    #[test]
    fn test_auto_generation_order() {
        use GenerationProvider::*;
        assert_eq!(resolve_generation_provider(Auto, &keys(true, true, true, false)), OpenAI);
        assert_eq!(resolve_generation_provider(Auto, &keys(false, true, true, false)), Gemini);
        assert_eq!(resolve_generation_provider(Auto, &keys(false, false, true, false)), Mistral);
        assert_eq!(resolve_generation_provider(Auto, &keys(false, false, false, false)), Extractive);
    }

    #[test]
    fn test_explicit_provider_without_key_falls_back() {
        use GenerationProvider::*;
        assert_eq!(resolve_generation_provider(Gemini, &keys(true, false, false, false)), Extractive);
        assert_eq!(resolve_generation_provider(Mistral, &keys(false, false, true, false)), Mistral);
        assert_eq!(resolve_generation_provider(Extractive, &keys(true, true, true, true)), Extractive);
    }

    #[test]
    fn test_store_and_embedder_fallbacks() {
        assert_eq!(
            resolve_vector_store_provider(VectorStoreProvider::Endee, &keys(false, false, false, false)),
            VectorStoreProvider::Memory
        );
        assert_eq!(
            resolve_vector_store_provider(VectorStoreProvider::Endee, &keys(false, false, false, true)),
            VectorStoreProvider::Endee
        );
        assert_eq!(
            resolve_embedding_provider(EmbeddingProvider::OpenAI, &ApiKeys::default()),
            EmbeddingProvider::Hashing
        );
    }

    #[tokio::test]
    async fn test_offline_components() {
        let mut settings = Settings::default();
        settings.vector_store.provider = VectorStoreProvider::Memory;
        settings.embedding.dimensions = 64;
        let keys = ApiKeys::default();

        let embedder = create_embedder(&settings, &keys).unwrap();
        assert_eq!(embedder.dimensions(), 64);

        let store = create_vector_store(&settings, &keys, embedder.dimensions()).unwrap();
        assert_eq!(store.count().await.unwrap(), 0);

        let generator = create_generator(&settings, &keys).unwrap();
        assert_eq!(generator.name(), "extractive");
    }
}
