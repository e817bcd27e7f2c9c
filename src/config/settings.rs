//! Configuration settings for docqa.

use crate::chunking::ChunkingConfig;
use crate::vector_store::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub embedding: EmbeddingSettings,
    pub chunking: ChunkingSettings,
    pub vector_store: VectorStoreSettings,
    pub generation: GenerationSettings,
    pub rag: RagSettings,
    pub timeouts: TimeoutSettings,
    pub server: ServerSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error) when no -v flag is given.
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.docqa".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Embedding provider type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// OpenAI embeddings API (default).
    #[default]
    OpenAI,
    /// Offline feature-hashing embedder.
    Hashing,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(EmbeddingProvider::OpenAI),
            "hashing" | "local" | "offline" => Ok(EmbeddingProvider::Hashing),
            _ => Err(format!("Unknown embedding provider: {}", s)),
        }
    }
}

impl std::fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingProvider::OpenAI => write!(f, "openai"),
            EmbeddingProvider::Hashing => write!(f, "hashing"),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (openai, hashing).
    pub provider: EmbeddingProvider,
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
    /// Maximum concurrent embedding requests per batch.
    pub max_concurrent: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::OpenAI,
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            max_concurrent: 4,
        }
    }
}

/// Text chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks.
    pub overlap: usize,
    /// How far back from a window end to look for a sentence or word break.
    pub boundary_lookback: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        let config = ChunkingConfig::default();
        Self {
            chunk_size: config.chunk_size,
            overlap: config.overlap,
            boundary_lookback: config.boundary_lookback,
        }
    }
}

impl ChunkingSettings {
    pub fn to_config(&self) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size: self.chunk_size,
            overlap: self.overlap,
            boundary_lookback: self.boundary_lookback,
        }
    }
}

/// Vector store provider type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreProvider {
    /// Local SQLite database (default).
    #[default]
    Sqlite,
    /// Process-local, lost on exit.
    Memory,
    /// Endee hosted vector database.
    Endee,
}

impl std::str::FromStr for VectorStoreProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(VectorStoreProvider::Sqlite),
            "memory" => Ok(VectorStoreProvider::Memory),
            "endee" => Ok(VectorStoreProvider::Endee),
            _ => Err(format!("Unknown vector store provider: {}", s)),
        }
    }
}

impl std::fmt::Display for VectorStoreProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorStoreProvider::Sqlite => write!(f, "sqlite"),
            VectorStoreProvider::Memory => write!(f, "memory"),
            VectorStoreProvider::Endee => write!(f, "endee"),
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Vector store provider (sqlite, memory, endee).
    pub provider: VectorStoreProvider,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
    /// Endee API base URL (for endee provider).
    pub endee_url: String,
    /// Collection name (for endee provider).
    pub collection: String,
    /// Attempts per remote operation, including the first.
    pub retry_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub retry_initial_backoff_ms: u64,
    /// Upper bound on any retry delay, in milliseconds.
    pub retry_max_backoff_ms: u64,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            provider: VectorStoreProvider::Sqlite,
            sqlite_path: "~/.docqa/vectors.db".to_string(),
            endee_url: crate::vector_store::DEFAULT_ENDEE_URL.to_string(),
            collection: crate::vector_store::DEFAULT_COLLECTION.to_string(),
            retry_attempts: retry.max_attempts,
            retry_initial_backoff_ms: retry.initial_backoff.as_millis() as u64,
            retry_max_backoff_ms: retry.max_backoff.as_millis() as u64,
        }
    }
}

impl VectorStoreSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts.max(1),
            initial_backoff: Duration::from_millis(self.retry_initial_backoff_ms),
            max_backoff: Duration::from_millis(self.retry_max_backoff_ms),
        }
    }
}

/// Answer generation provider type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    /// First provider with an API key: OpenAI, then Gemini, then Mistral.
    #[default]
    Auto,
    OpenAI,
    Gemini,
    Mistral,
    /// Offline answers quoted from the retrieved context.
    Extractive,
}

impl std::str::FromStr for GenerationProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(GenerationProvider::Auto),
            "openai" => Ok(GenerationProvider::OpenAI),
            "gemini" => Ok(GenerationProvider::Gemini),
            "mistral" => Ok(GenerationProvider::Mistral),
            "extractive" | "template" => Ok(GenerationProvider::Extractive),
            _ => Err(format!("Unknown generation provider: {}", s)),
        }
    }
}

impl std::fmt::Display for GenerationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationProvider::Auto => write!(f, "auto"),
            GenerationProvider::OpenAI => write!(f, "openai"),
            GenerationProvider::Gemini => write!(f, "gemini"),
            GenerationProvider::Mistral => write!(f, "mistral"),
            GenerationProvider::Extractive => write!(f, "extractive"),
        }
    }
}

/// Answer generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Generation provider (auto, openai, gemini, mistral, extractive).
    pub provider: GenerationProvider,
    /// Model override. Empty uses the provider's default.
    pub model: Option<String>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens in a completion.
    pub max_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            provider: GenerationProvider::Auto,
            model: None,
            temperature: 0.7,
            max_tokens: 500,
        }
    }
}

impl GenerationSettings {
    /// The configured model, or `default` when none is set.
    pub fn model_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(default)
    }
}

/// RAG (Retrieval-Augmented Generation) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// Number of chunks to retrieve per question.
    pub top_k: usize,
    /// Drop retrieved chunks scoring below this value.
    pub score_threshold: Option<f32>,
    /// Maximum characters of chunk text placed in the prompt.
    pub context_budget_chars: usize,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            top_k: 4,
            score_threshold: None,
            context_budget_chars: 4000,
        }
    }
}

/// Deadlines for collaborator calls, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub embedding_secs: u64,
    pub vector_store_secs: u64,
    pub generation_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            embedding_secs: 60,
            vector_store_secs: 30,
            generation_secs: 120,
        }
    }
}

impl TimeoutSettings {
    pub fn embedding(&self) -> Duration {
        Duration::from_secs(self.embedding_secs)
    }

    pub fn vector_store(&self) -> Duration {
        Duration::from_secs(self.vector_store_secs)
    }

    pub fn generation(&self) -> Duration {
        Duration::from_secs(self.generation_secs)
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Maximum upload size in megabytes.
    pub max_upload_mb: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_upload_mb: 25,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Serialize to pretty TOML.
    pub fn to_toml(&self) -> crate::error::Result<String> {
        toml::to_string_pretty(self).map_err(|e| crate::error::DocqaError::Config(e.to_string()))
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docqa")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.vector_store.sqlite_path)
    }
}
