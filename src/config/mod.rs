//! Configuration module for docqa.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{Prompts, RagPrompts};
pub use settings::{
    ChunkingSettings, EmbeddingProvider, EmbeddingSettings, GeneralSettings, GenerationProvider,
    GenerationSettings, PromptSettings, RagSettings, ServerSettings, Settings, TimeoutSettings,
    VectorStoreProvider, VectorStoreSettings,
};
