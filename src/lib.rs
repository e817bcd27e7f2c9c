//! docqa - retrieval-augmented question answering over your own documents
//!
//! # Overview
//!
//! docqa lets you:
//! - Ingest PDF, text and markdown documents into a vector store
//! - Ask questions and get answers grounded in the retrieved passages
//! - Search the indexed passages directly
//! - Serve the same pipeline over HTTP
//!
//! # Architecture
//!
//! - `config` - Configuration and prompt templates
//! - `loader` - Document loading (PDF, text, markdown)
//! - `chunking` - Overlapping, boundary-aware text chunking
//! - `embedding` - Embedding generation
//! - `vector_store` - Vector storage backends (SQLite, in-memory, Endee)
//! - `rag` - Retrieval and context assembly
//! - `generation` - Answer generation (OpenAI, Gemini, Mistral, extractive)
//! - `providers` - Building components from settings
//! - `orchestrator` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use docqa::config::Settings;
//! use docqa::document::Document;
//! use docqa::orchestrator::Orchestrator;
//! use docqa::rag::Query;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings.clone())?;
//!     orchestrator.initialize().await?;
//!
//!     let doc = Document::new("colors.txt", "The sky is blue. Grass is green.");
//!     orchestrator.ingest(&doc, &settings.chunking.to_config()).await?;
//!
//!     let answer = orchestrator.answer(&Query::new("What color is the sky?")).await?;
//!     println!("{}", answer.answer);
//!
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod loader;
pub mod openai;
pub mod orchestrator;
pub mod providers;
pub mod rag;
pub mod vector_store;

pub use error::{DocqaError, Result};
