//! Text chunking for splitting documents into overlapping, searchable segments.
//!
//! Chunks are measured in characters, never bytes, so offsets stay valid for
//! any UTF-8 input and a chunk never ends inside a code point.

mod pages;
mod window;

pub use pages::chunk_document;

use crate::document::Metadata;
use crate::error::{DocqaError, Result};
use serde::{Deserialize, Serialize};

/// A contiguous slice of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of this chunk within its document (0-based, contiguous).
    pub index: usize,
    /// Exact text of the chunk.
    pub text: String,
    /// Start character offset into the source text (inclusive).
    pub start: usize,
    /// End character offset into the source text (exclusive).
    pub end: usize,
    /// Metadata inherited from the document plus chunk-level fields.
    pub metadata: Metadata,
}

impl Chunk {
    /// Number of characters in this chunk.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether this chunk is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Configuration for chunking.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks.
    pub overlap: usize,
    /// How far back from a window end to look for a sentence or word break.
    pub boundary_lookback: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 100,
            boundary_lookback: 50,
        }
    }
}

impl ChunkingConfig {
    /// Create a config with the default boundary lookback.
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
            ..Self::default()
        }
    }

    /// Reject configurations that cannot make progress.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(DocqaError::InvalidConfiguration(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(DocqaError::InvalidConfiguration(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Split `text` into overlapping chunks of at most `chunk_size` characters.
///
/// Returns an empty vector for empty or whitespace-only text.
pub fn chunk(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    chunk_with_config(text, &ChunkingConfig::new(chunk_size, overlap))
}

/// Split `text` using a full [`ChunkingConfig`].
pub fn chunk_with_config(text: &str, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    config.validate()?;

    let mut chunks = Vec::new();
    push_segment_chunks(&mut chunks, text, 0, config, &Metadata::new());
    Ok(chunks)
}

/// Chunk `segment` (which starts at character `offset` of the source) and
/// append the results to `chunks`, continuing its index sequence.
pub(crate) fn push_segment_chunks(
    chunks: &mut Vec<Chunk>,
    segment: &str,
    offset: usize,
    config: &ChunkingConfig,
    base_metadata: &Metadata,
) {
    if segment.trim().is_empty() {
        return;
    }

    let chars: Vec<char> = segment.chars().collect();

    for span in window::split_windows(&chars, config) {
        let text: String = chars[span.start..span.end].iter().collect();
        if text.trim().is_empty() {
            continue;
        }

        let index = chunks.len();
        let mut metadata = base_metadata.clone();
        metadata.insert("chunk_index".to_string(), index.into());
        metadata.insert("char_count".to_string(), (span.end - span.start).into());

        chunks.push(Chunk {
            index,
            text,
            start: offset + span.start,
            end: offset + span.end,
            metadata,
        });
    }
}
