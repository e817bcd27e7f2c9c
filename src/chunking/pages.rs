//! Page-aware chunking for documents carrying `[PAGE n]` markers.

use super::{push_segment_chunks, Chunk, ChunkingConfig};
use crate::document::Document;
use crate::error::Result;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

fn page_marker() -> &'static Regex {
    static PAGE_MARKER: OnceLock<Regex> = OnceLock::new();
    PAGE_MARKER.get_or_init(|| Regex::new(r"\[PAGE (\d+)\]").expect("page marker regex is valid"))
}

/// Chunk a document, tagging each chunk with its page number and source.
///
/// Text loaded from PDFs is split on its page markers first so no chunk
/// straddles two pages. Offsets always refer to the full document text.
pub fn chunk_document(document: &Document, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    config.validate()?;

    let text = document.text.as_str();
    let mut chunks = Vec::new();

    let markers: Vec<_> = page_marker().captures_iter(text).collect();

    if markers.is_empty() {
        let mut base = document.metadata.clone();
        base.insert("page".to_string(), 1.into());
        push_segment_chunks(&mut chunks, text, 0, config, &base);
    } else {
        // Anything before the first marker belongs to page 1.
        let first = markers[0].get(0).map(|m| m.start()).unwrap_or(0);
        push_page(&mut chunks, document, text, 0, first, 1, config);

        for (i, caps) in markers.iter().enumerate() {
            let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let page: u64 = number.as_str().parse().unwrap_or(1);
            let body_end = markers
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map(|m| m.start())
                .unwrap_or(text.len());

            push_page(&mut chunks, document, text, whole.end(), body_end, page, config);
        }
    }

    debug!(
        "Chunked '{}' ({} chars) into {} chunks",
        document.id,
        document.char_count(),
        chunks.len()
    );

    Ok(chunks)
}

/// Chunk the trimmed byte range `[from, to)` of `text` as page `page`.
fn push_page(
    chunks: &mut Vec<Chunk>,
    document: &Document,
    text: &str,
    from: usize,
    to: usize,
    page: u64,
    config: &ChunkingConfig,
) {
    let body = &text[from..to];
    let leading = body.len() - body.trim_start().len();
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return;
    }

    let char_offset = text[..from + leading].chars().count();

    let mut base = document.metadata.clone();
    base.insert("page".to_string(), page.into());
    push_segment_chunks(chunks, trimmed, char_offset, config, &base);
}
