//! Document loading for supported file formats.
//!
//! Plain text and markdown are read as-is. PDFs are extracted with
//! `pdf-extract` and each page is prefixed with a `[PAGE n]` marker so the
//! chunker can attribute chunks to pages.

use crate::document::Document;
use crate::error::{DocqaError, Result};
use std::path::Path;
use tracing::{info, instrument, warn};

/// File extensions [`load_document`] accepts.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "md"];

/// Form feed, emitted by pdf-extract between pages.
const PAGE_SEPARATOR: char = '\x0C';

/// Whether `file_name` has a supported extension.
pub fn is_supported(file_name: &str) -> bool {
    extension(file_name).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Load a document from disk. The document id is the file name.
#[instrument]
pub fn load_document(path: &Path) -> Result<Document> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| DocqaError::InvalidArgument(format!("Not a file: {}", path.display())))?;

    if !is_supported(&file_name) {
        return Err(unsupported(&file_name));
    }

    let bytes = std::fs::read(path)?;
    load_document_from_bytes(&file_name, &bytes)
}

/// Load a document from in-memory file contents, e.g. an upload.
pub fn load_document_from_bytes(file_name: &str, bytes: &[u8]) -> Result<Document> {
    let text = match extension(file_name).as_deref() {
        Some("pdf") => extract_pdf(bytes)?,
        Some("txt") | Some("md") => decode_text(bytes),
        _ => return Err(unsupported(file_name)),
    };

    info!("Loaded {} characters from {}", text.chars().count(), file_name);
    Ok(Document::new(file_name, text).with_metadata("file_type", extension(file_name)))
}

fn extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
}

fn unsupported(file_name: &str) -> DocqaError {
    DocqaError::UnsupportedFormat(format!(
        "{} (supported: {})",
        file_name,
        SUPPORTED_EXTENSIONS
            .iter()
            .map(|e| format!(".{}", e))
            .collect::<Vec<_>>()
            .join(", ")
    ))
}

/// UTF-8, falling back to Latin-1 so legacy files still load.
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            warn!("File is not valid UTF-8, decoding as Latin-1");
            bytes.iter().map(|&b| b as char).collect()
        }
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| DocqaError::UnsupportedFormat(format!("PDF extraction failed: {}", e)))?;
    Ok(mark_pages(&text))
}

/// Prefix every non-empty page with `[PAGE n]`, numbering from 1.
fn mark_pages(text: &str) -> String {
    text.split(PAGE_SEPARATOR)
        .enumerate()
        .filter_map(|(i, page)| {
            let page = page.trim();
            (!page.is_empty()).then(|| format!("[PAGE {}]\n{}", i + 1, page))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
