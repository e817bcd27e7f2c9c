//! Sliding-window splitting with boundary snapping.

use super::ChunkingConfig;

/// Half-open character range of one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub start: usize,
    pub end: usize,
}

/// Split `chars` into windows of at most `chunk_size` characters, each
/// starting `overlap` characters before the previous window's end.
///
/// `config` must already be validated.
pub(crate) fn split_windows(chars: &[char], config: &ChunkingConfig) -> Vec<Span> {
    let len = chars.len();
    let mut spans = Vec::new();
    if len == 0 {
        return spans;
    }

    // A snapped end must stay past `start + overlap` or the next window
    // would not advance.
    let lookback = config
        .boundary_lookback
        .min(config.chunk_size - config.overlap - 1);

    let mut start = 0;
    loop {
        let hard_end = start + config.chunk_size;
        if hard_end >= len {
            spans.push(Span { start, end: len });
            break;
        }

        let end = snap_to_boundary(chars, hard_end, lookback);
        spans.push(Span { start, end });
        start = end - config.overlap;
    }

    spans
}

/// Find the best break at or before `hard_end`, at most `lookback` characters back.
///
/// Sentence breaks win over plain whitespace. Falls back to `hard_end`.
fn snap_to_boundary(chars: &[char], hard_end: usize, lookback: usize) -> usize {
    let floor = hard_end - lookback;

    if let Some(end) = (floor..=hard_end).rev().find(|&e| is_sentence_break(chars, e)) {
        return end;
    }
    if let Some(end) = (floor..=hard_end).rev().find(|&e| is_word_break(chars, e)) {
        return end;
    }
    hard_end
}

fn is_sentence_end(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// A cut at `end` falls right after a sentence terminator or a newline.
fn is_sentence_break(chars: &[char], end: usize) -> bool {
    if end == 0 || end >= chars.len() {
        return false;
    }
    let before = chars[end - 1];
    let after = chars[end];

    before == '\n'
        || (before.is_whitespace() && end >= 2 && is_sentence_end(chars[end - 2]))
        || (is_sentence_end(before) && after.is_whitespace())
}

/// A cut at `end` does not split a word.
fn is_word_break(chars: &[char], end: usize) -> bool {
    if end == 0 || end >= chars.len() {
        return false;
    }
    chars[end - 1].is_whitespace() || chars[end].is_whitespace()
}
