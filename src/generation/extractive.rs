//! Offline generator that answers by quoting the retrieved context.
//!
//! Picks the context sentences sharing the most words with the question and
//! returns them in reading order. Used when no model API key is configured.

use super::{Generator, Prompt};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashSet;

/// Answer given when there is no context to quote from.
pub const NO_CONTEXT_ANSWER: &str =
    "I don't have enough information to answer this question. Please upload relevant documents first.";

/// Quotes the most relevant sentences from the context.
#[derive(Debug, Clone)]
pub struct ExtractiveGenerator {
    max_sentences: usize,
}

impl ExtractiveGenerator {
    pub fn new() -> Self {
        Self { max_sentences: 3 }
    }

    pub fn with_max_sentences(mut self, max_sentences: usize) -> Self {
        self.max_sentences = max_sentences.max(1);
        self
    }

    fn answer(&self, prompt: &Prompt) -> String {
        let sentences: Vec<&str> = prompt
            .passages
            .iter()
            .flat_map(|p| split_sentences(p))
            .collect();

        if sentences.is_empty() {
            return NO_CONTEXT_ANSWER.to_string();
        }

        let question: HashSet<String> = words(&prompt.question).collect();

        // (position, overlap) for sentences sharing at least one word
        let mut scored: Vec<(usize, usize)> = sentences
            .iter()
            .enumerate()
            .map(|(i, s)| (i, words(s).filter(|w| question.contains(w)).count()))
            .filter(|(_, overlap)| *overlap > 0)
            .collect();

        let mut picked: Vec<usize> = if scored.is_empty() {
            (0..sentences.len().min(self.max_sentences)).collect()
        } else {
            scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
            scored
                .into_iter()
                .take(self.max_sentences)
                .map(|(i, _)| i)
                .collect()
        };
        picked.sort_unstable();

        let mut seen = HashSet::new();
        let summary = picked
            .into_iter()
            .map(|i| sentences[i])
            .filter(|s| seen.insert(*s))
            .collect::<Vec<_>>()
            .join(" ");

        format!("Based on the retrieved documents: {}", summary)
    }
}

impl Default for ExtractiveGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for ExtractiveGenerator {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        Ok(self.answer(prompt))
    }

    fn name(&self) -> String {
        "extractive".to_string()
    }
}

/// Split on sentence-ending punctuation, keeping the punctuation.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?' | '\n') {
            let end = i + c.len_utf8();
            let sentence = text[start..end].trim();
            if sentence.chars().any(char::is_alphanumeric) {
                sentences.push(sentence);
            }
            start = end;
        }
    }

    let tail = text[start..].trim();
    if tail.chars().any(char::is_alphanumeric) {
        sentences.push(tail);
    }
    sentences
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 1)
        .map(|w| w.to_lowercase())
}
