//! Quality-complaint vocabulary
//!
//! A data-driven list of phrases that, when they show up in the model's
//! explanation or reasoning, mean the photo itself was the limiting factor.
//! Matching uses a single Aho-Corasick automaton built once at start-up.

use aho_corasick::AhoCorasick;
use checkmeter_core::{Error, Result};
use std::collections::BTreeSet;

use crate::config::QualityPhraseSpec;

/// A matched vocabulary entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityMatch {
    /// The phrase as configured
    pub phrase: String,

    /// Remediation advice, if the entry carries any
    pub feedback: Option<String>,
}

/// Compiled quality-complaint vocabulary
#[derive(Debug, Clone)]
pub struct QualityVocabulary {
    matcher: AhoCorasick,
    entries: Vec<QualityPhraseSpec>,
}

impl QualityVocabulary {
    /// Compile a vocabulary. Entries keep their configured priority order;
    /// blank phrases are dropped.
    pub fn new(entries: Vec<QualityPhraseSpec>) -> Result<Self> {
        let entries: Vec<QualityPhraseSpec> = entries
            .into_iter()
            .filter(|entry| !entry.phrase.trim().is_empty())
            .collect();

        let matcher = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(entries.iter().map(|entry| entry.phrase.trim()))
            .map_err(|e| Error::config(format!("Failed to build quality vocabulary: {}", e)))?;

        Ok(Self { matcher, entries })
    }

    /// Number of phrases in the vocabulary
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest-priority phrase found in `text`.
    ///
    /// Priority is the configured order, not the position in the text.
    pub fn first_match(&self, text: &str) -> Option<QualityMatch> {
        self.matched_indices(text)
            .into_iter()
            .next()
            .map(|index| {
                let entry = &self.entries[index];
                QualityMatch {
                    phrase: entry.phrase.clone(),
                    feedback: entry.feedback.clone(),
                }
            })
    }

    /// Number of distinct phrases found in `text`
    pub fn distinct_matches(&self, text: &str) -> usize {
        self.matched_indices(text).len()
    }

    fn matched_indices(&self, text: &str) -> BTreeSet<usize> {
        self.matcher
            .find_overlapping_iter(text)
            .map(|m| m.pattern().as_usize())
            .collect()
    }
}
