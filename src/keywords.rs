//! Keyword-phrase extraction.
//!
//! Defines the [`KeywordExtractor`] trait — the seam through which the
//! metadata generator and the retriever request keyword phrases — plus the
//! built-in [`NgramExtractor`], a stop-word-filtered n-gram frequency
//! scorer. Heavier model-backed extractors can be plugged in behind the
//! same trait.

use std::collections::HashMap;
use std::collections::HashSet;

use anyhow::Result;

/// Extracts the `top_n` most relevant keyword phrases from a text.
///
/// Phrases are returned lower-cased, ordered by descending relevance score.
/// Implementations must be deterministic for a given input.
pub trait KeywordExtractor: Send + Sync {
    fn extract(
        &self,
        text: &str,
        ngram_range: (usize, usize),
        top_n: usize,
    ) -> Result<Vec<(String, f32)>>;
}

/// Stop-word-filtered n-gram frequency extractor.
///
/// Candidate phrases are contiguous token windows within the configured
/// n-gram range that contain no stop words. Scores are occurrence counts
/// normalized to `(0, 1]`.
pub struct NgramExtractor {
    stopwords: HashSet<String>,
}

impl NgramExtractor {
    pub fn new(extra_stopwords: &[String]) -> Self {
        let mut stopwords: HashSet<String> =
            DEFAULT_STOPWORDS.iter().map(|s| s.to_string()).collect();
        stopwords.extend(extra_stopwords.iter().map(|s| s.to_lowercase()));
        Self { stopwords }
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.chars().count() >= 2)
            .map(|t| t.to_string())
            .collect()
    }
}

impl Default for NgramExtractor {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl KeywordExtractor for NgramExtractor {
    fn extract(
        &self,
        text: &str,
        ngram_range: (usize, usize),
        top_n: usize,
    ) -> Result<Vec<(String, f32)>> {
        let tokens = Self::tokenize(text);
        if tokens.is_empty() || top_n == 0 {
            return Ok(Vec::new());
        }

        let (min_n, max_n) = ngram_range;
        let mut counts: HashMap<String, f32> = HashMap::new();

        for n in min_n..=max_n.min(tokens.len()) {
            for window in tokens.windows(n) {
                if window.iter().any(|t| self.stopwords.contains(t.as_str())) {
                    continue;
                }
                let phrase = window.join(" ");
                *counts.entry(phrase).or_insert(0.0) += 1.0;
            }
        }

        if counts.is_empty() {
            return Ok(Vec::new());
        }

        let max_score = counts.values().cloned().fold(f32::MIN, f32::max);
        let mut scored: Vec<(String, f32)> = counts
            .into_iter()
            .map(|(phrase, score)| (phrase, score / max_score))
            .collect();

        // Descending score; lexicographic tie-break keeps output stable.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(top_n);
        Ok(scored)
    }
}

/// Domain stop words for Portuguese-language case documents, plus a small
/// English set for mixed-language material.
const DEFAULT_STOPWORDS: &[&str] = &[
    // Portuguese
    "de", "da", "do", "das", "dos", "em", "no", "na", "nos", "nas", "um",
    "uma", "uns", "umas", "os", "as", "ao", "aos", "com", "por", "para",
    "pela", "pelo", "que", "quem", "qual", "ser", "foi", "era", "sem",
    "sobre", "entre", "mais", "menos", "muito", "como", "mas", "ou", "se",
    "sua", "seu", "suas", "seus", "ela", "ele", "elas", "eles", "isso",
    "este", "esta", "esse", "essa", "aquele", "aquela", "num", "numa",
    "tem", "ter", "havia", "são", "está", "estava", "não", "sim", "já",
    "até", "quando", "onde", "também", "depois", "antes",
    // English
    "the", "an", "and", "or", "of", "to", "in", "on", "at", "is", "are",
    "was", "were", "for", "with", "by", "from", "that", "this", "it", "as",
    "be", "has", "have", "had", "not", "but",
];
