//! Snippet retrieval: vector query, re-ranking, and window assembly.
//!
//! Takes a free-text query and an embedded chunk collection and produces a
//! ranked, deduplicated, windowed excerpt of the most relevant content.
//! Candidates are scored by combining embedding distance with
//! keyword-phrase overlap; excerpts are cut as character windows around the
//! first literal occurrence of the query inside each of the top chunks.
//!
//! Retrieval failure is never fatal to the caller: any embedding or store
//! error is absorbed into a degraded empty result.

use std::collections::{BTreeSet, HashSet};

use anyhow::Result;

use crate::embedding::Embedder;
use crate::keywords::KeywordExtractor;
use crate::models::{Candidate, RetrievalResult, RetrievalStatus};
use crate::store::Collection;

/// Default excerpt window size in characters.
pub const DEFAULT_WINDOW: usize = 800;

/// Most candidates fetched from the vector store per query.
const MAX_CANDIDATES: i64 = 10;

/// Keyword phrases extracted from the query for overlap scoring.
const QUERY_KEYWORD_COUNT: usize = 3;

/// Windows are cut from at most this many top-scored candidates.
const TOP_WINDOWS: usize = 3;

/// Weight of the embedding-distance component of the combined score.
const DISTANCE_WEIGHT: f64 = 0.6;

/// Weight of each keyword match in the combined score.
const KEYWORD_WEIGHT: f64 = 0.4;

/// Minimum combined score for admission without a literal query match.
const SCORE_THRESHOLD: f64 = 0.3;

/// Separator placed between non-contiguous excerpt windows.
const WINDOW_SEPARATOR: &str = "\n\n[...]\n\n";

/// Retrieve a windowed snippet for `query` from `collection`.
///
/// An empty result with [`RetrievalStatus::Empty`] means no chunk
/// qualified; that is a normal outcome, not an error. External failures
/// yield [`RetrievalStatus::Degraded`] with an empty payload.
pub async fn get_snippet(
    collection: &Collection,
    query: &str,
    embedder: &dyn Embedder,
    keywords: &dyn KeywordExtractor,
    window: usize,
) -> RetrievalResult {
    match try_get_snippet(collection, query, embedder, keywords, window).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(query, error = %e, "snippet retrieval failed");
            RetrievalResult::degraded(String::new())
        }
    }
}

async fn try_get_snippet(
    collection: &Collection,
    query: &str,
    embedder: &dyn Embedder,
    keywords: &dyn KeywordExtractor,
    window: usize,
) -> Result<RetrievalResult> {
    let total = collection.count().await?;
    let n = if total > 0 {
        total.min(MAX_CANDIDATES) as usize
    } else {
        1
    };

    let query_embedding = embedder.encode(query).await?;
    let hits = collection.query(&query_embedding, n, None).await?;

    let query_keywords: HashSet<String> = keywords
        .extract(query, (1, 2), QUERY_KEYWORD_COUNT)?
        .into_iter()
        .map(|(phrase, _)| phrase.to_lowercase())
        .collect();

    let query_lower = query.to_lowercase();
    let mut best_chunks: Vec<Candidate> = Vec::new();

    for hit in hits {
        let doc_keywords: HashSet<String> = hit
            .metadata
            .keyword_tags
            .split(',')
            .map(|k| k.trim().to_lowercase())
            .collect();
        let keyword_match = query_keywords
            .iter()
            .filter(|k| doc_keywords.contains(k.as_str()))
            .count();

        let score = (1.0 - hit.distance) * DISTANCE_WEIGHT + keyword_match as f64 * KEYWORD_WEIGHT;

        if score > SCORE_THRESHOLD || hit.text.to_lowercase().contains(&query_lower) {
            best_chunks.push(Candidate {
                text: hit.text,
                score,
                position: hit.metadata.position,
                file_path: hit.metadata.file_path,
            });
        }
    }

    if best_chunks.is_empty() {
        tracing::info!(query, "no snippet qualified");
        return Ok(RetrievalResult::empty());
    }

    // Higher score first; ties broken by ascending stored chunk position.
    best_chunks.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.position.cmp(&b.position))
    });

    // Cut a window around the first literal match in each top chunk.
    // Deduplication is a single running high-water mark over window end
    // offsets in score order, not true interval merging.
    let mut combined: Vec<String> = Vec::new();
    let mut current_end: i64 = -1;
    for chunk in best_chunks.iter().take(TOP_WINDOWS) {
        let lowered = chunk.text.to_lowercase();
        if let Some(match_pos) = lowered.find(&query_lower) {
            let match_pos = match_pos.min(chunk.text.len());
            let start = floor_char_boundary(&chunk.text, match_pos.saturating_sub(window / 2));
            let end = floor_char_boundary(
                &chunk.text,
                (match_pos + window / 2).min(chunk.text.len()),
            );
            if start as i64 > current_end {
                combined.push(chunk.text[start..end].to_string());
                current_end = end as i64;
            }
        }
    }

    let files: BTreeSet<String> = best_chunks
        .iter()
        .filter(|c| !c.file_path.is_empty())
        .map(|c| c.file_path.clone())
        .collect();

    Ok(RetrievalResult {
        text: combined.join(WINDOW_SEPARATOR),
        files,
        status: RetrievalStatus::Found,
    })
}

/// Largest char-boundary offset not exceeding `idx`.
///
/// Lower-casing can shift byte offsets in non-ASCII text, so window edges
/// computed on the lowered text are clamped back onto the original.
fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
