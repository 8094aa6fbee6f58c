//! Snippet refinement: second-pass retrieval over a retrieved excerpt.
//!
//! Re-queries the collection using the snippet itself as the query,
//! excluding image-derived chunks and passages too short to carry meaning,
//! and compresses the result to a bounded-length refined context.
//!
//! Refinement degrades gracefully: on any external failure the original
//! snippet is returned unrefined rather than failing the query pipeline.

use std::collections::BTreeSet;

use anyhow::Result;

use crate::embedding::Embedder;
use crate::models::{RetrievalResult, RetrievalStatus};
use crate::store::{Collection, QueryFilter};

/// Most passages fetched during refinement.
const MAX_RESULTS: i64 = 3;

/// Minimum trimmed passage length (in characters) worth keeping.
const MIN_PASSAGE_CHARS: usize = 50;

/// Maximum length of the refined context, in characters.
const MAX_REFINED_CHARS: usize = 2000;

/// Chunks with this document type are never used for refinement.
const EXCLUDED_DOCUMENT_TYPE: &str = "image";

/// Refine `snippet` against `collection`.
///
/// A blank snippet returns an empty result immediately, without touching
/// the store. External failures return the snippet unchanged with
/// [`RetrievalStatus::Degraded`].
pub async fn refine_snippet(
    collection: &Collection,
    snippet: &str,
    embedder: &dyn Embedder,
) -> RetrievalResult {
    if snippet.trim().is_empty() {
        tracing::warn!("blank snippet received for refinement");
        return RetrievalResult::empty();
    }

    match try_refine(collection, snippet, embedder).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "snippet refinement failed");
            RetrievalResult::degraded(snippet.to_string())
        }
    }
}

async fn try_refine(
    collection: &Collection,
    snippet: &str,
    embedder: &dyn Embedder,
) -> Result<RetrievalResult> {
    let total = collection.count().await?;
    let n = if total > 0 {
        total.min(MAX_RESULTS) as usize
    } else {
        1
    };

    let snippet_embedding = embedder.encode(snippet).await?;
    let filter = QueryFilter::ExcludeDocumentType(EXCLUDED_DOCUMENT_TYPE.to_string());
    let hits = collection.query(&snippet_embedding, n, Some(&filter)).await?;

    let refined_texts: Vec<&str> = hits
        .iter()
        .map(|h| h.text.as_str())
        .filter(|t| t.trim().chars().count() > MIN_PASSAGE_CHARS)
        .collect();

    let text = if refined_texts.is_empty() {
        truncate_chars(snippet, MAX_REFINED_CHARS)
    } else {
        truncate_chars(&refined_texts.join("\n\n"), MAX_REFINED_CHARS)
    };

    let files: BTreeSet<String> = hits
        .iter()
        .filter(|h| !h.metadata.file_path.is_empty())
        .map(|h| h.metadata.file_path.clone())
        .collect();

    Ok(RetrievalResult {
        text,
        files,
        status: RetrievalStatus::Found,
    })
}

/// Truncate a string to at most `max` characters.
fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
