//! Core data models used throughout Dossier.
//!
//! These types represent the chunks, metadata, and retrieval results that
//! flow through the ingestion and query pipeline.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A bounded-length, sentence-aligned span of text produced by the chunker.
///
/// Chunks are immutable once created and written exactly once into the
/// vector store.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Ordinal of this chunk within its source text, starting at 0.
    pub position: i64,
    pub text: String,
}

/// Metadata derived for each chunk at insertion time.
///
/// Tag fields are stored comma-joined (the wire format the retriever splits
/// on). Generation never fails: on keyword-extraction failure both tag
/// fields hold the literal `"default"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    /// Document name without its extension.
    pub title: String,
    /// Case subject the document belongs to.
    pub author: String,
    /// Date the metadata was generated, `YYYY-MM-DD`.
    pub creation_date: String,
    /// Top-2 keyword phrases, comma-joined.
    pub collection_tags: String,
    /// Top-5 keyword phrases, lower-cased and comma-joined.
    pub keyword_tags: String,
    /// Path of the source file the chunk came from.
    pub file_path: String,
    /// Extractor kind that produced the text (`"pdf"`, `"image"`, ...).
    pub document_type: String,
    /// Stored chunk position, used for retrieval tie-breaking.
    #[serde(default)]
    pub position: i64,
}

/// Ephemeral query-time candidate produced from a raw nearest-neighbor hit.
///
/// Lives for the duration of one retrieval call; never persisted.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub text: String,
    pub score: f64,
    pub position: i64,
    pub file_path: String,
}

/// Outcome tier of a retrieval or refinement call.
///
/// Distinguishes "empty but successful" from "degraded by an absorbed
/// external failure" so callers never have to guess from the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalStatus {
    /// At least one relevant passage was found.
    Found,
    /// The query completed but nothing qualified. Not an error.
    Empty,
    /// An external service failed; the result was downgraded rather than
    /// propagating the error.
    Degraded,
}

/// The externally visible output of both the retriever and refiner stages.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    /// Combined excerpt text. May be empty.
    pub text: String,
    /// Unique, non-empty source paths of the contributing documents.
    pub files: BTreeSet<String>,
    pub status: RetrievalStatus,
}

impl RetrievalResult {
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            files: BTreeSet::new(),
            status: RetrievalStatus::Empty,
        }
    }

    /// Degraded result carrying `text` (possibly empty) and no files.
    pub fn degraded(text: String) -> Self {
        Self {
            text,
            files: BTreeSet::new(),
            status: RetrievalStatus::Degraded,
        }
    }
}

/// Fatal ingestion-side failures.
///
/// Extraction failures are *not* represented here: malformed documents are
/// contained per extractor and yield an empty text sequence instead.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("input file not found: {0}")]
    InputMissing(PathBuf),
    #[error("embedding failed: {0}")]
    Embedding(#[source] anyhow::Error),
    #[error("vector store write failed: {0}")]
    Store(#[source] anyhow::Error),
}
