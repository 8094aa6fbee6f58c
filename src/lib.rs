//! Dossier: local-first ingestion and retrieval over case documents.
//!
//! Ingests heterogeneous documents (PDF, DOCX, spreadsheets, images, audio,
//! plain text) belonging to named case subjects, chunks and embeds their
//! text into a per-subject SQLite vector store, and answers free-text
//! queries with ranked, windowed excerpts that can ground an LLM answer.
//!
//! Pipeline shape:
//!
//! ```text
//! file --extract--> segments --chunk--> chunks --metadata/embed--> store
//! query --embed--> nearest chunks --score/window--> snippet --refine--> context
//! ```

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod ingest;
pub mod keywords;
pub mod llm;
pub mod metadata;
pub mod models;
pub mod refine;
pub mod retrieve;
pub mod sanitize;
pub mod store;
