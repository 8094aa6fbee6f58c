//! Per-subject vector store backed by SQLite.
//!
//! Each case subject owns one database file under the storage root; inside
//! it, every ingested source document gets a named collection of
//! (id, chunk text, metadata, embedding) tuples. Embeddings are stored as
//! little-endian f32 BLOBs and nearest-neighbor queries compute cosine
//! distance in process, so the store needs no SQLite extensions.

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use crate::models::ChunkMetadata;
use crate::sanitize::sanitize_collection_name;

/// A single nearest-neighbor result.
#[derive(Debug, Clone)]
pub struct QueryHit {
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Cosine distance from the query embedding; 0 means identical.
    pub distance: f64,
}

/// Metadata filter applied during a nearest-neighbor query.
#[derive(Debug, Clone)]
pub enum QueryFilter {
    /// Drop chunks whose `document_type` equals the given value.
    ExcludeDocumentType(String),
}

impl QueryFilter {
    fn admits(&self, metadata: &ChunkMetadata) -> bool {
        match self {
            QueryFilter::ExcludeDocumentType(t) => metadata.document_type != *t,
        }
    }
}

/// Handle to one subject's persistent store.
pub struct SubjectStore {
    pool: SqlitePool,
}

impl SubjectStore {
    /// Open (creating if necessary) the store for `subject` under `root`.
    ///
    /// The database lives at `<root>/<sanitized-subject>/dossier.db`.
    pub async fn open(root: &Path, subject: &str) -> Result<Self> {
        let dir = root.join(sanitize_collection_name(subject));
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create store directory {}", dir.display()))?;
        let db_path = dir.join("dossier.db");

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id            TEXT PRIMARY KEY,
                collection    TEXT NOT NULL,
                text          TEXT NOT NULL,
                metadata_json TEXT NOT NULL,
                embedding     BLOB NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_collection ON chunks(collection)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    /// Handle for the collection holding one source document's chunks.
    ///
    /// `document_name` is sanitized into the collection identifier.
    pub fn collection(&self, document_name: &str) -> Collection {
        Collection {
            pool: self.pool.clone(),
            name: sanitize_collection_name(document_name),
        }
    }

    /// Names of all collections in this store, sorted.
    pub async fn list_collections(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT collection FROM chunks ORDER BY collection")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get("collection")).collect())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// A named collection of embedded chunks scoped to one source document.
pub struct Collection {
    pool: SqlitePool,
    name: String,
}

impl Collection {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of chunks stored in this collection.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE collection = ?")
            .bind(&self.name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Insert one chunk. Re-inserting an existing id replaces it, so
    /// re-ingesting a document is idempotent.
    pub async fn insert(
        &self,
        id: &str,
        text: &str,
        metadata: &ChunkMetadata,
        embedding: &[f32],
    ) -> Result<()> {
        let metadata_json = serde_json::to_string(metadata)?;
        sqlx::query(
            r#"
            INSERT INTO chunks (id, collection, text, metadata_json, embedding)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                text = excluded.text,
                metadata_json = excluded.metadata_json,
                embedding = excluded.embedding
            "#,
        )
        .bind(id)
        .bind(&self.name)
        .bind(text)
        .bind(metadata_json)
        .bind(vec_to_blob(embedding))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Nearest-neighbor query by cosine distance.
    ///
    /// Fetches the collection's vectors, scores them in process, applies
    /// the optional metadata filter, and returns the `top_k` closest hits
    /// ordered by ascending distance.
    pub async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&QueryFilter>,
    ) -> Result<Vec<QueryHit>> {
        let rows = sqlx::query("SELECT text, metadata_json, embedding FROM chunks WHERE collection = ?")
            .bind(&self.name)
            .fetch_all(&self.pool)
            .await?;

        let mut hits: Vec<QueryHit> = Vec::with_capacity(rows.len());
        for row in &rows {
            let metadata_json: String = row.get("metadata_json");
            let metadata: ChunkMetadata = serde_json::from_str(&metadata_json)
                .with_context(|| format!("corrupt chunk metadata in collection {}", self.name))?;

            if let Some(f) = filter {
                if !f.admits(&metadata) {
                    continue;
                }
            }

            let blob: Vec<u8> = row.get("embedding");
            let distance = cosine_distance(embedding, &blob_to_vec(&blob));
            hits.push(QueryHit {
                text: row.get("text"),
                metadata,
                distance,
            });
        }

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }
}
