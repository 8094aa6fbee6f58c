//! Document ingestion pipeline: extract, chunk, annotate, embed, store.
//!
//! One source file becomes one collection named after the sanitized file
//! name. Chunk ids follow `{collection}chunk{segment_idx}{chunk_idx}` so
//! re-ingesting the same file overwrites its previous chunks in place.

use std::path::Path;

use crate::chunk::split_into_chunks;
use crate::embedding::Embedder;
use crate::extract::ExtractorRegistry;
use crate::keywords::KeywordExtractor;
use crate::metadata::generate_metadata;
use crate::models::IngestError;
use crate::store::SubjectStore;

/// What one ingestion run produced.
#[derive(Debug)]
pub struct IngestSummary {
    /// Sanitized collection the chunks were written to.
    pub collection: String,
    /// Extractor kind that handled the file.
    pub document_type: String,
    /// Text segments the extractor produced.
    pub segments: usize,
    /// Chunks embedded and stored.
    pub chunks: usize,
}

/// Ingest one file into `store` for `subject`.
///
/// A missing input file fails fast. Extraction failures are contained
/// upstream and reach this function as an empty segment list, which is a
/// successful run with zero chunks.
#[allow(clippy::too_many_arguments)]
pub async fn ingest_file(
    store: &SubjectStore,
    path: &Path,
    subject: &str,
    registry: &ExtractorRegistry,
    keywords: &dyn KeywordExtractor,
    embedder: &dyn Embedder,
    max_chunk_size: usize,
    batch_size: usize,
) -> Result<IngestSummary, IngestError> {
    if !path.exists() {
        return Err(IngestError::InputMissing(path.to_path_buf()));
    }

    let doc_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document")
        .to_string();
    let file_path = path.display().to_string();

    let (document_type, segments) = registry.extract(path);
    let collection = store.collection(&doc_name);

    tracing::info!(
        file = file_path.as_str(),
        collection = collection.name(),
        kind = document_type.as_str(),
        segments = segments.len(),
        "ingesting document"
    );

    let mut stored = 0usize;

    for (segment_idx, segment) in segments.iter().enumerate() {
        let chunks = split_into_chunks(segment, max_chunk_size);
        if chunks.is_empty() {
            continue;
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size.max(1)) {
            let batch_embeddings = embedder
                .encode_batch(batch)
                .await
                .map_err(IngestError::Embedding)?;
            embeddings.extend(batch_embeddings);
        }

        for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
            let metadata = generate_metadata(
                keywords,
                &chunk.text,
                &doc_name,
                subject,
                &file_path,
                &document_type,
                chunk.position,
            );
            let id = format!(
                "{}chunk{}{}",
                collection.name(),
                segment_idx,
                chunk.position
            );
            collection
                .insert(&id, &chunk.text, &metadata, embedding)
                .await
                .map_err(IngestError::Store)?;
            stored += 1;
        }
    }

    Ok(IngestSummary {
        collection: collection.name().to_string(),
        document_type,
        segments: segments.len(),
        chunks: stored,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keywords::NgramExtractor;
    use anyhow::Result;
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Deterministic embedder: vector derived from character counts.
    struct CountingEmbedder;

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn model_name(&self) -> &str {
            "counting"
        }

        async fn encode(&self, text: &str) -> Result<Vec<f32>> {
            let len = text.chars().count() as f32;
            Ok(vec![1.0, len / (len + 1.0)])
        }

        async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::with_capacity(texts.len());
            for t in texts {
                out.push(self.encode(t).await?);
            }
            Ok(out)
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "failing"
        }

        async fn encode(&self, _text: &str) -> Result<Vec<f32>> {
            anyhow::bail!("service unavailable")
        }

        async fn encode_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            anyhow::bail!("service unavailable")
        }
    }

    #[tokio::test]
    async fn test_missing_input_fails_fast() {
        let tmp = TempDir::new().unwrap();
        let store = SubjectStore::open(tmp.path(), "s").await.unwrap();
        let err = ingest_file(
            &store,
            Path::new("/nonexistent/depoimento.txt"),
            "s",
            &ExtractorRegistry::new(),
            &NgramExtractor::default(),
            &CountingEmbedder,
            1000,
            32,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, IngestError::InputMissing(_)));
    }

    #[tokio::test]
    async fn test_text_file_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let doc = tmp.path().join("depoimento.txt");
        std::fs::write(
            &doc,
            "A testemunha viu o suspeito na praça central. Ele vestia uma jaqueta azul.",
        )
        .unwrap();

        let store = SubjectStore::open(tmp.path(), "Maria Souza").await.unwrap();
        let summary = ingest_file(
            &store,
            &doc,
            "Maria Souza",
            &ExtractorRegistry::new(),
            &NgramExtractor::default(),
            &CountingEmbedder,
            1000,
            32,
        )
        .await
        .unwrap();

        assert_eq!(summary.collection, "depoimento_txt");
        assert_eq!(summary.document_type, "text");
        assert_eq!(summary.segments, 1);
        assert_eq!(summary.chunks, 1);

        let col = store.collection("depoimento.txt");
        assert_eq!(col.count().await.unwrap(), 1);
        let hits = col.query(&[1.0, 0.5], 1, None).await.unwrap();
        assert!(hits[0].text.contains("jaqueta azul"));
        assert_eq!(hits[0].metadata.author, "Maria Souza");
        assert_eq!(hits[0].metadata.title, "depoimento");
        assert_eq!(hits[0].metadata.document_type, "text");
    }

    #[tokio::test]
    async fn test_chunk_ids_make_reingestion_idempotent() {
        let tmp = TempDir::new().unwrap();
        let doc = tmp.path().join("nota.txt");
        std::fs::write(&doc, "Primeira frase. Segunda frase.").unwrap();

        let store = SubjectStore::open(tmp.path(), "s").await.unwrap();
        for _ in 0..2 {
            ingest_file(
                &store,
                &doc,
                "s",
                &ExtractorRegistry::new(),
                &NgramExtractor::default(),
                &CountingEmbedder,
                20,
                32,
            )
            .await
            .unwrap();
        }

        let col = store.collection("nota.txt");
        assert_eq!(col.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unreadable_document_ingests_zero_chunks() {
        let tmp = TempDir::new().unwrap();
        let doc = tmp.path().join("quebrado.docx");
        std::fs::write(&doc, b"not a zip").unwrap();

        let store = SubjectStore::open(tmp.path(), "s").await.unwrap();
        let summary = ingest_file(
            &store,
            &doc,
            "s",
            &ExtractorRegistry::new(),
            &NgramExtractor::default(),
            &CountingEmbedder,
            1000,
            32,
        )
        .await
        .unwrap();
        assert_eq!(summary.chunks, 0);
        assert_eq!(summary.document_type, "docx");
    }

    #[tokio::test]
    async fn test_embedding_failure_is_typed() {
        let tmp = TempDir::new().unwrap();
        let doc = tmp.path().join("nota.txt");
        std::fs::write(&doc, "Conteúdo qualquer.").unwrap();

        let store = SubjectStore::open(tmp.path(), "s").await.unwrap();
        let err = ingest_file(
            &store,
            &doc,
            "s",
            &ExtractorRegistry::new(),
            &NgramExtractor::default(),
            &FailingEmbedder,
            1000,
            32,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, IngestError::Embedding(_)));
    }
}
