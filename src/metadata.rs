//! Chunk metadata generation.
//!
//! Derives descriptive metadata and keyword tags for a chunk at insertion
//! time. Generation is deterministic over its inputs and never fails:
//! keyword-extraction errors are contained and replaced with literal
//! `"default"` placeholders so ingestion can always proceed.

use chrono::Utc;

use crate::keywords::KeywordExtractor;
use crate::models::ChunkMetadata;

/// Placeholder written into tag fields when keyword extraction fails.
const PLACEHOLDER: &str = "default";

/// Number of keyword phrases requested per chunk.
const KEYWORD_TOP_N: usize = 5;

/// How many of those phrases become collection tags.
const COLLECTION_TAG_COUNT: usize = 2;

/// Generate metadata for one chunk.
///
/// Requests the top-5 keyword phrases (1–2-grams, stop-words removed); the
/// first 2 become `collection_tags` and all 5, lower-cased and
/// comma-joined, become `keyword_tags`.
pub fn generate_metadata(
    extractor: &dyn KeywordExtractor,
    chunk_text: &str,
    doc_name: &str,
    owner_name: &str,
    file_path: &str,
    document_type: &str,
    position: i64,
) -> ChunkMetadata {
    let title = doc_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(doc_name)
        .to_string();

    let (collection_tags, keyword_tags) =
        match extractor.extract(chunk_text, (1, 2), KEYWORD_TOP_N) {
            Ok(keywords) if !keywords.is_empty() => {
                let phrases: Vec<String> = keywords
                    .into_iter()
                    .map(|(phrase, _)| phrase.to_lowercase())
                    .collect();
                (
                    phrases[..phrases.len().min(COLLECTION_TAG_COUNT)].join(", "),
                    phrases.join(", "),
                )
            }
            Ok(_) => (PLACEHOLDER.to_string(), PLACEHOLDER.to_string()),
            Err(e) => {
                tracing::error!(doc = doc_name, error = %e, "keyword extraction failed");
                (PLACEHOLDER.to_string(), PLACEHOLDER.to_string())
            }
        };

    ChunkMetadata {
        title,
        author: owner_name.to_string(),
        creation_date: Utc::now().format("%Y-%m-%d").to_string(),
        collection_tags,
        keyword_tags,
        file_path: file_path.to_string(),
        document_type: document_type.to_string(),
        position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keywords::NgramExtractor;
    use anyhow::bail;

    struct FailingExtractor;

    impl KeywordExtractor for FailingExtractor {
        fn extract(
            &self,
            _text: &str,
            _ngram_range: (usize, usize),
            _top_n: usize,
        ) -> anyhow::Result<Vec<(String, f32)>> {
            bail!("extractor backend unavailable")
        }
    }

    #[test]
    fn test_title_drops_extension() {
        let extractor = NgramExtractor::default();
        let meta = generate_metadata(
            &extractor,
            "Evidência registrada no laudo pericial completo.",
            "laudo-pericial.pdf",
            "Maria Souza",
            "/cases/maria/laudo-pericial.pdf",
            "pdf",
            0,
        );
        assert_eq!(meta.title, "laudo-pericial");
        assert_eq!(meta.author, "Maria Souza");
        assert_eq!(meta.document_type, "pdf");
    }

    #[test]
    fn test_tags_are_lowercase_comma_joined() {
        let extractor = NgramExtractor::default();
        let meta = generate_metadata(
            &extractor,
            "Taxa de amostragem: 44100 Hz. Taxa de amostragem alta no sinal.",
            "audio.wav",
            "owner",
            "/files/audio.wav",
            "audio",
            3,
        );
        assert!(!meta.keyword_tags.is_empty());
        assert_eq!(meta.keyword_tags, meta.keyword_tags.to_lowercase());
        let keywords: Vec<&str> = meta.keyword_tags.split(',').map(str::trim).collect();
        assert!(keywords.len() <= 5);
        let collections: Vec<&str> = meta.collection_tags.split(',').map(str::trim).collect();
        assert!(collections.len() <= 2);
        // Collection tags are a prefix of the keyword tags.
        for (c, k) in collections.iter().zip(keywords.iter()) {
            assert_eq!(c, k);
        }
        assert_eq!(meta.position, 3);
    }

    #[test]
    fn test_extraction_failure_yields_placeholders() {
        let meta = generate_metadata(
            &FailingExtractor,
            "any chunk text",
            "doc.txt",
            "owner",
            "/files/doc.txt",
            "text",
            0,
        );
        assert_eq!(meta.keyword_tags, "default");
        assert_eq!(meta.collection_tags, "default");
        assert_eq!(meta.title, "doc");
    }

    #[test]
    fn test_empty_text_yields_placeholders() {
        let extractor = NgramExtractor::default();
        let meta = generate_metadata(&extractor, "", "doc.txt", "owner", "", "text", 0);
        assert_eq!(meta.keyword_tags, "default");
    }

    #[test]
    fn test_creation_date_format() {
        let extractor = NgramExtractor::default();
        let meta = generate_metadata(&extractor, "text body", "doc.txt", "o", "", "text", 0);
        let parts: Vec<&str> = meta.creation_date.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 4);
    }
}
