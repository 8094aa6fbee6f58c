//! End-to-end pipeline tests: ingest a document from disk, then retrieve
//! and refine excerpts through the public API.

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use dossier::embedding::Embedder;
use dossier::extract::ExtractorRegistry;
use dossier::ingest::ingest_file;
use dossier::keywords::NgramExtractor;
use dossier::models::RetrievalStatus;
use dossier::refine::refine_snippet;
use dossier::retrieve::get_snippet;
use dossier::store::SubjectStore;

/// Deterministic embedder: hashed bag of words over a fixed dimension.
///
/// Identical texts get identical vectors, so an ingested chunk self-matches
/// its own text at distance 0 and word overlap still yields proximity.
struct BagOfWordsEmbedder;

const DIM: usize = 64;

impl BagOfWordsEmbedder {
    fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIM];
        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let idx = word.bytes().map(|b| b as usize).sum::<usize>() % DIM;
            v[idx] += 1.0;
        }
        v
    }
}

#[async_trait]
impl Embedder for BagOfWordsEmbedder {
    fn model_name(&self) -> &str {
        "bag-of-words"
    }

    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::vector(text))
    }

    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

const REPORT: &str = "A testemunha afirmou ter visto Maria na estação rodoviária. \
Ela carregava uma mochila vermelha e parecia apressada. \
O bilhete encontrado no guichê indicava um destino no litoral. \
Nenhuma câmera da estação registrou o embarque.";

async fn ingest_report(tmp: &TempDir) -> SubjectStore {
    let doc = tmp.path().join("relatorio.txt");
    std::fs::write(&doc, REPORT).unwrap();

    let store = SubjectStore::open(tmp.path(), "Maria Souza").await.unwrap();
    let summary = ingest_file(
        &store,
        &doc,
        "Maria Souza",
        &ExtractorRegistry::new(),
        &NgramExtractor::default(),
        &BagOfWordsEmbedder,
        120,
        32,
    )
    .await
    .unwrap();
    assert!(summary.chunks >= 2, "report should split into several chunks");
    store
}

#[tokio::test]
async fn test_ingest_then_search_self_match() {
    let tmp = TempDir::new().unwrap();
    let store = ingest_report(&tmp).await;
    let collection = store.collection("relatorio.txt");

    // The query is a literal substring of one chunk, so it is admitted
    // even independently of the embedding score.
    let result = get_snippet(
        &collection,
        "mochila vermelha",
        &BagOfWordsEmbedder,
        &NgramExtractor::default(),
        800,
    )
    .await;

    assert_eq!(result.status, RetrievalStatus::Found);
    assert!(result.text.contains("mochila vermelha"));
    assert_eq!(result.files.len(), 1);
    assert!(result.files.iter().next().unwrap().ends_with("relatorio.txt"));
}

#[tokio::test]
async fn test_search_unrelated_query_is_empty() {
    let tmp = TempDir::new().unwrap();
    let store = ingest_report(&tmp).await;
    let collection = store.collection("relatorio.txt");

    let result = get_snippet(
        &collection,
        "zyx qwv jkl",
        &BagOfWordsEmbedder,
        &NgramExtractor::default(),
        800,
    )
    .await;

    assert_eq!(result.status, RetrievalStatus::Empty);
    assert!(result.text.is_empty());
    assert!(result.files.is_empty());
}

#[tokio::test]
async fn test_search_then_refine_produces_bounded_context() {
    let tmp = TempDir::new().unwrap();
    let store = ingest_report(&tmp).await;
    let collection = store.collection("relatorio.txt");

    let retrieved = get_snippet(
        &collection,
        "estação rodoviária",
        &BagOfWordsEmbedder,
        &NgramExtractor::default(),
        800,
    )
    .await;
    assert_eq!(retrieved.status, RetrievalStatus::Found);

    let refined = refine_snippet(&collection, &retrieved.text, &BagOfWordsEmbedder).await;
    assert_eq!(refined.status, RetrievalStatus::Found);
    assert!(!refined.text.is_empty());
    assert!(refined.text.chars().count() <= 2000);
}

#[tokio::test]
async fn test_missing_collection_searches_empty() {
    let tmp = TempDir::new().unwrap();
    let store = SubjectStore::open(tmp.path(), "s").await.unwrap();
    let collection = store.collection("nunca-ingerido.pdf");

    let result = get_snippet(
        &collection,
        "qualquer consulta",
        &BagOfWordsEmbedder,
        &NgramExtractor::default(),
        800,
    )
    .await;
    assert_eq!(result.status, RetrievalStatus::Empty);
}
