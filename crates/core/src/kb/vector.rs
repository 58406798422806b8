//! Embedding-backed nearest-neighbor retrieval.
//!
//! The index is a flat squared-L2 scan over one vector per knowledge record,
//! built once at startup and persisted as an opaque cache file. The cache is
//! safe to delete at any time; it is rebuilt whenever it is absent, unreadable,
//! or inconsistent with the loaded store.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::{KnowledgeBase, KnowledgeRecord, Retriever};

/// Outbound contract to the embedding backend: encode texts into fixed-length
/// vectors. Implemented over HTTP in `cardbot-agent`.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding backend transport failure: {0}")]
    Transport(String),
    #[error("embedding backend returned a malformed response: {0}")]
    MalformedResponse(String),
    #[error("embedding backend returned {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },
}

/// Flat in-memory nearest-neighbor index, one row per knowledge record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VectorIndex {
    dim: usize,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    pub fn from_vectors(vectors: Vec<Vec<f32>>) -> Self {
        let dim = vectors.first().map(Vec::len).unwrap_or(0);
        Self { dim, vectors }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Row indices ordered by ascending squared-L2 distance to `query`,
    /// truncated to `k`. Ties keep row order (stable sort).
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        if k == 0 || self.vectors.is_empty() || query.len() != self.dim {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(row, vector)| (row, squared_l2(query, vector)))
            .collect();

        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    /// Persist the index cache. Failure to write is non-fatal for the caller:
    /// the in-memory index remains usable for the rest of the process.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_vec(self).map_err(std::io::Error::other)?;
        fs::write(path, raw)
    }

    /// Load a previously persisted index, or `None` when the cache is absent
    /// or unreadable.
    pub fn load(path: &Path) -> Option<Self> {
        let raw = fs::read(path).ok()?;
        serde_json::from_slice(&raw).ok()
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Nearest-neighbor retriever over record embeddings.
pub struct VectorRetriever {
    store: KnowledgeBase,
    index: VectorIndex,
    client: Arc<dyn EmbeddingClient>,
}

impl VectorRetriever {
    /// Build the retriever: reuse the persisted index when it is consistent
    /// with the store, otherwise embed every record and rewrite the cache.
    pub async fn build(
        store: KnowledgeBase,
        client: Arc<dyn EmbeddingClient>,
        index_path: &Path,
    ) -> Result<Self, EmbeddingError> {
        if store.is_empty() {
            return Ok(Self { store, index: VectorIndex::from_vectors(Vec::new()), client });
        }

        if let Some(index) = VectorIndex::load(index_path) {
            if index.len() == store.len() {
                info!(
                    event_name = "kb.index.cache_reused",
                    path = %index_path.display(),
                    rows = index.len(),
                    "reusing persisted vector index"
                );
                return Ok(Self { store, index, client });
            }
            warn!(
                event_name = "kb.index.cache_stale",
                path = %index_path.display(),
                cached_rows = index.len(),
                store_rows = store.len(),
                "persisted vector index does not match store, rebuilding"
            );
        }

        let texts: Vec<String> = store
            .records()
            .iter()
            .map(|record| format!("{} {}", record.q, record.answer).trim().to_string())
            .collect();
        let vectors = client.embed(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch { expected: texts.len(), got: vectors.len() });
        }

        let index = VectorIndex::from_vectors(vectors);
        if let Err(error) = index.save(index_path) {
            warn!(
                event_name = "kb.index.cache_write_failed",
                path = %index_path.display(),
                error = %error,
                "could not persist vector index, continuing in-memory"
            );
        }

        Ok(Self { store, index, client })
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn get_relevant(&self, query: &str, top_k: usize) -> Vec<KnowledgeRecord> {
        if top_k == 0 || self.store.is_empty() {
            return Vec::new();
        }

        let query_vector = match self.client.embed(&[query.to_string()]).await {
            Ok(mut vectors) if !vectors.is_empty() => vectors.remove(0),
            Ok(_) => return Vec::new(),
            Err(error) => {
                warn!(
                    event_name = "kb.retrieve.embed_failed",
                    error = %error,
                    "query embedding failed, returning no contexts"
                );
                return Vec::new();
            }
        };

        self.index
            .search(&query_vector, top_k)
            .into_iter()
            .filter_map(|(row, _)| self.store.records().get(row).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::{EmbeddingClient, EmbeddingError, VectorIndex, VectorRetriever};
    use crate::kb::{KnowledgeBase, KnowledgeRecord, Retriever};

    /// Deterministic stand-in backend: the vector is derived from text length
    /// and vowel count, so similar strings land close together.
    struct FakeEmbeddings {
        calls: AtomicUsize,
    }

    impl FakeEmbeddings {
        fn new() -> Self {
            Self { calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl EmbeddingClient for FakeEmbeddings {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|text| {
                    let vowels =
                        text.chars().filter(|c| "aeiou".contains(c.to_ascii_lowercase())).count();
                    vec![text.len() as f32, vowels as f32]
                })
                .collect())
        }
    }

    struct FailingEmbeddings;

    #[async_trait]
    impl EmbeddingClient for FailingEmbeddings {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::Transport("connection refused".to_string()))
        }
    }

    fn store_fixture() -> KnowledgeBase {
        KnowledgeBase::new(vec![
            KnowledgeRecord { q: "alpha".to_string(), answer: "a".to_string() },
            KnowledgeRecord { q: "beta beta".to_string(), answer: "b".to_string() },
            KnowledgeRecord { q: "gamma gamma gamma".to_string(), answer: "c".to_string() },
        ])
    }

    #[test]
    fn search_orders_by_ascending_distance() {
        let index = VectorIndex::from_vectors(vec![
            vec![0.0, 0.0],
            vec![3.0, 4.0],
            vec![1.0, 1.0],
        ]);
        assert_eq!(index.dim(), 2);
        assert!(!index.is_empty());

        let hits = index.search(&[0.0, 0.0], 3);
        assert_eq!(hits.iter().map(|(row, _)| *row).collect::<Vec<_>>(), vec![0, 2, 1]);
        assert_eq!(hits[2].1, 25.0);
    }

    #[test]
    fn empty_index_reports_zero_dimension() {
        let index = VectorIndex::from_vectors(Vec::new());
        assert!(index.is_empty());
        assert_eq!(index.dim(), 0);
        assert!(index.search(&[], 3).is_empty());
    }

    #[test]
    fn search_with_wrong_dimension_returns_empty() {
        let index = VectorIndex::from_vectors(vec![vec![1.0, 2.0]]);
        assert!(index.search(&[1.0], 3).is_empty());
    }

    #[tokio::test]
    async fn build_persists_index_and_reuses_cache() {
        let dir = TempDir::new().expect("tempdir");
        let index_path = dir.path().join("index.json");
        let client = Arc::new(FakeEmbeddings::new());

        let _first = VectorRetriever::build(store_fixture(), client.clone(), &index_path)
            .await
            .expect("first build");
        assert!(index_path.exists(), "cache file should be written on first build");
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);

        let _second = VectorRetriever::build(store_fixture(), client.clone(), &index_path)
            .await
            .expect("second build");
        assert_eq!(
            client.calls.load(Ordering::SeqCst),
            1,
            "cached index should be reused without re-embedding"
        );
    }

    #[tokio::test]
    async fn unreadable_cache_triggers_rebuild() {
        let dir = TempDir::new().expect("tempdir");
        let index_path = dir.path().join("index.json");
        fs::write(&index_path, b"not json at all").expect("write garbage cache");

        let client = Arc::new(FakeEmbeddings::new());
        let retriever = VectorRetriever::build(store_fixture(), client.clone(), &index_path)
            .await
            .expect("build should rebuild over garbage cache");

        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
        assert_eq!(retriever.index.len(), 3);
    }

    #[tokio::test]
    async fn stale_cache_row_count_triggers_rebuild() {
        let dir = TempDir::new().expect("tempdir");
        let index_path = dir.path().join("index.json");
        VectorIndex::from_vectors(vec![vec![1.0, 1.0]]).save(&index_path).expect("seed stale cache");

        let client = Arc::new(FakeEmbeddings::new());
        let retriever = VectorRetriever::build(store_fixture(), client, &index_path)
            .await
            .expect("build should rebuild stale cache");

        assert_eq!(retriever.index.len(), 3);
        let reloaded = VectorIndex::load(&index_path).expect("cache should be rewritten");
        assert_eq!(reloaded.len(), 3);
    }

    #[tokio::test]
    async fn retrieval_returns_nearest_records_first() {
        let dir = TempDir::new().expect("tempdir");
        let retriever = VectorRetriever::build(
            store_fixture(),
            Arc::new(FakeEmbeddings::new()),
            &dir.path().join("index.json"),
        )
        .await
        .expect("build");

        let results = retriever.get_relevant("alpha", 2).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].q, "alpha");
    }

    #[tokio::test]
    async fn per_query_embed_failure_degrades_to_empty() {
        let dir = TempDir::new().expect("tempdir");
        // Build with a working backend, then swap in a failing one for queries.
        let built = VectorRetriever::build(
            store_fixture(),
            Arc::new(FakeEmbeddings::new()),
            &dir.path().join("index.json"),
        )
        .await
        .expect("build");
        let retriever = VectorRetriever {
            store: built.store,
            index: built.index,
            client: Arc::new(FailingEmbeddings),
        };

        assert!(retriever.get_relevant("alpha", 3).await.is_empty());
    }

    #[tokio::test]
    async fn empty_store_skips_backend_entirely() {
        let dir = TempDir::new().expect("tempdir");
        let retriever = VectorRetriever::build(
            KnowledgeBase::default(),
            Arc::new(FailingEmbeddings),
            &dir.path().join("index.json"),
        )
        .await
        .expect("empty store must not touch the backend");

        assert!(retriever.get_relevant("anything", 3).await.is_empty());
    }
}
