//! Knowledge base loading and retrieval.
//!
//! The store is loaded once at process start and read-only afterwards. Two
//! retriever implementations share the same contract: most-relevant-first,
//! ties broken by load order, `min(top_k, store size)` results, and an empty
//! store always answers with an empty slice rather than an error.

pub mod vector;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One question/answer pair from the knowledge source file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    pub q: String,
    pub answer: String,
}

/// Immutable collection of knowledge records, in load order.
#[derive(Clone, Debug, Default)]
pub struct KnowledgeBase {
    records: Arc<Vec<KnowledgeRecord>>,
}

impl KnowledgeBase {
    pub fn new(records: Vec<KnowledgeRecord>) -> Self {
        Self { records: Arc::new(records) }
    }

    /// Load the knowledge source file. A missing or unreadable file yields an
    /// empty store; every query then returns an empty result set.
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) => {
                warn!(
                    event_name = "kb.load.missing_source",
                    path = %path.display(),
                    error = %error,
                    "knowledge source not readable, starting with empty store"
                );
                return Self::default();
            }
        };

        match serde_json::from_str::<Vec<KnowledgeRecord>>(&raw) {
            Ok(records) => Self::new(records),
            Err(error) => {
                warn!(
                    event_name = "kb.load.malformed_source",
                    path = %path.display(),
                    error = %error,
                    "knowledge source malformed, starting with empty store"
                );
                Self::default()
            }
        }
    }

    pub fn records(&self) -> &[KnowledgeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Ranking lookup over the knowledge store. Implementation selection happens
/// once at composition time, not per query.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn get_relevant(&self, query: &str, top_k: usize) -> Vec<KnowledgeRecord>;
}

/// Character-level similarity fallback with no external dependency.
///
/// Similarity is a normalized longest-common-subsequence ratio over the
/// lowercased query and stored question: `2 * lcs / (|a| + |b|)`. Symmetric,
/// in [0, 1], and 1.0 only for identical strings.
#[derive(Clone, Debug, Default)]
pub struct LexicalRetriever {
    store: KnowledgeBase,
}

impl LexicalRetriever {
    pub fn new(store: KnowledgeBase) -> Self {
        Self { store }
    }

    pub fn rank(&self, query: &str, top_k: usize) -> Vec<KnowledgeRecord> {
        if top_k == 0 || self.store.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(f64, &KnowledgeRecord)> = self
            .store
            .records()
            .iter()
            .map(|record| (match_ratio(query, &record.q), record))
            .collect();

        // Stable sort keeps load order for equal scores.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored.into_iter().map(|(_, record)| record.clone()).collect()
    }
}

#[async_trait]
impl Retriever for LexicalRetriever {
    async fn get_relevant(&self, query: &str, top_k: usize) -> Vec<KnowledgeRecord> {
        self.rank(query, top_k)
    }
}

/// Normalized character-sequence match ratio between two strings, compared
/// case-insensitively.
pub fn match_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    2.0 * f64::from(lcs_length(&a, &b)) / total as f64
}

fn lcs_length(a: &[char], b: &[char]) -> u32 {
    // Single-row dynamic program; KB questions are short so O(n*m) is fine.
    let mut row = vec![0u32; b.len() + 1];

    for &ca in a {
        let mut diagonal = 0u32;
        for (j, &cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == cb { diagonal + 1 } else { above.max(row[j]) };
            diagonal = above;
        }
    }

    row[b.len()]
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::{match_ratio, KnowledgeBase, KnowledgeRecord, LexicalRetriever, Retriever};

    fn store_fixture() -> KnowledgeBase {
        KnowledgeBase::new(vec![
            KnowledgeRecord {
                q: "How do I pay my credit card bill?".to_string(),
                answer: "Use the pay_bill action or your bank's portal.".to_string(),
            },
            KnowledgeRecord {
                q: "Where is my new card?".to_string(),
                answer: "Card delivery can be tracked with track_card.".to_string(),
            },
            KnowledgeRecord {
                q: "What is my credit limit?".to_string(),
                answer: "Your limit is shown in the mobile app.".to_string(),
            },
        ])
    }

    #[test]
    fn missing_source_file_yields_empty_store() {
        let dir = TempDir::new().expect("tempdir");
        let store = KnowledgeBase::load(&dir.path().join("absent.json"));
        assert!(store.is_empty());
    }

    #[test]
    fn source_file_round_trips_in_load_order() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("kb.json");
        fs::write(
            &path,
            r#"[{"q": "first question", "answer": "a1"}, {"q": "second question", "answer": "a2"}]"#,
        )
        .expect("write kb");

        let store = KnowledgeBase::load(&path);
        assert_eq!(store.len(), 2);
        assert_eq!(store.records()[0].q, "first question");
        assert_eq!(store.records()[1].q, "second question");
    }

    #[test]
    fn match_ratio_is_symmetric_and_bounded() {
        let pairs = [("pay my bill", "How do I pay my bill?"), ("card", "credit card"), ("", "x")];
        for (a, b) in pairs {
            let forward = match_ratio(a, b);
            let backward = match_ratio(b, a);
            assert!((forward - backward).abs() < 1e-12, "ratio should be symmetric");
            assert!((0.0..=1.0).contains(&forward), "ratio should stay in [0, 1]");
        }
        assert_eq!(match_ratio("Credit Card", "credit card"), 1.0);
    }

    #[tokio::test]
    async fn empty_store_returns_empty_for_any_query() {
        let retriever = LexicalRetriever::new(KnowledgeBase::default());
        assert!(retriever.get_relevant("anything", 3).await.is_empty());
    }

    #[tokio::test]
    async fn zero_top_k_returns_empty() {
        let retriever = LexicalRetriever::new(store_fixture());
        assert!(retriever.get_relevant("pay my bill", 0).await.is_empty());
    }

    #[tokio::test]
    async fn oversized_top_k_returns_full_store_ranked() {
        let retriever = LexicalRetriever::new(store_fixture());
        let results = retriever.get_relevant("how do I pay my credit card bill", 10).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].q, "How do I pay my credit card bill?");
    }

    #[tokio::test]
    async fn ranking_is_stable_across_runs() {
        let retriever = LexicalRetriever::new(store_fixture());
        let first = retriever.get_relevant("credit card", 3).await;
        let second = retriever.get_relevant("credit card", 3).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn equal_scores_break_ties_by_load_order() {
        let store = KnowledgeBase::new(vec![
            KnowledgeRecord { q: "same question".to_string(), answer: "first".to_string() },
            KnowledgeRecord { q: "same question".to_string(), answer: "second".to_string() },
        ]);
        let retriever = LexicalRetriever::new(store);

        let results = retriever.get_relevant("same question", 2).await;
        assert_eq!(results[0].answer, "first");
        assert_eq!(results[1].answer, "second");
    }
}
