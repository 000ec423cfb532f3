//! Semantic index over `(id, text)` entries
//!
//! Vectors are L2-normalised at build time so cosine similarity reduces to a
//! dot product. Two indexes built from the same fingerprint hold the same
//! entries in the same order and therefore rank identically; this is what
//! makes sharing them through [`IndexCache`] and [`IndexStore`] valid.

mod cache;
mod store;

pub use cache::IndexCache;
pub use store::{FileIndexStore, IndexStore};

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use crate::agents::error::{EmbeddingError, RouterError, RouterResult};
use crate::domain::EmbeddingProvider;

/// Embedding calls in flight while building one index
const BUILD_CONCURRENCY: usize = 8;

/// One indexed item; the vector is never mutated after insertion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
}

/// A query hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredMatch {
    pub id: String,
    pub text: String,
    /// Cosine similarity to the query
    pub score: f32,
    /// Insertion position in the index
    pub position: usize,
}

/// Deterministic hash over an index's inputs.
///
/// Covers the collection name, the embedding model and every `(id, text)`
/// pair in order. Fields are length-prefixed so no two distinct inputs
/// serialise to the same byte stream.
pub fn fingerprint(collection: &str, model: &str, entries: &[(String, String)]) -> String {
    let mut hasher = Sha256::new();

    for field in [collection, model] {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }

    hasher.update((entries.len() as u64).to_le_bytes());
    for (id, text) in entries {
        hasher.update((id.len() as u64).to_le_bytes());
        hasher.update(id.as_bytes());
        hasher.update((text.len() as u64).to_le_bytes());
        hasher.update(text.as_bytes());
    }

    format!("{:x}", hasher.finalize())
}

/// Vector index over a named collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticIndex {
    collection: String,
    model: String,
    fingerprint: String,
    dimensions: usize,
    entries: Vec<IndexEntry>,
}

impl SemanticIndex {
    /// Embed every entry and build the index
    #[instrument(skip(entries, embedder), fields(entries = entries.len()))]
    pub async fn build(
        collection: &str,
        entries: Vec<(String, String)>,
        embedder: &dyn EmbeddingProvider,
    ) -> RouterResult<Self> {
        let mut index = Self {
            collection: collection.to_string(),
            model: embedder.model().to_string(),
            fingerprint: fingerprint(collection, embedder.model(), &[]),
            dimensions: 0,
            entries: Vec::new(),
        };
        index.add(entries, embedder).await?;

        debug!(collection, fingerprint = %index.fingerprint, dimensions = index.dimensions, "Built semantic index");
        Ok(index)
    }

    /// Embed and append entries after the existing ones.
    ///
    /// Stored vectors are left untouched. The fingerprint is recomputed over
    /// all pairs, so it matches a fresh build over the same inputs. On error
    /// the index is unchanged.
    pub async fn add(
        &mut self,
        entries: Vec<(String, String)>,
        embedder: &dyn EmbeddingProvider,
    ) -> RouterResult<()> {
        if embedder.model() != self.model {
            return Err(RouterError::Validation(format!(
                "index '{}' was built with model '{}', not '{}'",
                self.collection,
                self.model,
                embedder.model()
            )));
        }
        if entries.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = entries.iter().map(|(_, text)| text.clone()).collect();
        let vectors: Vec<Vec<f32>> = stream::iter(texts)
            .map(move |text| async move { embedder.embed(&text).await })
            .buffered(BUILD_CONCURRENCY)
            .try_collect()
            .await?;

        let dimensions = match self.dimensions {
            0 => vectors.first().map(Vec::len).unwrap_or(0),
            existing => existing,
        };
        if vectors.iter().any(|v| v.len() != dimensions || v.is_empty()) {
            return Err(RouterError::EmbeddingUnavailable(EmbeddingError::InvalidResponse(
                "embedding dimensions are inconsistent".to_string(),
            )));
        }

        self.dimensions = dimensions;
        self.entries.extend(entries.into_iter().zip(vectors).map(|((id, text), vector)| IndexEntry {
            id,
            text,
            vector: normalize(vector),
        }));
        self.fingerprint = fingerprint(&self.collection, &self.model, &self.pairs());
        Ok(())
    }

    /// Embed `text` and return the `k` most similar entries
    pub async fn query(
        &self,
        text: &str,
        k: usize,
        embedder: &dyn EmbeddingProvider,
    ) -> RouterResult<Vec<ScoredMatch>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let vector = embedder.embed(text).await?;
        if vector.len() != self.dimensions {
            return Err(RouterError::EmbeddingUnavailable(EmbeddingError::InvalidResponse(format!(
                "query vector has {} dimensions, index has {}",
                vector.len(),
                self.dimensions
            ))));
        }

        Ok(self.rank(&vector, k))
    }

    /// Rank entries against a query vector.
    ///
    /// Highest similarity first, ties broken by insertion order, `k` clamped
    /// to the number of entries.
    pub fn rank(&self, query_vector: &[f32], k: usize) -> Vec<ScoredMatch> {
        let query = normalize(query_vector.to_vec());

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, entry)| (pos, dot(&entry.vector, &query)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        scored
            .into_iter()
            .take(k.min(self.entries.len()))
            .map(|(position, score)| {
                let entry = &self.entries[position];
                ScoredMatch {
                    id: entry.id.clone(),
                    text: entry.text.clone(),
                    score,
                    position,
                }
            })
            .collect()
    }

    /// Check that the stored entries still hash to the recorded fingerprint
    pub fn verify(&self) -> bool {
        fingerprint(&self.collection, &self.model, &self.pairs()) == self.fingerprint
            && self.entries.iter().all(|e| e.vector.len() == self.dimensions)
    }

    fn pairs(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|e| (e.id.clone(), e.text.clone()))
            .collect()
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
    vector
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns fixed vectors per text; unknown text maps to the zero vector
    pub(crate) struct TableEmbedder {
        pub vectors: HashMap<String, Vec<f32>>,
        pub calls: AtomicUsize,
        pub fail: bool,
    }

    impl TableEmbedder {
        pub(crate) fn new(pairs: &[(&str, [f32; 3])]) -> Self {
            Self {
                vectors: pairs.iter().map(|(t, v)| (t.to_string(), v.to_vec())).collect(),
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for TableEmbedder {
        fn model(&self) -> &str {
            "table"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EmbeddingError::Unavailable("offline".to_string()));
            }
            Ok(self.vectors.get(text).cloned().unwrap_or_else(|| vec![0.0, 0.0, 0.0]))
        }
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect()
    }

    #[test]
    fn test_fingerprint_is_order_and_boundary_sensitive() {
        let a = fingerprint("agents", "m", &pairs(&[("a", "bc")]));
        let b = fingerprint("agents", "m", &pairs(&[("ab", "c")]));
        let c = fingerprint("agents", "m", &pairs(&[("a", "bc")]));
        let d = fingerprint("agents", "other-model", &pairs(&[("a", "bc")]));
        assert_ne!(a, b);
        assert_eq!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_query_ranks_by_cosine() {
        let embedder = TableEmbedder::new(&[
            ("crm", [1.0, 0.0, 0.0]),
            ("chat", [0.0, 1.0, 0.0]),
            ("food", [0.0, 0.0, 1.0]),
            ("contacts", [0.9, 0.1, 0.0]),
        ]);
        let index = SemanticIndex::build(
            "agents",
            pairs(&[("hubspot", "crm"), ("slack", "chat"), ("zomato", "food")]),
            &embedder,
        )
        .await
        .unwrap();

        let hits = index.query("contacts", 2, &embedder).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "hubspot");
        assert_eq!(hits[1].id, "slack");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_ties_follow_insertion_order_and_k_is_clamped() {
        let embedder = TableEmbedder::new(&[("same", [1.0, 1.0, 0.0]), ("q", [1.0, 1.0, 0.0])]);
        let index = SemanticIndex::build(
            "tools",
            pairs(&[("b", "same"), ("a", "same"), ("c", "same")]),
            &embedder,
        )
        .await
        .unwrap();

        let hits = index.query("q", 10, &embedder).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_build_fails_when_embedder_offline() {
        let mut embedder = TableEmbedder::new(&[]);
        embedder.fail = true;
        let err = SemanticIndex::build("agents", pairs(&[("a", "x")]), &embedder)
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::EmbeddingUnavailable(_)));
    }

    #[tokio::test]
    async fn test_empty_index_never_embeds() {
        let embedder = TableEmbedder::new(&[]);
        let index = SemanticIndex::build("agents", Vec::new(), &embedder).await.unwrap();
        assert!(index.query("anything", 3, &embedder).await.unwrap().is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert!(index.verify());
    }

    #[tokio::test]
    async fn test_verify_detects_tampering() {
        let embedder = TableEmbedder::new(&[("x", [1.0, 0.0, 0.0])]);
        let mut index = SemanticIndex::build("agents", pairs(&[("a", "x")]), &embedder)
            .await
            .unwrap();
        assert!(index.verify());
        index.entries[0].text = "changed".to_string();
        assert!(!index.verify());
    }

    #[tokio::test]
    async fn test_add_matches_a_full_build() {
        let embedder = TableEmbedder::new(&[
            ("crm", [1.0, 0.0, 0.0]),
            ("chat", [0.0, 1.0, 0.0]),
            ("food", [0.0, 0.0, 1.0]),
            ("dinner", [0.1, 0.2, 0.9]),
        ]);
        let all = pairs(&[("hubspot", "crm"), ("slack", "chat"), ("zomato", "food")]);

        let mut grown = SemanticIndex::build("agents", all[..1].to_vec(), &embedder).await.unwrap();
        let first_vector = grown.entries()[0].vector.clone();
        grown.add(all[1..].to_vec(), &embedder).await.unwrap();
        let full = SemanticIndex::build("agents", all, &embedder).await.unwrap();

        assert_eq!(grown.fingerprint(), full.fingerprint());
        assert_eq!(grown.entries()[0].vector, first_vector);
        assert!(grown.verify());
        assert_eq!(
            grown.query("dinner", 3, &embedder).await.unwrap(),
            full.query("dinner", 3, &embedder).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_failed_add_leaves_index_unchanged() {
        let mut embedder = TableEmbedder::new(&[("crm", [1.0, 0.0, 0.0])]);
        let mut index = SemanticIndex::build("agents", pairs(&[("hubspot", "crm")]), &embedder)
            .await
            .unwrap();
        let before = index.fingerprint().to_string();

        embedder.fail = true;
        assert!(index.add(pairs(&[("slack", "chat")]), &embedder).await.is_err());
        assert_eq!(index.len(), 1);
        assert_eq!(index.fingerprint(), before);
    }
}
