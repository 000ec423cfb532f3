//! Single-flight index cache keyed by fingerprint

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use super::{fingerprint, IndexStore, SemanticIndex};
use crate::agents::error::RouterResult;
use crate::domain::EmbeddingProvider;

type Slot = Arc<OnceCell<Arc<SemanticIndex>>>;

/// Shares built indexes across concurrent runs.
///
/// Callers asking for the same `(collection, fingerprint)` at the same time
/// wait on one build. A failed build leaves the slot empty so the next
/// caller retries. When a durable store is attached, completed builds are
/// written through and later processes load them instead of re-embedding.
pub struct IndexCache {
    slots: Mutex<HashMap<(String, String), Slot>>,
    store: Option<Arc<dyn IndexStore>>,
    builds: AtomicU64,
}

impl Default for IndexCache {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexCache {
    /// Process-local cache without persistence
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            store: None,
            builds: AtomicU64::new(0),
        }
    }

    pub fn with_store(store: Arc<dyn IndexStore>) -> Self {
        Self {
            store: Some(store),
            ..Self::new()
        }
    }

    /// Return the index for these entries, building it at most once
    pub async fn get_or_build(
        &self,
        collection: &str,
        entries: Vec<(String, String)>,
        embedder: &dyn EmbeddingProvider,
    ) -> RouterResult<Arc<SemanticIndex>> {
        let fp = fingerprint(collection, embedder.model(), &entries);
        let key = (collection.to_string(), fp.clone());

        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(key).or_default().clone()
        };

        if let Some(index) = slot.get() {
            debug!(collection, fingerprint = %fp, "Index cache hit");
            return Ok(index.clone());
        }

        let index = slot
            .get_or_try_init(|| self.load_or_build(collection, &fp, entries, embedder))
            .await?
            .clone();

        // Drop completed slots for superseded builds of this collection
        let mut slots = self.slots.lock().await;
        slots.retain(|(c, f), slot| c != collection || f == &fp || !slot.initialized());

        Ok(index)
    }

    async fn load_or_build(
        &self,
        collection: &str,
        fp: &str,
        entries: Vec<(String, String)>,
        embedder: &dyn EmbeddingProvider,
    ) -> RouterResult<Arc<SemanticIndex>> {
        if let Some(store) = &self.store {
            match store.load(collection, fp).await {
                Ok(Some(index)) => {
                    debug!(collection, fingerprint = fp, "Loaded index from store");
                    return Ok(Arc::new(index));
                }
                Ok(None) => {}
                Err(e) => warn!(collection, fingerprint = fp, "Index store load failed: {}", e),
            }
        }

        let index = SemanticIndex::build(collection, entries, embedder).await?;
        self.builds.fetch_add(1, Ordering::Relaxed);
        info!(
            collection,
            fingerprint = fp,
            entries = index.len(),
            "Built index"
        );

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&index).await {
                warn!(collection, fingerprint = fp, "Failed to persist index: {}", e);
            }
        }

        Ok(Arc::new(index))
    }

    /// Number of builds performed by this cache (store loads excluded)
    pub fn builds(&self) -> u64 {
        self.builds.load(Ordering::Relaxed)
    }

    /// Number of tracked slots, including in-flight builds
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
