//! Durable index blobs, one per fingerprint

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, warn};

use super::SemanticIndex;
use crate::agents::error::{RouterError, RouterResult};

/// Persistence backend for built indexes
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Load a verified index, or `None` if absent or unusable
    async fn load(&self, collection: &str, fingerprint: &str) -> RouterResult<Option<SemanticIndex>>;

    async fn save(&self, index: &SemanticIndex) -> RouterResult<()>;
}

/// Stores each index as `<dir>/<collection>.<fingerprint>.json`
pub struct FileIndexStore {
    base_path: PathBuf,
}

impl FileIndexStore {
    pub fn new(base_path: impl Into<PathBuf>) -> RouterResult<Self> {
        let base_path = base_path.into();

        std::fs::create_dir_all(&base_path).map_err(|e| {
            RouterError::Cache(format!("Failed to create cache directory: {}", e))
        })?;

        Ok(Self { base_path })
    }

    fn blob_path(&self, collection: &str, fingerprint: &str) -> PathBuf {
        self.base_path
            .join(format!("{}.{}.json", file_stem(collection), fingerprint))
    }

    /// Remove blobs of older builds of the same collection
    async fn prune(&self, collection: &str, keep: &PathBuf) {
        let pattern = self
            .base_path
            .join(format!("{}.*.json", file_stem(collection)));
        let Some(pattern) = pattern.to_str() else {
            return;
        };

        let Ok(paths) = glob::glob(pattern) else {
            return;
        };

        for path in paths.flatten() {
            if &path != keep {
                if let Err(e) = fs::remove_file(&path).await {
                    debug!(path = %path.display(), "Failed to prune stale index blob: {}", e);
                }
            }
        }
    }
}

/// Collection names become file name stems; anything outside `[A-Za-z0-9_-]` is replaced
fn file_stem(collection: &str) -> String {
    collection
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

#[async_trait]
impl IndexStore for FileIndexStore {
    async fn load(&self, collection: &str, fingerprint: &str) -> RouterResult<Option<SemanticIndex>> {
        let path = self.blob_path(collection, fingerprint);

        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;

        let index: SemanticIndex = match serde_json::from_str(&content) {
            Ok(index) => index,
            Err(e) => {
                warn!(path = %path.display(), "Discarding unreadable index blob: {}", e);
                return Ok(None);
            }
        };

        if index.fingerprint() != fingerprint || index.collection() != collection || !index.verify() {
            warn!(
                path = %path.display(),
                collection,
                fingerprint,
                "Discarding index blob that failed its integrity check"
            );
            return Ok(None);
        }

        Ok(Some(index))
    }

    async fn save(&self, index: &SemanticIndex) -> RouterResult<()> {
        let path = self.blob_path(index.collection(), index.fingerprint());
        let content = serde_json::to_string(index)?;

        // Readers never observe a partial blob
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &path).await?;

        self.prune(index.collection(), &path).await;
        Ok(())
    }
}
