//! Embedding collaborator implementations

mod openai;

pub use openai::OpenAiEmbeddings;

use std::sync::Arc;

use crate::agents::config::EmbeddingConfig;
use crate::agents::error::EmbeddingError;
use crate::domain::EmbeddingProvider;

/// Create an embedding provider from configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    Ok(Arc::new(OpenAiEmbeddings::new(config)?))
}
