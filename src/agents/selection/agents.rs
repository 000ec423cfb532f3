use std::sync::Arc;

use tracing::{debug, warn};

use super::AGENT_COLLECTION;
use crate::agents::domain::{AgentDescriptor, Cause};
use crate::agents::error::RouterResult;
use crate::agents::index::IndexCache;
use crate::domain::EmbeddingProvider;

/// Shortlist produced for one query
#[derive(Debug, Clone)]
pub struct AgentSelection {
    /// Selected agents, most relevant first
    pub agents: Vec<Arc<AgentDescriptor>>,
    /// Set when retrieval failed and the full catalog was returned
    pub degradation: Option<Cause>,
}

impl AgentSelection {
    pub fn names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// Shortlists agents by similarity between the query and `"{name}: {description}"`
pub struct AgentSelector {
    cache: Arc<IndexCache>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl AgentSelector {
    pub fn new(cache: Arc<IndexCache>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { cache, embedder }
    }

    /// Top-`k` agents for `query` out of a catalog snapshot
    pub async fn select(
        &self,
        query: &str,
        agents: &[Arc<AgentDescriptor>],
        k: usize,
    ) -> AgentSelection {
        if agents.is_empty() {
            return AgentSelection {
                agents: Vec::new(),
                degradation: None,
            };
        }

        match self.rank(query, agents, k).await {
            Ok(selected) => {
                debug!(selected = ?selected.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(), "Agent shortlist");
                AgentSelection {
                    agents: selected,
                    degradation: None,
                }
            }
            Err(e) => {
                warn!("Agent selection unavailable, using every registered agent: {}", e);
                AgentSelection {
                    agents: agents.to_vec(),
                    degradation: Some(Cause::new(
                        e.kind(),
                        format!("agent selection unfiltered: {}", e),
                    )),
                }
            }
        }
    }

    async fn rank(
        &self,
        query: &str,
        agents: &[Arc<AgentDescriptor>],
        k: usize,
    ) -> RouterResult<Vec<Arc<AgentDescriptor>>> {
        let entries = agents
            .iter()
            .map(|a| (a.name.clone(), a.index_text()))
            .collect();

        let index = self
            .cache
            .get_or_build(AGENT_COLLECTION, entries, self.embedder.as_ref())
            .await?;
        let hits = index.query(query, k, self.embedder.as_ref()).await?;

        // Positions index straight back into the snapshot the index was built from
        Ok(hits
            .into_iter()
            .filter_map(|hit| agents.get(hit.position).cloned())
            .collect())
    }
}
