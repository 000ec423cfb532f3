use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use super::tool_collection;
use crate::agents::config::RouterConfig;
use crate::agents::domain::{AgentDescriptor, Cause};
use crate::agents::error::{FailureKind, RouterError, RouterResult};
use crate::agents::index::IndexCache;
use crate::agents::orchestration::RetryPolicy;
use crate::domain::{EmbeddingProvider, ToolDescriptor, ToolProviderPort};

/// Tools chosen for one agent
#[derive(Debug, Clone, Default)]
pub struct ToolSelection {
    pub tools: Vec<ToolDescriptor>,
    /// Reduced-capability conditions to attach to the agent's outcome
    pub degradations: Vec<Cause>,
}

impl ToolSelection {
    fn degraded(cause: Cause) -> Self {
        Self {
            tools: Vec::new(),
            degradations: vec![cause],
        }
    }

    pub fn ids(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.id.clone()).collect()
    }
}

/// Score tools by how many query keywords appear in their name or description.
///
/// Returns positions of matching tools, highest score first, catalog order on ties.
pub fn keyword_rank(query: &str, tools: &[ToolDescriptor]) -> Vec<usize> {
    let keywords: Vec<String> = query.to_lowercase().split_whitespace().map(str::to_string).collect();
    if keywords.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, usize)> = tools
        .iter()
        .enumerate()
        .filter_map(|(pos, tool)| {
            let name = tool.name.to_lowercase();
            let description = tool.description.to_lowercase();
            let score = keywords
                .iter()
                .filter(|kw| name.contains(kw.as_str()) || description.contains(kw.as_str()))
                .count();
            (score > 0).then_some((pos, score))
        })
        .collect();

    // Stable sort keeps catalog order between equal scores
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.into_iter().map(|(pos, _)| pos).collect()
}

/// Picks the top-k tools from an agent's provider for its tool query
pub struct ToolSelector {
    cache: Arc<IndexCache>,
    embedder: Arc<dyn EmbeddingProvider>,
    provider: Arc<dyn ToolProviderPort>,
    k: usize,
    max_tools: usize,
    hybrid: bool,
    retry: RetryPolicy,
}

impl ToolSelector {
    pub fn new(
        cache: Arc<IndexCache>,
        embedder: Arc<dyn EmbeddingProvider>,
        provider: Arc<dyn ToolProviderPort>,
        config: &RouterConfig,
    ) -> Self {
        Self {
            cache,
            embedder,
            provider,
            k: config.tool_k,
            max_tools: config.max_tools_per_agent,
            hybrid: config.hybrid_tool_search,
            retry: RetryPolicy::from_config(config),
        }
    }

    /// Filtered tool set for `agent`; never fails, degrades instead
    #[instrument(skip(self, agent), fields(agent = %agent.name))]
    pub async fn select(&self, agent: &AgentDescriptor, tool_query: &str) -> ToolSelection {
        if !agent.requires_tools {
            return ToolSelection::default();
        }

        let Some(provider) = agent.tool_provider.as_deref() else {
            warn!("Agent requires tools but has no provider");
            return ToolSelection::degraded(Cause::new(
                FailureKind::ToolProviderUnavailable,
                "no tool provider configured",
            ));
        };

        let tools = &self.provider;
        let listed = self
            .retry
            .run(provider, move |_| async move {
                tools.list_tools(provider).await.map_err(RouterError::from)
            })
            .await;

        let catalog = match listed.result {
            Ok(tools) => tools,
            Err(err) => {
                warn!(provider, attempts = listed.attempts, "Tool provider unreachable, continuing without tools: {}", err);
                return ToolSelection::degraded(Cause::new(
                    FailureKind::ToolProviderUnavailable,
                    err.to_string(),
                ));
            }
        };

        if catalog.is_empty() {
            return ToolSelection::default();
        }

        let keyword_hits = if self.hybrid {
            keyword_rank(tool_query, &catalog)
        } else {
            Vec::new()
        };

        if keyword_hits.len() >= self.k {
            debug!(provider, matches = keyword_hits.len(), "Keyword matches cover the tool budget");
            return ToolSelection {
                tools: pick(&catalog, keyword_hits.into_iter().take(self.k)),
                degradations: Vec::new(),
            };
        }

        match self.semantic_rank(provider, tool_query, &catalog).await {
            Ok(semantic) => {
                let merged = merge(keyword_hits, semantic).take(self.k);
                ToolSelection {
                    tools: pick(&catalog, merged),
                    degradations: Vec::new(),
                }
            }
            Err(e) => {
                warn!(provider, cap = self.max_tools, "Tool retrieval unavailable, using capped tool set: {}", e);
                let unfiltered = merge(keyword_hits, 0..catalog.len()).take(self.max_tools);
                ToolSelection {
                    tools: pick(&catalog, unfiltered),
                    degradations: vec![Cause::new(
                        e.kind(),
                        format!("tool selection unfiltered: {}", e),
                    )],
                }
            }
        }
    }

    /// Positions of the top `2k` tools by similarity
    async fn semantic_rank(
        &self,
        provider: &str,
        tool_query: &str,
        catalog: &[ToolDescriptor],
    ) -> RouterResult<Vec<usize>> {
        let entries = catalog.iter().map(|t| (t.id.clone(), t.index_text())).collect();
        let index = self
            .cache
            .get_or_build(&tool_collection(provider), entries, self.embedder.as_ref())
            .await?;

        let hits = index
            .query(tool_query, self.k * 2, self.embedder.as_ref())
            .await?;
        Ok(hits.into_iter().map(|h| h.position).collect())
    }
}

/// Keyword hits first, then the rest, without duplicates
fn merge(first: Vec<usize>, rest: impl IntoIterator<Item = usize>) -> impl Iterator<Item = usize> {
    let mut seen = HashSet::new();
    first
        .into_iter()
        .chain(rest)
        .filter(move |pos| seen.insert(*pos))
}

fn pick(catalog: &[ToolDescriptor], positions: impl Iterator<Item = usize>) -> Vec<ToolDescriptor> {
    positions.filter_map(|pos| catalog.get(pos).cloned()).collect()
}
