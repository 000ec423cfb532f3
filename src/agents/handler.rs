//! Router handler: the surface exposed to the surrounding application

use std::sync::Arc;

use tracing::info;

use crate::agents::catalog::AgentCatalog;
use crate::agents::domain::{AgentDescriptor, AgentInfo, OrchestrationResult};
use crate::agents::embedding::create_embedder;
use crate::agents::error::{RouterError, RouterResult};
use crate::agents::index::{FileIndexStore, IndexCache};
use crate::agents::llm::create_provider;
use crate::agents::orchestration::{Orchestrator, OrchestratorDeps};
use crate::config::Settings;
use crate::domain::ToolProviderPort;

/// Handler for routing operations
pub struct RouterHandler {
    catalog: Arc<AgentCatalog>,
    orchestrator: Orchestrator,
}

impl RouterHandler {
    pub fn new(deps: OrchestratorDeps, settings: &Settings) -> Self {
        Self {
            catalog: deps.catalog.clone(),
            orchestrator: Orchestrator::new(deps, settings.router.clone(), settings.llm.clone()),
        }
    }

    /// Build the HTTP collaborators and agent catalog from configuration
    pub async fn from_settings(settings: &Settings, tools: Arc<dyn ToolProviderPort>) -> RouterResult<Self> {
        let llm = create_provider(&settings.llm).map_err(|e| RouterError::Configuration(e.to_string()))?;
        let embedder =
            create_embedder(&settings.embedding).map_err(|e| RouterError::Configuration(e.to_string()))?;

        let cache = if settings.cache.persist {
            let store = FileIndexStore::new(&settings.cache.dir)?;
            IndexCache::with_store(Arc::new(store))
        } else {
            IndexCache::new()
        };

        let catalog = AgentCatalog::from_configs(&settings.agents).await?;
        info!(
            agents = catalog.len().await,
            model = %settings.llm.model,
            embedding_model = %settings.embedding.model,
            "Router initialised"
        );

        let deps = OrchestratorDeps {
            catalog: Arc::new(catalog),
            cache: Arc::new(cache),
            embedder,
            llm,
            tools,
        };
        Ok(Self::new(deps, settings))
    }

    /// Select, plan, execute and aggregate one query
    pub async fn run_query(&self, query: &str) -> OrchestrationResult {
        self.orchestrator.run(query).await
    }

    /// Registered agents in registration order
    pub async fn list_registered_agents(&self) -> Vec<AgentInfo> {
        self.catalog.list().await.iter().map(|a| a.info()).collect()
    }

    /// Add an agent; visible to runs that start afterwards
    pub async fn register(&self, descriptor: AgentDescriptor) -> RouterResult<()> {
        self.catalog.register(descriptor).await
    }
}
