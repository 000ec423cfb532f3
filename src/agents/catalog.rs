//! In-memory registry of agent descriptors
//!
//! Append/lookup only: descriptors are never replaced or removed while the
//! process runs. Runs take a snapshot with [`AgentCatalog::list`], so a
//! registration racing an active run never changes that run's view.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::agents::config::AgentConfig;
use crate::agents::domain::AgentDescriptor;
use crate::agents::error::{RouterError, RouterResult};

#[derive(Default)]
struct CatalogInner {
    /// Registration order
    agents: Vec<Arc<AgentDescriptor>>,
    by_name: HashMap<String, usize>,
}

/// Registry of every agent the router can select from
#[derive(Default)]
pub struct AgentCatalog {
    inner: RwLock<CatalogInner>,
}

impl AgentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from configured agents
    pub async fn from_configs(configs: &[AgentConfig]) -> RouterResult<Self> {
        let catalog = Self::new();
        for config in configs {
            catalog.register(AgentDescriptor::from(config.clone())).await?;
        }
        Ok(catalog)
    }

    /// Register an agent; names are unique
    pub async fn register(&self, descriptor: AgentDescriptor) -> RouterResult<()> {
        if descriptor.name.trim().is_empty() {
            return Err(RouterError::Validation("agent name must not be empty".to_string()));
        }

        let mut inner = self.inner.write().await;
        if inner.by_name.contains_key(&descriptor.name) {
            return Err(RouterError::Validation(format!(
                "agent '{}' is already registered",
                descriptor.name
            )));
        }

        info!(agent = %descriptor.name, kind = descriptor.factory.kind(), "Registered agent");
        let idx = inner.agents.len();
        inner.by_name.insert(descriptor.name.clone(), idx);
        inner.agents.push(Arc::new(descriptor));
        Ok(())
    }

    /// Snapshot of all agents in registration order
    pub async fn list(&self) -> Vec<Arc<AgentDescriptor>> {
        self.inner.read().await.agents.clone()
    }

    pub async fn get(&self, name: &str) -> Option<Arc<AgentDescriptor>> {
        let inner = self.inner.read().await;
        inner.by_name.get(name).map(|&idx| inner.agents[idx].clone())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.agents.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
