//! Shared doubles for the integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use conductor::agents::catalog::AgentCatalog;
use conductor::agents::config::RouterConfig;
use conductor::agents::core::{Agent, AgentOutput, ExecutionContext};
use conductor::agents::domain::{AgentBuilder, AgentDescriptor, AgentFactory};
use conductor::agents::error::{EmbeddingError, LlmError, LlmResult, RouterError, RouterResult, ToolProviderError};
use conductor::agents::index::IndexCache;
use conductor::agents::llm::{CompletionRequest, CompletionResponse, LlmProvider};
use conductor::agents::orchestration::OrchestratorDeps;
use conductor::agents::RouterHandler;
use conductor::config::Settings;
use conductor::domain::{EmbeddingProvider, ToolDescriptor, ToolProviderPort};
use serde_json::{json, Value};

const DIMENSIONS: usize = 256;

/// Deterministic bag-of-words embedder: one hashed bucket per word
#[derive(Default)]
pub struct BagOfWordsEmbedder {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl BagOfWordsEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let embedder = Self::default();
        embedder.fail.store(true, Ordering::SeqCst);
        Arc::new(embedder)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn bucket(word: &str) -> usize {
    // FNV-1a
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in word.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    (hash % DIMENSIONS as u64) as usize
}

#[async_trait]
impl EmbeddingProvider for BagOfWordsEmbedder {
    fn model(&self) -> &str {
        "bag-of-words"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Unavailable("connection refused".to_string()));
        }

        // Yield so concurrent builds really interleave
        tokio::task::yield_now().await;

        let mut vector = vec![0.0; DIMENSIONS];
        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            vector[bucket(word)] += 1.0;
        }
        Ok(vector)
    }
}

/// Language model that answers planning requests with a fixed reply
pub struct ScriptedLlm {
    plan: Option<String>,
    pub calls: AtomicUsize,
}

impl ScriptedLlm {
    /// Replies to planning requests with `plan` serialized as JSON
    pub fn planning(plan: Value) -> Arc<Self> {
        Arc::new(Self {
            plan: Some(plan.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    /// Replies to planning requests with raw text
    pub fn raw(text: &str) -> Arc<Self> {
        Arc::new(Self {
            plan: Some(text.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    /// Every call fails permanently
    pub fn down() -> Arc<Self> {
        Arc::new(Self {
            plan: None,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> LlmResult<CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.plan {
            None => Err(LlmError::Api {
                status: 400,
                message: "model unavailable".to_string(),
            }),
            Some(plan) if request.json_mode => Ok(CompletionResponse::text(plan.clone())),
            Some(_) => Ok(CompletionResponse::text("summary")),
        }
    }
}

/// Tool provider backed by fixed per-provider catalogs
#[derive(Default)]
pub struct InMemoryTools {
    catalogs: HashMap<String, Vec<ToolDescriptor>>,
    pub down: AtomicBool,
    pub invocations: AtomicUsize,
}

impl InMemoryTools {
    pub fn with_provider(mut self, provider: &str, tools: &[(&str, &str)]) -> Self {
        let catalog = tools
            .iter()
            .map(|(name, description)| ToolDescriptor::new(provider, *name, *description))
            .collect();
        self.catalogs.insert(provider.to_string(), catalog);
        self
    }

    /// `count` generic tools named `<provider>_tool_<n>`
    pub fn with_generated(mut self, provider: &str, count: usize) -> Self {
        let catalog = (0..count)
            .map(|n| {
                ToolDescriptor::new(
                    provider,
                    format!("{}_tool_{}", provider, n),
                    format!("Operation number {} of {}", n, provider),
                )
            })
            .collect();
        self.catalogs.insert(provider.to_string(), catalog);
        self
    }
}

#[async_trait]
impl ToolProviderPort for InMemoryTools {
    async fn list_tools(&self, provider: &str) -> Result<Vec<ToolDescriptor>, ToolProviderError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(ToolProviderError::Unavailable {
                provider: provider.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        self.catalogs
            .get(provider)
            .cloned()
            .ok_or_else(|| ToolProviderError::Unavailable {
                provider: provider.to_string(),
                reason: "unknown provider".to_string(),
            })
    }

    async fn invoke(&self, provider: &str, tool_id: &str, args: Value) -> Result<Value, ToolProviderError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Ok(json!({ "provider": provider, "tool": tool_id, "args": args }))
    }
}

/// What a stub agent does when run
#[derive(Debug, Clone)]
pub enum Behavior {
    Reply(String),
    /// Permanent execution error
    Fail,
    /// Succeed after sleeping this many seconds
    Sleep(u64),
    /// Reply with the prompt the agent was given
    Echo,
    /// Reply with the ids of the tools the agent was given
    ListTools,
}

/// Records the order in which stub agents were invoked
pub type InvocationLog = Arc<Mutex<Vec<String>>>;

struct StubAgent {
    name: String,
    behavior: Behavior,
    log: InvocationLog,
}

#[async_trait]
impl Agent for StubAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &ExecutionContext) -> RouterResult<AgentOutput> {
        self.log.lock().unwrap().push(self.name.clone());
        match &self.behavior {
            Behavior::Reply(text) => Ok(AgentOutput::text(text.clone())),
            Behavior::Fail => Err(RouterError::AgentExecutionFailed(format!(
                "{} rejected the request",
                self.name
            ))),
            Behavior::Sleep(secs) => {
                tokio::time::sleep(Duration::from_secs(*secs)).await;
                Ok(AgentOutput::text(format!("{} finished", self.name)))
            }
            Behavior::Echo => Ok(AgentOutput::text(ctx.user_prompt())),
            Behavior::ListTools => Ok(AgentOutput::text(
                ctx.tools.iter().map(|t| t.id.as_str()).collect::<Vec<_>>().join(","),
            )),
        }
    }
}

struct StubBuilder {
    behavior: Behavior,
    log: InvocationLog,
}

impl AgentBuilder for StubBuilder {
    fn build(&self, descriptor: &AgentDescriptor) -> Arc<dyn Agent> {
        Arc::new(StubAgent {
            name: descriptor.name.clone(),
            behavior: self.behavior.clone(),
            log: self.log.clone(),
        })
    }

    fn kind(&self) -> &str {
        "stub"
    }
}

pub fn stub(name: &str, description: &str, behavior: Behavior, log: &InvocationLog) -> AgentDescriptor {
    let builder = StubBuilder {
        behavior,
        log: log.clone(),
    };
    AgentDescriptor::new(name, description, AgentFactory::Custom(Arc::new(builder)))
}

/// Router config that shortlists every agent and never retries
pub fn router_config(shortlist_k: usize) -> RouterConfig {
    RouterConfig {
        shortlist_k,
        max_retries: 0,
        agent_timeout_seconds: 300,
        ..RouterConfig::default()
    }
}

pub async fn router(
    agents: Vec<AgentDescriptor>,
    llm: Arc<ScriptedLlm>,
    embedder: Arc<BagOfWordsEmbedder>,
    tools: Arc<InMemoryTools>,
    config: RouterConfig,
) -> RouterHandler {
    let catalog = AgentCatalog::new();
    for agent in agents {
        catalog.register(agent).await.unwrap();
    }

    let deps = OrchestratorDeps {
        catalog: Arc::new(catalog),
        cache: Arc::new(IndexCache::new()),
        embedder,
        llm,
        tools,
    };
    let settings = Settings {
        router: config,
        ..Settings::default()
    };
    RouterHandler::new(deps, &settings)
}
