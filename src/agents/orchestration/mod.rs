//! Run orchestration
//!
//! One run moves through
//! `RECEIVED → SELECTED → PLANNED → TOOLS_FILTERED → EXECUTING → AGGREGATED → COMPLETED`.
//! Retrieval, planning and tool failures degrade the run instead of
//! aborting it; only an empty catalog ends in `FAILED`.

mod aggregate;
mod retry;
mod scheduler;

pub use aggregate::{aggregate, concat};
pub use retry::{Attempted, RetryPolicy};
pub use scheduler::{AgentJob, Scheduler};

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::agents::catalog::AgentCatalog;
use crate::agents::config::{LlmProviderConfig, RouterConfig};
use crate::agents::core::AgentRuntime;
use crate::agents::domain::{AgentOutcome, Cause, OrchestrationResult, RunPhase, RunStatus};
use crate::agents::error::{FailureKind, RouterError};
use crate::agents::index::IndexCache;
use crate::agents::llm::LlmProvider;
use crate::agents::planner::{Plan, Planner};
use crate::agents::selection::{AgentSelector, ToolSelection, ToolSelector};
use crate::domain::{EmbeddingProvider, ToolProviderPort};

/// Collaborators shared by every run
#[derive(Clone)]
pub struct OrchestratorDeps {
    pub catalog: Arc<AgentCatalog>,
    pub cache: Arc<IndexCache>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub llm: Arc<dyn LlmProvider>,
    pub tools: Arc<dyn ToolProviderPort>,
}

pub struct Orchestrator {
    catalog: Arc<AgentCatalog>,
    llm: Arc<dyn LlmProvider>,
    agent_selector: AgentSelector,
    planner: Planner,
    tool_selector: ToolSelector,
    scheduler: Scheduler,
    config: RouterConfig,
}

/// Accumulates one run's state until it is sealed into a result
struct RunState {
    run_id: Uuid,
    query: String,
    started_at: chrono::DateTime<Utc>,
    started: Instant,
    degradations: Vec<Cause>,
}

impl RunState {
    fn enter(&self, phase: RunPhase) {
        info!(run_id = %self.run_id, phase = %phase, elapsed_ms = self.started.elapsed().as_millis() as u64, "Run phase");
    }

    fn degrade(&mut self, cause: Cause) {
        warn!(run_id = %self.run_id, kind = %cause.kind, "{}", cause.message);
        self.degradations.push(cause);
    }

    fn seal(
        self,
        status: RunStatus,
        plan: Option<Plan>,
        agents: BTreeMap<String, AgentOutcome>,
        answer: String,
        error: Option<String>,
    ) -> OrchestrationResult {
        self.enter(match status {
            RunStatus::Completed => RunPhase::Completed,
            RunStatus::Failed => RunPhase::Failed,
        });

        OrchestrationResult {
            run_id: self.run_id,
            query: self.query,
            status,
            plan,
            agents,
            answer,
            degradations: self.degradations,
            error,
            started_at: self.started_at,
            finished_at: Utc::now(),
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}

impl Orchestrator {
    pub fn new(deps: OrchestratorDeps, config: RouterConfig, llm_defaults: LlmProviderConfig) -> Self {
        let agent_timeout = Duration::from_secs(config.agent_timeout_seconds);
        let retry = RetryPolicy::from_config(&config);
        let runtime = AgentRuntime {
            llm: deps.llm.clone(),
            tools: deps.tools.clone(),
            llm_defaults,
            tool_retry: retry.clone(),
        };

        Self {
            agent_selector: AgentSelector::new(deps.cache.clone(), deps.embedder.clone()),
            planner: Planner::new(deps.llm.clone(), agent_timeout),
            tool_selector: ToolSelector::new(deps.cache, deps.embedder, deps.tools, &config),
            scheduler: Scheduler::new(runtime, retry, config.concurrency),
            catalog: deps.catalog,
            llm: deps.llm,
            config,
        }
    }

    /// Run one query end to end; always returns a sealed result
    #[instrument(skip(self))]
    pub async fn run(&self, query: &str) -> OrchestrationResult {
        let started = Instant::now();
        let deadline = started + Duration::from_secs(self.config.deadline_seconds);
        let mut state = RunState {
            run_id: Uuid::new_v4(),
            query: query.to_string(),
            started_at: Utc::now(),
            started,
            degradations: Vec::new(),
        };
        state.enter(RunPhase::Received);

        let snapshot = self.catalog.list().await;
        let selection = self
            .agent_selector
            .select(query, &snapshot, self.config.shortlist_k)
            .await;
        if let Some(cause) = selection.degradation.clone() {
            state.degrade(cause);
        }
        if selection.is_empty() {
            let err = RouterError::NoAgentsAvailable;
            return state.seal(RunStatus::Failed, None, BTreeMap::new(), String::new(), Some(err.to_string()));
        }
        state.enter(RunPhase::Selected);

        let planned = self.planner.plan(query, &selection.agents).await;
        if let Some(cause) = planned.degradation {
            state.degrade(cause);
        }
        let plan = planned.plan;
        state.enter(RunPhase::Planned);

        let descriptors: HashMap<&str, _> = selection
            .agents
            .iter()
            .map(|a| (a.name.as_str(), a.clone()))
            .collect();

        let tool_selector = &self.tool_selector;
        let filtering = futures::future::join_all(plan.steps.iter().map(|step| {
            let descriptor = descriptors.get(step.agent.as_str()).cloned();
            let tool_query = step.tool_query.clone();
            async move {
                match descriptor {
                    Some(descriptor) => tool_selector.select(&descriptor, &tool_query).await,
                    None => ToolSelection::default(),
                }
            }
        }));

        let agents = match tokio::time::timeout_at(deadline, filtering).await {
            Ok(selections) => {
                state.enter(RunPhase::ToolsFiltered);
                let jobs = plan
                    .steps
                    .iter()
                    .zip(selections)
                    .filter_map(|(step, tools)| {
                        descriptors.get(step.agent.as_str()).map(|descriptor| AgentJob {
                            step: step.clone(),
                            descriptor: descriptor.clone(),
                            tools,
                        })
                    })
                    .collect();

                state.enter(RunPhase::Executing);
                self.scheduler.execute(state.run_id, query, jobs, deadline).await
            }
            Err(_) => {
                state.degrade(Cause::new(
                    FailureKind::DeadlineExceeded,
                    "deadline expired while filtering tools",
                ));
                plan.agents()
                    .map(|name| (name.to_string(), AgentOutcome::skipped()))
                    .collect()
            }
        };

        let (answer, degradation) = aggregate(
            self.config.aggregation,
            query,
            &plan,
            &agents,
            &self.llm,
            Duration::from_secs(self.config.agent_timeout_seconds),
        )
        .await;
        if let Some(cause) = degradation {
            state.degrade(cause);
        }
        state.enter(RunPhase::Aggregated);

        state.seal(RunStatus::Completed, Some(plan), agents, answer, None)
    }
}
