//! Dependency-aware concurrent execution of planned agents

use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant as StdInstant;

use futures::FutureExt;
use tokio::task::{Id, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use super::retry::RetryPolicy;
use crate::agents::core::{create_agent, AgentRuntime, ExecutionContext, UpstreamOutput};
use crate::agents::domain::{AgentDescriptor, AgentOutcome, Cause};
use crate::agents::error::{FailureKind, RouterError};
use crate::agents::planner::PlanStep;
use crate::agents::selection::ToolSelection;

/// One planned agent with its filtered tools
#[derive(Debug, Clone)]
pub struct AgentJob {
    pub step: PlanStep,
    pub descriptor: Arc<AgentDescriptor>,
    pub tools: ToolSelection,
}

/// Runs jobs in dependency order under a concurrency cap and a deadline.
///
/// A job starts once every dependency has succeeded; a job with a failed
/// dependency is recorded as `DependencyFailed` and never started. At the
/// deadline in-flight jobs are aborted (`Cancelled`) and waiting jobs are
/// `Skipped`, as is every job still waiting when the deadline has already
/// passed on entry; outcomes collected so far are kept.
pub struct Scheduler {
    runtime: AgentRuntime,
    retry: RetryPolicy,
    concurrency: usize,
}

impl Scheduler {
    pub fn new(runtime: AgentRuntime, retry: RetryPolicy, concurrency: usize) -> Self {
        Self {
            runtime,
            retry,
            concurrency: concurrency.max(1),
        }
    }

    /// Execute `jobs`, which must be in topological order
    pub async fn execute(
        &self,
        run_id: Uuid,
        query: &str,
        jobs: Vec<AgentJob>,
        deadline: Instant,
    ) -> BTreeMap<String, AgentOutcome> {
        let mut outcomes: BTreeMap<String, AgentOutcome> = BTreeMap::new();
        let mut pending: Vec<AgentJob> = jobs;
        let mut running: HashMap<Id, String> = HashMap::new();
        let mut tasks: JoinSet<(String, AgentOutcome)> = JoinSet::new();

        loop {
            // Plan order is topological, so one pass propagates failures transitively
            pending.retain(|job| {
                let failed_dep = job.step.depends_on.iter().find(|dep| {
                    outcomes
                        .get(dep.as_str())
                        .is_some_and(|o| !o.status.is_success())
                });
                match failed_dep {
                    Some(dep) => {
                        warn!(%run_id, agent = %job.step.agent, dependency = %dep, "Dependency failed, not starting agent");
                        outcomes.insert(job.step.agent.clone(), AgentOutcome::dependency_failed(dep));
                        false
                    }
                    None => true,
                }
            });

            let expired = Instant::now() >= deadline;
            let mut idx = 0;
            while !expired && idx < pending.len() && running.len() < self.concurrency {
                let ready = pending[idx]
                    .step
                    .depends_on
                    .iter()
                    .all(|dep| outcomes.contains_key(dep.as_str()));
                if !ready {
                    idx += 1;
                    continue;
                }

                let job = pending.remove(idx);
                let ctx = ExecutionContext {
                    run_id,
                    agent: job.step.agent.clone(),
                    query: query.to_string(),
                    tool_query: job.step.tool_query.clone(),
                    upstream: upstream_outputs(&job.step, &outcomes),
                    tools: job.tools.tools.clone(),
                };

                debug!(%run_id, agent = %ctx.agent, tools = ctx.tools.len(), "Starting agent");
                let name = job.step.agent.clone();
                let span = tracing::info_span!("agent", %run_id, agent = %name);
                let handle = tasks.spawn(
                    run_job(job, ctx, self.runtime.clone(), self.retry.clone()).instrument(span),
                );
                running.insert(handle.id(), name);
            }

            if running.is_empty() {
                break;
            }

            tokio::select! {
                joined = tasks.join_next_with_id() => {
                    match joined {
                        Some(Ok((id, (name, outcome)))) => {
                            info!(%run_id, agent = %name, status = ?outcome.status, attempts = outcome.attempts, "Agent finished");
                            running.remove(&id);
                            outcomes.insert(name, outcome);
                        }
                        Some(Err(e)) => {
                            let Some(name) = running.remove(&e.id()) else {
                                continue;
                            };
                            warn!(%run_id, agent = %name, "Agent task ended unexpectedly: {}", e);
                            let err = RouterError::AgentExecutionFailed(format!("agent '{}' task ended: {}", name, e));
                            outcomes.insert(name, AgentOutcome::failed(&err, Vec::new()));
                        }
                        None => break,
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(%run_id, in_flight = running.len(), waiting = pending.len(), "Run deadline expired");
                    tasks.abort_all();
                    for (_, name) in running.drain() {
                        outcomes.insert(name, AgentOutcome::cancelled());
                    }
                    break;
                }
            }
        }

        for job in pending {
            outcomes.entry(job.step.agent).or_insert_with(AgentOutcome::skipped);
        }

        outcomes
    }
}

fn upstream_outputs(step: &PlanStep, outcomes: &BTreeMap<String, AgentOutcome>) -> Vec<UpstreamOutput> {
    step.depends_on
        .iter()
        .filter_map(|dep| {
            let output = outcomes.get(dep.as_str())?.output.clone()?;
            Some(UpstreamOutput {
                agent: dep.clone(),
                output,
            })
        })
        .collect()
}

async fn run_job(
    job: AgentJob,
    ctx: ExecutionContext,
    runtime: AgentRuntime,
    retry: RetryPolicy,
) -> (String, AgentOutcome) {
    let name = job.step.agent.clone();
    let started = StdInstant::now();

    let run = async {
        let agent = create_agent(&job.descriptor, &runtime);
        retry.run(&name, |_| agent.run(&ctx)).await
    };
    let attempted = match AssertUnwindSafe(run).catch_unwind().await {
        Ok(attempted) => attempted,
        Err(_) => {
            let err = RouterError::AgentExecutionFailed(format!("agent '{}' panicked", name));
            let mut outcome = AgentOutcome::failed(&err, job.tools.degradations);
            outcome.elapsed_ms = started.elapsed().as_millis() as u64;
            return (name, outcome);
        }
    };

    let mut degradations = job.tools.degradations;
    let mut outcome = match attempted.result {
        Ok(output) => {
            for call in output.tool_calls.iter().filter(|c| !c.success) {
                degradations.push(Cause::new(
                    FailureKind::ToolInvocationFailed,
                    format!(
                        "tool '{}' failed: {}",
                        call.tool,
                        call.error.as_deref().unwrap_or("unknown error")
                    ),
                ));
            }
            let mut outcome = AgentOutcome::success(output.content, degradations);
            outcome.tool_calls = output.tool_calls;
            outcome
        }
        Err(e) => {
            warn!(agent = %name, attempts = attempted.attempts, "Agent failed: {}", e);
            AgentOutcome::failed(&e, degradations)
        }
    };

    outcome.tools = job.tools.tools.iter().map(|t| t.id.clone()).collect();
    outcome.attempts = attempted.attempts;
    outcome.elapsed_ms = started.elapsed().as_millis() as u64;
    (name, outcome)
}
