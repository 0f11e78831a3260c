//! The pipeline scheduler.
//!
//! Walks a [`CompiledPipeline`] level by level: sequential and
//! conditional modes run one agent at a time in `(level, id)` order,
//! parallel mode fans a level out on tasks and joins on a completion
//! barrier. Every run is bracketed by contract checks and diff
//! capture, and lands in the audit trail.

use crate::agent::{AgentRegistry, ReasoningAgent};
use crate::config::{AgentSpec, ExecutionMode, PipelineOptions};
use crate::error::PipelineError;
use crate::graph::CompiledPipeline;
use axon_context::{
    AgentContext, AgentRun, ArtifactStore, ContextHandle, Namespace, RunStatus, Severity,
    SizeChecker, diff_between, externalize_artifacts, missing_paths,
};
use axon_types::{DurationMs, Event, ReasoningEvent};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What one pipeline run did.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Final status per agent, in completion order.
    pub statuses: Vec<(String, RunStatus)>,
    /// Levels that were started.
    pub levels_run: usize,
    /// Whether the run stopped early on client cancellation.
    pub canceled: bool,
}

impl PipelineReport {
    /// The status of one agent, if it was scheduled.
    pub fn status_of(&self, agent_id: &str) -> Option<RunStatus> {
        self.statuses
            .iter()
            .find(|(id, _)| id == agent_id)
            .map(|(_, s)| *s)
    }
}

/// Outcome of executing one agent, before audit bookkeeping.
struct RunOutcome {
    status: RunStatus,
    duration: Duration,
    attempts: u32,
    error: Option<String>,
    /// Note for skip records (condition false, missing preconditions).
    note: Option<String>,
}

/// The reasoning pipeline scheduler.
pub struct ReasoningManager {
    registry: AgentRegistry,
    retry_backoff: Duration,
    size_checker: SizeChecker,
    artifact_store: Option<Arc<dyn ArtifactStore>>,
}

impl ReasoningManager {
    /// A manager over the given agent registry, with a 50 ms fixed
    /// retry backoff and default size limits.
    pub fn new(registry: AgentRegistry) -> Self {
        Self {
            registry,
            retry_backoff: Duration::from_millis(50),
            size_checker: SizeChecker::default(),
            artifact_store: None,
        }
    }

    /// Override the fixed retry backoff.
    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Override the size checker.
    #[must_use]
    pub fn with_size_checker(mut self, checker: SizeChecker) -> Self {
        self.size_checker = checker;
        self
    }

    /// Attach an artifact store; oversized artifacts are externalized
    /// between levels.
    #[must_use]
    pub fn with_artifact_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.artifact_store = Some(store);
        self
    }

    /// Execute one compiled pipeline against one context.
    ///
    /// # Errors
    ///
    /// `UnknownAgent` when a configured id has no implementation;
    /// `CriticalAgentFailed` when a critical agent fails out of all
    /// retries (the context keeps a `critical` severity error either
    /// way). Non-critical failures degrade gracefully and do not
    /// surface here.
    pub async fn run(
        &self,
        workflow_name: &str,
        pipeline: &CompiledPipeline,
        handle: &ContextHandle,
        cancel: CancellationToken,
        events: Option<&mpsc::Sender<Event>>,
    ) -> Result<PipelineReport, PipelineError> {
        for spec in pipeline.agents() {
            if !self.registry.contains(&spec.id) {
                return Err(PipelineError::UnknownAgent(spec.id.clone()));
            }
        }

        let options = &pipeline.config.options;
        let started = Instant::now();
        let mut last_timestamp = Utc::now();
        let mut report = PipelineReport {
            statuses: Vec::new(),
            levels_run: 0,
            canceled: false,
        };

        info!(workflow = workflow_name, levels = pipeline.levels.len(), "pipeline start");

        'levels: for (level_index, level) in pipeline.levels.iter().enumerate() {
            if cancel.is_cancelled() {
                report.canceled = true;
                break;
            }
            report.levels_run += 1;

            let outcomes = match pipeline.config.mode {
                ExecutionMode::Parallel => {
                    self.run_level_parallel(level, options, handle, &cancel).await
                }
                ExecutionMode::Sequential | ExecutionMode::Conditional => {
                    self.run_level_sequential(level, options, handle, &cancel).await
                }
            };

            let parallel = pipeline.config.mode == ExecutionMode::Parallel;
            for (spec, outcome, pre) in outcomes {
                let status = self
                    .finalize_run(spec, outcome, &pre, options, parallel, handle, &mut last_timestamp)
                    .await;
                report.statuses.push((spec.id.clone(), status));

                if status.is_failure() && pipeline.config.critical_agents.contains(&spec.id) {
                    let message = format!("critical agent {} ended with {status:?}", spec.id);
                    handle
                        .privileged_mut(|ctx| {
                            ctx.push_error("pipeline", "critical_agent_failed", &message, Severity::Critical);
                        })
                        .await;
                    self.finish_performance(handle, options, started).await;
                    return Err(PipelineError::CriticalAgentFailed {
                        agent: spec.id.clone(),
                        message,
                    });
                }
            }

            self.externalize_if_needed(handle).await;

            if cancel.is_cancelled() {
                report.canceled = true;
                break 'levels;
            }
            if let Some(sender) = events {
                let statuses: Vec<String> = level
                    .iter()
                    .map(|s| {
                        let status = report
                            .status_of(&s.id)
                            .map(|st| format!("{st:?}").to_lowercase())
                            .unwrap_or_else(|| "unknown".into());
                        format!("{}: {status}", s.id)
                    })
                    .collect();
                let event = Event::Reasoning(ReasoningEvent::stage(
                    workflow_name,
                    level_index,
                    format!("stage {} complete ({})", level_index, statuses.join(", ")),
                ));
                // a closed receiver means the client is gone; cancellation
                // will stop the next level
                let _ = sender.send(event).await;
            }
        }

        self.finish_performance(handle, options, started).await;
        info!(workflow = workflow_name, canceled = report.canceled, "pipeline done");
        Ok(report)
    }

    async fn run_level_sequential<'a>(
        &self,
        level: &'a [AgentSpec],
        options: &PipelineOptions,
        handle: &ContextHandle,
        cancel: &CancellationToken,
    ) -> Vec<(&'a AgentSpec, RunOutcome, AgentContext)> {
        let mut results = Vec::with_capacity(level.len());
        for spec in level {
            if cancel.is_cancelled() {
                break;
            }
            let pre = handle.snapshot().await;
            let agent = Arc::clone(self.registry.get(&spec.id).expect("checked at run start"));
            let outcome = execute_one(
                agent,
                spec.clone(),
                options.clone(),
                handle.clone(),
                cancel.clone(),
                self.retry_backoff,
                pre.clone(),
            )
            .await;
            results.push((spec, outcome, pre));
        }
        results
    }

    async fn run_level_parallel<'a>(
        &self,
        level: &'a [AgentSpec],
        options: &PipelineOptions,
        handle: &ContextHandle,
        cancel: &CancellationToken,
    ) -> Vec<(&'a AgentSpec, RunOutcome, AgentContext)> {
        // One snapshot for the whole level: rollback and diffs are
        // relative to the level start.
        let pre = handle.snapshot().await;
        let mut handles = Vec::with_capacity(level.len());
        for spec in level {
            let agent = Arc::clone(self.registry.get(&spec.id).expect("checked at run start"));
            handles.push(tokio::spawn(execute_one(
                agent,
                spec.clone(),
                options.clone(),
                handle.clone(),
                cancel.clone(),
                self.retry_backoff,
                pre.clone(),
            )));
        }

        let mut results = Vec::with_capacity(level.len());
        for (spec, join) in level.iter().zip(handles) {
            let outcome = match join.await {
                Ok(outcome) => outcome,
                Err(e) => RunOutcome {
                    status: RunStatus::Failed,
                    duration: Duration::ZERO,
                    attempts: 1,
                    error: Some(format!("agent task panicked or was aborted: {e}")),
                    note: None,
                },
            };
            results.push((spec, outcome, pre.clone()));
        }
        results
    }

    /// Record one outcome into audit, diagnostics, and metrics, and
    /// enforce size limits. Returns the final status.
    async fn finalize_run(
        &self,
        spec: &AgentSpec,
        mut outcome: RunOutcome,
        pre: &AgentContext,
        options: &PipelineOptions,
        parallel: bool,
        handle: &ContextHandle,
        last_timestamp: &mut DateTime<Utc>,
    ) -> RunStatus {
        let agent_id = spec.id.as_str();
        let writable = handle.validator().writable_namespaces(agent_id);

        // Size enforcement: a run that blew the limits is rolled back
        // and marked failed.
        if outcome.status == RunStatus::Succeeded {
            let current = handle.snapshot().await;
            if let Err(size_error) = self.size_checker.check(&current) {
                warn!(agent = agent_id, error = %size_error, "run exceeded size limits, rolling back");
                let data: Vec<Namespace> =
                    writable.iter().copied().filter(|ns| ns.is_data()).collect();
                handle
                    .privileged_mut(|ctx| ctx.restore_namespaces(pre, &data))
                    .await;
                outcome.status = RunStatus::Failed;
                outcome.error = Some(size_error.to_string());
            }
        }

        let current = handle.snapshot().await;
        let diff = if options.capture_changes && outcome.status != RunStatus::Skipped {
            // At a parallel level every agent diffs against the shared
            // level snapshot, so restrict each diff to the agent's own
            // writable data namespaces or siblings' writes (and the
            // level's shared diagnostics) would be misattributed.
            let filter = parallel.then(|| {
                writable
                    .iter()
                    .copied()
                    .filter(|ns| ns.is_data())
                    .collect::<Vec<_>>()
            });
            Some(diff_between(pre, &current, agent_id, filter.as_deref()))
        } else {
            None
        };
        let keys_written = diff
            .as_ref()
            .map(|d| d.namespaces_changed.clone())
            .unwrap_or_default();

        let mut timestamp = Utc::now();
        if timestamp < *last_timestamp {
            timestamp = *last_timestamp;
        }
        *last_timestamp = timestamp;

        let run = AgentRun {
            timestamp,
            agent_id: agent_id.to_string(),
            status: outcome.status,
            duration_ms: DurationMs::from_millis(outcome.duration.as_millis() as u64),
            keys_written,
            attempts: outcome.attempts,
            error: outcome.error.clone(),
        };

        handle
            .privileged_mut(|ctx| {
                match outcome.status {
                    RunStatus::Failed | RunStatus::Timeout => {
                        ctx.push_error(
                            agent_id,
                            "agent_failed",
                            outcome.error.clone().unwrap_or_else(|| "unknown".into()),
                            Severity::High,
                        );
                    }
                    RunStatus::FailedPrecondition => {
                        ctx.push_error(
                            agent_id,
                            "failed_precondition",
                            outcome.note.clone().unwrap_or_default(),
                            Severity::High,
                        );
                    }
                    RunStatus::FailedPostcondition => {
                        ctx.push_error(
                            agent_id,
                            "failed_postcondition",
                            outcome.error.clone().unwrap_or_default(),
                            Severity::High,
                        );
                    }
                    RunStatus::Skipped => {
                        if let Some(note) = &outcome.note {
                            ctx.push_warning(agent_id, "agent_skipped", note.clone());
                        }
                    }
                    RunStatus::Succeeded => {}
                }

                ctx.audit.agent_runs.push(run);
                if let Some(diff) = diff {
                    if !diff.is_empty() {
                        ctx.audit.diffs.push(diff);
                    }
                }
                if options.track_performance && outcome.status != RunStatus::Skipped {
                    let metrics = ctx
                        .diagnostics
                        .performance
                        .agent_metrics
                        .entry(agent_id.to_string())
                        .or_default();
                    metrics.invocations += u64::from(outcome.attempts.max(1));
                    metrics.total_duration_ms = metrics
                        .total_duration_ms
                        .saturating_add(DurationMs::from_millis(outcome.duration.as_millis() as u64));
                    if outcome.status.is_failure() {
                        metrics.failures += 1;
                    }
                }
            })
            .await;

        debug!(agent = agent_id, status = ?outcome.status, "run recorded");
        outcome.status
    }

    async fn externalize_if_needed(&self, handle: &ContextHandle) {
        let Some(store) = &self.artifact_store else {
            return;
        };
        let snapshot = handle.snapshot().await;
        if !self.size_checker.should_externalize_artifacts(&snapshot) {
            return;
        }
        let mut working = snapshot;
        match externalize_artifacts(&mut working, store, self.size_checker.limits()).await {
            Ok(moved) if moved > 0 => {
                handle
                    .privileged_mut(|ctx| {
                        ctx.retrieval.artifacts = working.retrieval.artifacts;
                        ctx.diagnostics.warnings = working.diagnostics.warnings;
                    })
                    .await;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "artifact externalization failed");
                handle
                    .privileged_mut(|ctx| {
                        ctx.push_error("pipeline", "externalization_failed", e.to_string(), Severity::Medium);
                    })
                    .await;
            }
        }
    }

    async fn finish_performance(
        &self,
        handle: &ContextHandle,
        options: &PipelineOptions,
        started: Instant,
    ) {
        if !options.track_performance {
            return;
        }
        let total = DurationMs::from_millis(started.elapsed().as_millis() as u64);
        handle
            .privileged_mut(|ctx| {
                ctx.diagnostics.performance.total_duration_ms = total;
            })
            .await;
    }
}

/// Execute one agent: condition, preconditions, retries under timeout,
/// postconditions with rollback.
async fn execute_one(
    agent: Arc<dyn ReasoningAgent>,
    spec: AgentSpec,
    options: PipelineOptions,
    handle: ContextHandle,
    cancel: CancellationToken,
    backoff: Duration,
    pre: AgentContext,
) -> RunOutcome {
    let agent_id = spec.id.as_str();
    let skip = |note: String, status: RunStatus| RunOutcome {
        status,
        duration: Duration::ZERO,
        attempts: 0,
        error: None,
        note: Some(note),
    };

    if let Some(condition) = spec.condition {
        if !condition.evaluate(&pre) {
            return skip(format!("condition {condition:?} is false"), RunStatus::Skipped);
        }
    }

    if options.validate_contract {
        let preconditions = agent.preconditions();
        let missing = missing_paths(&pre.to_value(), &preconditions);
        if !missing.is_empty() {
            let note = format!("missing preconditions: {}", missing.join(", "));
            let status = if options.fail_on_violation {
                RunStatus::FailedPrecondition
            } else {
                RunStatus::Skipped
            };
            return skip(note, status);
        }
    }

    let data_namespaces: Vec<Namespace> = handle
        .validator()
        .writable_namespaces(agent_id)
        .into_iter()
        .filter(|ns| ns.is_data())
        .collect();
    let rollback = |handle: ContextHandle, pre: AgentContext, namespaces: Vec<Namespace>| async move {
        handle
            .privileged_mut(move |ctx| ctx.restore_namespaces(&pre, &namespaces))
            .await;
    };

    let started = Instant::now();
    let max_attempts = spec.retry + 1;
    let mut attempts = 0u32;
    let mut final_status = RunStatus::Failed;
    let mut final_error: Option<String> = None;

    while attempts < max_attempts {
        attempts += 1;
        let child = cancel.child_token();
        let result = timeout(
            Duration::from_millis(spec.timeout_ms),
            agent.execute(child.clone(), &handle),
        )
        .await;

        match result {
            Ok(Ok(())) => {
                final_status = RunStatus::Succeeded;
                final_error = None;
                break;
            }
            Ok(Err(error)) => {
                final_error = Some(error.to_string());
                final_status = RunStatus::Failed;
                if error.is_retryable() && attempts < max_attempts {
                    warn!(agent = agent_id, attempt = attempts, error = %error, "retrying after failure");
                    rollback(handle.clone(), pre.clone(), data_namespaces.clone()).await;
                    tokio::time::sleep(backoff).await;
                    continue;
                }
                break;
            }
            Err(_elapsed) => {
                child.cancel();
                final_error = Some(format!("timed out after {}ms", spec.timeout_ms));
                final_status = RunStatus::Timeout;
                if attempts < max_attempts {
                    warn!(agent = agent_id, attempt = attempts, "retrying after timeout");
                    rollback(handle.clone(), pre.clone(), data_namespaces.clone()).await;
                    tokio::time::sleep(backoff).await;
                    continue;
                }
                break;
            }
        }
    }

    let duration = started.elapsed();

    if final_status == RunStatus::Succeeded && options.validate_contract {
        let postconditions = agent.postconditions();
        let current = handle.snapshot().await;
        let missing = missing_paths(&current.to_value(), &postconditions);
        if !missing.is_empty() {
            // Degenerate success is allowed when the agent explained
            // itself with a warning: empty outputs plus a warning is a
            // contract-conforming "nothing to do here".
            let warned = warnings_added_by(&pre, &current, agent_id) > 0;
            if !warned {
                rollback(handle.clone(), pre.clone(), data_namespaces.clone()).await;
                final_status = RunStatus::FailedPostcondition;
                final_error = Some(format!(
                    "postconditions not satisfied: {}",
                    missing.join(", ")
                ));
            }
        }
    }

    if final_status.is_failure() {
        // leave no partial writes behind a failed run
        if final_status != RunStatus::FailedPostcondition {
            rollback(handle, pre, data_namespaces).await;
        }
    }

    RunOutcome {
        status: final_status,
        duration,
        attempts,
        error: final_error,
        note: None,
    }
}

fn warnings_added_by(pre: &AgentContext, current: &AgentContext, agent_id: &str) -> usize {
    let count = |ctx: &AgentContext| {
        ctx.diagnostics
            .warnings
            .iter()
            .filter(|w| w.agent_id == agent_id)
            .count()
    };
    count(current).saturating_sub(count(pre))
}
