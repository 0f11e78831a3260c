//! The streaming coordinator: one request in, one ordered event
//! channel out.
//!
//! Ordering grammar: `reasoning*` then `completion*` then `error?`
//! then exactly one `done`, after which the channel closes. Client
//! cancellation propagates into the pipeline and the provider stream;
//! a canceled run still ends with `done`.

use crate::error::GatewayError;
use crate::workflows::WorkflowRegistry;
use axon_agents::support::estimate_tokens;
use axon_agents::{default_registry, default_validator};
use axon_context::{AgentContext, ArtifactStore, ContextHandle};
use axon_llm::{LlmOrchestrator, ModelRef};
use axon_pipeline::{ReasoningManager, compile};
use axon_types::{
    ChatMessage, CompletionRequest, DataSourceClient, Event, ProviderRouter, ReasoningEvent,
    SessionId, StreamFault, TokenUsage, TraceId,
};
use futures::StreamExt;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Bounded event channel capacity; a full buffer applies backpressure
/// to the pipeline and the provider stream.
const EVENT_BUFFER: usize = 16;

/// Drives one request through the reasoning pipeline and the final
/// completion stream.
pub struct StreamingCoordinator {
    orchestrator: Arc<LlmOrchestrator>,
    sources: HashMap<String, Arc<dyn DataSourceClient>>,
    router: Arc<dyn ProviderRouter>,
    workflows: WorkflowRegistry,
    artifact_store: Option<Arc<dyn ArtifactStore>>,
    snapshot_tx: Option<mpsc::Sender<AgentContext>>,
}

impl StreamingCoordinator {
    /// A coordinator with the built-in workflows.
    pub fn new(
        orchestrator: Arc<LlmOrchestrator>,
        sources: HashMap<String, Arc<dyn DataSourceClient>>,
        router: Arc<dyn ProviderRouter>,
    ) -> Self {
        Self {
            orchestrator,
            sources,
            router,
            workflows: WorkflowRegistry::builtin(),
            artifact_store: None,
            snapshot_tx: None,
        }
    }

    /// Replace the workflow table.
    #[must_use]
    pub fn with_workflows(mut self, workflows: WorkflowRegistry) -> Self {
        self.workflows = workflows;
        self
    }

    /// Attach an artifact store for externalization.
    #[must_use]
    pub fn with_artifact_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.artifact_store = Some(store);
        self
    }

    /// Receive the sealed final context of every run, sent just before
    /// the terminal `done` event. Snapshot consumers must keep up; a
    /// full channel drops the snapshot, never the events.
    #[must_use]
    pub fn with_snapshot_channel(mut self, tx: mpsc::Sender<AgentContext>) -> Self {
        self.snapshot_tx = Some(tx);
        self
    }

    /// Process one request under the named workflow.
    ///
    /// Validation and workflow lookup fail synchronously; everything
    /// after that is reported on the returned channel, which always
    /// ends with a single `done` event.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Request`] on an invalid request,
    /// [`GatewayError::Pipeline`] when the workflow name is unknown or
    /// does not compile against the permission table.
    pub fn process_request(
        &self,
        request: CompletionRequest,
        workflow_name: &str,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<Event>, GatewayError> {
        request.validate()?;
        let config = self
            .workflows
            .get(workflow_name)
            .ok_or_else(|| {
                GatewayError::Pipeline(axon_pipeline::PipelineError::WorkflowNotFound(
                    workflow_name.to_string(),
                ))
            })?
            .clone();

        let validator = default_validator();
        let compiled = compile(&config, &validator)?;

        let session_id = request
            .user
            .clone()
            .map(SessionId::new)
            .unwrap_or_else(|| SessionId::new(format!("sess-{}", Uuid::new_v4())));
        let trace_id = TraceId::new(format!("trace-{}", Uuid::new_v4()));
        let handle = ContextHandle::new(AgentContext::new(session_id, trace_id), validator);

        let user_message = request.last_user_message().unwrap_or_default().to_string();
        let registry = default_registry(
            &user_message,
            Arc::clone(&self.orchestrator),
            self.sources.clone(),
        );
        let mut manager = ReasoningManager::new(registry);
        if let Some(store) = &self.artifact_store {
            manager = manager.with_artifact_store(Arc::clone(store));
        }

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let run = RequestRun {
            manager,
            compiled,
            handle,
            request,
            workflow_name: workflow_name.to_string(),
            orchestrator: Arc::clone(&self.orchestrator),
            router: Arc::clone(&self.router),
            snapshot_tx: self.snapshot_tx.clone(),
        };
        tokio::spawn(run.drive(tx, cancel));
        Ok(rx)
    }
}

/// Everything one spawned request task owns.
struct RequestRun {
    manager: ReasoningManager,
    compiled: axon_pipeline::CompiledPipeline,
    handle: ContextHandle,
    request: CompletionRequest,
    workflow_name: String,
    orchestrator: Arc<LlmOrchestrator>,
    router: Arc<dyn ProviderRouter>,
    snapshot_tx: Option<mpsc::Sender<AgentContext>>,
}

impl RequestRun {
    async fn drive(self, tx: mpsc::Sender<Event>, cancel: CancellationToken) {
        self.orchestrator.reset_session_budget().await;

        let mut success = true;
        let pipeline_result = self
            .manager
            .run(
                &self.workflow_name,
                &self.compiled,
                &self.handle,
                cancel.clone(),
                Some(&tx),
            )
            .await;

        let canceled_in_pipeline = match &pipeline_result {
            Ok(report) => report.canceled,
            Err(_) => false,
        };

        match pipeline_result {
            Ok(_) => {}
            Err(error) => {
                warn!(error = %error, "pipeline failed");
                let code = match &error {
                    axon_pipeline::PipelineError::CriticalAgentFailed { .. } => {
                        "critical_agent_failed"
                    }
                    _ => "pipeline_failed",
                };
                let _ = tx
                    .send(Event::Error {
                        code: code.to_string(),
                        message: error.to_string(),
                    })
                    .await;
                self.finish(&tx, false, cancel.is_cancelled()).await;
                return;
            }
        }

        let snapshot = self.handle.snapshot().await;
        let summary_event = ReasoningEvent::summary(
            &self.workflow_name,
            if snapshot.reasoning.summary.is_empty() {
                "reasoning complete".to_string()
            } else {
                snapshot.reasoning.summary.clone()
            },
            json!({
                "conclusions": snapshot.reasoning.conclusions.len(),
                "facts": snapshot.enrichment.facts.len(),
                "cost_usd": snapshot.llm.usage.cost_usd,
                "decisions": snapshot.llm.decisions.len(),
            }),
        );
        if !canceled_in_pipeline {
            let _ = tx.send(Event::Reasoning(summary_event)).await;
        }

        let needs_clarification = snapshot
            .diagnostics
            .warnings
            .iter()
            .any(|w| w.code == "clarification_questions")
            && snapshot.reasoning.conclusions.is_empty();

        if canceled_in_pipeline || cancel.is_cancelled() {
            self.finish(&tx, true, true).await;
            return;
        }
        if needs_clarification {
            debug!("clarification needed, skipping downstream completion");
            self.finish(&tx, true, false).await;
            return;
        }

        success &= self
            .stream_completion(&tx, &snapshot, cancel.clone())
            .await;
        self.finish(&tx, success, cancel.is_cancelled()).await;
    }

    /// Stream the downstream completion. Returns false on a fatal
    /// stream error (an `error` event has been sent).
    async fn stream_completion(
        &self,
        tx: &mpsc::Sender<Event>,
        snapshot: &AgentContext,
        cancel: CancellationToken,
    ) -> bool {
        let Some(provider) = self.router.route(&self.request.model) else {
            let _ = tx
                .send(Event::Error {
                    code: "no_provider_for_model".to_string(),
                    message: format!("no provider serves model {}", self.request.model),
                })
                .await;
            return false;
        };

        let mut downstream = self.request.clone();
        downstream.stream = true;
        if !snapshot.reasoning.summary.is_empty() {
            let preamble = ChatMessage::system(format!(
                "Reasoning context for this request:\n{}",
                snapshot.reasoning.summary
            ));
            downstream.messages.insert(0, preamble);
        }
        let prompt_tokens: usize = downstream
            .messages
            .iter()
            .map(|m| estimate_tokens(&m.content))
            .sum();

        let stream = match provider.stream_completion(cancel.clone(), downstream).await {
            Ok(stream) => stream,
            Err(error) => {
                let fault = StreamFault::StreamFailed(error.to_string());
                let _ = tx
                    .send(Event::Error {
                        code: fault.code().to_string(),
                        message: fault.to_string(),
                    })
                    .await;
                return false;
            }
        };

        let mut receiver = stream.receiver;
        let mut completion_chars = 0usize;
        let ok = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("client canceled mid-stream");
                    break true;
                }
                chunk = receiver.next() => match chunk {
                    Some(Ok(chunk)) => {
                        completion_chars += chunk.content_text().len();
                        if tx.send(Event::Completion(chunk)).await.is_err() {
                            // receiver gone; treat as cancellation
                            break true;
                        }
                    }
                    Some(Err(error)) => {
                        let fault = StreamFault::StreamFailed(error.to_string());
                        let _ = tx
                            .send(Event::Error {
                                code: fault.code().to_string(),
                                message: fault.to_string(),
                            })
                            .await;
                        break false;
                    }
                    None => break true,
                }
            }
        };

        // The downstream stream carries no usage report, so the session
        // budget absorbs an estimate of what was actually streamed
        // (same chars-per-token ratio as estimate_tokens).
        let usage = TokenUsage::new(prompt_tokens as u64, (completion_chars / 4) as u64);
        let model = ModelRef::new(provider.name(), &self.request.model);
        let cost = self
            .orchestrator
            .track_usage("stream_coordinator", &model, usage)
            .await;
        debug!(model = %model, cost = %cost, "downstream completion accounted");
        ok
    }

    /// Seal, snapshot, emit the final `done`, and let the channel
    /// close. `done` is sent exactly once, on every path.
    async fn finish(&self, tx: &mpsc::Sender<Event>, success: bool, canceled: bool) {
        if canceled {
            let _ = self
                .handle
                .privileged_mut(|ctx| {
                    ctx.push_warning(
                        "stream_coordinator",
                        StreamFault::ClientCanceled.code(),
                        "client disconnected before the stream completed",
                    );
                })
                .await;
        }
        self.handle.seal().await;

        if let Some(snapshot_tx) = &self.snapshot_tx {
            let snapshot = self.handle.snapshot().await;
            if snapshot_tx.try_send(snapshot).is_err() {
                warn!("snapshot receiver not keeping up, dropping final context");
            }
        }

        info!(workflow = %self.workflow_name, success, canceled, "request finished");
        let _ = tx.send(Event::Done { success }).await;
        // tx drops here (and in the spawned task), closing the channel
    }
}
