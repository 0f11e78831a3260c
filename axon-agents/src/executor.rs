//! Retrieval execution: bounded fan-out over data-source clients.

use crate::support::ids;
use axon_context::{ContextHandle, Namespace, QueryRecord};
use axon_pipeline::{AgentError, ReasoningAgent};
use axon_types::{Artifact, DataSourceClient, RetrievalError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Executes planned queries against registered [`DataSourceClient`]s,
/// one task per `(query, source)` with its own timeout, fan-out
/// bounded by a semaphore. Failures become warnings, never errors:
/// a partially answered query set is still useful downstream.
pub struct RetrievalExecutorAgent {
    clients: HashMap<String, Arc<dyn DataSourceClient>>,
    max_concurrency: usize,
    query_timeout: Duration,
}

impl RetrievalExecutorAgent {
    /// An executor over the given clients with the default fan-out
    /// bound (5) and per-query timeout (10 s).
    pub fn new(clients: HashMap<String, Arc<dyn DataSourceClient>>) -> Self {
        Self {
            clients,
            max_concurrency: 5,
            query_timeout: Duration::from_secs(10),
        }
    }

    /// Override the fan-out bound.
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Override the per-query timeout.
    #[must_use]
    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }
}

enum QueryOutcome {
    Artifacts(Vec<Artifact>),
    Empty(String),
    Failed(String),
}

#[async_trait]
impl ReasoningAgent for RetrievalExecutorAgent {
    fn agent_id(&self) -> &str {
        ids::RETRIEVAL_EXECUTOR
    }

    fn preconditions(&self) -> Vec<String> {
        vec!["retrieval.plans".into(), "retrieval.queries".into()]
    }

    fn postconditions(&self) -> Vec<String> {
        vec!["retrieval.artifacts".into()]
    }

    async fn execute(
        &self,
        cancel: CancellationToken,
        ctx: &ContextHandle,
    ) -> Result<(), AgentError> {
        let mut records = ctx.with(|c| c.retrieval.queries.clone()).await;
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));

        let mut tasks = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let query = record.query.clone();
            let client = self.clients.get(&query.source).cloned();
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let per_query_timeout = self.query_timeout;

            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let Some(client) = client else {
                    // unknown source degrades to an empty result
                    return (index, QueryOutcome::Empty(query.source.clone()));
                };
                let result = timeout(
                    per_query_timeout,
                    client.execute_query(cancel, query.clone()),
                )
                .await;
                match result {
                    Ok(Ok(artifacts)) => (index, QueryOutcome::Artifacts(artifacts)),
                    Ok(Err(RetrievalError::SourceUnavailable { source })) => {
                        (index, QueryOutcome::Failed(format!("source unavailable: {source}")))
                    }
                    Ok(Err(error)) => (index, QueryOutcome::Failed(error.to_string())),
                    Err(_) => (
                        index,
                        QueryOutcome::Failed(format!(
                            "query {} timed out after {:?}",
                            query.id, per_query_timeout
                        )),
                    ),
                }
            }));
        }

        let mut artifacts: Vec<Artifact> = Vec::new();
        let mut failures = 0usize;
        for task in tasks {
            let (index, outcome) = match task.await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "query task failed to join");
                    continue;
                }
            };
            let record: &mut QueryRecord = &mut records[index];
            match outcome {
                QueryOutcome::Artifacts(mut found) => {
                    record.executed = true;
                    record.artifact_ids = found.iter().map(|a| a.id.clone()).collect();
                    debug!(
                        query = %record.query.id,
                        source = %record.query.source,
                        n = found.len(),
                        "query complete"
                    );
                    artifacts.append(&mut found);
                }
                QueryOutcome::Empty(source) => {
                    record.executed = true;
                    ctx.push_warning(
                        self.agent_id(),
                        "source_unavailable",
                        format!("no client registered for source {source}"),
                    )
                    .await?;
                }
                QueryOutcome::Failed(message) => {
                    failures += 1;
                    record.executed = true;
                    record.error = Some(message.clone());
                    ctx.push_warning(self.agent_id(), "query_failed", message)
                        .await?;
                }
            }
        }

        if artifacts.is_empty() {
            let (code, message) = if failures > 0 {
                (
                    "retrieval_degraded",
                    format!("all {failures} failing queries produced no artifacts"),
                )
            } else {
                (
                    "no_artifacts_found",
                    "every query completed but matched nothing".to_string(),
                )
            };
            ctx.push_warning(self.agent_id(), code, message).await?;
        }

        ctx.safe_set(
            self.agent_id(),
            Namespace::Retrieval,
            "queries",
            serde_json::to_value(&records).map_err(|e| AgentError::Fatal(e.to_string()))?,
        )
        .await?;
        ctx.safe_set(
            self.agent_id(),
            Namespace::Retrieval,
            "artifacts",
            serde_json::to_value(&artifacts).map_err(|e| AgentError::Fatal(e.to_string()))?,
        )
        .await?;
        Ok(())
    }
}
