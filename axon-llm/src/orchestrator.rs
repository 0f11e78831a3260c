//! The LLM orchestrator: task-aware model selection under budget.

use crate::budget::{BudgetConstraints, BudgetTracker};
use crate::cache::{CacheConfig, CachedResponse, ResponseCache, cache_key};
use crate::error::LlmError;
use crate::profile::{ModelProfile, ModelRef, default_profiles};
use crate::strategy::{ModelSelectionStrategy, TaskType, default_strategies};
use axon_context::LlmDecision;
use axon_types::{ChatMessage, CompletionRequest, LlmProvider, ProviderError, TokenUsage};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Cap on the in-memory decision log; older decisions are dropped.
const MAX_DECISIONS: usize = 256;

/// A semantic request from an agent.
#[derive(Debug, Clone)]
pub struct LlmTask {
    /// The requesting agent.
    pub agent_id: String,
    /// What kind of work this is; drives model selection and caching.
    pub task_type: TaskType,
    /// The prompt to send.
    pub prompt: String,
    /// Completion token cap.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Estimated prompt context size in tokens.
    pub context_size: usize,
    /// Whether the response cache may serve this task.
    pub use_cache: bool,
}

impl LlmTask {
    /// A task with zero temperature, caching on, and a small context.
    pub fn new(
        agent_id: impl Into<String>,
        task_type: TaskType,
        prompt: impl Into<String>,
    ) -> Self {
        let prompt = prompt.into();
        let context_size = prompt.len() / 4;
        Self {
            agent_id: agent_id.into(),
            task_type,
            prompt,
            max_tokens: Some(1024),
            temperature: 0.0,
            context_size,
            use_cache: true,
        }
    }
}

/// What came back from one orchestrated call.
#[derive(Debug, Clone)]
pub struct LlmOutcome {
    /// The response text.
    pub text: String,
    /// The model that produced (or originally produced) the response.
    pub model: ModelRef,
    /// Token counts for the call; cached hits report the original
    /// call's counts.
    pub tokens: TokenUsage,
    /// Cost added by this call; zero on a cache hit.
    pub cost: Decimal,
    /// Whether the response was served from cache.
    pub cache_hit: bool,
    /// The selection decision, ready to append to `llm.decisions`.
    pub decision: LlmDecision,
}

struct ProviderEntry {
    provider: Arc<dyn LlmProvider>,
    credentialed: bool,
}

struct OrchestratorState {
    tracker: BudgetTracker,
    cache: ResponseCache,
    decisions: Vec<LlmDecision>,
    decisions_truncated: bool,
    health: HashMap<String, bool>,
}

/// Routes agent tasks to providers under budget, with caching,
/// fallback chains, and a decision log. Safe for concurrent use from
/// parallel agents: mutable state sits behind one mutex, the profile
/// and strategy tables are immutable after construction.
pub struct LlmOrchestrator {
    profiles: HashMap<ModelRef, ModelProfile>,
    strategies: HashMap<TaskType, ModelSelectionStrategy>,
    providers: HashMap<String, ProviderEntry>,
    budget: BudgetConstraints,
    state: Mutex<OrchestratorState>,
}

impl LlmOrchestrator {
    /// An orchestrator with the built-in profile and strategy tables.
    pub fn new(budget: BudgetConstraints, cache_config: CacheConfig) -> Self {
        Self {
            profiles: default_profiles()
                .into_iter()
                .map(|p| (p.model.clone(), p))
                .collect(),
            strategies: default_strategies()
                .into_iter()
                .map(|s| (s.task_type, s))
                .collect(),
            providers: HashMap::new(),
            budget,
            state: Mutex::new(OrchestratorState {
                tracker: BudgetTracker::new(),
                cache: ResponseCache::new(cache_config),
                decisions: Vec::new(),
                decisions_truncated: false,
                health: HashMap::new(),
            }),
        }
    }

    /// Replace the profile table.
    #[must_use]
    pub fn with_profiles(mut self, profiles: Vec<ModelProfile>) -> Self {
        self.profiles = profiles.into_iter().map(|p| (p.model.clone(), p)).collect();
        self
    }

    /// Replace the strategy table.
    #[must_use]
    pub fn with_strategies(mut self, strategies: Vec<ModelSelectionStrategy>) -> Self {
        self.strategies = strategies.into_iter().map(|s| (s.task_type, s)).collect();
        self
    }

    /// Register a provider. `credentialed` states whether auth-requiring
    /// models of this provider may be used.
    pub fn register_provider(&mut self, provider: Arc<dyn LlmProvider>, credentialed: bool) {
        self.providers.insert(
            provider.name().to_string(),
            ProviderEntry {
                provider,
                credentialed,
            },
        );
    }

    /// The configured budget constraints.
    pub fn budget(&self) -> &BudgetConstraints {
        &self.budget
    }

    /// Probe every registered provider and update the health table.
    pub async fn refresh_health(&self) {
        let mut results = HashMap::new();
        for (name, entry) in &self.providers {
            results.insert(name.clone(), entry.provider.check_health().await);
        }
        self.state.lock().await.health = results;
    }

    /// Clear cost tallies at session start.
    pub async fn reset_session_budget(&self) {
        self.state.lock().await.tracker.reset();
    }

    /// Total session spend so far.
    pub async fn session_spent(&self) -> Decimal {
        self.state.lock().await.tracker.session_spent()
    }

    /// Per-agent spend so far.
    pub async fn spent_by_agent(&self) -> std::collections::BTreeMap<String, Decimal> {
        self.state.lock().await.tracker.by_agent().clone()
    }

    /// The decision log (most recent [`MAX_DECISIONS`] entries).
    pub async fn decisions(&self) -> Vec<LlmDecision> {
        self.state.lock().await.decisions.clone()
    }

    /// Cache `(hits, misses)` so far.
    pub async fn cache_stats(&self) -> (u64, u64) {
        self.state.lock().await.cache.stats()
    }

    /// Account externally observed usage (e.g. the final completion
    /// stream) against the budget and return the cost delta.
    pub async fn track_usage(
        &self,
        agent_id: &str,
        model: &ModelRef,
        usage: TokenUsage,
    ) -> Decimal {
        let mut state = self.state.lock().await;
        self.track_usage_locked(&mut state, agent_id, model, usage)
    }

    /// Run one task: select a model, consult the cache, invoke the
    /// provider, account the cost, and log the decision.
    ///
    /// # Errors
    ///
    /// [`LlmError::BudgetExceeded`] before any provider call when the
    /// budget cannot cover the agent (never for critical agents);
    /// [`LlmError::ContextTooLarge`] when no chain model fits;
    /// [`LlmError::NoHealthyProvider`] when the chain has no usable
    /// provider; otherwise the last provider error after the chain is
    /// exhausted.
    pub async fn execute(&self, task: LlmTask) -> Result<LlmOutcome, LlmError> {
        let strategy = self
            .strategies
            .get(&task.task_type)
            .ok_or(LlmError::UnknownTaskType(task.task_type))?;

        let mut state = self.state.lock().await;
        let candidates = self.select_candidates(strategy, &task, &state)?;

        let cacheable = task.use_cache && (task.temperature <= 0.0 || strategy.deterministic);
        let key = cache_key(
            &task.prompt,
            &candidates[0].model,
            task.temperature,
            task.max_tokens,
        );
        if cacheable {
            if let Some(cached) = state.cache.get(&key) {
                let decision =
                    self.log_decision(&mut state, &task, strategy, &candidates[0], "cache_hit");
                debug!(agent = %task.agent_id, task = %task.task_type, "served from cache");
                return Ok(LlmOutcome {
                    text: cached.text.clone(),
                    model: candidates[0].clone(),
                    tokens: cached.tokens,
                    cost: Decimal::ZERO,
                    cache_hit: true,
                    decision,
                });
            }
        }
        // Hold the lock across provider calls and we'd serialize every
        // agent; drop it and re-acquire for accounting.
        drop(state);

        let demoted = self.is_demoted(&task).await;
        let mut last_error: Option<ProviderError> = None;
        for (index, model) in candidates.iter().enumerate() {
            let entry = match self.providers.get(&model.provider) {
                Some(entry) => entry,
                None => continue,
            };
            let request = self.build_request(model, &task);
            match entry.provider.complete(request).await {
                Ok(response) => {
                    let mut state = self.state.lock().await;
                    let cost =
                        self.track_usage_locked(&mut state, &task.agent_id, model, response.usage);
                    let reason = if demoted {
                        "budget_degradation".to_string()
                    } else if index == 0 && model == &strategy.default_model {
                        "default".to_string()
                    } else {
                        format!("fallback from {}", strategy.default_model)
                    };
                    let decision =
                        self.log_decision(&mut state, &task, strategy, model, &reason);
                    if cacheable {
                        state.cache.insert(
                            key.clone(),
                            CachedResponse {
                                text: response.text.clone(),
                                tokens: response.usage,
                                cost,
                                task_type: task.task_type,
                                created_at: Instant::now(),
                                hit_count: 0,
                            },
                        );
                    }
                    return Ok(LlmOutcome {
                        text: response.text,
                        model: model.clone(),
                        tokens: response.usage,
                        cost,
                        cache_hit: false,
                        decision,
                    });
                }
                Err(error) => {
                    warn!(
                        model = %model, agent = %task.agent_id,
                        error = %error, "provider failed, trying next in chain"
                    );
                    last_error = Some(error);
                }
            }
        }

        match last_error {
            Some(error) => Err(LlmError::Provider(error)),
            None => Err(LlmError::NoHealthyProvider {
                task_type: task.task_type,
            }),
        }
    }

    /// The ordered, eligible candidate chain for a task.
    fn select_candidates(
        &self,
        strategy: &ModelSelectionStrategy,
        task: &LlmTask,
        state: &OrchestratorState,
    ) -> Result<Vec<ModelRef>, LlmError> {
        let chain: Vec<&ModelProfile> = strategy
            .chain()
            .into_iter()
            .filter_map(|m| self.profiles.get(m))
            .collect();

        // Context capacity first: promote to longer-context fallbacks
        // when the strategy's own ceiling is crossed.
        let needs_promotion = task.context_size > strategy.max_context_size;
        let capable: Vec<&ModelProfile> = chain
            .iter()
            .copied()
            .filter(|p| p.context_limit >= task.context_size)
            .collect();
        if capable.is_empty() {
            return Err(LlmError::ContextTooLarge {
                context_size: task.context_size,
                max: chain.iter().map(|p| p.context_limit).max().unwrap_or(0),
            });
        }
        if needs_promotion {
            debug!(
                task = %task.task_type,
                context_size = task.context_size,
                "context exceeds strategy ceiling, promoting within chain"
            );
        }

        let critical = self.budget.is_critical(&task.agent_id);
        if !critical {
            let session_spent = state.tracker.session_spent();
            if session_spent >= self.budget.session_budget_usd {
                return Err(LlmError::BudgetExceeded {
                    agent_id: task.agent_id.clone(),
                    spent: session_spent,
                    limit: self.budget.session_budget_usd,
                });
            }
            let agent_spent = state.tracker.agent_spent(&task.agent_id);
            if agent_spent >= self.budget.agent_budget_usd {
                return Err(LlmError::BudgetExceeded {
                    agent_id: task.agent_id.clone(),
                    spent: agent_spent,
                    limit: self.budget.agent_budget_usd,
                });
            }
        }

        let mut ordered: Vec<&ModelProfile> = capable
            .into_iter()
            .filter(|p| self.provider_usable(p, state))
            .collect();
        if ordered.is_empty() {
            return Err(LlmError::NoHealthyProvider {
                task_type: task.task_type,
            });
        }

        // Emergency degradation: cheapest-first under budget pressure.
        // Critical agents keep their default ordering.
        let utilization = state.tracker.utilization(self.budget.session_budget_usd);
        if self.budget.emergency_degradation_enabled
            && utilization >= self.budget.warning_threshold
            && !critical
        {
            ordered.sort_by_key(|p| p.cost_per_1k_tokens);
        }

        Ok(ordered.into_iter().map(|p| p.model.clone()).collect())
    }

    fn provider_usable(&self, profile: &ModelProfile, state: &OrchestratorState) -> bool {
        let Some(entry) = self.providers.get(&profile.model.provider) else {
            return false;
        };
        if profile.requires_auth && !entry.credentialed {
            return false;
        }
        state
            .health
            .get(&profile.model.provider)
            .copied()
            .unwrap_or(true)
    }

    async fn is_demoted(&self, task: &LlmTask) -> bool {
        if !self.budget.emergency_degradation_enabled || self.budget.is_critical(&task.agent_id) {
            return false;
        }
        let state = self.state.lock().await;
        state.tracker.utilization(self.budget.session_budget_usd) >= self.budget.warning_threshold
    }

    fn build_request(&self, model: &ModelRef, task: &LlmTask) -> CompletionRequest {
        let mut request = CompletionRequest::new(
            model.model.clone(),
            vec![ChatMessage::user(task.prompt.clone())],
        );
        request.temperature = Some(task.temperature);
        request.max_tokens = task.max_tokens;
        request
    }

    /// Accumulate usage and return the cost delta for this call.
    fn track_usage_locked(
        &self,
        state: &mut OrchestratorState,
        agent_id: &str,
        model: &ModelRef,
        usage: TokenUsage,
    ) -> Decimal {
        let per_1k = self
            .profiles
            .get(model)
            .map(|p| p.cost_per_1k_tokens)
            .unwrap_or(Decimal::ZERO);
        let cost = per_1k * Decimal::from(usage.total_tokens) / Decimal::from(1000);
        state.tracker.record(agent_id, cost);
        cost
    }

    fn log_decision(
        &self,
        state: &mut OrchestratorState,
        task: &LlmTask,
        strategy: &ModelSelectionStrategy,
        model: &ModelRef,
        reason: &str,
    ) -> LlmDecision {
        let decision = LlmDecision {
            timestamp: Utc::now(),
            agent_id: task.agent_id.clone(),
            task_type: task.task_type.as_str().to_string(),
            provider: model.provider.clone(),
            model: model.model.clone(),
            reason: reason.to_string(),
            complexity: strategy.complexity.as_str().to_string(),
        };
        if state.decisions.len() >= MAX_DECISIONS {
            state.decisions.remove(0);
            if !state.decisions_truncated {
                state.decisions_truncated = true;
                warn!("decision log reached {MAX_DECISIONS} entries, truncating oldest");
            }
        }
        state.decisions.push(decision.clone());
        decision
    }
}
