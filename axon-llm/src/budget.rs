//! Budget constraints and cost tallies.
//!
//! All arithmetic is `Decimal`; per-agent tallies sum exactly to the
//! session total.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configured budget limits for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConstraints {
    /// Hard cap on session spend in USD.
    pub session_budget_usd: Decimal,
    /// Hard cap on any single agent's spend in USD.
    pub agent_budget_usd: Decimal,
    /// Fraction of the session budget at which degradation starts,
    /// in `[0, 1]`.
    pub warning_threshold: f64,
    /// Whether to demote to cheaper models under budget pressure.
    pub emergency_degradation_enabled: bool,
    /// Agents exempt from budget-driven skipping and demotion below
    /// their default model.
    pub critical_agents: Vec<String>,
}

impl Default for BudgetConstraints {
    fn default() -> Self {
        Self {
            session_budget_usd: Decimal::new(50, 2),  // $0.50
            agent_budget_usd: Decimal::new(20, 2),    // $0.20
            warning_threshold: 0.8,
            emergency_degradation_enabled: true,
            critical_agents: vec!["inference".to_string()],
        }
    }
}

impl BudgetConstraints {
    /// Whether `agent_id` is exempt from budget skipping.
    pub fn is_critical(&self, agent_id: &str) -> bool {
        self.critical_agents.iter().any(|a| a == agent_id)
    }
}

/// Running spend for one session.
#[derive(Debug, Clone, Default)]
pub struct BudgetTracker {
    session_spent: Decimal,
    by_agent: BTreeMap<String, Decimal>,
}

impl BudgetTracker {
    /// A tracker with nothing spent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `cost` against `agent_id` and return the new session total.
    pub fn record(&mut self, agent_id: &str, cost: Decimal) -> Decimal {
        self.session_spent += cost;
        *self
            .by_agent
            .entry(agent_id.to_string())
            .or_insert(Decimal::ZERO) += cost;
        self.session_spent
    }

    /// Total session spend.
    pub fn session_spent(&self) -> Decimal {
        self.session_spent
    }

    /// Spend attributed to one agent.
    pub fn agent_spent(&self, agent_id: &str) -> Decimal {
        self.by_agent
            .get(agent_id)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Per-agent tallies.
    pub fn by_agent(&self) -> &BTreeMap<String, Decimal> {
        &self.by_agent
    }

    /// Session utilization as a fraction of `budget`, clamped to
    /// `[0, 1]`. A zero budget counts as fully utilized once anything
    /// was spent.
    pub fn utilization(&self, budget: Decimal) -> f64 {
        if budget <= Decimal::ZERO {
            return if self.session_spent.is_zero() { 0.0 } else { 1.0 };
        }
        let ratio = self.session_spent / budget;
        ratio.to_f64().unwrap_or(1.0).clamp(0.0, 1.0)
    }

    /// Clear all tallies at session start.
    pub fn reset(&mut self) {
        self.session_spent = Decimal::ZERO;
        self.by_agent.clear();
    }
}
