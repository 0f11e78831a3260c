//! Diff capture between context snapshots.
//!
//! Diffs are compact by design: per-namespace arrays are compared by
//! length (added counts), scalar fields by equality (from/to records).
//! The tracker holds only the last captured snapshot; callers that
//! need the full history keep it in `audit.diffs`.

use crate::context::AgentContext;
use crate::entities::{ContextDiff, FieldChange};
use crate::namespaces::Namespace;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Tracks one snapshot and produces diffs against it.
#[derive(Debug, Clone)]
pub struct DiffTracker {
    snapshot: AgentContext,
}

impl DiffTracker {
    /// Start tracking from `initial`.
    pub fn new(initial: AgentContext) -> Self {
        Self { snapshot: initial }
    }

    /// Replace the tracked snapshot without producing a diff.
    pub fn reset(&mut self, snapshot: AgentContext) {
        self.snapshot = snapshot;
    }

    /// The tracked snapshot.
    pub fn snapshot(&self) -> &AgentContext {
        &self.snapshot
    }

    /// Diff `current` against the tracked snapshot, attribute it to
    /// `agent_id`, and advance the snapshot to `current`.
    pub fn capture(&mut self, agent_id: &str, current: &AgentContext) -> ContextDiff {
        let diff = diff_between(&self.snapshot, current, agent_id, None);
        self.snapshot = current.clone();
        diff
    }

    /// Like [`capture`](Self::capture), but only considering the given
    /// namespaces. Used at parallel levels where each agent's writes
    /// are confined to its own namespaces.
    pub fn capture_filtered(
        &mut self,
        agent_id: &str,
        current: &AgentContext,
        namespaces: &[Namespace],
    ) -> ContextDiff {
        let diff = diff_between(&self.snapshot, current, agent_id, Some(namespaces));
        diff
    }
}

fn count_delta(counts: &mut BTreeMap<String, u64>, name: &str, before: usize, after: usize) {
    if after > before {
        let field = name.rsplit('.').next().unwrap_or(name);
        counts.insert(format!("{field}_added"), (after - before) as u64);
    }
}

fn scalar_change(
    changes: &mut Vec<FieldChange>,
    field: &str,
    from: serde_json::Value,
    to: serde_json::Value,
) {
    if from != to {
        changes.push(FieldChange {
            field: field.to_string(),
            from,
            to,
        });
    }
}

/// Compute a diff between two snapshots, optionally restricted to a
/// namespace set.
pub fn diff_between(
    before: &AgentContext,
    after: &AgentContext,
    agent_id: &str,
    filter: Option<&[Namespace]>,
) -> ContextDiff {
    let included = |ns: Namespace| filter.is_none_or(|set| set.contains(&ns));

    let mut counts = BTreeMap::new();
    let before_lengths: BTreeMap<&str, usize> = before.array_lengths().into_iter().collect();
    for (path, after_len) in after.array_lengths() {
        let ns = path
            .split('.')
            .next()
            .and_then(|s| s.parse::<Namespace>().ok());
        if !ns.map(included).unwrap_or(true) {
            continue;
        }
        let before_len = before_lengths.get(path).copied().unwrap_or(0);
        count_delta(&mut counts, path, before_len, after_len);
    }

    let mut changes = Vec::new();
    if included(Namespace::Llm) {
        scalar_change(
            &mut changes,
            "llm.provider",
            serde_json::json!(before.llm.provider),
            serde_json::json!(after.llm.provider),
        );
        scalar_change(
            &mut changes,
            "llm.model",
            serde_json::json!(before.llm.model),
            serde_json::json!(after.llm.model),
        );
    }
    if included(Namespace::Reasoning) {
        scalar_change(
            &mut changes,
            "reasoning.summary",
            serde_json::json!(before.reasoning.summary),
            serde_json::json!(after.reasoning.summary),
        );
    }
    if included(Namespace::Metadata) {
        scalar_change(
            &mut changes,
            "metadata.locale",
            serde_json::json!(before.metadata.locale),
            serde_json::json!(after.metadata.locale),
        );
    }

    let cost_added = if included(Namespace::Llm) {
        after.llm.usage.cost_usd - before.llm.usage.cost_usd
    } else {
        Decimal::ZERO
    };

    let namespaces_changed = Namespace::ALL
        .iter()
        .copied()
        .filter(|ns| included(*ns))
        .filter(|ns| before.namespace_size(*ns) != after.namespace_size(*ns) || {
            // equal byte length does not prove equality; fall back to a
            // full comparison only in that narrow case
            namespace_json(before, *ns) != namespace_json(after, *ns)
        })
        .map(|ns| ns.as_str().to_string())
        .collect();

    ContextDiff {
        agent_id: agent_id.to_string(),
        timestamp: Utc::now(),
        counts,
        changes,
        cost_added,
        namespaces_changed,
    }
}

fn namespace_json(ctx: &AgentContext, ns: Namespace) -> serde_json::Value {
    let value = match ns {
        Namespace::Metadata => serde_json::to_value(&ctx.metadata),
        Namespace::Reasoning => serde_json::to_value(&ctx.reasoning),
        Namespace::Enrichment => serde_json::to_value(&ctx.enrichment),
        Namespace::Retrieval => serde_json::to_value(&ctx.retrieval),
        Namespace::Llm => serde_json::to_value(&ctx.llm),
        Namespace::Diagnostics => serde_json::to_value(&ctx.diagnostics),
        Namespace::Audit => serde_json::to_value(&ctx.audit),
    };
    value.unwrap_or(serde_json::Value::Null)
}
