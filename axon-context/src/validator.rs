//! Write-permission enforcement.
//!
//! Namespace isolation is enforced at mutation, not at read time:
//! agents may inspect foreign data but never write it. Registrations
//! are fixed before the run starts; the `*` token grants all
//! namespaces.

use crate::context::AgentContext;
use crate::error::ContextViolation;
use crate::namespaces::{FieldError, Namespace};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

/// Per-agent write grants.
#[derive(Debug, Clone)]
enum Grant {
    All,
    Namespaces(HashSet<Namespace>),
}

/// The write-ACL table for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    grants: HashMap<String, Grant>,
}

impl Validator {
    /// An empty validator with no registrations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent with its permitted namespaces. The single
    /// token `"*"` grants every namespace.
    pub fn register_agent<I, S>(&mut self, agent_id: impl Into<String>, namespaces: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = HashSet::new();
        for ns in namespaces {
            if ns.as_ref() == "*" {
                self.grants.insert(agent_id.into(), Grant::All);
                return;
            }
            if let Ok(parsed) = Namespace::from_str(ns.as_ref()) {
                set.insert(parsed);
            }
        }
        self.grants.insert(agent_id.into(), Grant::Namespaces(set));
    }

    /// Whether `agent_id` has been registered at all.
    pub fn is_registered(&self, agent_id: &str) -> bool {
        self.grants.contains_key(agent_id)
    }

    /// Whether `agent_id` may write `namespace`.
    pub fn may_write(&self, agent_id: &str, namespace: Namespace) -> bool {
        match self.grants.get(agent_id) {
            Some(Grant::All) => true,
            Some(Grant::Namespaces(set)) => set.contains(&namespace),
            None => false,
        }
    }

    /// The namespaces `agent_id` may write, in canonical order.
    pub fn writable_namespaces(&self, agent_id: &str) -> Vec<Namespace> {
        Namespace::ALL
            .iter()
            .copied()
            .filter(|ns| self.may_write(agent_id, *ns))
            .collect()
    }

    /// Reads are always permitted; there is no in-process secrecy.
    pub fn validate_read(&self, _agent_id: &str, _namespace: Namespace) -> bool {
        true
    }

    /// Validated field write. Fails when the agent is unregistered, the
    /// namespace is not permitted, the field is read-only or unknown,
    /// the value's type mismatches, or the context is sealed.
    pub fn safe_set(
        &self,
        ctx: &mut AgentContext,
        agent_id: &str,
        namespace: Namespace,
        field: &str,
        value: serde_json::Value,
    ) -> Result<(), ContextViolation> {
        let violation = |message: String| ContextViolation {
            agent_id: agent_id.to_string(),
            namespace,
            key: field.to_string(),
            message,
        };

        if ctx.sealed {
            return Err(violation("context is sealed".to_string()));
        }
        if !self.is_registered(agent_id) {
            return Err(violation("agent not registered".to_string()));
        }
        if !self.may_write(agent_id, namespace) {
            return Err(violation(format!(
                "namespace {namespace} not permitted for agent"
            )));
        }

        ctx.set_namespace_field(namespace, field, value)
            .map_err(|e| match e {
                FieldError::Unknown => violation("unknown field".to_string()),
                FieldError::ReadOnly => violation("field is read-only".to_string()),
                FieldError::Type(detail) => violation(format!("type mismatch: {detail}")),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator() -> Validator {
        let mut v = Validator::new();
        v.register_agent("intent_detection", ["reasoning", "diagnostics", "audit"]);
        v.register_agent("orchestrator", ["*"]);
        v
    }

    #[test]
    fn unregistered_agent_is_rejected() {
        let v = validator();
        let mut ctx = AgentContext::new("s", "t");
        let err = v
            .safe_set(&mut ctx, "ghost", Namespace::Reasoning, "summary", json!("x"))
            .unwrap_err();
        assert!(err.message.contains("not registered"));
    }

    #[test]
    fn denied_namespace_leaves_context_unchanged() {
        let v = validator();
        let mut ctx = AgentContext::new("s", "t");
        let before = ctx.serialize().unwrap();
        let err = v
            .safe_set(
                &mut ctx,
                "intent_detection",
                Namespace::Retrieval,
                "plans",
                json!([]),
            )
            .unwrap_err();
        assert!(err.message.contains("not permitted"));
        assert_eq!(ctx.serialize().unwrap(), before);
    }

    #[test]
    fn wildcard_grants_everything() {
        let v = validator();
        let mut ctx = AgentContext::new("s", "t");
        for ns in Namespace::ALL {
            assert!(v.may_write("orchestrator", ns));
        }
        v.safe_set(
            &mut ctx,
            "orchestrator",
            Namespace::Metadata,
            "locale",
            json!("fr-FR"),
        )
        .unwrap();
        assert_eq!(ctx.metadata.locale, "fr-FR");
    }

    #[test]
    fn metadata_read_only_fields_stay_read_only() {
        let v = validator();
        let mut ctx = AgentContext::new("s", "t");
        let err = v
            .safe_set(
                &mut ctx,
                "orchestrator",
                Namespace::Metadata,
                "trace_id",
                json!("forged"),
            )
            .unwrap_err();
        assert!(err.message.contains("read-only"));
    }

    #[test]
    fn sealed_context_rejects_writes() {
        let v = validator();
        let mut ctx = AgentContext::new("s", "t");
        ctx.seal();
        let err = v
            .safe_set(
                &mut ctx,
                "intent_detection",
                Namespace::Reasoning,
                "summary",
                json!("late"),
            )
            .unwrap_err();
        assert!(err.message.contains("sealed"));
    }

    #[test]
    fn type_mismatch_is_a_violation() {
        let v = validator();
        let mut ctx = AgentContext::new("s", "t");
        let err = v
            .safe_set(
                &mut ctx,
                "intent_detection",
                Namespace::Reasoning,
                "intents",
                json!("not a list"),
            )
            .unwrap_err();
        assert!(err.message.contains("type mismatch"));
    }
}
