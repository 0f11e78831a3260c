//! Shared ownership of one context during a pipeline run.
//!
//! The scheduler owns the context; agents receive a [`ContextHandle`]
//! and may only mutate permitted namespaces through the validator.
//! A single write lock per mutation keeps updates linearizable; the
//! DAG compiler guarantees no two same-level agents write the same
//! data namespace, so replace-style writes cannot lose updates.

use crate::context::AgentContext;
use crate::entities::Severity;
use crate::error::ContextViolation;
use crate::namespaces::Namespace;
use crate::validator::Validator;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A cloneable handle to the run's shared context.
#[derive(Clone)]
pub struct ContextHandle {
    inner: Arc<RwLock<AgentContext>>,
    validator: Arc<Validator>,
}

impl ContextHandle {
    /// Wrap a context and its validator.
    pub fn new(ctx: AgentContext, validator: Validator) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ctx)),
            validator: Arc::new(validator),
        }
    }

    /// The validator governing writes through this handle.
    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// A deep copy of the current context.
    pub async fn snapshot(&self) -> AgentContext {
        self.inner.read().await.clone()
    }

    /// Run a closure against the current context under the read lock.
    pub async fn with<R>(&self, f: impl FnOnce(&AgentContext) -> R) -> R {
        f(&*self.inner.read().await)
    }

    /// Validated field write; the agent write path.
    ///
    /// # Errors
    ///
    /// `ContextViolation` when the validator rejects the write; the
    /// context is left unchanged.
    pub async fn safe_set(
        &self,
        agent_id: &str,
        namespace: Namespace,
        field: &str,
        value: serde_json::Value,
    ) -> Result<(), ContextViolation> {
        let mut ctx = self.inner.write().await;
        self.validator.safe_set(&mut ctx, agent_id, namespace, field, value)
    }

    /// Append a diagnostic warning. Requires write permission on the
    /// diagnostics namespace; appends under one lock acquisition so
    /// parallel agents never lose each other's warnings.
    ///
    /// # Errors
    ///
    /// `ContextViolation` when the agent may not write diagnostics.
    pub async fn push_warning(
        &self,
        agent_id: &str,
        code: &str,
        message: impl Into<String>,
    ) -> Result<(), ContextViolation> {
        let mut ctx = self.inner.write().await;
        self.check_diagnostics_grant(&ctx, agent_id, code)?;
        ctx.push_warning(agent_id, code, message);
        Ok(())
    }

    /// Append a diagnostic error, same grant rules as
    /// [`push_warning`](Self::push_warning).
    ///
    /// # Errors
    ///
    /// `ContextViolation` when the agent may not write diagnostics.
    pub async fn push_error(
        &self,
        agent_id: &str,
        code: &str,
        message: impl Into<String>,
        severity: Severity,
    ) -> Result<(), ContextViolation> {
        let mut ctx = self.inner.write().await;
        self.check_diagnostics_grant(&ctx, agent_id, code)?;
        ctx.push_error(agent_id, code, message, severity);
        Ok(())
    }

    fn check_diagnostics_grant(
        &self,
        ctx: &AgentContext,
        agent_id: &str,
        code: &str,
    ) -> Result<(), ContextViolation> {
        let violation = |message: String| ContextViolation {
            agent_id: agent_id.to_string(),
            namespace: Namespace::Diagnostics,
            key: code.to_string(),
            message,
        };
        if ctx.sealed {
            return Err(violation("context is sealed".to_string()));
        }
        if !self.validator.may_write(agent_id, Namespace::Diagnostics) {
            return Err(violation("namespace diagnostics not permitted for agent".to_string()));
        }
        Ok(())
    }

    /// Unchecked mutable access for the scheduler and coordinator,
    /// which own the context (registered as `orchestrator` with the
    /// `*` grant). Agent code must use [`safe_set`](Self::safe_set).
    pub async fn privileged_mut<R>(&self, f: impl FnOnce(&mut AgentContext) -> R) -> R {
        f(&mut *self.inner.write().await)
    }

    /// Seal the context; all subsequent writes fail.
    pub async fn seal(&self) {
        self.inner.write().await.seal();
    }
}
