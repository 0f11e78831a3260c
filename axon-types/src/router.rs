//! Routing from a client-visible model name to a provider.
//!
//! The mapping itself (model prefixes, aliases) is host configuration;
//! the core only consumes the trait. [`StaticRouter`] is a table-backed
//! implementation for tests and simple embeddings.

use crate::provider::LlmProvider;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolve the provider that serves a client-requested model name.
pub trait ProviderRouter: Send + Sync {
    /// The provider for `model`, or `None` when no provider serves it.
    fn route(&self, model: &str) -> Option<Arc<dyn LlmProvider>>;
}

/// A fixed prefix table: the longest registered prefix of the model
/// name wins. Registering the empty prefix makes a provider the
/// catch-all default.
#[derive(Default)]
pub struct StaticRouter {
    prefixes: HashMap<String, Arc<dyn LlmProvider>>,
}

impl StaticRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider for a model-name prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>, provider: Arc<dyn LlmProvider>) -> Self {
        self.prefixes.insert(prefix.into(), provider);
        self
    }
}

impl ProviderRouter for StaticRouter {
    fn route(&self, model: &str) -> Option<Arc<dyn LlmProvider>> {
        self.prefixes
            .iter()
            .filter(|(prefix, _)| model.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, provider)| Arc::clone(provider))
    }
}
