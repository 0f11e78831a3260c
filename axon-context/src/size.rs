//! Size limits and enforcement.

use crate::context::AgentContext;
use crate::error::ContextSizeError;
use crate::namespaces::Namespace;

/// Configured caps on context growth.
#[derive(Debug, Clone, Copy)]
pub struct SizeLimits {
    /// Total serialized context size in bytes.
    pub max_total_bytes: usize,
    /// Serialized size of any single namespace in bytes.
    pub max_namespace_bytes: usize,
    /// Items in any single array.
    pub max_array_items: usize,
    /// Artifact size above which externalization kicks in.
    pub externalization_threshold_bytes: usize,
    /// Largest artifact content that may stay inline.
    pub max_inline_artifact_bytes: usize,
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            max_total_bytes: 10 * 1024 * 1024,
            max_namespace_bytes: 2 * 1024 * 1024,
            max_array_items: 1000,
            externalization_threshold_bytes: 100 * 1024,
            max_inline_artifact_bytes: 50 * 1024,
        }
    }
}

/// Checks a context against configured [`SizeLimits`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeChecker {
    limits: SizeLimits,
}

impl SizeChecker {
    /// A checker with the given limits.
    pub fn new(limits: SizeLimits) -> Self {
        Self { limits }
    }

    /// The configured limits.
    pub fn limits(&self) -> &SizeLimits {
        &self.limits
    }

    /// Verify every limit. The first violation is returned, naming the
    /// limit, the observed value, and the cap.
    ///
    /// # Errors
    ///
    /// `ContextSizeError` on the first exceeded limit.
    pub fn check(&self, ctx: &AgentContext) -> Result<(), ContextSizeError> {
        for (path, len) in ctx.array_lengths() {
            if len > self.limits.max_array_items {
                return Err(ContextSizeError {
                    limit: format!("array_items:{path}"),
                    current: len,
                    maximum: self.limits.max_array_items,
                });
            }
        }

        let mut total = 0usize;
        for ns in Namespace::ALL {
            let size = ctx.namespace_size(ns);
            total += size;
            if size > self.limits.max_namespace_bytes {
                return Err(ContextSizeError {
                    limit: format!("namespace_bytes:{ns}"),
                    current: size,
                    maximum: self.limits.max_namespace_bytes,
                });
            }
        }
        if total > self.limits.max_total_bytes {
            return Err(ContextSizeError {
                limit: "total_bytes".to_string(),
                current: total,
                maximum: self.limits.max_total_bytes,
            });
        }
        Ok(())
    }

    /// Whether any inline artifact has outgrown the externalization
    /// threshold.
    pub fn should_externalize_artifacts(&self, ctx: &AgentContext) -> bool {
        ctx.retrieval
            .artifacts
            .iter()
            .any(|a| a.content.inline_size() > self.limits.externalization_threshold_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_types::{Artifact, ArtifactContent};
    use serde_json::json;

    fn artifact_with_payload(id: &str, payload: serde_json::Value) -> Artifact {
        Artifact {
            id: id.into(),
            source: "gitlab".into(),
            kind: "issue".into(),
            title: String::new(),
            content: ArtifactContent::inline(payload),
            relevance: 0.5,
        }
    }

    #[test]
    fn fresh_context_passes() {
        let checker = SizeChecker::default();
        let ctx = AgentContext::new("s", "t");
        assert!(checker.check(&ctx).is_ok());
    }

    #[test]
    fn array_limit_is_enforced() {
        let checker = SizeChecker::new(SizeLimits {
            max_array_items: 2,
            ..SizeLimits::default()
        });
        let mut ctx = AgentContext::new("s", "t");
        for i in 0..3 {
            ctx.retrieval
                .artifacts
                .push(artifact_with_payload(&format!("a-{i}"), json!({})));
        }
        let err = checker.check(&ctx).unwrap_err();
        assert_eq!(err.limit, "array_items:retrieval.artifacts");
        assert_eq!(err.current, 3);
        assert_eq!(err.maximum, 2);
    }

    #[test]
    fn namespace_byte_limit_is_enforced() {
        let checker = SizeChecker::new(SizeLimits {
            max_namespace_bytes: 256,
            ..SizeLimits::default()
        });
        let mut ctx = AgentContext::new("s", "t");
        ctx.retrieval.artifacts.push(artifact_with_payload(
            "a-1",
            json!({"blob": "x".repeat(512)}),
        ));
        let err = checker.check(&ctx).unwrap_err();
        assert!(err.limit.starts_with("namespace_bytes:retrieval"));
    }

    #[test]
    fn externalization_trigger_watches_inline_size() {
        let checker = SizeChecker::new(SizeLimits {
            externalization_threshold_bytes: 64,
            ..SizeLimits::default()
        });
        let mut ctx = AgentContext::new("s", "t");
        assert!(!checker.should_externalize_artifacts(&ctx));
        ctx.retrieval.artifacts.push(artifact_with_payload(
            "a-1",
            json!({"blob": "x".repeat(256)}),
        ));
        assert!(checker.should_externalize_artifacts(&ctx));
    }
}
