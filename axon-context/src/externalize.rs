//! Artifact externalization.
//!
//! When an artifact's inline content outgrows its limit, the content
//! moves to an [`ArtifactStore`] and the artifact keeps a reference
//! `{externalized: true, reference: {id, type, size, location,
//! checksum}}`. Externalization is idempotent: already-externalized
//! artifacts are left alone, and stores are content-addressed by
//! `(id, checksum)` so re-putting the same bytes is a no-op.

use crate::context::AgentContext;
use crate::error::ContextError;
use crate::size::SizeLimits;
use async_trait::async_trait;
use axon_types::artifact::{ArtifactContent, ExternalReference, checksum_hex};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Storage backend for externalized artifact content.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `bytes` for `(artifact_id, checksum)` and return a
    /// location string. Re-putting an existing `(id, checksum)` pair
    /// must return the same location without duplicating storage.
    async fn put(
        &self,
        artifact_id: &str,
        checksum: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ContextError>;

    /// Fetch previously stored content.
    async fn get(&self, artifact_id: &str, checksum: &str) -> Option<Vec<u8>>;
}

/// In-memory artifact store, content-addressed by `(id, checksum)`.
/// Suitable for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    blobs: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryArtifactStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    /// Whether the store holds nothing.
    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(
        &self,
        artifact_id: &str,
        checksum: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ContextError> {
        let key = (artifact_id.to_string(), checksum.to_string());
        let location = format!("mem://{artifact_id}/{checksum}");
        self.blobs.write().await.entry(key).or_insert(bytes);
        Ok(location)
    }

    async fn get(&self, artifact_id: &str, checksum: &str) -> Option<Vec<u8>> {
        self.blobs
            .read()
            .await
            .get(&(artifact_id.to_string(), checksum.to_string()))
            .cloned()
    }
}

/// Replace any artifact whose inline content exceeds
/// `limits.max_inline_artifact_bytes` with an external reference, and
/// append one warning enumerating how many were moved.
///
/// # Errors
///
/// `ContextError::Externalization` when the store rejects a put; the
/// offending artifact keeps its inline content in that case.
pub async fn externalize_artifacts(
    ctx: &mut AgentContext,
    store: &Arc<dyn ArtifactStore>,
    limits: &SizeLimits,
) -> Result<usize, ContextError> {
    let mut moved = 0usize;
    for artifact in &mut ctx.retrieval.artifacts {
        let size = artifact.content.inline_size();
        if size == 0 || size <= limits.max_inline_artifact_bytes {
            continue;
        }
        let ArtifactContent::Inline(value) = &artifact.content else {
            continue;
        };
        let bytes =
            serde_json::to_vec(value).map_err(|e| ContextError::Externalization(e.to_string()))?;
        let checksum = checksum_hex(&bytes);
        let location = store.put(&artifact.id, &checksum, bytes).await?;
        artifact.content = ArtifactContent::External {
            externalized: true,
            reference: ExternalReference {
                id: artifact.id.clone(),
                kind: artifact.kind.clone(),
                size,
                location,
                checksum,
            },
        };
        moved += 1;
    }

    if moved > 0 {
        ctx.push_warning(
            "size_checker",
            "artifacts_externalized",
            format!("externalized {moved} artifact(s) exceeding the inline size limit"),
        );
    }
    Ok(moved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_types::Artifact;
    use serde_json::json;

    fn big_artifact(id: &str) -> Artifact {
        Artifact {
            id: id.into(),
            source: "gitlab".into(),
            kind: "issue".into(),
            title: String::new(),
            content: ArtifactContent::inline(json!({"blob": "x".repeat(4096)})),
            relevance: 0.5,
        }
    }

    fn limits() -> SizeLimits {
        SizeLimits {
            max_inline_artifact_bytes: 1024,
            ..SizeLimits::default()
        }
    }

    #[tokio::test]
    async fn oversized_artifacts_are_externalized_with_warning() {
        let store: Arc<dyn ArtifactStore> = Arc::new(MemoryArtifactStore::new());
        let mut ctx = AgentContext::new("s", "t");
        ctx.retrieval.artifacts.push(big_artifact("a-1"));

        let moved = externalize_artifacts(&mut ctx, &store, &limits())
            .await
            .unwrap();
        assert_eq!(moved, 1);
        assert!(ctx.retrieval.artifacts[0].content.is_externalized());
        assert_eq!(ctx.diagnostics.warnings.len(), 1);
        assert_eq!(ctx.diagnostics.warnings[0].code, "artifacts_externalized");
    }

    #[tokio::test]
    async fn externalization_is_idempotent() {
        let store: Arc<dyn ArtifactStore> = Arc::new(MemoryArtifactStore::new());
        let mut ctx = AgentContext::new("s", "t");
        ctx.retrieval.artifacts.push(big_artifact("a-1"));

        externalize_artifacts(&mut ctx, &store, &limits())
            .await
            .unwrap();
        let reference_before = ctx.retrieval.artifacts[0].content.clone();
        let moved = externalize_artifacts(&mut ctx, &store, &limits())
            .await
            .unwrap();
        assert_eq!(moved, 0);
        // no second warning, reference unchanged
        assert_eq!(ctx.diagnostics.warnings.len(), 1);
        assert!(
            matches!((&reference_before, &ctx.retrieval.artifacts[0].content),
            (ArtifactContent::External { reference: a, .. }, ArtifactContent::External { reference: b, .. })
                if a == b)
        );
    }

    #[tokio::test]
    async fn small_artifacts_stay_inline() {
        let store: Arc<dyn ArtifactStore> = Arc::new(MemoryArtifactStore::new());
        let mut ctx = AgentContext::new("s", "t");
        ctx.retrieval.artifacts.push(Artifact {
            id: "a-1".into(),
            source: "gitlab".into(),
            kind: "issue".into(),
            title: String::new(),
            content: ArtifactContent::inline(json!({"ok": true})),
            relevance: 0.5,
        });
        let moved = externalize_artifacts(&mut ctx, &store, &limits())
            .await
            .unwrap();
        assert_eq!(moved, 0);
        assert!(store.get("a-1", "whatever").await.is_none());
    }
}
