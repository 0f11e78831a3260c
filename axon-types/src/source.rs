//! The data-source boundary.
//!
//! Retrieval agents query external systems (issue trackers, wikis,
//! search indexes) through this trait. Adapters (MCP, REST) implement
//! it outside the core. Unknown sources degrade to empty results, not
//! errors.

use crate::artifact::Artifact;
use crate::error::RetrievalError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// A normalized query against one data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceQuery {
    /// Query identifier, unique within a run.
    pub id: String,
    /// Target source name.
    pub source: String,
    /// Normalized query string in the source's dialect.
    pub query: String,
    /// Source-specific filters (`"state" => "open"`, …).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, String>,
    /// Cap on returned artifacts.
    #[serde(default = "SourceQuery::default_limit")]
    pub limit: usize,
}

impl SourceQuery {
    fn default_limit() -> usize {
        20
    }

    /// Create a query with the default limit and no filters.
    pub fn new(id: impl Into<String>, source: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            query: query.into(),
            filters: BTreeMap::new(),
            limit: Self::default_limit(),
        }
    }
}

/// A client for one external data source.
#[async_trait]
pub trait DataSourceClient: Send + Sync {
    /// The source this client serves.
    fn source_name(&self) -> &str;

    /// Execute a query and return its artifacts.
    ///
    /// Must return promptly when `cancel` fires. An unknown query
    /// against a healthy source returns an empty slice, not an error.
    async fn execute_query(
        &self,
        cancel: CancellationToken,
        query: SourceQuery,
    ) -> Result<Vec<Artifact>, RetrievalError>;

    /// Whether the source is currently reachable.
    async fn health_check(&self) -> bool;
}
