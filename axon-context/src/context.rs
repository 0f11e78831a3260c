//! The versioned blackboard itself.

use crate::entities::{DiagnosticError, DiagnosticWarning, Severity};
use crate::error::ContextError;
use crate::namespaces::*;
use axon_types::{SessionId, TraceId};
use chrono::Utc;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Current context schema version. Deserialization accepts any `1.x`.
pub const SCHEMA_VERSION: &str = "1.0";

/// The versioned, namespaced blackboard that carries all reasoning
/// state through one pipeline run.
///
/// Created by the streaming coordinator, exclusively owned by the
/// pipeline scheduler for the duration of the run, sealed on
/// completion. Agents mutate it only through the validator's
/// [`safe_set`](crate::ContextHandle::safe_set).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentContext {
    /// Schema version of this snapshot.
    pub version: String,
    /// Whether the context has been sealed (no further writes).
    #[serde(default)]
    pub sealed: bool,
    /// Session identity.
    pub metadata: MetadataNs,
    /// Intents, hypotheses, conclusions, summary.
    pub reasoning: ReasoningNs,
    /// Facts and derived knowledge.
    pub enrichment: EnrichmentNs,
    /// Plans, queries, artifacts.
    pub retrieval: RetrievalNs,
    /// Model selection and usage accounting.
    pub llm: LlmNs,
    /// Errors, warnings, performance, validation reports.
    pub diagnostics: DiagnosticsNs,
    /// Agent runs and diffs.
    pub audit: AuditNs,
}

impl AgentContext {
    /// Create a fresh context for one request.
    pub fn new(session_id: impl Into<SessionId>, trace_id: impl Into<TraceId>) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            sealed: false,
            metadata: MetadataNs {
                session_id: session_id.into(),
                trace_id: trace_id.into(),
                created_at: Utc::now(),
                locale: "en-US".to_string(),
            },
            reasoning: ReasoningNs::default(),
            enrichment: EnrichmentNs::default(),
            retrieval: RetrievalNs::default(),
            llm: LlmNs::default(),
            diagnostics: DiagnosticsNs::default(),
            audit: AuditNs::default(),
        }
    }

    /// Seal the context. Further `safe_set` calls fail.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Serialize to canonical JSON bytes.
    ///
    /// # Errors
    ///
    /// `ContextError::Serialization` when encoding fails.
    pub fn serialize(&self) -> Result<Vec<u8>, ContextError> {
        serde_json::to_vec(self).map_err(|e| ContextError::Serialization(e.to_string()))
    }

    /// Deserialize from JSON bytes, checking the schema version.
    ///
    /// # Errors
    ///
    /// `ContextError::Serialization` on malformed JSON,
    /// `ContextError::Version` on an unsupported schema version.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, ContextError> {
        let ctx: AgentContext =
            serde_json::from_slice(bytes).map_err(|e| ContextError::Serialization(e.to_string()))?;
        let major = ctx.version.split('.').next().unwrap_or("");
        let supported = SCHEMA_VERSION.split('.').next().unwrap_or("");
        if major != supported {
            return Err(ContextError::Version {
                found: ctx.version.clone(),
                supported: SCHEMA_VERSION.to_string(),
            });
        }
        Ok(ctx)
    }

    /// Serialize to gzip-compressed JSON, for persisted snapshots.
    ///
    /// # Errors
    ///
    /// `ContextError::Serialization` when encoding fails.
    pub fn serialize_compressed(&self) -> Result<Vec<u8>, ContextError> {
        let json = self.serialize()?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&json)
            .and_then(|_| encoder.finish())
            .map_err(|e| ContextError::Serialization(e.to_string()))
    }

    /// Deserialize from gzip-compressed JSON.
    ///
    /// # Errors
    ///
    /// `ContextError::Serialization` on corrupt input,
    /// `ContextError::Version` on an unsupported schema version.
    pub fn deserialize_compressed(bytes: &[u8]) -> Result<Self, ContextError> {
        let mut decoder = GzDecoder::new(bytes);
        let mut json = Vec::new();
        decoder
            .read_to_end(&mut json)
            .map_err(|e| ContextError::Serialization(e.to_string()))?;
        Self::deserialize(&json)
    }

    /// The whole context as a JSON value, for contract-path checks and
    /// condition evaluation.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Lengths of every bounded array, keyed by dotted path.
    pub fn array_lengths(&self) -> Vec<(&'static str, usize)> {
        array_lengths(
            &self.reasoning,
            &self.enrichment,
            &self.retrieval,
            &self.llm,
            &self.diagnostics,
            &self.audit,
        )
    }

    /// Serialized size in bytes of one namespace.
    pub fn namespace_size(&self, namespace: Namespace) -> usize {
        let bytes = match namespace {
            Namespace::Metadata => serde_json::to_vec(&self.metadata),
            Namespace::Reasoning => serde_json::to_vec(&self.reasoning),
            Namespace::Enrichment => serde_json::to_vec(&self.enrichment),
            Namespace::Retrieval => serde_json::to_vec(&self.retrieval),
            Namespace::Llm => serde_json::to_vec(&self.llm),
            Namespace::Diagnostics => serde_json::to_vec(&self.diagnostics),
            Namespace::Audit => serde_json::to_vec(&self.audit),
        };
        bytes.map(|b| b.len()).unwrap_or(0)
    }

    /// Route a field write into a namespace. ACL checks happen in the
    /// validator; this only does field routing and type checking.
    pub(crate) fn set_namespace_field(
        &mut self,
        namespace: Namespace,
        field: &str,
        value: serde_json::Value,
    ) -> Result<(), FieldError> {
        match namespace {
            Namespace::Metadata => self.metadata.set_field(field, value),
            Namespace::Reasoning => self.reasoning.set_field(field, value),
            Namespace::Enrichment => self.enrichment.set_field(field, value),
            Namespace::Retrieval => self.retrieval.set_field(field, value),
            Namespace::Llm => self.llm.set_field(field, value),
            Namespace::Diagnostics => self.diagnostics.set_field(field, value),
            Namespace::Audit => self.audit.set_field(field, value),
        }
    }

    /// Copy the given namespaces from `snapshot` into `self`. Used for
    /// rollback after a failed run; siblings' namespaces are untouched.
    pub fn restore_namespaces(&mut self, snapshot: &AgentContext, namespaces: &[Namespace]) {
        for ns in namespaces {
            match ns {
                Namespace::Metadata => self.metadata = snapshot.metadata.clone(),
                Namespace::Reasoning => self.reasoning = snapshot.reasoning.clone(),
                Namespace::Enrichment => self.enrichment = snapshot.enrichment.clone(),
                Namespace::Retrieval => self.retrieval = snapshot.retrieval.clone(),
                Namespace::Llm => self.llm = snapshot.llm.clone(),
                Namespace::Diagnostics => self.diagnostics = snapshot.diagnostics.clone(),
                Namespace::Audit => self.audit = snapshot.audit.clone(),
            }
        }
    }

    /// Append an error to diagnostics.
    pub fn push_error(
        &mut self,
        agent_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
    ) {
        self.diagnostics.errors.push(DiagnosticError {
            timestamp: Utc::now(),
            agent_id: agent_id.into(),
            code: code.into(),
            message: message.into(),
            severity,
        });
    }

    /// Append a warning to diagnostics.
    pub fn push_warning(
        &mut self,
        agent_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.diagnostics.warnings.push(DiagnosticWarning {
            timestamp: Utc::now(),
            agent_id: agent_id.into(),
            code: code.into(),
            message: message.into(),
        });
    }
}
