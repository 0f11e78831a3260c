//! Retrieval artifacts and externalization references.
//!
//! Artifact content is an open sum: inline JSON while small, an
//! external reference once the size checker pushes it out of the
//! context. The core treats inline content as opaque except when
//! measuring or externalizing it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A unit of retrieved data, produced by a [`crate::DataSourceClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Identifier assigned by the source.
    pub id: String,
    /// The source that produced this artifact.
    pub source: String,
    /// Artifact kind (`"issue"`, `"document"`, `"record"`, …).
    pub kind: String,
    /// Short human-readable title.
    #[serde(default)]
    pub title: String,
    /// The payload, inline or externalized.
    pub content: ArtifactContent,
    /// Source-reported relevance, in `[0, 1]`.
    #[serde(default)]
    pub relevance: f64,
}

/// Inline payload or a reference to payload stored elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArtifactContent {
    /// A reference to content held by an artifact store.
    External {
        /// Discriminator, always `true` in the serialized form.
        externalized: bool,
        /// Where the content went.
        reference: ExternalReference,
    },
    /// Content carried inside the context.
    Inline(serde_json::Value),
}

impl ArtifactContent {
    /// Wrap an inline JSON payload.
    pub fn inline(value: serde_json::Value) -> Self {
        ArtifactContent::Inline(value)
    }

    /// Whether this content has been externalized.
    pub fn is_externalized(&self) -> bool {
        matches!(self, ArtifactContent::External { .. })
    }

    /// Serialized size in bytes of the inline payload; zero when
    /// externalized.
    pub fn inline_size(&self) -> usize {
        match self {
            ArtifactContent::Inline(value) => {
                serde_json::to_vec(value).map(|v| v.len()).unwrap_or(0)
            }
            ArtifactContent::External { .. } => 0,
        }
    }
}

/// Pointer to externally stored artifact content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalReference {
    /// The artifact id the content belongs to.
    pub id: String,
    /// Content kind, mirrored from the artifact.
    #[serde(rename = "type")]
    pub kind: String,
    /// Serialized size in bytes at externalization time.
    pub size: usize,
    /// Store-specific location (key, path, URL).
    pub location: String,
    /// Hex SHA-256 of the serialized content.
    pub checksum: String,
}

/// Hex SHA-256 digest of a byte slice. Used for artifact checksums and
/// content addressing.
pub fn checksum_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
