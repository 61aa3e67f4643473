//! Memory store trait — partitioned, relevance-ranked knowledge storage.
//!
//! Memories live in named containers (e.g. "document", "long-term",
//! "working"), each scoped by a chat id. The empty scope id addresses
//! global (chat-independent) partitions. Search returns records ranked by
//! relevance; the store owns how relevance is computed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

/// A reference to the external source backing a retrieved memory snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Link to the source (document path, URL)
    pub link: String,

    /// Human-readable source name
    pub source_name: String,

    /// Content type of the source (e.g. "application/pdf")
    pub source_content_type: String,
}

/// A single retrieved memory. Immutable once returned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// The memory text
    pub text: String,

    /// Relevance to the query, in [0, 1]
    pub relevance: f32,

    /// Which container this record came from
    pub memory_type: String,

    /// The chat scope it was stored under (empty for global)
    pub chat_id: String,

    /// Citation for document-sourced records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<Citation>,
}

/// The memory store trait.
///
/// Implementations: in-memory (testing/ephemeral), file-backed JSONL,
/// no-op (memory disabled). A vector-database variant lives behind the
/// same contract.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// The store name (e.g. "in_memory", "file", "noop").
    fn name(&self) -> &str;

    /// Search one container for records relevant to `query`, scoped by
    /// `scope_id` (empty string = global scope). Only records with
    /// relevance ≥ `threshold` are returned, ranked descending, at most
    /// `limit` of them.
    async fn search(
        &self,
        scope_id: &str,
        container: &str,
        query: &str,
        threshold: f32,
        limit: usize,
    ) -> std::result::Result<Vec<MemoryRecord>, MemoryError>;

    /// Store a text item into a container under the given scope.
    async fn store(
        &self,
        scope_id: &str,
        container: &str,
        item_id: &str,
        text: &str,
    ) -> std::result::Result<(), MemoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serialization() {
        let record = MemoryRecord {
            text: "The user prefers metric units".into(),
            relevance: 0.92,
            memory_type: "long-term".into(),
            chat_id: "chat-1".into(),
            citation: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("metric units"));
        assert!(!json.contains("citation"));
    }

    #[test]
    fn citation_equality() {
        let a = Citation {
            link: "docs/a.pdf".into(),
            source_name: "a.pdf".into(),
            source_content_type: "application/pdf".into(),
        };
        assert_eq!(a, a.clone());
    }
}
