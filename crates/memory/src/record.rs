//! The stored form of a memory, shared by the in-memory and file stores.

use chatloom_core::memory::{Citation, MemoryRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One persisted memory item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMemory {
    /// Unique ID for this memory
    pub id: String,

    /// Chat scope; empty string for global partitions
    pub scope_id: String,

    /// Container this item lives in
    pub container: String,

    /// The memory text
    pub text: String,

    /// Citation for document-sourced items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<Citation>,

    /// When this memory was created
    pub created_at: DateTime<Utc>,
}

impl StoredMemory {
    /// View this item as a retrieval result with the given relevance.
    pub fn to_record(&self, relevance: f32) -> MemoryRecord {
        MemoryRecord {
            text: self.text.clone(),
            relevance,
            memory_type: self.container.clone(),
            chat_id: self.scope_id.clone(),
            citation: self.citation.clone(),
        }
    }
}
