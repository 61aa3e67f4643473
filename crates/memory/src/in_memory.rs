//! In-memory store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chatloom_core::error::MemoryError;
use chatloom_core::memory::{Citation, MemoryRecord, MemoryStore};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::record::StoredMemory;
use crate::score::keyword_relevance;

/// An in-memory store that keeps memories in a Vec.
/// Useful for testing and sessions where persistence isn't needed.
pub struct InMemoryStore {
    entries: Arc<RwLock<Vec<StoredMemory>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Seed a document-sourced memory with its citation. Document
    /// ingestion lives outside the turn pipeline; tests and importers use
    /// this to populate document containers.
    pub async fn store_document(
        &self,
        scope_id: &str,
        container: &str,
        text: &str,
        citation: Citation,
    ) {
        self.entries.write().await.push(StoredMemory {
            id: Uuid::new_v4().to_string(),
            scope_id: scope_id.into(),
            container: container.into(),
            text: text.into(),
            citation: Some(citation),
            created_at: Utc::now(),
        });
    }

    /// Total stored items, across all scopes and containers.
    pub async fn count(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn search(
        &self,
        scope_id: &str,
        container: &str,
        query: &str,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let entries = self.entries.read().await;

        let mut results: Vec<MemoryRecord> = entries
            .iter()
            .filter(|e| e.scope_id == scope_id && e.container == container)
            .map(|e| e.to_record(keyword_relevance(query, &e.text)))
            .filter(|r| r.relevance >= threshold)
            .collect();

        results.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);

        Ok(results)
    }

    async fn store(
        &self,
        scope_id: &str,
        container: &str,
        item_id: &str,
        text: &str,
    ) -> Result<(), MemoryError> {
        let id = if item_id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            item_id.to_string()
        };
        self.entries.write().await.push(StoredMemory {
            id,
            scope_id: scope_id.into(),
            container: container.into(),
            text: text.into(),
            citation: None,
            created_at: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_and_search() {
        let store = InMemoryStore::new();
        store
            .store("chat-1", "long-term-memory", "m1", "The user likes Rust")
            .await
            .unwrap();

        let results = store
            .search("chat-1", "long-term-memory", "user likes rust", 0.5, 10)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].memory_type, "long-term-memory");
        assert!(results[0].relevance >= 0.5);
    }

    #[tokio::test]
    async fn scope_isolation() {
        let store = InMemoryStore::new();
        store
            .store("chat-1", "working-memory", "", "topic: birds")
            .await
            .unwrap();
        store
            .store("chat-2", "working-memory", "", "topic: birds")
            .await
            .unwrap();

        let results = store
            .search("chat-1", "working-memory", "topic birds", 0.1, 10)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chat_id, "chat-1");
    }

    #[tokio::test]
    async fn container_isolation() {
        let store = InMemoryStore::new();
        store
            .store("chat-1", "working-memory", "", "likes birds")
            .await
            .unwrap();

        let other = store
            .search("chat-1", "long-term-memory", "likes birds", 0.1, 10)
            .await
            .unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn global_scope_uses_empty_sentinel() {
        let store = InMemoryStore::new();
        store
            .store("", "document-memory", "", "shared handbook snippet")
            .await
            .unwrap();

        let global = store
            .search("", "document-memory", "handbook snippet", 0.1, 10)
            .await
            .unwrap();
        assert_eq!(global.len(), 1);

        let scoped = store
            .search("chat-1", "document-memory", "handbook snippet", 0.1, 10)
            .await
            .unwrap();
        assert!(scoped.is_empty());
    }

    #[tokio::test]
    async fn threshold_filters_low_relevance() {
        let store = InMemoryStore::new();
        store
            .store("chat-1", "working-memory", "", "completely unrelated text")
            .await
            .unwrap();

        let results = store
            .search("chat-1", "working-memory", "weather forecast", 0.5, 10)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn results_ranked_descending() {
        let store = InMemoryStore::new();
        store
            .store("chat-1", "working-memory", "", "rust")
            .await
            .unwrap();
        store
            .store("chat-1", "working-memory", "", "rust memory safety")
            .await
            .unwrap();

        let results = store
            .search("chat-1", "working-memory", "rust memory safety", 0.1, 10)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].relevance >= results[1].relevance);
        assert_eq!(results[0].text, "rust memory safety");
    }

    #[tokio::test]
    async fn document_citation_carried_through() {
        let store = InMemoryStore::new();
        store
            .store_document(
                "",
                "document-memory",
                "Q3 revenue grew 12%",
                Citation {
                    link: "docs/q3.pdf".into(),
                    source_name: "q3.pdf".into(),
                    source_content_type: "application/pdf".into(),
                },
            )
            .await;

        let results = store
            .search("", "document-memory", "revenue grew", 0.1, 10)
            .await
            .unwrap();
        assert_eq!(results[0].citation.as_ref().unwrap().link, "docs/q3.pdf");
    }
}
