//! No-op store — memory disabled.

use async_trait::async_trait;
use chatloom_core::error::MemoryError;
use chatloom_core::memory::{MemoryRecord, MemoryStore};

/// A store that remembers nothing. Searches return empty, stores succeed
/// silently. Used when memory is switched off in configuration.
pub struct NoopStore;

#[async_trait]
impl MemoryStore for NoopStore {
    fn name(&self) -> &str {
        "noop"
    }

    async fn search(
        &self,
        _scope_id: &str,
        _container: &str,
        _query: &str,
        _threshold: f32,
        _limit: usize,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        Ok(Vec::new())
    }

    async fn store(
        &self,
        _scope_id: &str,
        _container: &str,
        _item_id: &str,
        _text: &str,
    ) -> Result<(), MemoryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn search_is_always_empty() {
        let store = NoopStore;
        store
            .store("chat-1", "working-memory", "", "ignored")
            .await
            .unwrap();
        let results = store
            .search("chat-1", "working-memory", "ignored", 0.0, 10)
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
