//! File-backed store — persistent JSON-lines storage.
//!
//! Each line is a JSON-encoded `StoredMemory`. Entries are loaded into
//! memory on creation and flushed to disk on every mutation, giving fast
//! reads with durable writes. Corrupted lines are skipped with a warning
//! rather than failing the whole store.

use async_trait::async_trait;
use chatloom_core::error::MemoryError;
use chatloom_core::memory::{MemoryRecord, MemoryStore};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::record::StoredMemory;
use crate::score::keyword_relevance;

/// A file-backed memory store using JSONL (one JSON object per line).
pub struct FileStore {
    path: PathBuf,
    entries: Arc<RwLock<Vec<StoredMemory>>>,
}

impl FileStore {
    /// Create a new file-backed store at the given path.
    ///
    /// If the file exists, entries are loaded from it.
    /// If the file does not exist, starts empty (file created on first write).
    pub fn new(path: PathBuf) -> Self {
        let entries = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = entries.len(), "File memory store loaded");
        Self {
            path,
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    fn load_from_disk(path: &PathBuf) -> Vec<StoredMemory> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(), // File doesn't exist yet — start empty
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<StoredMemory>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted memory entry");
                    None
                }
            })
            .collect()
    }

    /// Flush all entries to disk as JSONL.
    async fn flush(&self) -> Result<(), MemoryError> {
        let entries = self.entries.read().await;
        let mut out = String::new();
        for entry in entries.iter() {
            let line = serde_json::to_string(entry)
                .map_err(|e| MemoryError::Storage(e.to_string()))?;
            out.push_str(&line);
            out.push('\n');
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MemoryError::Storage(e.to_string()))?;
        }
        std::fs::write(&self.path, out).map_err(|e| MemoryError::Storage(e.to_string()))
    }
}

#[async_trait]
impl MemoryStore for FileStore {
    fn name(&self) -> &str {
        "file"
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
        self.flush().await
    }
}
