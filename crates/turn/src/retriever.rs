//! Memory relevance retrieval — concurrent container fan-out, balance-tuned
//! thresholds, and greedy budget packing.
//!
//! For one query the retriever searches every configured container (plus
//! the global document partition) concurrently, merges the results, and
//! packs the most relevant records into the remaining token budget. A
//! single container failing affects only its own results.

use chatloom_config::MemoryConfig;
use chatloom_core::error::TurnError;
use chatloom_core::memory::{Citation, MemoryRecord, MemoryStore};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::prompts::{DOCUMENT_SNIPPETS_HEADER, PAST_MEMORIES_HEADER};
use crate::tokens::{count_tokens, TokenBudget};

/// The retrieval policy role of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryKind {
    /// Uploaded-document snippets; fixed relevance floor.
    Document,
    /// Facts kept across sessions; favored as the balance rises.
    LongTerm,
    /// Session-scoped context; favored as the balance falls.
    Working,
}

/// The relevance floor for one container at the given memory balance.
///
/// A balance of 0 biases retrieval toward working memory (low floor there,
/// high floor on long-term); a balance of 1 biases the other way. The
/// document floor is fixed, independent of balance.
pub fn relevance_threshold(kind: MemoryKind, balance: f32, config: &MemoryConfig) -> f32 {
    let lower = config.relevance_lower;
    let upper = config.relevance_upper;
    match kind {
        MemoryKind::Document => config.document_min_relevance,
        MemoryKind::LongTerm => (lower - upper) * balance + upper,
        MemoryKind::Working => (upper - lower) * balance + lower,
    }
}

/// The outcome of one retrieval: rendered prompt text plus the citations
/// for every accepted document record.
#[derive(Debug, Clone, Default)]
pub struct MemoryRetrieval {
    pub text: String,
    pub citations: Vec<Citation>,
}

/// Retrieves and packs relevant memories for a turn.
pub struct MemoryRelevanceRetriever {
    store: Arc<dyn MemoryStore>,
    config: MemoryConfig,
}

impl MemoryRelevanceRetriever {
    pub fn new(store: Arc<dyn MemoryStore>, config: MemoryConfig) -> Self {
        Self { store, config }
    }

    /// Classify a container name against the configured containers.
    pub fn kind_of(&self, container: &str) -> Result<MemoryKind, TurnError> {
        let names = &self.config.containers;
        if container == names.document {
            Ok(MemoryKind::Document)
        } else if container == names.long_term {
            Ok(MemoryKind::LongTerm)
        } else if container == names.working {
            Ok(MemoryKind::Working)
        } else {
            Err(TurnError::UnknownContainer(container.to_string()))
        }
    }

    /// Search all containers for `query` and pack the winners into
    /// `budget`. Packing never overdraws: a record that does not leave the
    /// budget positive stops the fill, and lower-relevance records behind
    /// it are dropped whole.
    pub async fn retrieve(
        &self,
        chat_id: &str,
        query: &str,
        balance: f32,
        budget: &mut TokenBudget,
        cancel: &CancellationToken,
    ) -> Result<MemoryRetrieval, TurnError> {
        if !(0.0..=1.0).contains(&balance) {
            return Err(TurnError::InvalidMemoryBalance(balance));
        }

        // One search per configured container (declared order), plus the
        // global document partition (empty scope id).
        let names = &self.config.containers;
        let targets: Vec<(String, String, MemoryKind)> = vec![
            (names.document.clone(), chat_id.to_string(), MemoryKind::Document),
            (names.long_term.clone(), chat_id.to_string(), MemoryKind::LongTerm),
            (names.working.clone(), chat_id.to_string(), MemoryKind::Working),
            (names.document.clone(), String::new(), MemoryKind::Document),
        ];

        let searches = targets.iter().map(|(container, scope, kind)| {
            let threshold = relevance_threshold(*kind, balance, &self.config);
            async move {
                tokio::select! {
                    _ = cancel.cancelled() => Vec::new(),
                    result = self.store.search(
                        scope,
                        container,
                        query,
                        threshold,
                        self.config.search_limit,
                    ) => match result {
                        Ok(records) => records,
                        Err(e) => {
                            warn!(container = %container, error = %e, "Memory container search failed");
                            Vec::new()
                        }
                    }
                }
            }
        });

        // Wait-all; a slow container delays but never deadlocks the merge.
        let per_container = futures::future::join_all(searches).await;
        if cancel.is_cancelled() {
            return Err(TurnError::Timeout);
        }

        let mut merged: Vec<MemoryRecord> = per_container.into_iter().flatten().collect();
        // Stable sort: ties keep arrival order.
        merged.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Greedy pack into per-container buckets.
        let mut documents: Vec<MemoryRecord> = Vec::new();
        let mut buckets: Vec<(String, Vec<MemoryRecord>)> = vec![
            (names.long_term.clone(), Vec::new()),
            (names.working.clone(), Vec::new()),
        ];
        let mut citations: Vec<Citation> = Vec::new();
        let mut seen_links: HashSet<String> = HashSet::new();
        let mut accepted = 0usize;

        for record in merged {
            let cost = count_tokens(&record.text);
            if cost >= budget.remaining() {
                break;
            }
            budget.try_charge(cost);
            accepted += 1;

            if record.memory_type == names.document {
                if let Some(citation) = &record.citation {
                    // First occurrence wins on duplicate links
                    if seen_links.insert(citation.link.clone()) {
                        citations.push(citation.clone());
                    }
                }
                documents.push(record);
            } else if let Some((_, bucket)) =
                buckets.iter_mut().find(|(name, _)| *name == record.memory_type)
            {
                bucket.push(record);
            }
        }

        debug!(
            accepted,
            remaining_budget = budget.remaining(),
            "Packed memories for prompt"
        );

        Ok(MemoryRetrieval {
            text: Self::render(&documents, &buckets),
            citations,
        })
    }

    /// Render accepted records: document snippets first (link/name headed,
    /// content-delimited), then the memory lines grouped by container in
    /// declared order under a single header.
    fn render(documents: &[MemoryRecord], buckets: &[(String, Vec<MemoryRecord>)]) -> String {
        let mut sections: Vec<String> = Vec::new();

        if !documents.is_empty() {
            let mut block = String::from(DOCUMENT_SNIPPETS_HEADER);
            for record in documents {
                let (link, name) = record
                    .citation
                    .as_ref()
                    .map(|c| (c.link.as_str(), c.source_name.as_str()))
                    .unwrap_or(("unknown", "unknown"));
                block.push_str(&format!(
                    "\nLink: {link}\nName: {name}\n[CONTENT START]\n{}\n[CONTENT END]",
                    record.text
                ));
            }
            sections.push(block);
        }

        if buckets.iter().any(|(_, records)| !records.is_empty()) {
            let mut block = String::from(PAST_MEMORIES_HEADER);
            for (container, records) in buckets {
                for record in records {
                    block.push_str(&format!("\n[{container}] {}", record.text));
                }
            }
            sections.push(block);
        }

        sections.join("\n\n")
    }
}
