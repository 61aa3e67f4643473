//! Post-turn memory distillation.
//!
//! After a response is delivered, the exchange is distilled into
//! structured memory items per memory type and stored for future turns.
//! This runs with its own fixed token reserve (the turn budget is gone by
//! now) and is entirely best-effort: a parse or store failure for one
//! memory type is logged and never touches the other types or the
//! already-delivered response.

use chatloom_config::MemoryConfig;
use chatloom_core::completion::{CompletionService, PromptMessage, SamplingParams};
use chatloom_core::error::Error;
use chatloom_core::memory::MemoryStore;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::prompts;
use crate::retriever::MemoryKind;

/// One extracted memory, before formatting.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SemanticMemoryItem {
    pub label: String,
    pub details: String,
}

impl SemanticMemoryItem {
    /// The stored text form.
    pub fn to_text(&self) -> String {
        format!("{}: {}", self.label, self.details)
    }
}

/// Distills a finished turn into stored memories.
pub struct MemoryExtractor {
    completion: Arc<dyn CompletionService>,
    memory: Arc<dyn MemoryStore>,
    config: MemoryConfig,
    sampling: SamplingParams,
    token_reserve: usize,
}

impl MemoryExtractor {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        memory: Arc<dyn MemoryStore>,
        config: MemoryConfig,
        sampling: SamplingParams,
        token_reserve: usize,
    ) -> Self {
        Self {
            completion,
            memory,
            config,
            sampling,
            token_reserve,
        }
    }

    /// Extract and store memories for every configured memory type.
    ///
    /// Each type is processed independently; failures are logged per type
    /// and swallowed.
    pub async fn extract_and_store(&self, chat_id: &str, transcript: &[PromptMessage]) {
        let containers = self.config.containers.clone();
        let types = [
            (MemoryKind::LongTerm, containers.long_term.as_str()),
            (MemoryKind::Working, containers.working.as_str()),
        ];

        for (kind, container) in types {
            match self.extract_type(kind, container, chat_id, transcript).await {
                Ok(stored) => {
                    debug!(container, stored, "Memory extraction finished");
                }
                Err(e) => {
                    warn!(container, error = %e, "Memory extraction failed for one type");
                }
            }
        }
    }

    /// One memory type: run the extraction completion, parse the items,
    /// and store everything that is not a near-duplicate of an existing
    /// record. Returns how many items were stored.
    async fn extract_type(
        &self,
        kind: MemoryKind,
        container: &str,
        chat_id: &str,
        transcript: &[PromptMessage],
    ) -> Result<usize, Error> {
        let mut messages = vec![PromptMessage::system(
            prompts::memory_extraction_instructions(kind),
        )];
        messages.extend_from_slice(transcript);

        let params = self.sampling.with_max_tokens(self.token_reserve as u32);
        let completion = self.completion.complete(&messages, &params).await?;
        let items = Self::parse_items(&completion.text)?;

        let mut stored = 0usize;
        for item in items {
            let text = item.to_text();

            // Near-duplicate suppression: anything already in the container
            // above the upper threshold means this item adds nothing.
            let duplicates = self
                .memory
                .search(
                    chat_id,
                    container,
                    &text,
                    self.config.relevance_upper,
                    1,
                )
                .await?;
            if !duplicates.is_empty() {
                debug!(container, label = %item.label, "Skipping duplicate memory");
                continue;
            }

            self.memory
                .store(chat_id, container, &Uuid::new_v4().to_string(), &text)
                .await?;
            stored += 1;
        }

        Ok(stored)
    }

    /// Parse the model's answer as a list of memory items.
    ///
    /// Accepts a bare JSON array or one wrapped in `{"items": [...]}`,
    /// with or without a fenced code block around it.
    fn parse_items(raw: &str) -> Result<Vec<SemanticMemoryItem>, serde_json::Error> {
        #[derive(Deserialize)]
        struct Wrapper {
            items: Vec<SemanticMemoryItem>,
        }

        let stripped = Self::strip_fences(raw);
        match serde_json::from_str::<Vec<SemanticMemoryItem>>(stripped) {
            Ok(items) => Ok(items),
            Err(array_err) => match serde_json::from_str::<Wrapper>(stripped) {
                Ok(wrapper) => Ok(wrapper.items),
                Err(_) => Err(array_err),
            },
        }
    }

    /// Strip a surrounding markdown code fence, if present.
    fn strip_fences(raw: &str) -> &str {
        let trimmed = raw.trim();
        let Some(rest) = trimmed.strip_prefix("```") else {
            return trimmed;
        };
        // Drop the info string ("json") up to the first newline
        let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or(rest);
        body.strip_suffix("```").unwrap_or(body).trim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chatloom_core::completion::Completion;
    use chatloom_core::error::CompletionError;
    use chatloom_memory::InMemoryStore;

    struct FixedCompletion {
        text: String,
    }

    #[async_trait]
    impl CompletionService for FixedCompletion {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(
            &self,
            _messages: &[PromptMessage],
            _params: &SamplingParams,
        ) -> Result<Completion, CompletionError> {
            Ok(Completion {
                text: self.text.clone(),
                usage: None,
            })
        }
    }

    fn extractor(answer: &str, memory: Arc<InMemoryStore>) -> MemoryExtractor {
        MemoryExtractor::new(
            Arc::new(FixedCompletion {
                text: answer.into(),
            }),
            memory,
            MemoryConfig::default(),
            SamplingParams::default(),
            512,
        )
    }

    fn transcript() -> Vec<PromptMessage> {
        vec![
            PromptMessage::user("I live in Lisbon, what's the weather there?"),
            PromptMessage::assistant("Sunny and 24 degrees in Lisbon today."),
        ]
    }

    // --- Parsing ---

    #[test]
    fn parses_bare_array() {
        let items = MemoryExtractor::parse_items(
            r#"[{"label": "home city", "details": "the user lives in Lisbon"}]"#,
        )
        .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].label, "home city");
    }

    #[test]
    fn parses_wrapped_items() {
        let items = MemoryExtractor::parse_items(
            r#"{"items": [{"label": "a", "details": "b"}]}"#,
        )
        .unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn parses_fenced_block() {
        let raw = "```json\n[{\"label\": \"a\", \"details\": \"b\"}]\n```";
        let items = MemoryExtractor::parse_items(raw).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn empty_array_yields_no_items() {
        assert!(MemoryExtractor::parse_items("[]").unwrap().is_empty());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(MemoryExtractor::parse_items("the user likes cats").is_err());
    }

    #[test]
    fn item_text_form() {
        let item = SemanticMemoryItem {
            label: "home city".into(),
            details: "the user lives in Lisbon".into(),
        };
        assert_eq!(item.to_text(), "home city: the user lives in Lisbon");
    }

    // --- Extraction + storage ---

    #[tokio::test]
    async fn stores_new_items_per_type() {
        let memory = Arc::new(InMemoryStore::new());
        let ex = extractor(
            r#"[{"label": "home city", "details": "the user lives in Lisbon"}]"#,
            memory.clone(),
        );

        ex.extract_and_store("chat-1", &transcript()).await;

        // Both the long-term and working passes store the same answer
        assert_eq!(memory.count().await, 2);
    }

    #[tokio::test]
    async fn duplicates_are_suppressed() {
        let memory = Arc::new(InMemoryStore::new());
        let ex = extractor(
            r#"[{"label": "home city", "details": "the user lives in Lisbon"}]"#,
            memory.clone(),
        );

        ex.extract_and_store("chat-1", &transcript()).await;
        let after_first = memory.count().await;

        // Extracting the same item again must not create new records
        ex.extract_and_store("chat-1", &transcript()).await;
        assert_eq!(memory.count().await, after_first);
    }

    #[tokio::test]
    async fn parse_failure_is_swallowed() {
        let memory = Arc::new(InMemoryStore::new());
        let ex = extractor("not json at all", memory.clone());

        // Must not panic or error out of the call
        ex.extract_and_store("chat-1", &transcript()).await;
        assert_eq!(memory.count().await, 0);
    }
}
