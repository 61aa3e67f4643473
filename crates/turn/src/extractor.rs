//! Bounded sub-completions that compute prompt components.
//!
//! Audience and intent extraction both run through here: a small
//! completion over an instruction template plus the running conversation,
//! capped by whatever budget the turn has left. The extractor reports the
//! provider's token usage so the turn can account for it per function.

use chatloom_core::completion::{
    CompletionService, PromptMessage, SamplingParams, TokenUsage,
};
use chatloom_core::error::CompletionError;
use std::sync::Arc;
use tracing::debug;

use crate::tokens::TokenBudget;

/// The result of one extraction: the text fragment and the usage the
/// provider reported for producing it.
#[derive(Debug, Clone)]
pub struct ExtractedComponent {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// Runs bounded sub-completions for prompt components.
pub struct PromptComponentExtractor {
    completion: Arc<dyn CompletionService>,
    sampling: SamplingParams,
    template_overhead_tokens: usize,
}

impl PromptComponentExtractor {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        sampling: SamplingParams,
        template_overhead_tokens: usize,
    ) -> Self {
        Self {
            completion,
            sampling,
            template_overhead_tokens,
        }
    }

    /// Run the instruction template against the shared context.
    ///
    /// The sub-completion's generation cap is the budget at call time
    /// minus the template overhead. Errors propagate to the caller, which
    /// decides whether the component is worth failing the turn over.
    pub async fn extract(
        &self,
        instructions: &str,
        shared_context: &[PromptMessage],
        budget: &TokenBudget,
    ) -> Result<ExtractedComponent, CompletionError> {
        let limit = budget
            .remaining()
            .saturating_sub(self.template_overhead_tokens);
        if limit == 0 {
            // Nothing left to spend; treat as an empty extraction rather
            // than sending an unsatisfiable request.
            debug!("Skipping extraction, no budget left after template overhead");
            return Ok(ExtractedComponent {
                text: String::new(),
                usage: None,
            });
        }

        let mut messages = Vec::with_capacity(shared_context.len() + 1);
        messages.push(PromptMessage::system(instructions));
        messages.extend_from_slice(shared_context);

        let params = self.sampling.with_max_tokens(limit as u32);
        let completion = self.completion.complete(&messages, &params).await?;

        Ok(ExtractedComponent {
            text: completion.text.trim().to_string(),
            usage: completion.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chatloom_core::completion::Completion;
    use std::sync::Mutex;

    /// Captures the request it receives and returns a fixed answer.
    struct RecordingService {
        response: String,
        fail: bool,
        seen_max_tokens: Mutex<Option<u32>>,
    }

    impl RecordingService {
        fn new(response: &str) -> Self {
            Self {
                response: response.into(),
                fail: false,
                seen_max_tokens: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl CompletionService for RecordingService {
        fn name(&self) -> &str {
            "recording"
        }

        async fn complete(
            &self,
            _messages: &[PromptMessage],
            params: &SamplingParams,
        ) -> Result<Completion, CompletionError> {
            *self.seen_max_tokens.lock().unwrap() = params.max_tokens;
            if self.fail {
                return Err(CompletionError::Network("unreachable".into()));
            }
            Ok(Completion {
                text: self.response.clone(),
                usage: Some(TokenUsage {
                    prompt_tokens: 50,
                    completion_tokens: 7,
                    total_tokens: 57,
                }),
            })
        }
    }

    #[tokio::test]
    async fn extracts_trimmed_text_with_usage() {
        let service = Arc::new(RecordingService::new("  the user wants a forecast \n"));
        let extractor =
            PromptComponentExtractor::new(service.clone(), SamplingParams::default(), 128);
        let budget = TokenBudget::new(1000);

        let component = extractor
            .extract("rewrite the intent", &[PromptMessage::user("weather?")], &budget)
            .await
            .unwrap();

        assert_eq!(component.text, "the user wants a forecast");
        assert_eq!(component.usage.unwrap().total_tokens, 57);
    }

    #[tokio::test]
    async fn generation_cap_is_budget_minus_overhead() {
        let service = Arc::new(RecordingService::new("x"));
        let extractor =
            PromptComponentExtractor::new(service.clone(), SamplingParams::default(), 128);
        let budget = TokenBudget::new(1000);

        extractor
            .extract("instructions", &[], &budget)
            .await
            .unwrap();

        assert_eq!(*service.seen_max_tokens.lock().unwrap(), Some(872));
    }

    #[tokio::test]
    async fn exhausted_budget_short_circuits() {
        let service = Arc::new(RecordingService::new("never used"));
        let extractor =
            PromptComponentExtractor::new(service.clone(), SamplingParams::default(), 128);
        let budget = TokenBudget::new(100); // less than the overhead

        let component = extractor
            .extract("instructions", &[], &budget)
            .await
            .unwrap();

        assert!(component.text.is_empty());
        assert!(component.usage.is_none());
        // The provider was never called
        assert!(service.seen_max_tokens.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn provider_errors_propagate() {
        let service = Arc::new(RecordingService {
            fail: true,
            ..RecordingService::new("")
        });
        let extractor = PromptComponentExtractor::new(service, SamplingParams::default(), 128);
        let budget = TokenBudget::new(1000);

        let err = extractor
            .extract("instructions", &[], &budget)
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Network(_)));
    }
}
