//! Completion service trait — the abstraction over LLM backends.
//!
//! The turn pipeline uses two calling modes: `complete()` for bounded
//! sub-completions (audience, intent, memory extraction) and `stream()`
//! for the final response, which arrives as a lazy, finite, non-restartable
//! sequence of text deltas.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CompletionError;

/// The role of a prompt message sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

impl PromptRole {
    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One entry in the ordered message list sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: PromptRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: PromptRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: PromptRole::Assistant, content: content.into() }
    }
}

/// Sampling parameters for a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Temperature (0.0 = deterministic)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Nucleus sampling cutoff
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Presence penalty
    #[serde(default)]
    pub presence_penalty: f32,

    /// Frequency penalty
    #[serde(default)]
    pub frequency_penalty: f32,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_top_p() -> f32 {
    1.0
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_tokens: None,
            temperature: default_temperature(),
            top_p: default_top_p(),
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            stop: Vec::new(),
        }
    }
}

impl SamplingParams {
    /// Copy of these params with a different generation cap.
    pub fn with_max_tokens(&self, max_tokens: u32) -> Self {
        Self {
            max_tokens: Some(max_tokens),
            ..self.clone()
        }
    }
}

/// Token usage reported by the provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A complete (non-streaming) result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text
    pub text: String,

    /// Token usage, when the provider reports it
    pub usage: Option<TokenUsage>,
}

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionDelta {
    /// Partial content
    #[serde(default)]
    pub content: Option<String>,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,

    /// Usage info (typically only in the final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// The completion service trait.
///
/// Every model backend implements this. The turn pipeline calls it without
/// knowing which backend is configured.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// A human-readable name for this service (e.g. "openai", "mock").
    fn name(&self) -> &str;

    /// Send a message list and get the complete generated text.
    async fn complete(
        &self,
        messages: &[PromptMessage],
        params: &SamplingParams,
    ) -> std::result::Result<Completion, CompletionError>;

    /// Send a message list and get a stream of text deltas.
    ///
    /// Default implementation calls `complete()` and wraps the result as a
    /// single final chunk.
    async fn stream(
        &self,
        messages: &[PromptMessage],
        params: &SamplingParams,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<CompletionDelta, CompletionError>>,
        CompletionError,
    > {
        let completion = self.complete(messages, params).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let _ = tx
            .send(Ok(CompletionDelta {
                content: Some(completion.text),
                done: true,
                usage: completion.usage,
            }))
            .await;
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_defaults() {
        let params = SamplingParams::default();
        assert!((params.temperature - 0.7).abs() < f32::EPSILON);
        assert!(params.max_tokens.is_none());
        assert!(params.stop.is_empty());
    }

    #[test]
    fn with_max_tokens_overrides_cap_only() {
        let params = SamplingParams {
            temperature: 0.2,
            ..Default::default()
        };
        let capped = params.with_max_tokens(256);
        assert_eq!(capped.max_tokens, Some(256));
        assert!((capped.temperature - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn prompt_role_wire_names() {
        assert_eq!(PromptRole::System.as_str(), "system");
        assert_eq!(PromptRole::User.as_str(), "user");
        assert_eq!(PromptRole::Assistant.as_str(), "assistant");
    }

    #[tokio::test]
    async fn default_stream_wraps_complete() {
        struct Fixed;

        #[async_trait]
        impl CompletionService for Fixed {
            fn name(&self) -> &str {
                "fixed"
            }

            async fn complete(
                &self,
                _messages: &[PromptMessage],
                _params: &SamplingParams,
            ) -> std::result::Result<Completion, CompletionError> {
                Ok(Completion {
                    text: "hello".into(),
                    usage: None,
                })
            }
        }

        let mut rx = Fixed
            .stream(&[PromptMessage::user("hi")], &SamplingParams::default())
            .await
            .unwrap();
        let chunk = rx.recv().await.unwrap().unwrap();
        assert_eq!(chunk.content.as_deref(), Some("hello"));
        assert!(chunk.done);
    }
}
