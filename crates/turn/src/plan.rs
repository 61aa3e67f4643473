//! The per-turn context and the assembled prompt plan.
//!
//! `TurnContext` is the explicit, strongly-typed record of everything a
//! turn accumulates (extracted components, token usage by function);
//! `PromptPlan` is the finished, ordered prompt handed to the completion
//! call. Both live for exactly one turn.

use chatloom_core::completion::PromptMessage;
use serde::Serialize;
use std::collections::HashMap;

/// Well-known keys of the per-function token usage map.
pub mod usage_keys {
    pub const AUDIENCE_EXTRACTION: &str = "audienceExtraction";
    pub const INTENT_EXTRACTION: &str = "intentExtraction";
    pub const RESPONSE_COMPLETION: &str = "responseCompletion";
}

/// Mutable state a turn threads through its steps.
#[derive(Debug, Default)]
pub struct TurnContext {
    /// Token usage per pipeline function.
    pub token_usage_by_function: HashMap<String, u64>,
}

impl TurnContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record usage for one pipeline function. Repeated calls accumulate.
    pub fn record_usage(&mut self, function: &str, tokens: u64) {
        *self
            .token_usage_by_function
            .entry(function.to_string())
            .or_insert(0) += tokens;
    }
}

/// The assembled prompt for one turn, in the order it was built.
///
/// Consumed immediately by the completion call; kept only on the bot
/// message (`prompt_used`) for inspection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PromptPlan {
    /// System persona section
    pub persona: String,

    /// Extracted audience ("" when skipped or failed)
    pub audience: String,

    /// Extracted user intent ("" when failed)
    pub intent: String,

    /// Rendered memory text ("" when nothing survived packing)
    pub past_memories: String,

    /// Rendered chat history, oldest first
    pub chat_history: String,

    /// The ordered message list sent to the model
    pub messages: Vec<PromptMessage>,
}

impl PromptPlan {
    /// Flatten the plan into one inspectable string.
    pub fn rendered(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("[{}] {}", m.role.as_str(), m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
