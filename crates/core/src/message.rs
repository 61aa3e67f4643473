//! Chat message domain types.
//!
//! A `ChatMessage` is the persisted record of one utterance in a chat:
//! User sends a message → the turn pipeline builds a prompt → the bot's
//! reply is streamed into a second message and finalized with its token
//! usage and citations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::memory::Citation;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorRole {
    /// The end user
    User,
    /// The assistant
    Bot,
}

/// What kind of content a message carries.
///
/// `Document` messages record uploaded-document notices; they are stored in
/// the chat but excluded from prompt history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMessageKind {
    Message,
    Plan,
    Document,
}

/// A single persisted chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message ID
    pub id: String,

    /// The chat session this message belongs to
    pub chat_id: String,

    /// Who sent this message
    pub author_role: AuthorRole,

    /// Display name of the author
    pub author_name: String,

    /// Content kind
    pub kind: ChatMessageKind,

    /// The text content. Grows monotonically while a bot response streams.
    pub content: String,

    /// Timestamp
    pub timestamp: DateTime<Utc>,

    /// The rendered prompt that produced this message (bot messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_used: Option<String>,

    /// Citations for document-sourced memories used in the response
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Citation>,

    /// Token usage per pipeline function (e.g. "intentExtraction",
    /// "responseCompletion"), filled in when the turn finalizes.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub token_usage_by_function: HashMap<String, u64>,
}

impl ChatMessage {
    /// Create a new user message.
    pub fn user(
        chat_id: impl Into<String>,
        author_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            chat_id: chat_id.into(),
            author_role: AuthorRole::User,
            author_name: author_name.into(),
            kind: ChatMessageKind::Message,
            content: content.into(),
            timestamp: Utc::now(),
            prompt_used: None,
            citations: Vec::new(),
            token_usage_by_function: HashMap::new(),
        }
    }

    /// Create a new, initially empty bot message to stream into.
    pub fn bot(chat_id: impl Into<String>, bot_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            chat_id: chat_id.into(),
            author_role: AuthorRole::Bot,
            author_name: bot_name.into(),
            kind: ChatMessageKind::Message,
            content: String::new(),
            timestamp: Utc::now(),
            prompt_used: None,
            citations: Vec::new(),
            token_usage_by_function: HashMap::new(),
        }
    }

    /// Render this message the way it appears inside a prompt.
    pub fn prompt_line(&self) -> String {
        format!("[{}] {}: {}", self.timestamp.format("%Y-%m-%d %H:%M"), self.author_name, self.content)
    }
}
