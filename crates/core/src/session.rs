//! Chat session and participant domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved user id for callers without a resolved identity.
/// Anonymous callers skip per-user pipeline steps such as audience
/// extraction.
pub const ANONYMOUS_USER_ID: &str = "anonymous";

/// A chat session: one ongoing conversation with its tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    /// Unique session ID
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// Session-specific system description appended to the persona
    pub system_description: String,

    /// Biases memory retrieval between working memory (0.0) and
    /// long-term memory (1.0).
    pub memory_balance: f32,

    /// When this session was created
    pub created_at: DateTime<Utc>,
}

impl ChatSession {
    /// Create a new session with the default balanced retrieval.
    pub fn new(title: impl Into<String>, system_description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            system_description: system_description.into(),
            memory_balance: 0.5,
            created_at: Utc::now(),
        }
    }
}

/// Membership of a user in a chat session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatParticipant {
    pub user_id: String,
    pub chat_id: String,
}

impl ChatParticipant {
    pub fn new(user_id: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            chat_id: chat_id.into(),
        }
    }

    /// Whether this participant is the anonymous placeholder identity.
    pub fn is_anonymous(&self) -> bool {
        self.user_id == ANONYMOUS_USER_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_balanced() {
        let session = ChatSession::new("Weather chat", "You discuss weather.");
        assert!((session.memory_balance - 0.5).abs() < f32::EPSILON);
        assert!(!session.id.is_empty());
    }

    #[test]
    fn anonymous_participant_detected() {
        let anon = ChatParticipant::new(ANONYMOUS_USER_ID, "chat-1");
        let named = ChatParticipant::new("u-42", "chat-1");
        assert!(anon.is_anonymous());
        assert!(!named.is_anonymous());
    }
}
