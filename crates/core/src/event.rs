//! Chat event broadcasting — push updates to whoever is watching a chat.
//!
//! The turn pipeline publishes status and incremental message content as it
//! works; transports (WebSocket, SSE) subscribe and forward. Publishing is
//! fire-and-forget: a chat with no watchers is not an error.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Events published while a turn is processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A pipeline step started or finished; shown as a status line.
    StatusUpdated { chat_id: String, status: String },

    /// Incremental content for an in-progress bot message.
    MessageUpdated {
        chat_id: String,
        message_id: String,
        content: String,
    },

    /// The turn finished and the bot message is final.
    TurnCompleted {
        chat_id: String,
        message_id: String,
    },

    /// The turn failed; `reason` is safe to show to the user.
    TurnFailed { chat_id: String, reason: String },
}

impl ChatEvent {
    /// The chat this event belongs to.
    pub fn chat_id(&self) -> &str {
        match self {
            Self::StatusUpdated { chat_id, .. }
            | Self::MessageUpdated { chat_id, .. }
            | Self::TurnCompleted { chat_id, .. }
            | Self::TurnFailed { chat_id, .. } => chat_id,
        }
    }

    /// Wire event name for transports that need one.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StatusUpdated { .. } => "status_updated",
            Self::MessageUpdated { .. } => "message_updated",
            Self::TurnCompleted { .. } => "turn_completed",
            Self::TurnFailed { .. } => "turn_failed",
        }
    }
}

/// Fire-and-forget event publishing.
pub trait Broadcaster: Send + Sync {
    fn notify(&self, event: ChatEvent);
}

/// A broadcast-based event hub.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Subscribers
/// receive all events and filter by `chat_id()` for the chats they watch.
pub struct EventHub {
    sender: broadcast::Sender<Arc<ChatEvent>>,
}

impl EventHub {
    /// Create a new hub with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ChatEvent>> {
        self.sender.subscribe()
    }
}

impl Broadcaster for EventHub {
    fn notify(&self, event: ChatEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(256)
    }
}
