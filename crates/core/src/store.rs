//! Persistence traits for chat sessions, messages, and participants.
//!
//! The turn pipeline only ever talks to these traits. Implementations
//! (in-memory map, file-backed map, document database) live in their own
//! crates and are swapped via configuration.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::message::ChatMessage;
use crate::session::ChatSession;

/// Chat message persistence.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Messages for a chat, ordered newest-first, with paging.
    /// `count` of `None` means "all remaining".
    async fn find_by_chat(
        &self,
        chat_id: &str,
        skip: usize,
        count: Option<usize>,
    ) -> std::result::Result<Vec<ChatMessage>, StoreError>;

    /// Persist a new message.
    async fn create(&self, message: ChatMessage) -> std::result::Result<(), StoreError>;

    /// Insert or replace a message by id. Used to flush streamed content.
    async fn upsert(&self, message: ChatMessage) -> std::result::Result<(), StoreError>;
}

/// Chat session persistence. Read-only from the turn pipeline's view.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn find_by_id(
        &self,
        chat_id: &str,
    ) -> std::result::Result<Option<ChatSession>, StoreError>;
}

/// Chat membership checks.
#[async_trait]
pub trait ParticipantStore: Send + Sync {
    async fn is_participant(
        &self,
        user_id: &str,
        chat_id: &str,
    ) -> std::result::Result<bool, StoreError>;
}
