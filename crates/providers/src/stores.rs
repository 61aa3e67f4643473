//! In-memory chat persistence — sessions, messages, participants.
//!
//! The simplest of the closed store variants. Fine for tests and
//! single-process deployments; swapped for a durable backend via the
//! traits in `chatloom_core::store`.

use async_trait::async_trait;
use chatloom_core::error::StoreError;
use chatloom_core::message::ChatMessage;
use chatloom_core::session::{ChatParticipant, ChatSession};
use chatloom_core::store::{MessageStore, ParticipantStore, SessionStore};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Message persistence in a Vec, newest entries appended last.
pub struct InMemoryMessageStore {
    messages: Arc<RwLock<Vec<ChatMessage>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self {
            messages: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn find_by_chat(
        &self,
        chat_id: &str,
        skip: usize,
        count: Option<usize>,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let messages = self.messages.read().await;
        let mut chat_messages: Vec<ChatMessage> = messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        // Newest first
        chat_messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let iter = chat_messages.into_iter().skip(skip);
        Ok(match count {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        })
    }

    async fn create(&self, message: ChatMessage) -> Result<(), StoreError> {
        self.messages.write().await.push(message);
        Ok(())
    }

    async fn upsert(&self, message: ChatMessage) -> Result<(), StoreError> {
        let mut messages = self.messages.write().await;
        match messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message,
            None => messages.push(message),
        }
        Ok(())
    }
}

/// Session persistence in a Vec.
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<Vec<ChatSession>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn create(&self, session: ChatSession) {
        self.sessions.write().await.push(session);
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn find_by_id(&self, chat_id: &str) -> Result<Option<ChatSession>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.iter().find(|s| s.id == chat_id).cloned())
    }
}

/// Participant membership in a Vec.
pub struct InMemoryParticipantStore {
    participants: Arc<RwLock<Vec<ChatParticipant>>>,
}

impl InMemoryParticipantStore {
    pub fn new() -> Self {
        Self {
            participants: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn add(&self, participant: ChatParticipant) {
        self.participants.write().await.push(participant);
    }
}

impl Default for InMemoryParticipantStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ParticipantStore for InMemoryParticipantStore {
    async fn is_participant(&self, user_id: &str, chat_id: &str) -> Result<bool, StoreError> {
        let participants = self.participants.read().await;
        Ok(participants
            .iter()
            .any(|p| p.user_id == user_id && p.chat_id == chat_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn messages_returned_newest_first() {
        let store = InMemoryMessageStore::new();

        let mut m1 = ChatMessage::user("chat-1", "Alice", "first");
        let mut m2 = ChatMessage::user("chat-1", "Alice", "second");
        m1.timestamp -= Duration::minutes(2);
        m2.timestamp -= Duration::minutes(1);
        store.create(m1).await.unwrap();
        store.create(m2).await.unwrap();
        store
            .create(ChatMessage::user("chat-1", "Alice", "third"))
            .await
            .unwrap();

        let messages = store.find_by_chat("chat-1", 0, None).await.unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, "third");
        assert_eq!(messages[2].content, "first");
    }

    #[tokio::test]
    async fn paging_skips_and_limits() {
        let store = InMemoryMessageStore::new();
        for i in 0..5 {
            let mut m = ChatMessage::user("chat-1", "Alice", format!("msg {i}"));
            m.timestamp += Duration::seconds(i);
            store.create(m).await.unwrap();
        }

        let page = store.find_by_chat("chat-1", 1, Some(2)).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].content, "msg 3");
        assert_eq!(page[1].content, "msg 2");
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let store = InMemoryMessageStore::new();
        let mut msg = ChatMessage::bot("chat-1", "Loom");
        let id = msg.id.clone();
        store.create(msg.clone()).await.unwrap();

        msg.content = "streamed so far".into();
        store.upsert(msg).await.unwrap();

        let messages = store.find_by_chat("chat-1", 0, None).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, id);
        assert_eq!(messages[0].content, "streamed so far");
    }

    #[tokio::test]
    async fn other_chats_not_returned() {
        let store = InMemoryMessageStore::new();
        store
            .create(ChatMessage::user("chat-1", "Alice", "mine"))
            .await
            .unwrap();
        store
            .create(ChatMessage::user("chat-2", "Bob", "theirs"))
            .await
            .unwrap();

        let messages = store.find_by_chat("chat-1", 0, None).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "mine");
    }

    #[tokio::test]
    async fn session_lookup() {
        let store = InMemorySessionStore::new();
        let session = ChatSession::new("Test", "desc");
        let id = session.id.clone();
        store.create(session).await;

        assert!(store.find_by_id(&id).await.unwrap().is_some());
        assert!(store.find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn participant_membership() {
        let store = InMemoryParticipantStore::new();
        store.add(ChatParticipant::new("u-1", "chat-1")).await;

        assert!(store.is_participant("u-1", "chat-1").await.unwrap());
        assert!(!store.is_participant("u-2", "chat-1").await.unwrap());
        assert!(!store.is_participant("u-1", "chat-2").await.unwrap());
    }
}
