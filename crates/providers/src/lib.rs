//! Collaborator implementations for chatloom: the OpenAI-compatible
//! completion service and in-memory chat persistence.

pub mod openai;
pub mod stores;

pub use openai::OpenAiCompatService;
pub use stores::{InMemoryMessageStore, InMemoryParticipantStore, InMemorySessionStore};
