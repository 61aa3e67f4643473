//! # chatloom Core
//!
//! Domain types, traits, and error definitions for the chatloom
//! conversation-turn pipeline. This crate has **zero framework
//! dependencies** — it defines the domain model that all other crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator the pipeline needs (memory store, completion
//! service, chat persistence, broadcast) is defined as a trait here.
//! Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod completion;
pub mod error;
pub mod event;
pub mod memory;
pub mod message;
pub mod session;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use completion::{
    Completion, CompletionDelta, CompletionService, PromptMessage, PromptRole, SamplingParams,
    TokenUsage,
};
pub use error::{CompletionError, Error, MemoryError, Result, StoreError, TurnError};
pub use event::{Broadcaster, ChatEvent, EventHub};
pub use memory::{Citation, MemoryRecord, MemoryStore};
pub use message::{AuthorRole, ChatMessage, ChatMessageKind};
pub use session::{ChatParticipant, ChatSession, ANONYMOUS_USER_ID};
pub use store::{MessageStore, ParticipantStore, SessionStore};
