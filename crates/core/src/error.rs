//! Error types for the chatloom domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant. Turn-fatal failures
//! (missing session, failed response completion, cancellation) live in
//! `TurnError`; everything recoverable is handled at the call site and
//! never surfaces here.

use thiserror::Error;

/// The top-level error type for all chatloom operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Turn pipeline errors ---
    #[error("Turn error: {0}")]
    Turn(#[from] TurnError),

    // --- Completion service errors ---
    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    // --- Memory store errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Chat store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Fatal outcomes of a conversation turn. Anything here aborts the turn
/// and is reported to the caller as the terminal result.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("Chat session not found: {0}")]
    SessionNotFound(String),

    #[error("User {user_id} is not a participant of chat {chat_id}")]
    NotAParticipant { user_id: String, chat_id: String },

    #[error("Response generation failed: {0}")]
    ResponseFailed(#[source] CompletionError),

    #[error("Turn cancelled before the response completed")]
    Timeout,

    #[error("Memory balance {0} is outside [0, 1]")]
    InvalidMemoryBalance(f32),

    #[error("Unknown memory container: {0}")]
    UnknownContainer(String),

    #[error("Chat store failure: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Malformed completion payload: {0}")]
    InvalidResponse(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_error_displays_correctly() {
        let err = Error::Turn(TurnError::NotAParticipant {
            user_id: "u-1".into(),
            chat_id: "c-1".into(),
        });
        assert!(err.to_string().contains("u-1"));
        assert!(err.to_string().contains("c-1"));
    }

    #[test]
    fn timeout_is_distinct_from_response_failure() {
        let timeout = TurnError::Timeout.to_string();
        let failed = TurnError::ResponseFailed(CompletionError::Network("dns".into())).to_string();
        assert!(timeout.contains("cancelled"));
        assert!(failed.contains("Response generation failed"));
        assert_ne!(timeout, failed);
    }

    #[test]
    fn completion_error_displays_status() {
        let err = Error::Completion(CompletionError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
    }
}
