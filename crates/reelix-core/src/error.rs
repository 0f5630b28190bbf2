//! Shared error type for the recommendation core.
//!
//! Every component maps its failures onto one of these variants so the SSE
//! endpoint layer (component L) can apply the error policy uniformly: most
//! kinds collapse into a single opaque `error` frame; a handful (reflection
//! failure, logging failure, stale session decode) are swallowed by their
//! caller and never reach here at all.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReelixError {
    #[error("missing Authorization header")]
    AuthMissing,

    #[error("invalid or expired credential")]
    AuthInvalid,

    #[error("ticket {query_id} not found")]
    TicketNotFound { query_id: String },

    #[error("ticket {query_id} does not belong to caller")]
    TicketForbidden { query_id: String },

    #[error("session state for {session_id} could not be decoded")]
    SessionDecodeError { session_id: String },

    #[error("vector store unavailable: {0}")]
    RetrievalUnavailable(String),

    #[error("LLM call failed after retries: {0}")]
    LlmTransient(String),

    #[error("LLM returned invalid tool arguments: {0}")]
    LlmValidation(String),

    #[error("client disconnected")]
    ClientDisconnect,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ReelixError {
    /// Short uppercase code used as the opaque `error_id` surfaced to
    /// clients and in server-side logs — never the `Display` text, which
    /// may carry internal detail.
    pub fn code(&self) -> &'static str {
        match self {
            ReelixError::AuthMissing => "AUTH_MISSING",
            ReelixError::AuthInvalid => "AUTH_INVALID",
            ReelixError::TicketNotFound { .. } => "TICKET_NOT_FOUND",
            ReelixError::TicketForbidden { .. } => "TICKET_FORBIDDEN",
            ReelixError::SessionDecodeError { .. } => "SESSION_DECODE_ERROR",
            ReelixError::RetrievalUnavailable(_) => "RETRIEVAL_UNAVAILABLE",
            ReelixError::LlmTransient(_) => "LLM_TRANSIENT",
            ReelixError::LlmValidation(_) => "LLM_VALIDATION",
            ReelixError::ClientDisconnect => "CLIENT_DISCONNECT",
            ReelixError::Config(_) => "CONFIG",
            ReelixError::Serialization(_) => "SERIALIZATION",
            ReelixError::Io(_) => "IO",
            ReelixError::Internal(_) => "INTERNAL",
        }
    }
}

pub type Result<T> = std::result::Result<T, ReelixError>;
