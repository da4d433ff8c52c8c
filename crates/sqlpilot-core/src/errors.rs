//! Error types for the query workflow

use thiserror::Error;

/// Conversation invariant violations.
///
/// These indicate a controller bug rather than a recoverable condition:
/// the controller never appends out of order.
#[derive(Error, Debug)]
pub enum ConversationError {
    #[error("conversation is sealed by a final answer")]
    Sealed,

    #[error("tool request issued while request {0} is still unanswered")]
    PendingRequest(String),

    #[error("tool result does not answer any request: {0}")]
    UnknownCorrelation(String),

    #[error("tool request {0} already has a result")]
    DuplicateResult(String),
}

/// Database gateway faults.
///
/// Malformed SQL is never an error here: the gateway reports it as a
/// failed execution outcome. Only connection-level problems surface as
/// `GatewayError`, and those are fatal for the current run.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("database connection error: {0}")]
    Connection(String),

    #[error("schema discovery failed: {0}")]
    Metadata(String),
}

/// Language generation service errors.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("request took longer than {0}ms")]
    Timeout(u64),
}

/// Top-level workflow errors.
///
/// Every variant is fatal for the current run; retryable conditions
/// (failed queries, wrong tool calls) are fed back into the loop as
/// tool results instead and never surface here.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("conversation error: {0}")]
    Conversation(#[from] ConversationError),

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("{operation} call exceeded {timeout_ms}ms")]
    CallTimeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("no transition from state {state} for event {event}")]
    InvalidTransition { state: String, event: String },
}
