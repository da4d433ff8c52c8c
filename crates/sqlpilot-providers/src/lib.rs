//! # sqlpilot Providers
//!
//! Language generation service bindings for the query workflow:
//! - Groq (OpenAI-compatible chat completions with function calling)
//! - Exponential backoff retry for transient errors
//! - A deterministic scripted mock backend for tests

pub mod backend;
pub mod groq;
pub mod message;
pub mod mock;
pub mod retry;

pub use backend::{GenerationBackend, GenerationOutput, TokenUsage};
pub use groq::GroqProvider;
pub use message::{CapabilityCall, ChatMessage, ChatRole};
pub use mock::{MockBackend, MockReply};
pub use retry::{with_retry, RetryBackend, RetryConfig};
