//! Backend trait for language generation services

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use sqlpilot_core::{CapabilitySet, GenerationError};

use crate::message::{CapabilityCall, ChatMessage};

/// Output of one generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    /// Generated text content
    pub content: String,

    /// Capability calls requested by the model, if any
    pub capability_calls: Option<Vec<CapabilityCall>>,

    /// Token usage for the call
    pub token_usage: TokenUsage,
}

impl GenerationOutput {
    /// The first requested capability call, if any.
    pub fn first_call(&self) -> Option<&CapabilityCall> {
        self.capability_calls.as_ref().and_then(|calls| calls.first())
    }
}

/// Token usage information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

impl TokenUsage {
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Language generation service.
///
/// Stateless across calls except for the message history passed in. The
/// capability set constrains what the model may request on this call;
/// an empty set means plain text generation.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        capabilities: &CapabilitySet,
        temperature: f32,
    ) -> Result<GenerationOutput, GenerationError>;

    /// Model identifier, for logging.
    fn model_name(&self) -> &str;
}
