//! Scripted mock backend for deterministic tests
//!
//! Returns predefined replies in sequence (or by content match) and
//! records every call for later inspection, so workflow tests can assert
//! on what the controller asked for without touching a real API.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use sqlpilot_core::{Capability, CapabilitySet, GenerationError};

use crate::backend::{GenerationBackend, GenerationOutput, TokenUsage};
use crate::message::{CapabilityCall, ChatMessage};

/// One scripted reply.
#[derive(Debug, Clone, Default)]
pub struct MockReply {
    pub content: String,
    pub capability_calls: Option<Vec<CapabilityCall>>,
    pub fail_with: Option<String>,
}

impl MockReply {
    /// Plain text reply.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Reply that requests a capability.
    pub fn capability_call(capability: Capability, arguments: serde_json::Value) -> Self {
        Self {
            capability_calls: Some(vec![CapabilityCall::new(capability, arguments)]),
            ..Default::default()
        }
    }

    /// Reply that submits the final answer.
    pub fn final_answer(answer: impl Into<String>) -> Self {
        Self::capability_call(
            Capability::SubmitFinalAnswer,
            serde_json::json!({ "final_answer": answer.into() }),
        )
    }

    /// Reply that fails the generation call.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Default::default()
        }
    }
}

/// A recorded call for inspection.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<ChatMessage>,
    pub capabilities: Vec<Capability>,
    pub temperature: f32,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Deterministic scripted backend.
///
/// Content-matched replies take priority; otherwise replies are served
/// in order, cycling when exhausted.
#[derive(Default)]
pub struct MockBackend {
    replies: Mutex<Vec<MockReply>>,
    reply_index: AtomicUsize,
    conditional: Mutex<Vec<(String, MockReply)>>,
    recorded: Mutex<Vec<RecordedCall>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sequential reply.
    pub fn with_reply(self, reply: MockReply) -> Self {
        self.replies.lock().push(reply);
        self
    }

    /// Add multiple sequential replies.
    pub fn with_replies(self, replies: Vec<MockReply>) -> Self {
        self.replies.lock().extend(replies);
        self
    }

    /// Reply whenever the last message contains the substring.
    pub fn when_contains(self, substring: impl Into<String>, reply: MockReply) -> Self {
        self.conditional.lock().push((substring.into(), reply));
        self
    }

    pub fn call_count(&self) -> usize {
        self.recorded.lock().len()
    }

    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.recorded.lock().clone()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        self.recorded.lock().last().cloned()
    }

    /// Capability sets offered across all calls, in order.
    pub fn offered_capabilities(&self) -> Vec<Vec<Capability>> {
        self.recorded
            .lock()
            .iter()
            .map(|c| c.capabilities.clone())
            .collect()
    }

    fn next_reply(&self, messages: &[ChatMessage]) -> MockReply {
        let last_content = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        for (substring, reply) in self.conditional.lock().iter() {
            if last_content.contains(substring.as_str()) {
                return reply.clone();
            }
        }

        let replies = self.replies.lock();
        if replies.is_empty() {
            return MockReply::text("Mock reply");
        }
        let index = self.reply_index.fetch_add(1, Ordering::SeqCst);
        replies[index % replies.len()].clone()
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        capabilities: &CapabilitySet,
        temperature: f32,
    ) -> Result<GenerationOutput, GenerationError> {
        self.recorded.lock().push(RecordedCall {
            messages: messages.to_vec(),
            capabilities: capabilities.iter().collect(),
            temperature,
            timestamp: chrono::Utc::now(),
        });

        let reply = self.next_reply(messages);

        if let Some(message) = reply.fail_with {
            return Err(GenerationError::ApiError(message));
        }

        Ok(GenerationOutput {
            content: reply.content,
            capability_calls: reply.capability_calls,
            token_usage: TokenUsage::new(100, 50),
        })
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}
