//! Append-only conversation history for one workflow run
//!
//! The conversation is the unit of state for one question-answering run.
//! Appends enforce the structural invariants the controller relies on:
//! at most one `FinalAnswer` and it is always last, every tool result
//! answers exactly one earlier tool request, and a new tool request may
//! not be issued while another is still unanswered.

use serde::{Deserialize, Serialize};

use crate::errors::ConversationError;
use crate::message::{CorrelationId, Message, ToolRequest, ToolResult};

/// Ordered, append-only message history for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message, enforcing the conversation invariants.
    pub fn push(&mut self, message: Message) -> Result<(), ConversationError> {
        if self.is_sealed() {
            return Err(ConversationError::Sealed);
        }

        match &message {
            Message::ToolRequest(req) => {
                if let Some(pending) = self.pending_request() {
                    return Err(ConversationError::PendingRequest(pending.id.to_string()));
                }
                let _ = req;
            }
            Message::ToolResult(res) => {
                let request_exists = self
                    .messages
                    .iter()
                    .filter_map(Message::as_tool_request)
                    .any(|r| r.id == res.call_id);
                if !request_exists {
                    return Err(ConversationError::UnknownCorrelation(
                        res.call_id.to_string(),
                    ));
                }
                if self.result_for(&res.call_id).is_some() {
                    return Err(ConversationError::DuplicateResult(res.call_id.to_string()));
                }
            }
            _ => {}
        }

        self.messages.push(message);
        Ok(())
    }

    /// The latest tool request that has not yet received a result.
    pub fn pending_request(&self) -> Option<&ToolRequest> {
        self.messages
            .iter()
            .filter_map(Message::as_tool_request)
            .find(|req| self.result_for(&req.id).is_none())
    }

    /// The result answering the given correlation id, if present.
    pub fn result_for(&self, id: &CorrelationId) -> Option<&ToolResult> {
        self.messages
            .iter()
            .filter_map(Message::as_tool_result)
            .find(|res| &res.call_id == id)
    }

    /// The final answer text, if the run has ended.
    pub fn final_answer(&self) -> Option<&str> {
        match self.messages.last() {
            Some(Message::FinalAnswer(text)) => Some(text),
            _ => None,
        }
    }

    /// Whether a final answer has been produced.
    pub fn is_sealed(&self) -> bool {
        self.final_answer().is_some()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
