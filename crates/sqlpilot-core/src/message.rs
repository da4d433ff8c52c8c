//! Message types for the query workflow conversation

use serde::{Deserialize, Serialize};

use crate::capability::Capability;

/// Token linking a tool request to its eventual tool result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(format!("call_{}", uuid::Uuid::new_v4()))
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A request for the controller to perform a capability on the
/// generation service's behalf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Correlation identifier linking this request to its result
    pub id: CorrelationId,

    /// The requested capability
    pub capability: Capability,

    /// Arguments as a JSON object
    pub arguments: serde_json::Value,
}

impl ToolRequest {
    pub fn new(capability: Capability, arguments: serde_json::Value) -> Self {
        Self {
            id: CorrelationId::generate(),
            capability,
            arguments,
        }
    }

    /// Look up a string argument by name.
    pub fn str_arg(&self, name: &str) -> Option<&str> {
        self.arguments.get(name).and_then(|v| v.as_str())
    }
}

/// The outcome of a tool request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Correlation identifier of the request this result answers
    pub call_id: CorrelationId,

    /// Whether the capability succeeded
    pub success: bool,

    /// Result payload as text
    pub payload: String,
}

impl ToolResult {
    pub fn success(call_id: CorrelationId, payload: impl Into<String>) -> Self {
        Self {
            call_id,
            success: true,
            payload: payload.into(),
        }
    }

    pub fn failure(call_id: CorrelationId, payload: impl Into<String>) -> Self {
        Self {
            call_id,
            success: false,
            payload: payload.into(),
        }
    }
}

/// A message in a workflow conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Message {
    /// The user's question
    UserText(String),

    /// Text produced by the generation service
    AssistantText(String),

    /// A capability request issued by the generation service (or
    /// synthesized by the controller)
    ToolRequest(ToolRequest),

    /// The result of a capability request
    ToolResult(ToolResult),

    /// Terminal payload; once present the conversation is sealed
    FinalAnswer(String),
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Message::UserText(text.into())
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Message::AssistantText(text.into())
    }

    pub fn final_answer(text: impl Into<String>) -> Self {
        Message::FinalAnswer(text.into())
    }

    pub fn is_final_answer(&self) -> bool {
        matches!(self, Message::FinalAnswer(_))
    }

    pub fn is_tool_request(&self) -> bool {
        matches!(self, Message::ToolRequest(_))
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self, Message::ToolResult(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Message::UserText(t) | Message::AssistantText(t) | Message::FinalAnswer(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_tool_request(&self) -> Option<&ToolRequest> {
        match self {
            Message::ToolRequest(req) => Some(req),
            _ => None,
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolResult> {
        match self {
            Message::ToolResult(res) => Some(res),
            _ => None,
        }
    }
}
