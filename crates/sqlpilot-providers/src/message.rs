//! Chat message format for OpenAI-style completion APIs

use serde::{Deserialize, Serialize};

use sqlpilot_core::Capability;

/// A capability invocation parsed from (or sent to) the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityCall {
    /// Provider-assigned call id (the correlation identifier on the wire)
    pub id: String,

    /// The requested capability
    pub capability: Capability,

    /// Arguments as JSON
    pub arguments: serde_json::Value,
}

impl CapabilityCall {
    pub fn new(capability: Capability, arguments: serde_json::Value) -> Self {
        Self {
            id: format!("call_{}", uuid::Uuid::new_v4()),
            capability,
            arguments,
        }
    }
}

/// Message role in a chat completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

impl ChatRole {
    pub fn as_wire(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::Tool => "tool",
        }
    }
}

/// One message in a chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,

    pub content: String,

    /// Capability calls attached to an assistant message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability_calls: Option<Vec<CapabilityCall>>,

    /// Call id this message answers (tool role only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
            capability_calls: None,
            call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            capability_calls: None,
            call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            capability_calls: None,
            call_id: None,
        }
    }

    pub fn assistant_with_calls(calls: Vec<CapabilityCall>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: String::new(),
            capability_calls: Some(calls),
            call_id: None,
        }
    }

    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: content.into(),
            capability_calls: None,
            call_id: Some(call_id.into()),
        }
    }
}
