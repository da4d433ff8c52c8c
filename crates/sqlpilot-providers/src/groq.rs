//! Groq provider (OpenAI-compatible chat completions)

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use sqlpilot_core::{Capability, CapabilitySet, GenerationError};

use crate::backend::{GenerationBackend, GenerationOutput, TokenUsage};
use crate::message::{CapabilityCall, ChatMessage};

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub struct GroqProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GroqProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Override the API base URL (for compatible endpoints or tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the per-request HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        self
    }

    fn convert_messages(&self, messages: &[ChatMessage]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .map(|msg| {
                let mut json = serde_json::json!({
                    "role": msg.role.as_wire(),
                    "content": msg.content.clone(),
                });

                if let Some(calls) = &msg.capability_calls {
                    json["tool_calls"] = serde_json::json!(calls.iter().map(|call| {
                        serde_json::json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.capability.wire_name(),
                                "arguments": serde_json::to_string(&call.arguments)
                                    .unwrap_or_default(),
                            }
                        })
                    }).collect::<Vec<_>>());
                }

                if let Some(call_id) = &msg.call_id {
                    json["tool_call_id"] = serde_json::json!(call_id);
                }

                json
            })
            .collect()
    }

    fn convert_capabilities(&self, capabilities: &CapabilitySet) -> Vec<serde_json::Value> {
        capabilities
            .iter()
            .map(|cap| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": cap.wire_name(),
                        "description": cap.description(),
                        "parameters": cap.parameters(),
                    }
                })
            })
            .collect()
    }
}

#[async_trait]
impl GenerationBackend for GroqProvider {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        capabilities: &CapabilitySet,
        temperature: f32,
    ) -> Result<GenerationOutput, GenerationError> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": self.convert_messages(messages),
            "temperature": temperature,
        });

        if !capabilities.is_empty() {
            body["tools"] = serde_json::json!(self.convert_capabilities(capabilities));
            body["tool_choice"] = serde_json::json!("auto");
        }

        debug!(
            model = %self.model,
            messages = messages.len(),
            capabilities = capabilities.len(),
            "Groq request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(DEFAULT_TIMEOUT.as_millis() as u64)
                } else {
                    GenerationError::NetworkError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                429 => GenerationError::RateLimitExceeded,
                401 => GenerationError::AuthenticationFailed(error_text),
                _ => GenerationError::ApiError(format!("status {status}: {error_text}")),
            });
        }

        let api_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        let choice = api_response
            .choices
            .first()
            .ok_or_else(|| GenerationError::InvalidResponse("no choices in response".into()))?;

        let capability_calls = match &choice.message.tool_calls {
            Some(calls) => {
                let mut parsed = Vec::with_capacity(calls.len());
                for call in calls {
                    let capability = Capability::from_wire_name(&call.function.name)
                        .ok_or_else(|| {
                            GenerationError::InvalidResponse(format!(
                                "unknown capability: {}",
                                call.function.name
                            ))
                        })?;
                    let arguments = serde_json::from_str(&call.function.arguments)
                        .map_err(|e| {
                            GenerationError::InvalidResponse(format!(
                                "malformed arguments for {}: {e}",
                                call.function.name
                            ))
                        })?;
                    parsed.push(CapabilityCall {
                        id: call.id.clone(),
                        capability,
                        arguments,
                    });
                }
                (!parsed.is_empty()).then_some(parsed)
            }
            None => None,
        };

        let token_usage = TokenUsage::new(
            api_response.usage.prompt_tokens,
            api_response.usage.completion_tokens,
        );

        Ok(GenerationOutput {
            content: choice.message.content.clone().unwrap_or_default(),
            capability_calls,
            token_usage,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// Chat completions wire types

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: ChatUsage,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}
