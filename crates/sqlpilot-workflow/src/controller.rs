//! Query workflow controller
//!
//! Drives one question through the state machine: list tables, fetch
//! schema, then loop between query generation, checking and execution
//! until the generation service submits a final answer or the iteration
//! budget runs out. Failed executions, empty result sets and wrong tool
//! calls are fed back into the conversation as error tool results so the
//! generation step can self-correct; only connection faults, timeouts
//! and invariant violations abort the run.

use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use sqlpilot_core::{
    Capability, CapabilitySet, Conversation, CorrelationId, Message, ToolRequest, ToolResult,
    WorkflowError,
};
use sqlpilot_db::{ensure_read_only, DatabaseGateway, ExecutionOutcome};
use sqlpilot_providers::{CapabilityCall, ChatMessage, GenerationBackend, GenerationOutput};

use crate::config::WorkflowConfig;
use crate::prompts;
use crate::state::{WorkflowEvent, WorkflowState};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The generation service submitted a final answer
    Answered(String),
    /// The iteration budget ran out; a fallback answer was produced
    BudgetExhausted(String),
}

impl RunOutcome {
    /// The user-facing answer text, whichever way the run ended.
    pub fn answer(&self) -> &str {
        match self {
            RunOutcome::Answered(text) | RunOutcome::BudgetExhausted(text) => text,
        }
    }
}

/// Controller for one question-answering workflow.
///
/// The gateway and backend handles are shared; independent controllers
/// (or concurrent `run` calls) are fully isolated otherwise, each run
/// owning its own conversation.
pub struct QueryWorkflowController {
    gateway: Arc<DatabaseGateway>,
    backend: Arc<dyn GenerationBackend>,
    config: WorkflowConfig,
}

impl QueryWorkflowController {
    pub fn new(
        gateway: Arc<DatabaseGateway>,
        backend: Arc<dyn GenerationBackend>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            gateway,
            backend,
            config,
        }
    }

    /// Answer a question. The conversation is discarded after the
    /// answer is extracted.
    pub async fn run(&self, question: &str) -> Result<RunOutcome, WorkflowError> {
        let (outcome, _) = self.run_with_transcript(question).await?;
        Ok(outcome)
    }

    /// Answer a question and return the full conversation transcript
    /// alongside the outcome.
    #[instrument(skip(self, question), fields(model = self.backend.model_name()))]
    pub async fn run_with_transcript(
        &self,
        question: &str,
    ) -> Result<(RunOutcome, Conversation), WorkflowError> {
        let mut conversation = Conversation::new();
        let mut state = WorkflowState::Start;

        conversation.push(Message::user(question))?;
        state = state.next(WorkflowEvent::Begun)?;

        // Schema discovery is seeded by the controller, not the model:
        // a synthetic ListTables request answered from the gateway.
        let tables = self.discover_tables(&mut conversation).await?;
        state = state.next(WorkflowEvent::TablesListed)?;

        self.fetch_schema(&mut conversation, &tables).await?;
        state = state.next(WorkflowEvent::SchemaFetched)?;

        let generate_prompt = prompts::generate_system(self.config.max_result_rows);
        let final_only = CapabilitySet::only(Capability::SubmitFinalAnswer);

        let mut iterations = 0;
        while iterations < self.config.max_iterations {
            iterations += 1;
            debug!(iteration = iterations, %state, "generation pass");

            let output = self
                .generate(&generate_prompt, &conversation, &final_only)
                .await?;

            if let Some(call) = output.first_call() {
                match self.route_capability_call(&mut conversation, call)? {
                    Routed::Answered(answer) => {
                        state = state.next(WorkflowEvent::AnswerSubmitted)?;
                        debug_assert!(state.is_terminal());
                        info!(iterations, "run answered");
                        return Ok((RunOutcome::Answered(answer), conversation));
                    }
                    Routed::Retry => {
                        state = state.next(WorkflowEvent::RetrySignalled)?;
                        continue;
                    }
                }
            }

            let content = output.content.trim().to_string();
            if content.is_empty() || content.starts_with("Error:") {
                if !content.is_empty() {
                    conversation.push(Message::assistant(content))?;
                }
                state = state.next(WorkflowEvent::RetrySignalled)?;
                continue;
            }

            // Well-formed candidate SQL.
            conversation.push(Message::assistant(content.clone()))?;
            state = state.next(WorkflowEvent::SqlProposed)?;

            let checked = self.check_query(&content).await?;
            if checked != content {
                debug!("candidate query rewritten during check");
            }
            state = state.next(WorkflowEvent::QueryChecked)?;

            self.execute_query(&mut conversation, &checked).await?;
            state = state.next(WorkflowEvent::Executed)?;
        }

        warn!(iterations, "iteration budget exhausted");
        let answer = prompts::BUDGET_EXHAUSTED_ANSWER.to_string();
        conversation.push(Message::final_answer(answer.clone()))?;
        Ok((RunOutcome::BudgetExhausted(answer), conversation))
    }

    /// Seed the conversation with the table list.
    async fn discover_tables(
        &self,
        conversation: &mut Conversation,
    ) -> Result<Vec<String>, WorkflowError> {
        let request = ToolRequest::new(Capability::ListTables, json!({}));
        let call_id = request.id.clone();
        conversation.push(Message::ToolRequest(request))?;

        let tables = self
            .with_timeout("list_tables", self.gateway.list_tables())
            .await?;
        debug!(tables = ?tables, "discovered tables");

        conversation.push(Message::ToolResult(ToolResult::success(
            call_id,
            tables.join(", "),
        )))?;
        Ok(tables)
    }

    /// Ask the model which tables matter, then fetch their schema. If
    /// the model does not request a schema, fall back to all tables so
    /// the run can proceed.
    async fn fetch_schema(
        &self,
        conversation: &mut Conversation,
        tables: &[String],
    ) -> Result<(), WorkflowError> {
        let output = self
            .generate(
                prompts::SCHEMA_SELECT_SYSTEM,
                conversation,
                &CapabilitySet::only(Capability::GetSchema),
            )
            .await?;

        let request = match output.first_call() {
            Some(call) if call.capability == Capability::GetSchema => ToolRequest {
                id: CorrelationId::new(call.id.clone()),
                capability: call.capability,
                arguments: call.arguments.clone(),
            },
            _ => {
                warn!("model did not request a schema; fetching all tables");
                ToolRequest::new(Capability::GetSchema, json!({ "tables": tables }))
            }
        };

        let requested: Vec<String> = request
            .arguments
            .get("tables")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect::<Vec<_>>()
            })
            .filter(|requested: &Vec<String>| !requested.is_empty())
            .unwrap_or_else(|| tables.to_vec());

        let call_id = request.id.clone();
        conversation.push(Message::ToolRequest(request))?;

        let schema = self
            .with_timeout("table_schema", self.gateway.table_schema(&requested))
            .await?;
        conversation.push(Message::ToolResult(ToolResult::success(call_id, schema)))?;
        Ok(())
    }

    /// Route a capability call made during query generation: only
    /// SubmitFinalAnswer is valid here; anything else gets a corrective
    /// error result without touching the gateway.
    fn route_capability_call(
        &self,
        conversation: &mut Conversation,
        call: &CapabilityCall,
    ) -> Result<Routed, WorkflowError> {
        let request = ToolRequest {
            id: CorrelationId::new(call.id.clone()),
            capability: call.capability,
            arguments: call.arguments.clone(),
        };
        let call_id = request.id.clone();

        if call.capability != Capability::SubmitFinalAnswer {
            warn!(capability = %call.capability, "wrong capability called during query generation");
            conversation.push(Message::ToolRequest(request))?;
            conversation.push(Message::ToolResult(ToolResult::failure(
                call_id,
                format!(
                    "Error: The wrong tool was called: {}. Only {} may be called here; \
                     generated SQL must be plain text without a tool call.",
                    call.capability,
                    Capability::SubmitFinalAnswer.wire_name(),
                ),
            )))?;
            return Ok(Routed::Retry);
        }

        let Some(answer) = request.str_arg("final_answer").map(String::from) else {
            warn!("submit_final_answer called without a final_answer argument");
            conversation.push(Message::ToolRequest(request))?;
            conversation.push(Message::ToolResult(ToolResult::failure(
                call_id,
                "Error: submit_final_answer requires a final_answer argument.",
            )))?;
            return Ok(Routed::Retry);
        };

        conversation.push(Message::ToolRequest(request))?;
        conversation.push(Message::ToolResult(ToolResult::success(
            call_id,
            answer.clone(),
        )))?;
        conversation.push(Message::final_answer(answer.clone()))?;
        Ok(Routed::Answered(answer))
    }

    /// Review the candidate query for common mistakes; returns the
    /// (possibly rewritten) query. A blank review falls back to the
    /// original candidate.
    async fn check_query(&self, candidate: &str) -> Result<String, WorkflowError> {
        let messages = vec![
            ChatMessage::system(prompts::CHECK_SYSTEM),
            ChatMessage::user(candidate),
        ];
        let output = self
            .with_timeout(
                "check_query",
                self.backend
                    .generate(&messages, &CapabilitySet::none(), self.config.temperature),
            )
            .await?;

        let checked = output.content.trim();
        if checked.is_empty() {
            Ok(candidate.to_string())
        } else {
            Ok(checked.to_string())
        }
    }

    /// Execute the checked query, converting every failure mode into a
    /// retryable error tool result.
    async fn execute_query(
        &self,
        conversation: &mut Conversation,
        query: &str,
    ) -> Result<(), WorkflowError> {
        let request = ToolRequest::new(Capability::ExecuteQuery, json!({ "query": query }));
        let call_id = request.id.clone();
        conversation.push(Message::ToolRequest(request))?;

        let result = match ensure_read_only(query) {
            Err(violation) => {
                warn!(%violation, "query rejected by read-only guard");
                ToolResult::failure(
                    call_id,
                    format!(
                        "Error: {violation}. The query was not executed; \
                         rewrite it as a read-only SELECT."
                    ),
                )
            }
            Ok(()) => match self
                .with_timeout("execute", self.gateway.execute(query))
                .await?
            {
                ExecutionOutcome::Rows(rows) => ToolResult::success(call_id, rows),
                ExecutionOutcome::Failure => {
                    ToolResult::failure(call_id, prompts::QUERY_FAILED_FEEDBACK)
                }
            },
        };

        conversation.push(Message::ToolResult(result))?;
        Ok(())
    }

    /// One generation call: step-specific system prompt followed by the
    /// conversation so far, constrained to the given capability set.
    async fn generate(
        &self,
        system: &str,
        conversation: &Conversation,
        capabilities: &CapabilitySet,
    ) -> Result<GenerationOutput, WorkflowError> {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(ChatMessage::system(system));
        messages.extend(chat_history(conversation));

        self.with_timeout(
            "generate",
            self.backend
                .generate(&messages, capabilities, self.config.temperature),
        )
        .await
    }

    /// Apply the configured per-call timeout to an external call.
    async fn with_timeout<T, E, F>(
        &self,
        operation: &'static str,
        fut: F,
    ) -> Result<T, WorkflowError>
    where
        E: Into<WorkflowError>,
        F: Future<Output = Result<T, E>>,
    {
        match tokio::time::timeout(self.config.call_timeout, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(WorkflowError::CallTimeout {
                operation,
                timeout_ms: self.config.call_timeout.as_millis() as u64,
            }),
        }
    }
}

/// Routing decision for a capability call during query generation.
enum Routed {
    Answered(String),
    Retry,
}

/// Convert the conversation into chat messages for the wire.
fn chat_history(conversation: &Conversation) -> Vec<ChatMessage> {
    conversation
        .messages()
        .iter()
        .map(|message| match message {
            Message::UserText(text) => ChatMessage::user(text.clone()),
            Message::AssistantText(text) | Message::FinalAnswer(text) => {
                ChatMessage::assistant(text.clone())
            }
            Message::ToolRequest(req) => ChatMessage::assistant_with_calls(vec![CapabilityCall {
                id: req.id.0.clone(),
                capability: req.capability,
                arguments: req.arguments.clone(),
            }]),
            Message::ToolResult(res) => ChatMessage::tool(res.call_id.0.clone(), res.payload.clone()),
        })
        .collect()
}
