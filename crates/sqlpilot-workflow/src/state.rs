//! Workflow state machine
//!
//! An explicit enum with a pure transition function. Invalid state/event
//! pairs are errors, not silent no-ops, so a controller bug surfaces
//! immediately instead of looping in a bad state.

use sqlpilot_core::WorkflowError;

/// States of one question-answering run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Start,
    ListTables,
    GetSchema,
    GenerateQuery,
    CheckQuery,
    ExecuteQuery,
    End,
}

/// Events that drive transitions between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowEvent {
    /// The run began; seed the table listing
    Begun,
    /// The gateway returned the table list
    TablesListed,
    /// Schema text for the chosen tables is available
    SchemaFetched,
    /// The generation step produced candidate SQL text
    SqlProposed,
    /// The generation step must be retried (wrong tool, error text)
    RetrySignalled,
    /// The generation step submitted the final answer
    AnswerSubmitted,
    /// The candidate query passed (or was rewritten by) the check
    QueryChecked,
    /// The gateway executed the query, successfully or not
    Executed,
}

impl WorkflowState {
    /// Apply an event, returning the next state.
    pub fn next(self, event: WorkflowEvent) -> Result<WorkflowState, WorkflowError> {
        use WorkflowEvent::*;
        use WorkflowState::*;

        match (self, event) {
            (Start, Begun) => Ok(ListTables),
            (ListTables, TablesListed) => Ok(GetSchema),
            (GetSchema, SchemaFetched) => Ok(GenerateQuery),
            (GenerateQuery, SqlProposed) => Ok(CheckQuery),
            (GenerateQuery, RetrySignalled) => Ok(GenerateQuery),
            (GenerateQuery, AnswerSubmitted) => Ok(End),
            (CheckQuery, QueryChecked) => Ok(ExecuteQuery),
            (ExecuteQuery, Executed) => Ok(GenerateQuery),
            (state, event) => Err(WorkflowError::InvalidTransition {
                state: format!("{state:?}"),
                event: format!("{event:?}"),
            }),
        }
    }

    /// Whether the run has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::End)
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
