//! Capability definitions for the query workflow
//!
//! Capabilities are the closed set of operations the generation service
//! may request the controller to perform. They are matched exhaustively
//! as enum variants rather than by runtime string comparison, so a
//! capability the service is not permitted to request in a given state
//! is rejected by the `CapabilitySet` passed into that generation call.

use serde::{Deserialize, Serialize};
use serde_json::json;

/// A named, schema-typed operation the generation service may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// List the user tables in the database
    ListTables,
    /// Fetch DDL and sample rows for a set of tables
    GetSchema,
    /// Produce a candidate SQL query for the question
    GenerateQuery,
    /// Review a candidate query for common mistakes
    CheckQuery,
    /// Execute a SQL query against the database
    ExecuteQuery,
    /// Submit the final, user-facing answer; the only way a run may end
    SubmitFinalAnswer,
}

impl Capability {
    /// All capabilities, in workflow order.
    pub const ALL: [Capability; 6] = [
        Capability::ListTables,
        Capability::GetSchema,
        Capability::GenerateQuery,
        Capability::CheckQuery,
        Capability::ExecuteQuery,
        Capability::SubmitFinalAnswer,
    ];

    /// Name used on the wire for function-calling APIs.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Capability::ListTables => "list_tables",
            Capability::GetSchema => "get_schema",
            Capability::GenerateQuery => "generate_query",
            Capability::CheckQuery => "check_query",
            Capability::ExecuteQuery => "execute_query",
            Capability::SubmitFinalAnswer => "submit_final_answer",
        }
    }

    /// Parse a wire name back into a capability.
    pub fn from_wire_name(name: &str) -> Option<Capability> {
        Capability::ALL.into_iter().find(|c| c.wire_name() == name)
    }

    /// Human-readable description sent to the generation service.
    pub fn description(&self) -> &'static str {
        match self {
            Capability::ListTables => "List all user tables in the database.",
            Capability::GetSchema => {
                "Get the CREATE TABLE statement and sample rows for the given tables. \
                 Use this to understand the schema before writing a query."
            }
            Capability::GenerateQuery => {
                "Generate a syntactically correct SQL query that answers the question."
            }
            Capability::CheckQuery => {
                "Double-check a SQL query for common mistakes before executing it."
            }
            Capability::ExecuteQuery => {
                "Execute a SQL query against the database and return the result. \
                 If the query is invalid or returns no result, an error message \
                 will be returned."
            }
            Capability::SubmitFinalAnswer => {
                "Submit the final answer to the user's question. This is the only \
                 way to finish the run."
            }
        }
    }

    /// JSON Schema for the capability's arguments.
    pub fn parameters(&self) -> serde_json::Value {
        match self {
            Capability::ListTables => json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
            Capability::GetSchema => json!({
                "type": "object",
                "properties": {
                    "tables": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Names of the tables to describe"
                    }
                },
                "required": ["tables"]
            }),
            Capability::GenerateQuery | Capability::CheckQuery | Capability::ExecuteQuery => {
                json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "The SQL query"
                        }
                    },
                    "required": ["query"]
                })
            }
            Capability::SubmitFinalAnswer => json!({
                "type": "object",
                "properties": {
                    "final_answer": {
                        "type": "string",
                        "description": "The final answer to the user's question"
                    }
                },
                "required": ["final_answer"]
            }),
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// The fixed set of capabilities one generation call may request.
///
/// Each call into the generation service is constrained to a set, so the
/// controller can express e.g. "only SubmitFinalAnswer is callable here".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilitySet {
    allowed: Vec<Capability>,
}

impl CapabilitySet {
    /// An empty set: the call may not request any capability.
    pub fn none() -> Self {
        Self { allowed: Vec::new() }
    }

    /// A set containing a single capability.
    pub fn only(capability: Capability) -> Self {
        Self {
            allowed: vec![capability],
        }
    }

    /// A set containing the given capabilities.
    pub fn of(capabilities: &[Capability]) -> Self {
        Self {
            allowed: capabilities.to_vec(),
        }
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.allowed.contains(&capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.allowed.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.allowed.len()
    }
}
