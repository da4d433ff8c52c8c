//! System prompts for the workflow's generation steps
//!
//! These are textual instructions to the generation service and are
//! best-effort by nature. The constraints that matter for safety are
//! enforced in code regardless: the read-only guard rejects DML before
//! execution, and the capability set passed to each call limits what
//! the model may request.

/// Feedback payload for a failed or empty query execution. The exact
/// wording is part of the workflow contract: the generation prompt
/// tells the model to rewrite its query when it sees this text.
pub const QUERY_FAILED_FEEDBACK: &str =
    "Error: Query failed. Please rewrite your query and try again.";

/// Fallback answer when the iteration budget runs out.
pub const BUDGET_EXHAUSTED_ANSWER: &str =
    "I could not gather enough information to answer the question within the \
     allotted number of attempts. Please rephrase the question or try again.";

/// System prompt for the table-selection step.
pub const SCHEMA_SELECT_SYSTEM: &str =
    "You are a SQL expert. Given the user's question and the list of tables \
     in the database, call get_schema with the tables relevant to answering \
     the question.";

/// System prompt for the query-generation step.
pub fn generate_system(max_result_rows: u32) -> String {
    format!(
        "You are a SQL expert with strong attention to detail.\n\
         \n\
         Given the conversation so far — the user's question, the available \
         tables with their schemas, and the results of any queries already \
         executed — do exactly one of the following:\n\
         - Output a syntactically correct SQLite query as plain text, with no \
           tool call.\n\
         - Once the query results are sufficient to answer the question, call \
           submit_final_answer with the answer.\n\
         \n\
         When writing a query:\n\
         - Unless the user specifies how many rows they want, limit the query \
           to at most {max_result_rows} results.\n\
         - Never query for all the columns of a table; select only the columns \
           relevant to the question.\n\
         \n\
         If a query result starts with 'Error:', rewrite the query and try \
         again. If a result set comes back empty, rewrite the query to get a \
         non-empty result. NEVER invent facts the query results do not \
         support; if the data cannot answer the question, say so in the final \
         answer.\n\
         \n\
         NEVER call any tool other than submit_final_answer.\n\
         DO NOT write DML statements (INSERT, UPDATE, DELETE, DROP and \
         similar); the database is read-only."
    )
}

/// System prompt for the query-check step.
pub const CHECK_SYSTEM: &str =
    "You are a SQL expert with strong attention to detail. Double check the \
     SQLite query below for common mistakes, including:\n\
     - Using NOT IN with NULL values\n\
     - Using UNION when UNION ALL should have been used\n\
     - Using BETWEEN for exclusive ranges\n\
     - Data type mismatches in predicates\n\
     - Properly quoting identifiers\n\
     - Using the correct number of arguments for functions\n\
     - Casting to the correct data type\n\
     - Using the proper columns for joins\n\
     \n\
     If there are any of the above mistakes, output the corrected query. If \
     there are no mistakes, reproduce the original query exactly. Output only \
     the SQL, nothing else.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_system_carries_row_cap() {
        let prompt = generate_system(5);
        assert!(prompt.contains("at most 5 results"));
        assert!(prompt.contains("submit_final_answer"));
        assert!(prompt.contains("DO NOT write DML"));

        let prompt = generate_system(25);
        assert!(prompt.contains("at most 25 results"));
    }

    #[test]
    fn test_failed_feedback_is_a_retry_signal() {
        // The generation routing treats any text with this prefix as a retry.
        assert!(QUERY_FAILED_FEEDBACK.starts_with("Error:"));
    }
}
