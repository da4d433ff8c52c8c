//! End-to-end workflow tests against a seeded in-memory database and a
//! scripted generation backend.

use std::sync::Arc;

use serde_json::json;

use sqlpilot_core::{Capability, Message};
use sqlpilot_db::fixture::{memory_pool, seed_demo_db};
use sqlpilot_db::{DatabaseGateway, ExecutionOutcome};
use sqlpilot_providers::{GenerationBackend, MockBackend, MockReply};
use sqlpilot_workflow::{QueryWorkflowController, RunOutcome, WorkflowConfig};

const QUERY_FAILED_FEEDBACK: &str =
    "Error: Query failed. Please rewrite your query and try again.";

async fn demo_gateway() -> Arc<DatabaseGateway> {
    let pool = memory_pool().await.unwrap();
    seed_demo_db(&pool).await.unwrap();
    Arc::new(DatabaseGateway::new(pool))
}

fn controller(
    gateway: Arc<DatabaseGateway>,
    backend: Arc<MockBackend>,
    config: WorkflowConfig,
) -> QueryWorkflowController {
    QueryWorkflowController::new(gateway, backend, config)
}

fn schema_reply() -> MockReply {
    MockReply::capability_call(Capability::GetSchema, json!({ "tables": ["orders"] }))
}

/// Assert the transcript invariants every run must satisfy: at most one
/// final answer and it is last, and every tool request has exactly one
/// matching result.
fn assert_transcript_invariants(messages: &[Message]) {
    let final_positions: Vec<usize> = messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.is_final_answer())
        .map(|(i, _)| i)
        .collect();
    assert!(final_positions.len() <= 1, "more than one final answer");
    if let Some(&pos) = final_positions.first() {
        assert_eq!(pos, messages.len() - 1, "final answer is not last");
    }

    for request in messages.iter().filter_map(Message::as_tool_request) {
        let results = messages
            .iter()
            .filter_map(Message::as_tool_result)
            .filter(|r| r.call_id == request.id)
            .count();
        assert_eq!(results, 1, "request {} has {} results", request.id, results);
    }
}

#[tokio::test]
async fn test_happy_path_answers_question() {
    let backend = Arc::new(MockBackend::new().with_replies(vec![
        schema_reply(),
        MockReply::text("SELECT SUM(amount) FROM orders"),
        MockReply::text("SELECT SUM(amount) FROM orders"),
        MockReply::final_answer("The total order amount is 1151.25."),
    ]));
    let controller = controller(
        demo_gateway().await,
        backend.clone(),
        WorkflowConfig::default(),
    );

    let (outcome, transcript) = controller
        .run_with_transcript("What is the total amount of all orders?")
        .await
        .unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Answered("The total order amount is 1151.25.".into())
    );
    assert!(transcript.is_sealed());
    assert_eq!(
        transcript.final_answer(),
        Some("The total order amount is 1151.25.")
    );
    assert_transcript_invariants(transcript.messages());

    // The execution result carries the real rows from the database.
    let execute = transcript
        .messages()
        .iter()
        .filter_map(Message::as_tool_request)
        .find(|r| r.capability == Capability::ExecuteQuery)
        .unwrap();
    let rows = transcript.result_for(&execute.id).unwrap();
    assert!(rows.success);
    assert!(rows.payload.contains("1151.25"), "payload: {}", rows.payload);
}

#[tokio::test]
async fn test_capability_sets_are_scoped_per_step() {
    let backend = Arc::new(MockBackend::new().with_replies(vec![
        schema_reply(),
        MockReply::text("SELECT COUNT(*) FROM orders"),
        MockReply::text("SELECT COUNT(*) FROM orders"),
        MockReply::final_answer("There are 4 orders."),
    ]));
    let controller = controller(
        demo_gateway().await,
        backend.clone(),
        WorkflowConfig::default(),
    );

    controller.run("How many orders are there?").await.unwrap();

    let offered = backend.offered_capabilities();
    assert_eq!(
        offered,
        vec![
            vec![Capability::GetSchema],
            vec![Capability::SubmitFinalAnswer],
            vec![], // query check is plain text generation
            vec![Capability::SubmitFinalAnswer],
        ]
    );
}

#[tokio::test]
async fn test_wrong_capability_gets_corrective_feedback() {
    let backend = Arc::new(MockBackend::new().with_replies(vec![
        schema_reply(),
        MockReply::capability_call(Capability::ListTables, json!({})),
        MockReply::final_answer("There are 4 customers."),
    ]));
    let controller = controller(
        demo_gateway().await,
        backend.clone(),
        WorkflowConfig::default(),
    );

    let (outcome, transcript) = controller
        .run_with_transcript("How many customers are there?")
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::Answered("There are 4 customers.".into()));
    assert_transcript_invariants(transcript.messages());

    // The stray call got a failure result naming it, and nothing was
    // executed against the database for it.
    let stray = transcript
        .messages()
        .iter()
        .filter_map(Message::as_tool_result)
        .find(|r| !r.success)
        .unwrap();
    assert!(stray.payload.starts_with("Error: The wrong tool was called: list_tables"));
}

#[tokio::test]
async fn test_failed_query_produces_retry_feedback() {
    let backend = Arc::new(MockBackend::new().with_replies(vec![
        schema_reply(),
        MockReply::text("SELECT * FROM no_such_table"),
        MockReply::text("SELECT * FROM no_such_table"),
        MockReply::text("SELECT order_id FROM orders"),
        MockReply::text("SELECT order_id FROM orders"),
        MockReply::final_answer("There are 4 orders."),
    ]));
    let controller = controller(
        demo_gateway().await,
        backend.clone(),
        WorkflowConfig::default(),
    );

    let (outcome, transcript) = controller
        .run_with_transcript("List the order ids.")
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::Answered("There are 4 orders.".into()));
    assert_transcript_invariants(transcript.messages());

    let failure = transcript
        .messages()
        .iter()
        .filter_map(Message::as_tool_result)
        .find(|r| !r.success)
        .unwrap();
    assert_eq!(failure.payload, QUERY_FAILED_FEEDBACK);
}

#[tokio::test]
async fn test_zero_rows_is_a_failure() {
    let backend = Arc::new(MockBackend::new().with_replies(vec![
        schema_reply(),
        MockReply::text("SELECT * FROM orders WHERE amount > 100000"),
        MockReply::text("SELECT * FROM orders WHERE amount > 100000"),
        MockReply::final_answer("No orders exceed that amount."),
    ]));
    let controller = controller(
        demo_gateway().await,
        backend.clone(),
        WorkflowConfig::default(),
    );

    let (_, transcript) = controller
        .run_with_transcript("Which orders exceed 100000?")
        .await
        .unwrap();

    // A well-formed query with an empty result set is fed back exactly
    // like a malformed one.
    let failure = transcript
        .messages()
        .iter()
        .filter_map(Message::as_tool_result)
        .find(|r| !r.success)
        .unwrap();
    assert_eq!(failure.payload, QUERY_FAILED_FEEDBACK);
}

#[tokio::test]
async fn test_dml_is_rejected_before_execution() {
    let gateway = demo_gateway().await;
    let backend = Arc::new(MockBackend::new().with_replies(vec![
        schema_reply(),
        MockReply::text("DELETE FROM orders"),
        MockReply::text("DELETE FROM orders"),
        MockReply::final_answer("I cannot modify the database."),
    ]));
    let controller = controller(gateway.clone(), backend.clone(), WorkflowConfig::default());

    let (_, transcript) = controller
        .run_with_transcript("Delete all orders.")
        .await
        .unwrap();

    let rejection = transcript
        .messages()
        .iter()
        .filter_map(Message::as_tool_result)
        .find(|r| !r.success)
        .unwrap();
    assert!(rejection.payload.starts_with("Error:"));
    assert!(rejection.payload.contains("was not executed"));

    // The data is untouched.
    let outcome = gateway.execute("SELECT COUNT(*) FROM orders").await.unwrap();
    assert_eq!(outcome, ExecutionOutcome::Rows("[(4)]".into()));
}

#[tokio::test]
async fn test_iteration_budget_produces_fallback_answer() {
    let backend = Arc::new(MockBackend::new().with_replies(vec![
        schema_reply(),
        MockReply::text("Error: I cannot answer this."),
        MockReply::text("Error: I cannot answer this."),
        MockReply::text("Error: I cannot answer this."),
    ]));
    let config = WorkflowConfig::default().with_max_iterations(3);
    let controller = controller(demo_gateway().await, backend.clone(), config);

    let (outcome, transcript) = controller
        .run_with_transcript("An unanswerable question.")
        .await
        .unwrap();

    let RunOutcome::BudgetExhausted(answer) = outcome else {
        panic!("expected budget exhaustion, got {outcome:?}");
    };
    assert!(transcript.is_sealed());
    assert_eq!(transcript.final_answer(), Some(answer.as_str()));
    // Schema selection plus exactly three generation passes.
    assert_eq!(backend.call_count(), 4);
    assert_transcript_invariants(transcript.messages());
}

#[tokio::test]
async fn test_empty_reply_is_retried() {
    let backend = Arc::new(MockBackend::new().with_replies(vec![
        schema_reply(),
        MockReply::text(""),
        MockReply::final_answer("There are 4 employees."),
    ]));
    let controller = controller(
        demo_gateway().await,
        backend.clone(),
        WorkflowConfig::default(),
    );

    let outcome = controller.run("How many employees are there?").await.unwrap();
    assert_eq!(outcome, RunOutcome::Answered("There are 4 employees.".into()));
    assert_eq!(backend.call_count(), 3);
}

#[tokio::test]
async fn test_schema_falls_back_to_all_tables() {
    let backend = Arc::new(MockBackend::new().with_replies(vec![
        MockReply::text("I am not sure which tables matter."),
        MockReply::final_answer("The tables are employees, customers and orders."),
    ]));
    let controller = controller(
        demo_gateway().await,
        backend.clone(),
        WorkflowConfig::default(),
    );

    let (_, transcript) = controller
        .run_with_transcript("What tables exist?")
        .await
        .unwrap();

    let schema_request = transcript
        .messages()
        .iter()
        .filter_map(Message::as_tool_request)
        .find(|r| r.capability == Capability::GetSchema)
        .unwrap();
    let tables: Vec<&str> = schema_request.arguments["tables"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(tables, vec!["customers", "employees", "orders"]);

    let schema = transcript.result_for(&schema_request.id).unwrap();
    assert!(schema.payload.contains("CREATE TABLE orders"));
    assert!(schema.payload.contains("CREATE TABLE employees"));
}

#[tokio::test]
async fn test_checked_rewrite_is_what_executes() {
    let backend = Arc::new(
        MockBackend::new()
            .with_replies(vec![
                schema_reply(),
                MockReply::text("SELECT amount FROM orders LIMIT 2"),
                MockReply::final_answer("Two amounts were returned."),
            ])
            // The check pass rewrites the candidate query.
            .when_contains(
                "SELECT amount FROM orders LIMIT 2",
                MockReply::text("SELECT order_id, amount FROM orders LIMIT 2"),
            ),
    );
    let controller = controller(
        demo_gateway().await,
        backend.clone(),
        WorkflowConfig::default(),
    );

    let (_, transcript) = controller
        .run_with_transcript("Show two order amounts.")
        .await
        .unwrap();

    let execute = transcript
        .messages()
        .iter()
        .filter_map(Message::as_tool_request)
        .find(|r| r.capability == Capability::ExecuteQuery)
        .unwrap();
    assert_eq!(
        execute.str_arg("query"),
        Some("SELECT order_id, amount FROM orders LIMIT 2")
    );

    let rows = transcript.result_for(&execute.id).unwrap();
    assert!(rows.success);
    assert_eq!(rows.payload, "[(1, 250.75), (2, 150.5)]");
}

#[tokio::test]
async fn test_missing_final_answer_argument_is_retried() {
    let backend = Arc::new(MockBackend::new().with_replies(vec![
        schema_reply(),
        MockReply::capability_call(Capability::SubmitFinalAnswer, json!({})),
        MockReply::final_answer("Done."),
    ]));
    let controller = controller(
        demo_gateway().await,
        backend.clone(),
        WorkflowConfig::default(),
    );

    let (outcome, transcript) = controller
        .run_with_transcript("Anything.")
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::Answered("Done.".into()));
    let failure = transcript
        .messages()
        .iter()
        .filter_map(Message::as_tool_result)
        .find(|r| !r.success)
        .unwrap();
    assert!(failure.payload.contains("final_answer"));
    assert_transcript_invariants(transcript.messages());
}

#[tokio::test]
async fn test_non_transient_generation_error_aborts_run() {
    let backend = Arc::new(MockBackend::new().with_reply(MockReply::error("invalid api key")));
    let controller = controller(
        demo_gateway().await,
        backend.clone(),
        WorkflowConfig::default(),
    );

    let result = controller.run("Anything.").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_concurrent_runs_share_one_gateway() {
    let gateway = demo_gateway().await;

    let make_backend = || {
        Arc::new(MockBackend::new().with_replies(vec![
            schema_reply(),
            MockReply::text("SELECT COUNT(*) FROM orders"),
            MockReply::text("SELECT COUNT(*) FROM orders"),
            MockReply::final_answer("There are 4 orders."),
        ]))
    };

    let a = controller(gateway.clone(), make_backend(), WorkflowConfig::default());
    let b = controller(gateway.clone(), make_backend(), WorkflowConfig::default());

    let (ra, rb) = tokio::join!(a.run("How many orders?"), b.run("How many orders?"));
    assert_eq!(ra.unwrap().answer(), "There are 4 orders.");
    assert_eq!(rb.unwrap().answer(), "There are 4 orders.");
}
