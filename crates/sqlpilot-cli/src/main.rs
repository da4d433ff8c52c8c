//! sqlpilot command line entry point
//!
//! Answers a natural-language question about a SQLite database by
//! running the query workflow against the Groq chat completions API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sqlpilot_db::{fixture, DatabaseGateway};
use sqlpilot_providers::{GroqProvider, RetryBackend, RetryConfig};
use sqlpilot_workflow::{QueryWorkflowController, RunOutcome, WorkflowConfig};

#[derive(Parser, Debug)]
#[command(name = "sqlpilot", version, about = "Ask a SQLite database questions in plain language")]
struct Args {
    /// The question to answer
    question: String,

    /// SQLite database URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite::memory:")]
    database_url: String,

    /// Groq API key
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Model to use for generation
    #[arg(long, env = "SQLPILOT_MODEL", default_value = "llama-3.3-70b-versatile")]
    model: String,

    /// Maximum generation passes before giving up
    #[arg(long, default_value_t = 10)]
    max_iterations: usize,

    /// Per-call timeout for database and generation calls, in seconds
    #[arg(long, default_value_t = 30)]
    call_timeout_secs: u64,

    /// Create and populate the demo tables before answering
    #[arg(long)]
    seed_demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let gateway = if args.database_url == "sqlite::memory:" {
        // In-memory databases need the single-connection pool from the
        // fixture, or each pooled connection sees an empty database.
        DatabaseGateway::new(fixture::memory_pool().await?)
    } else {
        DatabaseGateway::connect(&args.database_url)
            .await
            .with_context(|| format!("connecting to {}", args.database_url))?
    };
    if args.seed_demo {
        fixture::seed_demo_db(gateway.pool()).await?;
        info!("seeded demo tables");
    }

    let provider = GroqProvider::new(args.api_key, args.model);
    let backend = RetryBackend::new(provider, RetryConfig::default());

    let config = WorkflowConfig::default()
        .with_max_iterations(args.max_iterations)
        .with_call_timeout(Duration::from_secs(args.call_timeout_secs));
    let controller =
        QueryWorkflowController::new(Arc::new(gateway), Arc::new(backend), config);

    let outcome = controller
        .run(&args.question)
        .await
        .context("workflow run failed")?;

    if let RunOutcome::BudgetExhausted(_) = &outcome {
        info!("iteration budget exhausted before an answer was found");
    }
    println!("{}", outcome.answer());
    Ok(())
}
