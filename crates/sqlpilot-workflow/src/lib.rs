//! # sqlpilot Workflow
//!
//! The query workflow controller: a bounded finite-state loop that
//! drives the database gateway and the language generation service
//! through schema discovery, query generation, query checking and
//! execution until a final answer is submitted or the iteration budget
//! runs out.

pub mod config;
pub mod controller;
pub mod prompts;
pub mod state;

pub use config::WorkflowConfig;
pub use controller::{QueryWorkflowController, RunOutcome};
pub use state::{WorkflowEvent, WorkflowState};
