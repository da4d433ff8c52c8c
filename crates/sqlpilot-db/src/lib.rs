//! # sqlpilot Database Gateway
//!
//! Read-only SQLite access for the query workflow: query execution that
//! never raises on malformed SQL, schema discovery (table list, DDL and
//! sample rows), a statement-type guard that rejects DML/DDL before it
//! reaches the database, and the demo fixture used by the CLI and the
//! integration tests.

pub mod fixture;
pub mod gateway;
pub mod guard;

pub use gateway::{DatabaseGateway, ExecutionOutcome};
pub use guard::{ensure_read_only, ReadOnlyViolation};
