//! Test Utilities Crate
//!
//! Shared test infrastructure for the invoicing workspace.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built values (dates, money, users, clients, line items)
//! - `builders`: Builders for invoices and payments used by pure-function tests
//! - `harness`: In-memory services wired to a fixed clock
//! - `database`: PostgreSQL pool for adapter tests, enabled by `TEST_DATABASE_URL`
//! - `assertions`: Assertion helpers for money, totals and error kinds
//! - `generators`: Proptest strategies

pub mod assertions;
pub mod builders;
pub mod database;
pub mod fixtures;
pub mod generators;
pub mod harness;

pub use assertions::*;
pub use builders::*;
pub use database::*;
pub use fixtures::*;
pub use generators::*;
pub use harness::*;
