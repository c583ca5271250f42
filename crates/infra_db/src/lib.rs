//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the invoicing core using SQLx.
//!
//! # Architecture
//!
//! - [`pool`]: connection pool configuration and embedded migrations
//! - [`repositories`]: row types and SQL, one repository per aggregate group
//! - [`adapters`]: `InvoicingPort` implementation mapping rows to domain types
//!
//! Multi-row writes (an invoice with its items, a guarded payment) run in a
//! single transaction. The payment guard locks the invoice row so concurrent
//! payments cannot overshoot the invoice total.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresInvoicingAdapter};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/ledgerlight")).await?;
//! run_migrations(&pool).await?;
//! let adapter = PostgresInvoicingAdapter::new(pool);
//! ```

pub mod adapters;
pub mod error;
pub mod pool;
pub mod repositories;

pub use adapters::PostgresInvoicingAdapter;
pub use error::DatabaseError;
pub use pool::{create_pool, run_migrations, DatabaseConfig, DatabasePool};
pub use repositories::InvoicingRepository;
