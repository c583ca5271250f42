//! Adapters bundled with the domain
//!
//! The PostgreSQL adapter lives in `infra_db`; these need no external system.

pub mod memory;
pub mod notifier;

pub use memory::InMemoryInvoicingAdapter;
pub use notifier::{LogNotifier, RecordingNotifier};
