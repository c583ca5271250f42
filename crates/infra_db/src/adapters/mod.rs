//! Port adapters backed by PostgreSQL

pub mod invoicing;

pub use invoicing::PostgresInvoicingAdapter;
