//! Reporting Domain
//!
//! Read-only analytics over a user's invoices and payments:
//!
//! - **Monthly revenue** for a trailing window of calendar months, zero-filled
//! - **Top clients** by revenue received
//! - **Status and payment-method breakdowns**
//! - **Average days to pay** and the **collection rate**
//!
//! # Collection rate
//!
//! `total payments / total invoiced × 100`, where "invoiced" excludes drafts
//! and cancelled invoices:
//! - Invoiced: $2,000
//! - Received: $1,500
//! - Collection rate: 75.00

pub mod aggregate;
pub mod error;
pub mod service;

pub use aggregate::{
    build_report, ClientRevenue, MethodSummary, MonthlyRevenue, ReportBundle, ReportTotals, ReportWindow,
    StatusSummary,
};
pub use error::ReportingError;
pub use service::ReportingService;
