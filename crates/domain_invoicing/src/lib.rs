//! Invoicing Domain - invoices, payments and recurring schedules
//!
//! This crate holds the business rules of the invoicing core:
//!
//! - **Lifecycle**: draft → sent → paid/overdue, cancellation, reminders,
//!   duplication and the overdue sweep ([`services::InvoiceService`])
//! - **Reconciliation**: balance due, guarded payment insertion and
//!   settlement within [`reconciliation::SETTLEMENT_TOLERANCE`]
//! - **Recurring**: weekly/monthly/quarterly templates materialized
//!   idempotently per cycle ([`services::RecurringService`])
//!
//! Persistence and notifications go through [`ports::InvoicingPort`] and
//! [`ports::NotificationPort`].
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_invoicing::services::{CreateInvoiceRequest, InvoiceService};
//!
//! let request = CreateInvoiceRequest::new(client_id, issue, due, items)
//!     .with_tax_rate(dec!(10))
//!     .sent();
//! let invoice = service.create_invoice(user_id, request).await?;
//! assert_eq!(invoice.number, "INV-001");
//! ```

pub mod adapters;
pub mod client;
pub mod error;
pub mod invoice;
pub mod numbering;
pub mod payment;
pub mod ports;
pub mod reconciliation;
pub mod recurring;
pub mod services;
pub mod user;

pub use client::{Client, ClientDetails};
pub use error::{ErrorBody, ErrorKind, InvoicingError};
pub use invoice::{Invoice, InvoiceDraft, InvoiceItem, InvoiceStatus, InvoiceTotals, LineItemInput, RecurringSource};
pub use payment::{PayerInfo, Payment, PaymentGateway, PaymentMethod, PaymentStatus};
pub use ports::{DeliveryReceipt, InvoiceQuery, InvoicingPort, NotificationPort, OutboundMessage, PaymentInsertOutcome};
pub use reconciliation::{Reconciliation, SETTLEMENT_TOLERANCE};
pub use recurring::{Frequency, RecurringInvoice, RecurringTemplate};
pub use services::{ClientService, InvoiceService, RecurringService};
pub use user::User;
