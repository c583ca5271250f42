//! Invoicing Domain Ports
//!
//! The services in this crate depend only on these traits. Two adapters
//! implement `InvoicingPort`:
//!
//! - **PostgreSQL**: `infra_db::PostgresInvoicingAdapter`
//! - **In-memory**: [`crate::adapters::InMemoryInvoicingAdapter`], for tests and demos
//!
//! Every operation takes the owning user id. Records that belong to another
//! user are reported as `PortError::NotFound`, never as a permission error.
//!
//! # Usage
//!
//! ```rust,ignore
//! let port: Arc<dyn InvoicingPort> = Arc::new(PostgresInvoicingAdapter::new(pool));
//! let service = InvoiceService::new(port, Arc::new(LogNotifier::new()), Arc::new(SystemClock));
//! let invoice = service.send_invoice(user_id, invoice_id).await?;
//! ```

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{ClientId, DomainPort, InvoiceId, PortError, RecurringInvoiceId, UserId};

use crate::client::Client;
use crate::invoice::{Invoice, InvoiceStatus, RecurringSource};
use crate::payment::Payment;
use crate::recurring::RecurringInvoice;
use crate::user::User;

/// Query parameters for listing invoices
///
/// Results are ordered newest first (issue date, then number).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceQuery {
    /// Filter by client
    pub client_id: Option<ClientId>,
    /// Keep only these statuses
    pub statuses: Option<Vec<InvoiceStatus>>,
    /// Earliest issue date (inclusive)
    pub issued_from: Option<NaiveDate>,
    /// Latest issue date (inclusive)
    pub issued_to: Option<NaiveDate>,
    /// Limit results
    pub limit: Option<u32>,
}

impl InvoiceQuery {
    /// All invoices of the user
    pub fn all() -> Self {
        Self::default()
    }

    /// Invoices billed to one client
    pub fn by_client(client_id: ClientId) -> Self {
        Self {
            client_id: Some(client_id),
            ..Default::default()
        }
    }

    /// Restricts to the given statuses
    pub fn with_statuses(mut self, statuses: impl Into<Vec<InvoiceStatus>>) -> Self {
        self.statuses = Some(statuses.into());
        self
    }

    /// Restricts to an inclusive issue-date window
    pub fn issued_between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.issued_from = Some(from);
        self.issued_to = Some(to);
        self
    }

    /// Caps the number of results
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `invoice` passes the filters (ordering and limit excluded)
    pub fn matches(&self, invoice: &Invoice) -> bool {
        if let Some(client_id) = self.client_id {
            if invoice.client_id != client_id {
                return false;
            }
        }
        if let Some(ref statuses) = self.statuses {
            if !statuses.contains(&invoice.status) {
                return false;
            }
        }
        if let Some(from) = self.issued_from {
            if invoice.issue_date < from {
                return false;
            }
        }
        if let Some(to) = self.issued_to {
            if invoice.issue_date > to {
                return false;
            }
        }
        true
    }
}

/// Cumulative position after a guarded payment insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentInsertOutcome {
    /// Sum of completed payments including the new one
    pub total_paid: core_kernel::Money,
}

/// Persistence port for the invoicing domain
#[async_trait]
pub trait InvoicingPort: DomainPort {
    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    async fn get_user(&self, user_id: UserId) -> Result<User, PortError>;

    async fn insert_user(&self, user: &User) -> Result<(), PortError>;

    /// All users, for background jobs
    async fn list_users(&self) -> Result<Vec<User>, PortError>;

    /// Atomically increments the user's invoice counter and returns the new value
    ///
    /// Never returns a value at or below the highest invoice number already
    /// stored for the user.
    async fn next_invoice_sequence(&self, user_id: UserId) -> Result<u32, PortError>;

    // ------------------------------------------------------------------
    // Clients
    // ------------------------------------------------------------------

    async fn get_client(&self, user_id: UserId, client_id: ClientId) -> Result<Client, PortError>;

    async fn list_clients(&self, user_id: UserId) -> Result<Vec<Client>, PortError>;

    async fn insert_client(&self, client: &Client) -> Result<(), PortError>;

    async fn update_client(&self, client: &Client) -> Result<(), PortError>;

    /// Fails with `Conflict` while the client has invoices
    async fn delete_client(&self, user_id: UserId, client_id: ClientId) -> Result<(), PortError>;

    // ------------------------------------------------------------------
    // Invoices
    // ------------------------------------------------------------------

    async fn get_invoice(&self, user_id: UserId, invoice_id: InvoiceId) -> Result<Invoice, PortError>;

    async fn find_invoices(&self, user_id: UserId, query: &InvoiceQuery) -> Result<Vec<Invoice>, PortError>;

    /// Stores a new invoice with its items
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), PortError>;

    /// Saves header fields and replaces the items wholesale
    async fn update_invoice(&self, invoice: &Invoice) -> Result<(), PortError>;

    /// Fails with `Conflict` while payments remain
    async fn delete_invoice(&self, user_id: UserId, invoice_id: InvoiceId) -> Result<(), PortError>;

    /// Flips `sent` invoices due before `today` to `overdue`; returns how many changed
    async fn mark_overdue(&self, user_id: UserId, today: NaiveDate, now: DateTime<Utc>) -> Result<u64, PortError>;

    /// Invoice previously materialized for a recurring cycle, if any
    async fn find_by_recurring_source(
        &self,
        user_id: UserId,
        source: RecurringSource,
    ) -> Result<Option<Invoice>, PortError>;

    // ------------------------------------------------------------------
    // Payments
    // ------------------------------------------------------------------

    async fn list_payments(&self, user_id: UserId, invoice_id: InvoiceId) -> Result<Vec<Payment>, PortError>;

    /// Every payment across the user's invoices
    async fn list_user_payments(&self, user_id: UserId) -> Result<Vec<Payment>, PortError>;

    /// Inserts a completed payment after re-checking, under a lock on the
    /// invoice, that cumulative completed payments stay within its total
    ///
    /// Returns `Conflict` on overshoot and leaves nothing written.
    async fn insert_payment_guarded(&self, payment: &Payment) -> Result<PaymentInsertOutcome, PortError>;

    /// Removes all payments of an invoice; returns how many were removed
    async fn delete_payments(&self, user_id: UserId, invoice_id: InvoiceId) -> Result<u64, PortError>;

    // ------------------------------------------------------------------
    // Recurring templates
    // ------------------------------------------------------------------

    async fn get_recurring(&self, user_id: UserId, id: RecurringInvoiceId) -> Result<RecurringInvoice, PortError>;

    async fn list_recurring(&self, user_id: UserId) -> Result<Vec<RecurringInvoice>, PortError>;

    /// Active templates across all users whose next date is on or before `today`
    async fn list_due_recurring(&self, today: NaiveDate) -> Result<Vec<RecurringInvoice>, PortError>;

    async fn insert_recurring(&self, recurring: &RecurringInvoice) -> Result<(), PortError>;

    async fn update_recurring(&self, recurring: &RecurringInvoice) -> Result<(), PortError>;

    async fn delete_recurring(&self, user_id: UserId, id: RecurringInvoiceId) -> Result<(), PortError>;
}

/// A plain message to a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub invoice_id: Option<InvoiceId>,
}

/// Acknowledgement from the notification channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub message_id: String,
    pub accepted_at: DateTime<Utc>,
}

/// Outbound notification port (email provider, log, test capture)
#[async_trait]
pub trait NotificationPort: DomainPort {
    async fn submit(&self, message: OutboundMessage) -> Result<DeliveryReceipt, PortError>;
}
