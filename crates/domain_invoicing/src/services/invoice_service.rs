//! Invoice lifecycle and payment reconciliation service

use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use core_kernel::{ClientId, Clock, InvoiceId, Money, UserId};

use crate::client::Client;
use crate::error::InvoicingError;
use crate::invoice::{Invoice, InvoiceDraft, InvoiceStatus, LineItemInput};
use crate::numbering::format_invoice_number;
use crate::payment::{PayerInfo, Payment, PaymentMethod};
use crate::ports::{InvoiceQuery, InvoicingPort, NotificationPort, OutboundMessage};
use crate::reconciliation::{ensure_within_balance, is_settled, total_paid, Reconciliation};
use crate::user::User;

/// Payment window for duplicated invoices
pub const DUPLICATE_DUE_IN_DAYS: u64 = 30;

/// Input for `InvoiceService::create_invoice`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvoiceRequest {
    pub client_id: ClientId,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub tax_rate: Decimal,
    pub items: Vec<LineItemInput>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub terms: Option<String>,
    /// `draft` or `sent`
    pub status: InvoiceStatus,
}

impl CreateInvoiceRequest {
    /// A draft request with no tax
    pub fn new(client_id: ClientId, issue_date: NaiveDate, due_date: NaiveDate, items: Vec<LineItemInput>) -> Self {
        Self {
            client_id,
            issue_date,
            due_date,
            tax_rate: Decimal::ZERO,
            items,
            notes: None,
            terms: None,
            status: InvoiceStatus::Draft,
        }
    }

    pub fn with_tax_rate(mut self, tax_rate: Decimal) -> Self {
        self.tax_rate = tax_rate;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_terms(mut self, terms: impl Into<String>) -> Self {
        self.terms = Some(terms.into());
        self
    }

    /// Create and send in one step
    pub fn sent(mut self) -> Self {
        self.status = InvoiceStatus::Sent;
        self
    }
}

/// Partial edit of an invoice; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateInvoiceRequest {
    pub client_id: Option<ClientId>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub tax_rate: Option<Decimal>,
    /// Replaces every item when present
    pub items: Option<Vec<LineItemInput>>,
    /// `Some(None)` clears the notes
    pub notes: Option<Option<String>>,
    pub terms: Option<Option<String>>,
}

impl UpdateInvoiceRequest {
    pub fn items(items: Vec<LineItemInput>) -> Self {
        Self {
            items: Some(items),
            ..Default::default()
        }
    }

    pub fn with_tax_rate(mut self, tax_rate: Decimal) -> Self {
        self.tax_rate = Some(tax_rate);
        self
    }
}

/// Input for `InvoiceService::record_payment`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
    pub method: PaymentMethod,
    #[serde(default)]
    pub reference: Option<String>,
    /// Defaults to now
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
}

impl RecordPaymentRequest {
    pub fn new(amount: Decimal, method: PaymentMethod) -> Self {
        Self {
            amount,
            method,
            reference: None,
            paid_at: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn paid_at(mut self, paid_at: DateTime<Utc>) -> Self {
        self.paid_at = Some(paid_at);
        self
    }
}

/// An invoice with its payments and balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceDetails {
    pub invoice: Invoice,
    pub payments: Vec<Payment>,
    pub reconciliation: Reconciliation,
}

impl InvoiceDetails {
    pub fn balance_due(&self) -> Money {
        self.reconciliation.balance_due
    }
}

/// Orchestrates the invoice lifecycle over the persistence and notification ports
#[derive(Clone)]
pub struct InvoiceService {
    port: Arc<dyn InvoicingPort>,
    notifier: Arc<dyn NotificationPort>,
    clock: Arc<dyn Clock>,
}

impl InvoiceService {
    pub fn new(port: Arc<dyn InvoicingPort>, notifier: Arc<dyn NotificationPort>, clock: Arc<dyn Clock>) -> Self {
        Self { port, notifier, clock }
    }

    /// Creates an invoice as draft or sent
    ///
    /// The number is reserved only after the request validates, so rejected
    /// requests never burn a sequence value.
    #[instrument(skip(self, request), fields(client_id = %request.client_id))]
    pub async fn create_invoice(&self, user_id: UserId, request: CreateInvoiceRequest) -> Result<Invoice, InvoicingError> {
        if !matches!(request.status, InvoiceStatus::Draft | InvoiceStatus::Sent) {
            return Err(InvoicingError::validation_field(
                format!("New invoices must be draft or sent, not {}", request.status),
                "status",
            ));
        }

        let user = self.port.get_user(user_id).await?;
        let client = self.port.get_client(user_id, request.client_id).await?;

        let draft = InvoiceDraft {
            user_id,
            client_id: client.id,
            currency: user.currency,
            issue_date: request.issue_date,
            due_date: request.due_date,
            tax_rate: request.tax_rate,
            items: request.items,
            notes: request.notes,
            terms: request.terms,
            recurring_source: None,
        };

        self.issue(&user, &client, draft, request.status == InvoiceStatus::Sent).await
    }

    /// Numbers, stores and optionally sends a validated draft
    pub(crate) async fn issue(
        &self,
        user: &User,
        client: &Client,
        draft: InvoiceDraft,
        send: bool,
    ) -> Result<Invoice, InvoicingError> {
        draft.validate()?;

        let sequence = self.port.next_invoice_sequence(user.id).await?;
        let now = self.clock.now();
        let mut invoice = Invoice::from_draft(draft, format_invoice_number(sequence), now)?;
        if send {
            invoice.mark_sent(now)?;
        }

        self.port.insert_invoice(&invoice).await?;
        info!(
            invoice_id = %invoice.id,
            number = %invoice.number,
            status = %invoice.status,
            total = %invoice.total,
            "Invoice created"
        );

        if send {
            self.notify(invoice_message(user, client, &invoice)).await;
        }
        Ok(invoice)
    }

    /// Edits a draft, sent or overdue invoice
    #[instrument(skip(self, request))]
    pub async fn update_invoice(
        &self,
        user_id: UserId,
        invoice_id: InvoiceId,
        request: UpdateInvoiceRequest,
    ) -> Result<Invoice, InvoicingError> {
        let mut invoice = self.port.get_invoice(user_id, invoice_id).await?;
        invoice.ensure_editable()?;
        let now = self.clock.now();

        if let Some(client_id) = request.client_id {
            self.port.get_client(user_id, client_id).await?;
            invoice.client_id = client_id;
        }
        if request.issue_date.is_some() || request.due_date.is_some() {
            let issue_date = request.issue_date.unwrap_or(invoice.issue_date);
            let due_date = request.due_date.unwrap_or(invoice.due_date);
            invoice.reschedule(issue_date, due_date, now)?;
        }
        if let Some(tax_rate) = request.tax_rate {
            invoice.set_tax_rate(tax_rate, now)?;
        }
        if let Some(ref items) = request.items {
            invoice.replace_items(items, now)?;
        }
        if let Some(notes) = request.notes {
            invoice.notes = notes;
        }
        if let Some(terms) = request.terms {
            invoice.terms = terms;
        }
        invoice.updated_at = now;

        let payments = self.port.list_payments(user_id, invoice_id).await?;
        let paid = total_paid(&payments, invoice.currency)?;
        if invoice.total.amount() < paid.amount() {
            warn!(number = %invoice.number, total = %invoice.total, paid = %paid, "Edit rejected below amount paid");
            return Err(InvoicingError::conflict(format!(
                "New total {} is below the {} already paid",
                invoice.total, paid
            )));
        }
        // an edit down to the amount already received settles the invoice
        if invoice.status.is_outstanding() && paid.is_positive() && is_settled(&paid, &invoice.total) {
            invoice.transition_to(InvoiceStatus::Paid, now)?;
            info!(number = %invoice.number, "Invoice settled by edit");
        }

        self.port.update_invoice(&invoice).await?;
        info!(number = %invoice.number, total = %invoice.total, "Invoice updated");
        Ok(invoice)
    }

    /// Deletes an invoice and its payments
    #[instrument(skip(self))]
    pub async fn delete_invoice(&self, user_id: UserId, invoice_id: InvoiceId) -> Result<(), InvoicingError> {
        let invoice = self.port.get_invoice(user_id, invoice_id).await?;
        let removed = self.port.delete_payments(user_id, invoice_id).await?;
        self.port.delete_invoice(user_id, invoice_id).await?;
        info!(number = %invoice.number, payments_removed = removed, "Invoice deleted");
        Ok(())
    }

    /// Marks a draft or sent invoice as sent and emails the client
    #[instrument(skip(self))]
    pub async fn send_invoice(&self, user_id: UserId, invoice_id: InvoiceId) -> Result<Invoice, InvoicingError> {
        let mut invoice = self.port.get_invoice(user_id, invoice_id).await?;
        invoice.mark_sent(self.clock.now())?;

        let user = self.port.get_user(user_id).await?;
        let client = self.port.get_client(user_id, invoice.client_id).await?;
        self.port.update_invoice(&invoice).await?;
        info!(number = %invoice.number, to = %client.email, "Invoice sent");

        self.notify(invoice_message(&user, &client, &invoice)).await;
        Ok(invoice)
    }

    /// Emails a payment reminder for a sent or overdue invoice
    #[instrument(skip(self))]
    pub async fn send_reminder(&self, user_id: UserId, invoice_id: InvoiceId) -> Result<Invoice, InvoicingError> {
        let mut invoice = self.port.get_invoice(user_id, invoice_id).await?;
        invoice.record_reminder(self.clock.now())?;

        let user = self.port.get_user(user_id).await?;
        let client = self.port.get_client(user_id, invoice.client_id).await?;
        let payments = self.port.list_payments(user_id, invoice_id).await?;
        let reconciliation = Reconciliation::of(&invoice, &payments)?;
        self.port.update_invoice(&invoice).await?;
        info!(number = %invoice.number, reminders = invoice.reminder_count, "Reminder sent");

        self.notify(reminder_message(&user, &client, &invoice, reconciliation.balance_due)).await;
        Ok(invoice)
    }

    /// Cancels a draft or sent invoice
    #[instrument(skip(self))]
    pub async fn cancel_invoice(&self, user_id: UserId, invoice_id: InvoiceId) -> Result<Invoice, InvoicingError> {
        let mut invoice = self.port.get_invoice(user_id, invoice_id).await?;
        if let Err(err) = invoice.cancel(self.clock.now()) {
            warn!(number = %invoice.number, status = %invoice.status, "Cancel rejected");
            return Err(err);
        }
        self.port.update_invoice(&invoice).await?;
        info!(number = %invoice.number, "Invoice cancelled");
        Ok(invoice)
    }

    /// Copies an invoice into a new draft dated today
    #[instrument(skip(self))]
    pub async fn duplicate_invoice(&self, user_id: UserId, invoice_id: InvoiceId) -> Result<Invoice, InvoicingError> {
        let source = self.port.get_invoice(user_id, invoice_id).await?;
        let user = self.port.get_user(user_id).await?;
        let client = self.port.get_client(user_id, source.client_id).await?;

        let issue_date = user.timezone.today(self.clock.as_ref());
        let due_date = issue_date
            .checked_add_days(Days::new(DUPLICATE_DUE_IN_DAYS))
            .ok_or_else(|| InvoicingError::validation("Due date is out of range"))?;

        let draft = InvoiceDraft {
            user_id,
            client_id: source.client_id,
            currency: source.currency,
            issue_date,
            due_date,
            tax_rate: source.tax_rate,
            items: source.line_inputs(),
            notes: source.notes.clone(),
            terms: source.terms.clone(),
            recurring_source: None,
        };

        let copy = self.issue(&user, &client, draft, false).await?;
        info!(from = %source.number, to = %copy.number, "Invoice duplicated");
        Ok(copy)
    }

    /// Flips the user's past-due sent invoices to overdue
    ///
    /// "Today" is the user's local date. Running it again on the same day
    /// changes nothing.
    #[instrument(skip(self))]
    pub async fn sweep_overdue(&self, user_id: UserId) -> Result<u64, InvoicingError> {
        let user = self.port.get_user(user_id).await?;
        let today = user.timezone.today(self.clock.as_ref());
        let flipped = self.port.mark_overdue(user_id, today, self.clock.now()).await?;
        if flipped > 0 {
            info!(count = flipped, %today, "Invoices marked overdue");
        }
        Ok(flipped)
    }

    /// Invoice with its payments and balance due
    pub async fn get_invoice(&self, user_id: UserId, invoice_id: InvoiceId) -> Result<InvoiceDetails, InvoicingError> {
        let invoice = self.port.get_invoice(user_id, invoice_id).await?;
        let payments = self.port.list_payments(user_id, invoice_id).await?;
        let reconciliation = Reconciliation::of(&invoice, &payments)?;
        Ok(InvoiceDetails {
            invoice,
            payments,
            reconciliation,
        })
    }

    pub async fn list_invoices(&self, user_id: UserId, query: &InvoiceQuery) -> Result<Vec<Invoice>, InvoicingError> {
        Ok(self.port.find_invoices(user_id, query).await?)
    }

    /// Records a payment entered by the owner
    ///
    /// # Arguments
    ///
    /// * `user_id` - Owner of the invoice
    /// * `invoice_id` - Invoice being paid; must be sent or overdue
    /// * `request` - Amount, method and optional reference
    ///
    /// # Returns
    ///
    /// The stored payment. The invoice becomes paid when cumulative payments
    /// reach its total within `SETTLEMENT_TOLERANCE`.
    #[instrument(skip(self, request), fields(amount = %request.amount, method = %request.method))]
    pub async fn record_payment(
        &self,
        user_id: UserId,
        invoice_id: InvoiceId,
        request: RecordPaymentRequest,
    ) -> Result<Payment, InvoicingError> {
        if request.amount <= Decimal::ZERO {
            return Err(InvoicingError::validation_field(
                "Payment amount must be greater than zero",
                "amount",
            ));
        }

        let invoice = self.port.get_invoice(user_id, invoice_id).await?;
        if !invoice.status.is_outstanding() {
            warn!(number = %invoice.number, status = %invoice.status, "Payment rejected");
            return Err(InvoicingError::ActionNotAllowed {
                action: "record a payment on",
                status: invoice.status,
            });
        }

        let amount = Money::new(request.amount, invoice.currency).round_to_currency();
        let payments = self.port.list_payments(user_id, invoice_id).await?;
        let paid = total_paid(&payments, invoice.currency)?;
        if let Err(err) = ensure_within_balance(&invoice.total, &paid, &amount) {
            warn!(number = %invoice.number, %amount, %paid, "Payment rejected");
            return Err(err);
        }

        let mut payment = Payment::manual(
            user_id,
            invoice_id,
            amount,
            request.method,
            request.paid_at.unwrap_or_else(|| self.clock.now()),
        );
        payment.reference = request.reference;

        self.settle(&invoice, payment).await
    }

    /// Pays the whole remaining balance through the public pay action
    #[instrument(skip(self, payer))]
    pub async fn process_online_payment(
        &self,
        user_id: UserId,
        invoice_id: InvoiceId,
        method: PaymentMethod,
        payer: PayerInfo,
    ) -> Result<Payment, InvoicingError> {
        let invoice = self.port.get_invoice(user_id, invoice_id).await?;
        if !invoice.status.is_outstanding() {
            warn!(number = %invoice.number, status = %invoice.status, "Online payment rejected");
            return Err(InvoicingError::ActionNotAllowed {
                action: "pay",
                status: invoice.status,
            });
        }

        let payments = self.port.list_payments(user_id, invoice_id).await?;
        let paid = total_paid(&payments, invoice.currency)?;
        let balance = invoice.total.checked_sub(&paid)?;
        if !balance.is_positive() {
            return Err(InvoicingError::conflict(format!("Invoice {} has no balance due", invoice.number)));
        }

        let payment = Payment::online(user_id, invoice_id, balance, method, payer, self.clock.now());
        self.settle(&invoice, payment).await
    }

    /// Stores the payment through the guarded insert and settles the invoice when fully paid
    async fn settle(&self, invoice: &Invoice, payment: Payment) -> Result<Payment, InvoicingError> {
        let outcome = self.port.insert_payment_guarded(&payment).await?;
        info!(
            number = %invoice.number,
            payment_id = %payment.id,
            amount = %payment.amount,
            total_paid = %outcome.total_paid,
            "Payment recorded"
        );

        if is_settled(&outcome.total_paid, &invoice.total) {
            let mut current = self.port.get_invoice(invoice.user_id, invoice.id).await?;
            if current.status.can_transition_to(InvoiceStatus::Paid) {
                current.transition_to(InvoiceStatus::Paid, self.clock.now())?;
                self.port.update_invoice(&current).await?;
                info!(number = %current.number, "Invoice paid in full");
            }
        }
        Ok(payment)
    }

    async fn notify(&self, message: OutboundMessage) {
        let to = message.to.clone();
        if let Err(err) = self.notifier.submit(message).await {
            warn!(%to, error = %err, "Notification failed");
        }
    }
}

fn invoice_message(user: &User, client: &Client, invoice: &Invoice) -> OutboundMessage {
    OutboundMessage {
        to: client.email.clone(),
        subject: format!("Invoice {} from {}", invoice.number, user.display_name()),
        body: format!(
            "Hi {},\n\n{} has sent you invoice {} for {}, due on {}.",
            client.name,
            user.display_name(),
            invoice.number,
            invoice.total,
            invoice.due_date
        ),
        invoice_id: Some(invoice.id),
    }
}

fn reminder_message(user: &User, client: &Client, invoice: &Invoice, balance_due: Money) -> OutboundMessage {
    let when = if invoice.status == InvoiceStatus::Overdue {
        "was due"
    } else {
        "is due"
    };
    OutboundMessage {
        to: client.email.clone(),
        subject: format!("Reminder: invoice {} from {}", invoice.number, user.display_name()),
        body: format!(
            "Hi {},\n\nThis is a reminder that invoice {} {} on {}. Balance due: {}.",
            client.name, invoice.number, when, invoice.due_date, balance_due
        ),
        invoice_id: Some(invoice.id),
    }
}
