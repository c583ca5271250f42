//! In-memory implementation of `InvoicingPort`
//!
//! All collections sit behind one `RwLock`, so every port call is atomic with
//! respect to the others. That single write lock is what makes the guarded
//! payment insert race-free here.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use core_kernel::{
    AdapterHealth, ClientId, DomainPort, HealthCheckResult, HealthCheckable, InvoiceId, Money, PortError,
    RecurringInvoiceId, UserId,
};

use crate::client::Client;
use crate::invoice::{Invoice, RecurringSource};
use crate::numbering::highest_sequence;
use crate::payment::Payment;
use crate::ports::{InvoiceQuery, InvoicingPort, PaymentInsertOutcome};
use crate::recurring::RecurringInvoice;
use crate::user::User;

#[derive(Debug, Default)]
struct Store {
    users: HashMap<UserId, User>,
    clients: HashMap<ClientId, Client>,
    invoices: HashMap<InvoiceId, Invoice>,
    payments: Vec<Payment>,
    recurring: HashMap<RecurringInvoiceId, RecurringInvoice>,
}

impl Store {
    fn invoice(&self, user_id: UserId, invoice_id: InvoiceId) -> Result<&Invoice, PortError> {
        self.invoices
            .get(&invoice_id)
            .filter(|invoice| invoice.user_id == user_id)
            .ok_or_else(|| PortError::not_found("Invoice", invoice_id))
    }

    fn paid_on(&self, invoice: &Invoice) -> Result<Money, PortError> {
        Money::sum(
            self.payments
                .iter()
                .filter(|p| p.invoice_id == invoice.id && p.is_completed())
                .map(|p| &p.amount),
            invoice.currency,
        )
        .map_err(|e| PortError::validation(e.to_string()))
    }
}

/// Process-local invoicing store
#[derive(Debug, Default)]
pub struct InMemoryInvoicingAdapter {
    store: RwLock<Store>,
}

impl InMemoryInvoicingAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DomainPort for InMemoryInvoicingAdapter {}

#[async_trait]
impl HealthCheckable for InMemoryInvoicingAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult {
            status: AdapterHealth::Healthy,
            message: Some("In-memory store".to_string()),
            ..HealthCheckResult::healthy("memory-invoicing", 0)
        }
    }
}

#[async_trait]
impl InvoicingPort for InMemoryInvoicingAdapter {
    async fn get_user(&self, user_id: UserId) -> Result<User, PortError> {
        self.store
            .read()
            .await
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("User", user_id))
    }

    async fn insert_user(&self, user: &User) -> Result<(), PortError> {
        let mut store = self.store.write().await;
        if store.users.values().any(|u| u.id == user.id || u.email == user.email) {
            return Err(PortError::conflict(format!("User {} already exists", user.email)));
        }
        store.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, PortError> {
        let mut users: Vec<User> = self.store.read().await.users.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    #[instrument(skip(self))]
    async fn next_invoice_sequence(&self, user_id: UserId) -> Result<u32, PortError> {
        let mut store = self.store.write().await;
        let floor = highest_sequence(
            store
                .invoices
                .values()
                .filter(|i| i.user_id == user_id)
                .map(|i| i.number.as_str()),
        );
        let user = store
            .users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::not_found("User", user_id))?;
        user.invoice_counter = user.invoice_counter.max(floor) + 1;
        debug!(sequence = user.invoice_counter, "Reserved invoice sequence");
        Ok(user.invoice_counter)
    }

    async fn get_client(&self, user_id: UserId, client_id: ClientId) -> Result<Client, PortError> {
        self.store
            .read()
            .await
            .clients
            .get(&client_id)
            .filter(|c| c.user_id == user_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Client", client_id))
    }

    async fn list_clients(&self, user_id: UserId) -> Result<Vec<Client>, PortError> {
        let mut clients: Vec<Client> = self
            .store
            .read()
            .await
            .clients
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        clients.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(clients)
    }

    async fn insert_client(&self, client: &Client) -> Result<(), PortError> {
        let mut store = self.store.write().await;
        if !store.users.contains_key(&client.user_id) {
            return Err(PortError::not_found("User", client.user_id));
        }
        store.clients.insert(client.id, client.clone());
        Ok(())
    }

    async fn update_client(&self, client: &Client) -> Result<(), PortError> {
        let mut store = self.store.write().await;
        match store.clients.get_mut(&client.id) {
            Some(existing) if existing.user_id == client.user_id => {
                *existing = client.clone();
                Ok(())
            }
            _ => Err(PortError::not_found("Client", client.id)),
        }
    }

    #[instrument(skip(self))]
    async fn delete_client(&self, user_id: UserId, client_id: ClientId) -> Result<(), PortError> {
        let mut store = self.store.write().await;
        if !store.clients.get(&client_id).is_some_and(|c| c.user_id == user_id) {
            return Err(PortError::not_found("Client", client_id));
        }
        let invoice_count = store.invoices.values().filter(|i| i.client_id == client_id).count();
        if invoice_count > 0 {
            return Err(PortError::conflict(format!(
                "Client has {} invoice(s) and cannot be deleted",
                invoice_count
            )));
        }
        store.clients.remove(&client_id);
        Ok(())
    }

    async fn get_invoice(&self, user_id: UserId, invoice_id: InvoiceId) -> Result<Invoice, PortError> {
        self.store.read().await.invoice(user_id, invoice_id).cloned()
    }

    #[instrument(skip(self))]
    async fn find_invoices(&self, user_id: UserId, query: &InvoiceQuery) -> Result<Vec<Invoice>, PortError> {
        let store = self.store.read().await;
        let mut invoices: Vec<Invoice> = store
            .invoices
            .values()
            .filter(|i| i.user_id == user_id && query.matches(i))
            .cloned()
            .collect();
        invoices.sort_by(|a, b| {
            b.issue_date
                .cmp(&a.issue_date)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.id.cmp(&a.id))
        });
        if let Some(limit) = query.limit {
            invoices.truncate(limit as usize);
        }
        debug!(count = invoices.len(), "Found invoices");
        Ok(invoices)
    }

    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), PortError> {
        let mut store = self.store.write().await;
        if store
            .invoices
            .values()
            .any(|i| i.user_id == invoice.user_id && i.number == invoice.number)
        {
            return Err(PortError::conflict(format!("Invoice number {} is already taken", invoice.number)));
        }
        if let Some(source) = invoice.recurring_source {
            if store.invoices.values().any(|i| i.recurring_source == Some(source)) {
                return Err(PortError::conflict("Recurring cycle already materialized"));
            }
        }
        store.invoices.insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn update_invoice(&self, invoice: &Invoice) -> Result<(), PortError> {
        let mut store = self.store.write().await;
        match store.invoices.get_mut(&invoice.id) {
            Some(existing) if existing.user_id == invoice.user_id => {
                *existing = invoice.clone();
                Ok(())
            }
            _ => Err(PortError::not_found("Invoice", invoice.id)),
        }
    }

    #[instrument(skip(self))]
    async fn delete_invoice(&self, user_id: UserId, invoice_id: InvoiceId) -> Result<(), PortError> {
        let mut store = self.store.write().await;
        store.invoice(user_id, invoice_id)?;
        if store.payments.iter().any(|p| p.invoice_id == invoice_id) {
            return Err(PortError::conflict("Invoice still has payments"));
        }
        store.invoices.remove(&invoice_id);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn mark_overdue(&self, user_id: UserId, today: NaiveDate, now: DateTime<Utc>) -> Result<u64, PortError> {
        let mut store = self.store.write().await;
        let flipped = store
            .invoices
            .values_mut()
            .filter(|i| i.user_id == user_id)
            .map(|i| i.mark_overdue_if_due(today, now))
            .filter(|changed| *changed)
            .count();
        Ok(flipped as u64)
    }

    async fn find_by_recurring_source(
        &self,
        user_id: UserId,
        source: RecurringSource,
    ) -> Result<Option<Invoice>, PortError> {
        Ok(self
            .store
            .read()
            .await
            .invoices
            .values()
            .find(|i| i.user_id == user_id && i.recurring_source == Some(source))
            .cloned())
    }

    async fn list_payments(&self, user_id: UserId, invoice_id: InvoiceId) -> Result<Vec<Payment>, PortError> {
        let store = self.store.read().await;
        store.invoice(user_id, invoice_id)?;
        let mut payments: Vec<Payment> = store
            .payments
            .iter()
            .filter(|p| p.invoice_id == invoice_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| (p.paid_at, p.created_at));
        Ok(payments)
    }

    async fn list_user_payments(&self, user_id: UserId) -> Result<Vec<Payment>, PortError> {
        let mut payments: Vec<Payment> = self
            .store
            .read()
            .await
            .payments
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| (p.paid_at, p.created_at));
        Ok(payments)
    }

    #[instrument(skip(self, payment), fields(invoice_id = %payment.invoice_id, amount = %payment.amount))]
    async fn insert_payment_guarded(&self, payment: &Payment) -> Result<PaymentInsertOutcome, PortError> {
        let mut store = self.store.write().await;
        let invoice = store.invoice(payment.user_id, payment.invoice_id)?;
        if payment.amount.currency() != invoice.currency {
            return Err(PortError::validation_field(
                format!("Payment currency {} does not match invoice currency {}", payment.amount.currency(), invoice.currency),
                "amount",
            ));
        }
        let paid = store.paid_on(invoice)?;
        let total_paid = Money::new(paid.amount() + payment.amount.amount(), invoice.currency);
        if total_paid.amount() > invoice.total.amount() {
            return Err(PortError::conflict(format!(
                "Payment of {} exceeds remaining balance of {}",
                payment.amount,
                Money::new(invoice.total.amount() - paid.amount(), invoice.currency)
            )));
        }
        store.payments.push(payment.clone());
        debug!(total_paid = %total_paid, "Payment stored");
        Ok(PaymentInsertOutcome { total_paid })
    }

    async fn delete_payments(&self, user_id: UserId, invoice_id: InvoiceId) -> Result<u64, PortError> {
        let mut store = self.store.write().await;
        store.invoice(user_id, invoice_id)?;
        let before = store.payments.len();
        store.payments.retain(|p| p.invoice_id != invoice_id);
        Ok((before - store.payments.len()) as u64)
    }

    async fn get_recurring(&self, user_id: UserId, id: RecurringInvoiceId) -> Result<RecurringInvoice, PortError> {
        self.store
            .read()
            .await
            .recurring
            .get(&id)
            .filter(|r| r.user_id == user_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("RecurringInvoice", id))
    }

    async fn list_recurring(&self, user_id: UserId) -> Result<Vec<RecurringInvoice>, PortError> {
        let mut templates: Vec<RecurringInvoice> = self
            .store
            .read()
            .await
            .recurring
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        templates.sort_by_key(|r| (r.next_date, r.created_at));
        Ok(templates)
    }

    async fn list_due_recurring(&self, today: NaiveDate) -> Result<Vec<RecurringInvoice>, PortError> {
        let mut due: Vec<RecurringInvoice> = self
            .store
            .read()
            .await
            .recurring
            .values()
            .filter(|r| r.is_due(today))
            .cloned()
            .collect();
        due.sort_by_key(|r| (r.next_date, r.created_at));
        Ok(due)
    }

    async fn insert_recurring(&self, recurring: &RecurringInvoice) -> Result<(), PortError> {
        let mut store = self.store.write().await;
        if !store
            .clients
            .get(&recurring.client_id)
            .is_some_and(|c| c.user_id == recurring.user_id)
        {
            return Err(PortError::not_found("Client", recurring.client_id));
        }
        store.recurring.insert(recurring.id, recurring.clone());
        Ok(())
    }

    async fn update_recurring(&self, recurring: &RecurringInvoice) -> Result<(), PortError> {
        let mut store = self.store.write().await;
        match store.recurring.get_mut(&recurring.id) {
            Some(existing) if existing.user_id == recurring.user_id => {
                *existing = recurring.clone();
                Ok(())
            }
            _ => Err(PortError::not_found("RecurringInvoice", recurring.id)),
        }
    }

    async fn delete_recurring(&self, user_id: UserId, id: RecurringInvoiceId) -> Result<(), PortError> {
        let mut store = self.store.write().await;
        if !store.recurring.get(&id).is_some_and(|r| r.user_id == user_id) {
            return Err(PortError::not_found("RecurringInvoice", id));
        }
        store.recurring.remove(&id);
        Ok(())
    }
}
