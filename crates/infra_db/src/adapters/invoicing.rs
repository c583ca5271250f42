//! PostgreSQL Invoicing Adapter
//!
//! Implements `InvoicingPort` on top of [`InvoicingRepository`]. The adapter
//! owns the mapping in both directions:
//!
//! - domain records are flattened into rows (enums as TEXT, money as
//!   NUMERIC plus a currency code, the recurring template as JSONB)
//! - rows are parsed back, and a stored value that no longer parses is
//!   reported as `PortError::Transformation`
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresInvoicingAdapter};
//!
//! let pool = create_pool(DatabaseConfig::new(url)).await?;
//! run_migrations(&pool).await?;
//! let port: Arc<dyn InvoicingPort> = Arc::new(PostgresInvoicingAdapter::new(pool));
//! ```

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{
    ClientId, Currency, DomainPort, HealthCheckResult, HealthCheckable, InvoiceId, InvoiceItemId, Money, PaymentId,
    PortError, RecurringInvoiceId, Timezone, UserId,
};
use domain_invoicing::numbering::highest_sequence;
use domain_invoicing::{
    Client, Frequency, Invoice, InvoiceItem, InvoiceQuery, InvoiceStatus, InvoicingPort, PayerInfo, Payment,
    PaymentGateway, PaymentInsertOutcome, PaymentMethod, PaymentStatus, RecurringInvoice, RecurringSource,
    RecurringTemplate, User,
};

use crate::error::DatabaseError;
use crate::repositories::invoicing::{
    ClientRow, InvoiceFilter, InvoiceItemRow, InvoiceRecord, InvoiceRow, InvoicingRepository, PaymentRow,
    RecurringRow, UserRow,
};

const ADAPTER_ID: &str = "postgres-invoicing-adapter";

/// PostgreSQL-backed implementation of `InvoicingPort`
///
/// # Error Handling
///
/// - `DatabaseError::NotFound` -> `PortError::NotFound`
/// - constraint violations and `DatabaseError::Conflict` -> `PortError::Conflict`
/// - `DatabaseError::InvalidInput` -> `PortError::Validation`
/// - connection and pool errors -> transient `PortError` variants
#[derive(Debug, Clone)]
pub struct PostgresInvoicingAdapter {
    repository: InvoicingRepository,
    pool: PgPool,
}

impl PostgresInvoicingAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: InvoicingRepository::new(pool.clone()),
            pool,
        }
    }

    /// Returns a reference to the underlying repository
    pub fn repository(&self) -> &InvoicingRepository {
        &self.repository
    }
}

impl DomainPort for PostgresInvoicingAdapter {}

#[async_trait]
impl HealthCheckable for PostgresInvoicingAdapter {
    /// Runs `SELECT 1` against the pool
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();
        let result = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&self.pool).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult::healthy(ADAPTER_ID, latency_ms),
            Err(e) => HealthCheckResult::unhealthy(ADAPTER_ID, latency_ms, format!("Database error: {}", e)),
        }
    }
}

#[async_trait]
impl InvoicingPort for PostgresInvoicingAdapter {
    #[instrument(skip(self))]
    async fn get_user(&self, user_id: UserId) -> Result<User, PortError> {
        let row = self.repository.get_user(user_id.into()).await.map_err(db_to_port_error)?;
        row_to_user(row)
    }

    async fn insert_user(&self, user: &User) -> Result<(), PortError> {
        self.repository
            .insert_user(&user_to_row(user)?)
            .await
            .map_err(db_to_port_error)
    }

    async fn list_users(&self) -> Result<Vec<User>, PortError> {
        let rows = self.repository.list_users().await.map_err(db_to_port_error)?;
        rows.into_iter().map(row_to_user).collect()
    }

    #[instrument(skip(self))]
    async fn next_invoice_sequence(&self, user_id: UserId) -> Result<u32, PortError> {
        let numbers = self
            .repository
            .invoice_numbers(user_id.into())
            .await
            .map_err(db_to_port_error)?;
        let floor = to_i32(highest_sequence(numbers.iter().map(String::as_str)), "invoice_counter")?;

        let sequence = self
            .repository
            .next_invoice_sequence(user_id.into(), floor)
            .await
            .map_err(db_to_port_error)?;
        to_u32(sequence, "invoice_counter")
    }

    async fn get_client(&self, user_id: UserId, client_id: ClientId) -> Result<Client, PortError> {
        let row = self
            .repository
            .get_client(user_id.into(), client_id.into())
            .await
            .map_err(db_to_port_error)?;
        Ok(row_to_client(row))
    }

    async fn list_clients(&self, user_id: UserId) -> Result<Vec<Client>, PortError> {
        let rows = self.repository.list_clients(user_id.into()).await.map_err(db_to_port_error)?;
        Ok(rows.into_iter().map(row_to_client).collect())
    }

    async fn insert_client(&self, client: &Client) -> Result<(), PortError> {
        self.repository
            .insert_client(&client_to_row(client))
            .await
            .map_err(db_to_port_error)
    }

    async fn update_client(&self, client: &Client) -> Result<(), PortError> {
        self.repository
            .update_client(&client_to_row(client))
            .await
            .map_err(db_to_port_error)
    }

    #[instrument(skip(self))]
    async fn delete_client(&self, user_id: UserId, client_id: ClientId) -> Result<(), PortError> {
        debug!("Deleting client");
        self.repository
            .delete_client(user_id.into(), client_id.into())
            .await
            .map_err(db_to_port_error)
    }

    #[instrument(skip(self))]
    async fn get_invoice(&self, user_id: UserId, invoice_id: InvoiceId) -> Result<Invoice, PortError> {
        let record = self
            .repository
            .get_invoice(user_id.into(), invoice_id.into())
            .await
            .map_err(db_to_port_error)?;
        record_to_invoice(record)
    }

    #[instrument(skip(self))]
    async fn find_invoices(&self, user_id: UserId, query: &InvoiceQuery) -> Result<Vec<Invoice>, PortError> {
        let records = self
            .repository
            .find_invoices(user_id.into(), &query_to_filter(query))
            .await
            .map_err(db_to_port_error)?;
        records.into_iter().map(record_to_invoice).collect()
    }

    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.id, number = %invoice.number))]
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), PortError> {
        self.repository
            .insert_invoice(&invoice_to_record(invoice)?)
            .await
            .map_err(db_to_port_error)
    }

    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.id))]
    async fn update_invoice(&self, invoice: &Invoice) -> Result<(), PortError> {
        self.repository
            .update_invoice(&invoice_to_record(invoice)?)
            .await
            .map_err(db_to_port_error)
    }

    #[instrument(skip(self))]
    async fn delete_invoice(&self, user_id: UserId, invoice_id: InvoiceId) -> Result<(), PortError> {
        self.repository
            .delete_invoice(user_id.into(), invoice_id.into())
            .await
            .map_err(db_to_port_error)
    }

    #[instrument(skip(self))]
    async fn mark_overdue(&self, user_id: UserId, today: NaiveDate, now: DateTime<Utc>) -> Result<u64, PortError> {
        let flipped = self
            .repository
            .mark_overdue(user_id.into(), today, now)
            .await
            .map_err(db_to_port_error)?;
        debug!(flipped, "Overdue sweep");
        Ok(flipped)
    }

    async fn find_by_recurring_source(
        &self,
        user_id: UserId,
        source: RecurringSource,
    ) -> Result<Option<Invoice>, PortError> {
        let record = self
            .repository
            .find_by_recurring_source(user_id.into(), source.template_id.into(), to_i32(source.cycle, "recurring_cycle")?)
            .await
            .map_err(db_to_port_error)?;
        record.map(record_to_invoice).transpose()
    }

    async fn list_payments(&self, user_id: UserId, invoice_id: InvoiceId) -> Result<Vec<Payment>, PortError> {
        let rows = self
            .repository
            .list_payments(user_id.into(), invoice_id.into())
            .await
            .map_err(db_to_port_error)?;
        rows.into_iter().map(row_to_payment).collect()
    }

    async fn list_user_payments(&self, user_id: UserId) -> Result<Vec<Payment>, PortError> {
        let rows = self
            .repository
            .list_user_payments(user_id.into())
            .await
            .map_err(db_to_port_error)?;
        rows.into_iter().map(row_to_payment).collect()
    }

    #[instrument(skip(self, payment), fields(invoice_id = %payment.invoice_id, amount = %payment.amount))]
    async fn insert_payment_guarded(&self, payment: &Payment) -> Result<PaymentInsertOutcome, PortError> {
        let total_paid = self
            .repository
            .insert_payment_guarded(&payment_to_row(payment))
            .await
            .map_err(db_to_port_error)?;
        Ok(PaymentInsertOutcome {
            total_paid: Money::new(total_paid, payment.amount.currency()),
        })
    }

    #[instrument(skip(self))]
    async fn delete_payments(&self, user_id: UserId, invoice_id: InvoiceId) -> Result<u64, PortError> {
        self.repository
            .delete_payments(user_id.into(), invoice_id.into())
            .await
            .map_err(db_to_port_error)
    }

    async fn get_recurring(&self, user_id: UserId, id: RecurringInvoiceId) -> Result<RecurringInvoice, PortError> {
        let row = self
            .repository
            .get_recurring(user_id.into(), id.into())
            .await
            .map_err(db_to_port_error)?;
        row_to_recurring(row)
    }

    async fn list_recurring(&self, user_id: UserId) -> Result<Vec<RecurringInvoice>, PortError> {
        let rows = self.repository.list_recurring(user_id.into()).await.map_err(db_to_port_error)?;
        rows.into_iter().map(row_to_recurring).collect()
    }

    #[instrument(skip(self))]
    async fn list_due_recurring(&self, today: NaiveDate) -> Result<Vec<RecurringInvoice>, PortError> {
        let rows = self.repository.list_due_recurring(today).await.map_err(db_to_port_error)?;
        debug!(count = rows.len(), "Due recurring templates");
        rows.into_iter().map(row_to_recurring).collect()
    }

    async fn insert_recurring(&self, recurring: &RecurringInvoice) -> Result<(), PortError> {
        self.repository
            .insert_recurring(&recurring_to_row(recurring)?)
            .await
            .map_err(db_to_port_error)
    }

    async fn update_recurring(&self, recurring: &RecurringInvoice) -> Result<(), PortError> {
        self.repository
            .update_recurring(&recurring_to_row(recurring)?)
            .await
            .map_err(db_to_port_error)
    }

    async fn delete_recurring(&self, user_id: UserId, id: RecurringInvoiceId) -> Result<(), PortError> {
        self.repository
            .delete_recurring(user_id.into(), id.into())
            .await
            .map_err(db_to_port_error)
    }
}

// ============================================================================
// Error translation
// ============================================================================

/// Converts database errors to port errors
///
/// Constraint violations surface as conflicts: a duplicate invoice number, a
/// client that still has invoices, a payment above the balance.
fn db_to_port_error(e: DatabaseError) -> PortError {
    match e {
        DatabaseError::NotFound { entity, id } => PortError::not_found(entity, id),
        DatabaseError::DuplicateEntry(message)
        | DatabaseError::ForeignKeyViolation(message)
        | DatabaseError::ConstraintViolation(message)
        | DatabaseError::Conflict(message) => PortError::conflict(message),
        DatabaseError::InvalidInput { field, message } => PortError::validation_field(message, field),
        DatabaseError::InvalidData(message) => PortError::transformation(message),
        DatabaseError::ConnectionFailed(message) => PortError::connection(message),
        DatabaseError::PoolExhausted => PortError::ServiceUnavailable {
            service: "postgres".to_string(),
        },
        other => PortError::internal(other.to_string()),
    }
}

fn parse<T>(value: &str, column: &str) -> Result<T, PortError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| PortError::transformation(format!("Invalid {} '{}': {}", column, value, e)))
}

fn to_u32(value: i32, column: &str) -> Result<u32, PortError> {
    u32::try_from(value).map_err(|_| PortError::transformation(format!("Negative {}: {}", column, value)))
}

fn to_i32(value: u32, column: &str) -> Result<i32, PortError> {
    i32::try_from(value).map_err(|_| PortError::validation_field(format!("{} out of range: {}", column, value), column))
}

// ============================================================================
// Row -> domain
// ============================================================================

fn row_to_user(row: UserRow) -> Result<User, PortError> {
    Ok(User {
        id: UserId::from(row.user_id),
        currency: parse::<Currency>(&row.currency, "currency")?,
        invoice_counter: to_u32(row.invoice_counter, "invoice_counter")?,
        timezone: parse::<Timezone>(&row.timezone, "timezone")?,
        email: row.email,
        name: row.name,
        business_name: row.business_name,
        created_at: row.created_at,
    })
}

fn row_to_client(row: ClientRow) -> Client {
    Client {
        id: ClientId::from(row.client_id),
        user_id: UserId::from(row.user_id),
        name: row.name,
        email: row.email,
        company: row.company,
        address: row.address,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

fn record_to_invoice(record: InvoiceRecord) -> Result<Invoice, PortError> {
    let row = record.invoice;
    let currency = parse::<Currency>(&row.currency, "currency")?;

    let recurring_source = match (row.recurring_id, row.recurring_cycle) {
        (Some(template_id), Some(cycle)) => Some(RecurringSource {
            template_id: RecurringInvoiceId::from(template_id),
            cycle: to_u32(cycle, "recurring_cycle")?,
        }),
        (None, None) => None,
        _ => {
            return Err(PortError::transformation(format!(
                "Invoice {} has a partial recurring source",
                row.invoice_id
            )))
        }
    };

    let items = record
        .items
        .into_iter()
        .map(|item| InvoiceItem {
            id: InvoiceItemId::from(item.item_id),
            description: item.description,
            quantity: item.quantity,
            rate: Money::new(item.rate, currency),
            amount: Money::new(item.amount, currency),
        })
        .collect();

    Ok(Invoice {
        id: InvoiceId::from(row.invoice_id),
        user_id: UserId::from(row.user_id),
        client_id: ClientId::from(row.client_id),
        status: parse::<InvoiceStatus>(&row.status, "status")?,
        number: row.invoice_number,
        issue_date: row.issue_date,
        due_date: row.due_date,
        currency,
        items,
        tax_rate: row.tax_rate,
        subtotal: Money::new(row.subtotal, currency),
        tax: Money::new(row.tax, currency),
        total: Money::new(row.total, currency),
        notes: row.notes,
        terms: row.terms,
        reminder_count: to_u32(row.reminder_count, "reminder_count")?,
        sent_at: row.sent_at,
        recurring_source,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn row_to_payment(row: PaymentRow) -> Result<Payment, PortError> {
    let currency = parse::<Currency>(&row.currency, "currency")?;
    let payer = match (row.payer_name, row.payer_email) {
        (None, None) => None,
        (name, email) => Some(PayerInfo { name, email }),
    };

    Ok(Payment {
        id: PaymentId::from(row.payment_id),
        invoice_id: InvoiceId::from(row.invoice_id),
        user_id: UserId::from(row.user_id),
        amount: Money::new(row.amount, currency),
        method: parse::<PaymentMethod>(&row.method, "method")?,
        gateway: parse::<PaymentGateway>(&row.gateway, "gateway")?,
        status: parse::<PaymentStatus>(&row.status, "status")?,
        paid_at: row.paid_at,
        reference: row.reference,
        payer,
        created_at: row.created_at,
    })
}

fn row_to_recurring(row: RecurringRow) -> Result<RecurringInvoice, PortError> {
    let template: RecurringTemplate = serde_json::from_value(row.template).map_err(|e| {
        PortError::transformation(format!("Invalid template on recurring invoice {}: {}", row.recurring_id, e))
    })?;

    Ok(RecurringInvoice {
        id: RecurringInvoiceId::from(row.recurring_id),
        user_id: UserId::from(row.user_id),
        client_id: ClientId::from(row.client_id),
        frequency: parse::<Frequency>(&row.frequency, "frequency")?,
        start_date: row.start_date,
        anchor_date: row.anchor_date,
        anchor_cycle: to_u32(row.anchor_cycle, "anchor_cycle")?,
        next_date: row.next_date,
        cycles_generated: to_u32(row.cycles_generated, "cycles_generated")?,
        active: row.active,
        template,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

// ============================================================================
// Domain -> row
// ============================================================================

fn user_to_row(user: &User) -> Result<UserRow, PortError> {
    Ok(UserRow {
        user_id: user.id.into(),
        email: user.email.clone(),
        name: user.name.clone(),
        business_name: user.business_name.clone(),
        currency: user.currency.code().to_string(),
        invoice_counter: to_i32(user.invoice_counter, "invoice_counter")?,
        timezone: user.timezone.name().to_string(),
        created_at: user.created_at,
    })
}

fn client_to_row(client: &Client) -> ClientRow {
    ClientRow {
        client_id: client.id.into(),
        user_id: client.user_id.into(),
        name: client.name.clone(),
        email: client.email.clone(),
        company: client.company.clone(),
        address: client.address.clone(),
        created_at: client.created_at,
        updated_at: client.updated_at,
    }
}

fn invoice_to_record(invoice: &Invoice) -> Result<InvoiceRecord, PortError> {
    let invoice_id: Uuid = invoice.id.into();
    let (recurring_id, recurring_cycle) = match invoice.recurring_source {
        Some(source) => (
            Some(Uuid::from(source.template_id)),
            Some(to_i32(source.cycle, "recurring_cycle")?),
        ),
        None => (None, None),
    };

    let items = invoice
        .items
        .iter()
        .enumerate()
        .map(|(position, item)| {
            Ok(InvoiceItemRow {
                item_id: item.id.into(),
                invoice_id,
                position: to_i32(position as u32, "position")?,
                description: item.description.clone(),
                quantity: item.quantity,
                rate: item.rate.amount(),
                amount: item.amount.amount(),
            })
        })
        .collect::<Result<Vec<_>, PortError>>()?;

    Ok(InvoiceRecord {
        invoice: InvoiceRow {
            invoice_id,
            user_id: invoice.user_id.into(),
            client_id: invoice.client_id.into(),
            invoice_number: invoice.number.clone(),
            status: invoice.status.as_str().to_string(),
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            currency: invoice.currency.code().to_string(),
            tax_rate: invoice.tax_rate,
            subtotal: invoice.subtotal.amount(),
            tax: invoice.tax.amount(),
            total: invoice.total.amount(),
            notes: invoice.notes.clone(),
            terms: invoice.terms.clone(),
            reminder_count: to_i32(invoice.reminder_count, "reminder_count")?,
            sent_at: invoice.sent_at,
            recurring_id,
            recurring_cycle,
            created_at: invoice.created_at,
            updated_at: invoice.updated_at,
        },
        items,
    })
}

fn payment_to_row(payment: &Payment) -> PaymentRow {
    let (payer_name, payer_email) = match &payment.payer {
        Some(payer) => (payer.name.clone(), payer.email.clone()),
        None => (None, None),
    };

    PaymentRow {
        payment_id: payment.id.into(),
        invoice_id: payment.invoice_id.into(),
        user_id: payment.user_id.into(),
        amount: payment.amount.amount(),
        currency: payment.amount.currency().code().to_string(),
        method: payment.method.as_str().to_string(),
        gateway: payment.gateway.as_str().to_string(),
        status: payment.status.as_str().to_string(),
        paid_at: payment.paid_at,
        reference: payment.reference.clone(),
        payer_name,
        payer_email,
        created_at: payment.created_at,
    }
}

fn recurring_to_row(recurring: &RecurringInvoice) -> Result<RecurringRow, PortError> {
    let template = serde_json::to_value(&recurring.template)
        .map_err(|e| PortError::transformation(format!("Template could not be serialized: {}", e)))?;

    Ok(RecurringRow {
        recurring_id: recurring.id.into(),
        user_id: recurring.user_id.into(),
        client_id: recurring.client_id.into(),
        frequency: recurring.frequency.as_str().to_string(),
        start_date: recurring.start_date,
        anchor_date: recurring.anchor_date,
        anchor_cycle: to_i32(recurring.anchor_cycle, "anchor_cycle")?,
        next_date: recurring.next_date,
        cycles_generated: to_i32(recurring.cycles_generated, "cycles_generated")?,
        active: recurring.active,
        template,
        created_at: recurring.created_at,
        updated_at: recurring.updated_at,
    })
}

fn query_to_filter(query: &InvoiceQuery) -> InvoiceFilter {
    InvoiceFilter {
        client_id: query.client_id.map(Uuid::from),
        statuses: query
            .statuses
            .as_ref()
            .map(|statuses| statuses.iter().map(|s| s.as_str().to_string()).collect()),
        issued_from: query.issued_from,
        issued_to: query.issued_to,
        limit: query.limit.map(i64::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_invoicing::{InvoiceDraft, LineItemInput};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_invoice() -> Invoice {
        let user_id = UserId::new();
        let draft = InvoiceDraft {
            user_id,
            client_id: ClientId::new(),
            currency: Currency::USD,
            issue_date: date(2024, 3, 1),
            due_date: date(2024, 3, 31),
            tax_rate: dec!(10),
            items: vec![
                LineItemInput::new("Design", dec!(2), dec!(100)),
                LineItemInput::new("Hosting", dec!(1), dec!(20)),
            ],
            notes: Some("Thanks".to_string()),
            terms: None,
            recurring_source: Some(RecurringSource {
                template_id: RecurringInvoiceId::new(),
                cycle: 3,
            }),
        };
        Invoice::from_draft(draft, "INV-001".to_string(), Utc::now()).unwrap()
    }

    #[test]
    fn test_invoice_row_mapping_preserves_items_and_source() {
        let invoice = sample_invoice();
        let record = invoice_to_record(&invoice).unwrap();

        assert_eq!(record.invoice.status, "draft");
        assert_eq!(record.invoice.currency, "USD");
        assert_eq!(record.invoice.recurring_cycle, Some(3));
        assert_eq!(record.items.iter().map(|i| i.position).collect::<Vec<_>>(), vec![0, 1]);

        let restored = record_to_invoice(record).unwrap();
        assert_eq!(restored, invoice);
    }

    #[test]
    fn test_partial_recurring_source_is_rejected() {
        let mut record = invoice_to_record(&sample_invoice()).unwrap();
        record.invoice.recurring_cycle = None;

        let err = record_to_invoice(record).unwrap_err();
        assert!(matches!(err, PortError::Transformation { .. }));
    }

    #[test]
    fn test_unknown_status_is_a_transformation_error() {
        let mut record = invoice_to_record(&sample_invoice()).unwrap();
        record.invoice.status = "archived".to_string();

        let err = record_to_invoice(record).unwrap_err();
        assert!(err.to_string().contains("archived"));
    }

    #[test]
    fn test_payer_columns_collapse_to_none() {
        let row = PaymentRow {
            payment_id: Uuid::new_v4(),
            invoice_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            amount: dec!(50),
            currency: "EUR".to_string(),
            method: "bank_transfer".to_string(),
            gateway: "manual".to_string(),
            status: "completed".to_string(),
            paid_at: Utc::now(),
            reference: None,
            payer_name: None,
            payer_email: None,
            created_at: Utc::now(),
        };
        let payment = row_to_payment(row.clone()).unwrap();
        assert!(payment.payer.is_none());
        assert_eq!(payment.amount.currency(), Currency::EUR);

        let with_email = PaymentRow {
            payer_email: Some("ap@acme.test".to_string()),
            ..row
        };
        let payer = row_to_payment(with_email).unwrap().payer.unwrap();
        assert_eq!(payer.name, None);
        assert_eq!(payer.email.as_deref(), Some("ap@acme.test"));
    }

    #[test]
    fn test_query_to_filter() {
        let client_id = ClientId::new();
        let query = InvoiceQuery::by_client(client_id)
            .with_statuses(vec![InvoiceStatus::Sent, InvoiceStatus::Overdue])
            .limit(20);

        let filter = query_to_filter(&query);
        assert_eq!(filter.client_id, Some(Uuid::from(client_id)));
        assert_eq!(filter.statuses, Some(vec!["sent".to_string(), "overdue".to_string()]));
        assert_eq!(filter.limit, Some(20));
        assert_eq!(filter.issued_from, None);
    }

    #[test]
    fn test_error_translation() {
        assert!(db_to_port_error(DatabaseError::not_found("Invoice", "inv_1")).is_not_found());
        assert!(db_to_port_error(DatabaseError::DuplicateEntry("invoices_number_key".into())).is_conflict());
        assert!(db_to_port_error(DatabaseError::Conflict("exceeds balance".into())).is_conflict());
        assert!(db_to_port_error(DatabaseError::PoolExhausted).is_transient());

        let err = db_to_port_error(DatabaseError::InvalidInput {
            field: "amount",
            message: "currency mismatch".into(),
        });
        assert!(matches!(err, PortError::Validation { field: Some(ref f), .. } if f == "amount"));
    }

    #[test]
    fn test_negative_counter_is_rejected() {
        assert!(to_u32(-1, "invoice_counter").is_err());
        assert_eq!(to_u32(7, "invoice_counter").unwrap(), 7);
    }
}
