//! Invoicing repository
//!
//! Row-level access to the users, clients, invoices, invoice_items, payments
//! and recurring_invoices tables. Rows use database-native types only
//! (UUIDs, TEXT enums, NUMERIC amounts); conversion to domain types happens
//! in the adapter.
//!
//! Every read and write that targets a tenant's record filters on `user_id`,
//! so a record owned by another user is indistinguishable from a missing one.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::types::JsonValue;
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DatabaseError;

const USER_COLUMNS: &str =
    "user_id, email, name, business_name, currency, invoice_counter, timezone, created_at";

const CLIENT_COLUMNS: &str = "client_id, user_id, name, email, company, address, created_at, updated_at";

const INVOICE_COLUMNS: &str = "invoice_id, user_id, client_id, invoice_number, status, issue_date, due_date, \
     currency, tax_rate, subtotal, tax, total, notes, terms, reminder_count, sent_at, \
     recurring_id, recurring_cycle, created_at, updated_at";

const ITEM_COLUMNS: &str = "item_id, invoice_id, position, description, quantity, rate, amount";

const PAYMENT_COLUMNS: &str = "payment_id, invoice_id, user_id, amount, currency, method, gateway, status, \
     paid_at, reference, payer_name, payer_email, created_at";

const RECURRING_COLUMNS: &str = "recurring_id, user_id, client_id, frequency, start_date, anchor_date, \
     anchor_cycle, next_date, cycles_generated, active, template, created_at, updated_at";

/// Unique index guarding one invoice per template cycle
const RECURRING_CYCLE_KEY: &str = "invoices_recurring_cycle_key";

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub business_name: Option<String>,
    pub currency: String,
    pub invoice_counter: i32,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ClientRow {
    pub client_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Invoice header row
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct InvoiceRow {
    pub invoice_id: Uuid,
    pub user_id: Uuid,
    pub client_id: Uuid,
    pub invoice_number: String,
    pub status: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub currency: String,
    pub tax_rate: Decimal,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub reminder_count: i32,
    pub sent_at: Option<DateTime<Utc>>,
    pub recurring_id: Option<Uuid>,
    pub recurring_cycle: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct InvoiceItemRow {
    pub item_id: Uuid,
    pub invoice_id: Uuid,
    /// Zero-based order on the invoice
    pub position: i32,
    pub description: String,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub amount: Decimal,
}

/// An invoice header with its items in position order
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceRecord {
    pub invoice: InvoiceRow,
    pub items: Vec<InvoiceItemRow>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PaymentRow {
    pub payment_id: Uuid,
    pub invoice_id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub method: String,
    pub gateway: String,
    pub status: String,
    pub paid_at: DateTime<Utc>,
    pub reference: Option<String>,
    pub payer_name: Option<String>,
    pub payer_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct RecurringRow {
    pub recurring_id: Uuid,
    pub user_id: Uuid,
    pub client_id: Uuid,
    pub frequency: String,
    pub start_date: NaiveDate,
    pub anchor_date: NaiveDate,
    pub anchor_cycle: i32,
    pub next_date: NaiveDate,
    pub cycles_generated: i32,
    pub active: bool,
    /// Line items, tax rate and terms as JSON
    pub template: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Invoice list filter in column terms
///
/// `None` disables the corresponding condition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceFilter {
    pub client_id: Option<Uuid>,
    pub statuses: Option<Vec<String>>,
    pub issued_from: Option<NaiveDate>,
    pub issued_to: Option<NaiveDate>,
    pub limit: Option<i64>,
}

/// Repository for the invoicing tables
#[derive(Debug, Clone)]
pub struct InvoicingRepository {
    pool: PgPool,
}

impl InvoicingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub async fn get_user(&self, user_id: Uuid) -> Result<UserRow, DatabaseError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("User", user_id))
    }

    pub async fn list_users(&self) -> Result<Vec<UserRow>, DatabaseError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at, user_id");
        Ok(sqlx::query_as::<_, UserRow>(&sql).fetch_all(&self.pool).await?)
    }

    pub async fn insert_user(&self, row: &UserRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, email, name, business_name, currency, invoice_counter, timezone, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(row.user_id)
        .bind(&row.email)
        .bind(&row.name)
        .bind(&row.business_name)
        .bind(&row.currency)
        .bind(row.invoice_counter)
        .bind(&row.timezone)
        .bind(row.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::DuplicateEntry(_) => DatabaseError::Conflict(format!("User {} already exists", row.email)),
            other => other,
        })?;
        Ok(())
    }

    /// Invoice numbers the user has stored, for counter repair
    pub async fn invoice_numbers(&self, user_id: Uuid) -> Result<Vec<String>, DatabaseError> {
        Ok(
            sqlx::query_scalar::<_, String>("SELECT invoice_number FROM invoices WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    /// Increments the user's counter in one statement and returns the new value
    ///
    /// The counter is first raised to `floor` when it lags behind it. The row
    /// lock taken by `UPDATE` serializes concurrent callers.
    pub async fn next_invoice_sequence(&self, user_id: Uuid, floor: i32) -> Result<i32, DatabaseError> {
        let sequence = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE users
            SET invoice_counter = GREATEST(invoice_counter, $2) + 1
            WHERE user_id = $1
            RETURNING invoice_counter
            "#,
        )
        .bind(user_id)
        .bind(floor)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("User", user_id))?;

        debug!(sequence, "Reserved invoice sequence");
        Ok(sequence)
    }

    // ------------------------------------------------------------------
    // Clients
    // ------------------------------------------------------------------

    pub async fn get_client(&self, user_id: Uuid, client_id: Uuid) -> Result<ClientRow, DatabaseError> {
        let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE client_id = $1 AND user_id = $2");
        sqlx::query_as::<_, ClientRow>(&sql)
            .bind(client_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Client", client_id))
    }

    pub async fn list_clients(&self, user_id: Uuid) -> Result<Vec<ClientRow>, DatabaseError> {
        let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE user_id = $1 ORDER BY lower(name), client_id");
        Ok(sqlx::query_as::<_, ClientRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn insert_client(&self, row: &ClientRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO clients (client_id, user_id, name, email, company, address, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(row.client_id)
        .bind(row.user_id)
        .bind(&row.name)
        .bind(&row.email)
        .bind(&row.company)
        .bind(&row.address)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::ForeignKeyViolation(_) => DatabaseError::not_found("User", row.user_id),
            other => other,
        })?;
        Ok(())
    }

    pub async fn update_client(&self, row: &ClientRow) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE clients
            SET name = $3, email = $4, company = $5, address = $6, updated_at = $7
            WHERE client_id = $1 AND user_id = $2
            "#,
        )
        .bind(row.client_id)
        .bind(row.user_id)
        .bind(&row.name)
        .bind(&row.email)
        .bind(&row.company)
        .bind(&row.address)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Client", row.client_id));
        }
        Ok(())
    }

    /// Deletes a client that has no invoices; its recurring templates go with it
    pub async fn delete_client(&self, user_id: Uuid, client_id: Uuid) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, Uuid>("SELECT client_id FROM clients WHERE client_id = $1 AND user_id = $2 FOR UPDATE")
            .bind(client_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Client", client_id))?;

        let invoice_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM invoices WHERE client_id = $1")
            .bind(client_id)
            .fetch_one(&mut *tx)
            .await?;
        if invoice_count > 0 {
            return Err(DatabaseError::Conflict(format!(
                "Client has {} invoice(s) and cannot be deleted",
                invoice_count
            )));
        }

        sqlx::query("DELETE FROM clients WHERE client_id = $1")
            .bind(client_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Invoices
    // ------------------------------------------------------------------

    pub async fn get_invoice(&self, user_id: Uuid, invoice_id: Uuid) -> Result<InvoiceRecord, DatabaseError> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE invoice_id = $1 AND user_id = $2");
        let invoice = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(invoice_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Invoice", invoice_id))?;

        let mut records = self.with_items(vec![invoice]).await?;
        records.pop().ok_or_else(|| DatabaseError::not_found("Invoice", invoice_id))
    }

    /// Invoices matching `filter`, newest issue date first
    pub async fn find_invoices(&self, user_id: Uuid, filter: &InvoiceFilter) -> Result<Vec<InvoiceRecord>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE user_id = $1
              AND ($2::uuid IS NULL OR client_id = $2)
              AND ($3::text[] IS NULL OR status = ANY($3))
              AND ($4::date IS NULL OR issue_date >= $4)
              AND ($5::date IS NULL OR issue_date <= $5)
            ORDER BY issue_date DESC, created_at DESC, invoice_id DESC
            LIMIT $6
            "#
        );
        let invoices = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(user_id)
            .bind(filter.client_id)
            .bind(&filter.statuses)
            .bind(filter.issued_from)
            .bind(filter.issued_to)
            .bind(filter.limit)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = invoices.len(), "Found invoices");
        self.with_items(invoices).await
    }

    pub async fn find_by_recurring_source(
        &self,
        user_id: Uuid,
        recurring_id: Uuid,
        cycle: i32,
    ) -> Result<Option<InvoiceRecord>, DatabaseError> {
        let sql = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE user_id = $1 AND recurring_id = $2 AND recurring_cycle = $3"
        );
        let invoice = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(user_id)
            .bind(recurring_id)
            .bind(cycle)
            .fetch_optional(&self.pool)
            .await?;

        match invoice {
            Some(invoice) => Ok(self.with_items(vec![invoice]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Inserts the header and its items in one transaction
    pub async fn insert_invoice(&self, record: &InvoiceRecord) -> Result<(), DatabaseError> {
        let row = &record.invoice;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO invoices (
                invoice_id, user_id, client_id, invoice_number, status, issue_date, due_date,
                currency, tax_rate, subtotal, tax, total, notes, terms, reminder_count, sent_at,
                recurring_id, recurring_cycle, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            "#,
        )
        .bind(row.invoice_id)
        .bind(row.user_id)
        .bind(row.client_id)
        .bind(&row.invoice_number)
        .bind(&row.status)
        .bind(row.issue_date)
        .bind(row.due_date)
        .bind(&row.currency)
        .bind(row.tax_rate)
        .bind(row.subtotal)
        .bind(row.tax)
        .bind(row.total)
        .bind(&row.notes)
        .bind(&row.terms)
        .bind(row.reminder_count)
        .bind(row.sent_at)
        .bind(row.recurring_id)
        .bind(row.recurring_cycle)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| invoice_conflict(e, row))?;

        insert_items(&mut *tx, &record.items).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Saves the header and replaces the items wholesale
    pub async fn update_invoice(&self, record: &InvoiceRecord) -> Result<(), DatabaseError> {
        let row = &record.invoice;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET client_id = $3, invoice_number = $4, status = $5, issue_date = $6, due_date = $7,
                currency = $8, tax_rate = $9, subtotal = $10, tax = $11, total = $12, notes = $13,
                terms = $14, reminder_count = $15, sent_at = $16, recurring_id = $17,
                recurring_cycle = $18, updated_at = $19
            WHERE invoice_id = $1 AND user_id = $2
            "#,
        )
        .bind(row.invoice_id)
        .bind(row.user_id)
        .bind(row.client_id)
        .bind(&row.invoice_number)
        .bind(&row.status)
        .bind(row.issue_date)
        .bind(row.due_date)
        .bind(&row.currency)
        .bind(row.tax_rate)
        .bind(row.subtotal)
        .bind(row.tax)
        .bind(row.total)
        .bind(&row.notes)
        .bind(&row.terms)
        .bind(row.reminder_count)
        .bind(row.sent_at)
        .bind(row.recurring_id)
        .bind(row.recurring_cycle)
        .bind(row.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| invoice_conflict(e, row))?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Invoice", row.invoice_id));
        }

        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
            .bind(row.invoice_id)
            .execute(&mut *tx)
            .await?;
        insert_items(&mut *tx, &record.items).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Deletes an invoice without payments; items cascade
    pub async fn delete_invoice(&self, user_id: Uuid, invoice_id: Uuid) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        lock_invoice(&mut *tx, user_id, invoice_id).await?;

        let has_payments =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM payments WHERE invoice_id = $1)")
                .bind(invoice_id)
                .fetch_one(&mut *tx)
                .await?;
        if has_payments {
            return Err(DatabaseError::Conflict("Invoice still has payments".to_string()));
        }

        sqlx::query("DELETE FROM invoices WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Flips the user's sent invoices due before `today` to overdue
    pub async fn mark_overdue(&self, user_id: Uuid, today: NaiveDate, now: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'overdue', updated_at = $3
            WHERE user_id = $1 AND status = 'sent' AND due_date < $2
            "#,
        )
        .bind(user_id)
        .bind(today)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Attaches items to each header, preserving header order
    async fn with_items(&self, invoices: Vec<InvoiceRow>) -> Result<Vec<InvoiceRecord>, DatabaseError> {
        if invoices.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = invoices.iter().map(|inv| inv.invoice_id).collect();
        let sql = format!("SELECT {ITEM_COLUMNS} FROM invoice_items WHERE invoice_id = ANY($1) ORDER BY invoice_id, position");
        let rows = sqlx::query_as::<_, InvoiceItemRow>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        let mut items: HashMap<Uuid, Vec<InvoiceItemRow>> = HashMap::new();
        for row in rows {
            items.entry(row.invoice_id).or_default().push(row);
        }

        Ok(invoices
            .into_iter()
            .map(|invoice| InvoiceRecord {
                items: items.remove(&invoice.invoice_id).unwrap_or_default(),
                invoice,
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Payments
    // ------------------------------------------------------------------

    pub async fn list_payments(&self, user_id: Uuid, invoice_id: Uuid) -> Result<Vec<PaymentRow>, DatabaseError> {
        self.ensure_invoice(user_id, invoice_id).await?;
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE invoice_id = $1 ORDER BY paid_at, created_at");
        Ok(sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(invoice_id)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn list_user_payments(&self, user_id: Uuid) -> Result<Vec<PaymentRow>, DatabaseError> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE user_id = $1 ORDER BY paid_at, created_at");
        Ok(sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Inserts a payment unless it would push completed payments past the total
    ///
    /// The invoice row is locked `FOR UPDATE` for the duration of the check,
    /// so two concurrent payments cannot both pass it. Returns the completed
    /// sum including the new payment.
    pub async fn insert_payment_guarded(&self, row: &PaymentRow) -> Result<Decimal, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let (total, currency) = sqlx::query_as::<_, (Decimal, String)>(
            "SELECT total, currency FROM invoices WHERE invoice_id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(row.invoice_id)
        .bind(row.user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Invoice", row.invoice_id))?;

        if currency != row.currency {
            return Err(DatabaseError::InvalidInput {
                field: "amount",
                message: format!(
                    "Payment currency {} does not match invoice currency {}",
                    row.currency, currency
                ),
            });
        }

        let paid = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE invoice_id = $1 AND status = 'completed'",
        )
        .bind(row.invoice_id)
        .fetch_one(&mut *tx)
        .await?;

        let total_paid = paid + row.amount;
        if total_paid > total {
            return Err(DatabaseError::Conflict(format!(
                "Payment of {} {} exceeds remaining balance of {} {}",
                row.amount,
                currency,
                total - paid,
                currency
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO payments (
                payment_id, invoice_id, user_id, amount, currency, method, gateway, status,
                paid_at, reference, payer_name, payer_email, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(row.payment_id)
        .bind(row.invoice_id)
        .bind(row.user_id)
        .bind(row.amount)
        .bind(&row.currency)
        .bind(&row.method)
        .bind(&row.gateway)
        .bind(&row.status)
        .bind(row.paid_at)
        .bind(&row.reference)
        .bind(&row.payer_name)
        .bind(&row.payer_email)
        .bind(row.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(%total_paid, "Payment stored");
        Ok(total_paid)
    }

    pub async fn delete_payments(&self, user_id: Uuid, invoice_id: Uuid) -> Result<u64, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        lock_invoice(&mut *tx, user_id, invoice_id).await?;

        let result = sqlx::query("DELETE FROM payments WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn ensure_invoice(&self, user_id: Uuid, invoice_id: Uuid) -> Result<(), DatabaseError> {
        sqlx::query_scalar::<_, Uuid>("SELECT invoice_id FROM invoices WHERE invoice_id = $1 AND user_id = $2")
            .bind(invoice_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(|_| ())
            .ok_or_else(|| DatabaseError::not_found("Invoice", invoice_id))
    }

    // ------------------------------------------------------------------
    // Recurring templates
    // ------------------------------------------------------------------

    pub async fn get_recurring(&self, user_id: Uuid, recurring_id: Uuid) -> Result<RecurringRow, DatabaseError> {
        let sql = format!("SELECT {RECURRING_COLUMNS} FROM recurring_invoices WHERE recurring_id = $1 AND user_id = $2");
        sqlx::query_as::<_, RecurringRow>(&sql)
            .bind(recurring_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("RecurringInvoice", recurring_id))
    }

    pub async fn list_recurring(&self, user_id: Uuid) -> Result<Vec<RecurringRow>, DatabaseError> {
        let sql = format!(
            "SELECT {RECURRING_COLUMNS} FROM recurring_invoices WHERE user_id = $1 ORDER BY next_date, created_at"
        );
        Ok(sqlx::query_as::<_, RecurringRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Active templates of every user due on or before `today`
    pub async fn list_due_recurring(&self, today: NaiveDate) -> Result<Vec<RecurringRow>, DatabaseError> {
        let sql = format!(
            "SELECT {RECURRING_COLUMNS} FROM recurring_invoices WHERE active AND next_date <= $1 ORDER BY next_date, created_at"
        );
        Ok(sqlx::query_as::<_, RecurringRow>(&sql)
            .bind(today)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Inserts a template for a client the same user owns
    pub async fn insert_recurring(&self, row: &RecurringRow) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            INSERT INTO recurring_invoices (
                recurring_id, user_id, client_id, frequency, start_date, anchor_date, anchor_cycle,
                next_date, cycles_generated, active, template, created_at, updated_at
            )
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13
            WHERE EXISTS (SELECT 1 FROM clients WHERE client_id = $3 AND user_id = $2)
            "#,
        )
        .bind(row.recurring_id)
        .bind(row.user_id)
        .bind(row.client_id)
        .bind(&row.frequency)
        .bind(row.start_date)
        .bind(row.anchor_date)
        .bind(row.anchor_cycle)
        .bind(row.next_date)
        .bind(row.cycles_generated)
        .bind(row.active)
        .bind(&row.template)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Client", row.client_id));
        }
        Ok(())
    }

    pub async fn update_recurring(&self, row: &RecurringRow) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE recurring_invoices
            SET frequency = $3, start_date = $4, anchor_date = $5, anchor_cycle = $6, next_date = $7,
                cycles_generated = $8, active = $9, template = $10, updated_at = $11
            WHERE recurring_id = $1 AND user_id = $2
            "#,
        )
        .bind(row.recurring_id)
        .bind(row.user_id)
        .bind(&row.frequency)
        .bind(row.start_date)
        .bind(row.anchor_date)
        .bind(row.anchor_cycle)
        .bind(row.next_date)
        .bind(row.cycles_generated)
        .bind(row.active)
        .bind(&row.template)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("RecurringInvoice", row.recurring_id));
        }
        Ok(())
    }

    pub async fn delete_recurring(&self, user_id: Uuid, recurring_id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM recurring_invoices WHERE recurring_id = $1 AND user_id = $2")
            .bind(recurring_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("RecurringInvoice", recurring_id));
        }
        Ok(())
    }
}

async fn insert_items(conn: &mut PgConnection, items: &[InvoiceItemRow]) -> Result<(), DatabaseError> {
    for item in items {
        sqlx::query(
            r#"
            INSERT INTO invoice_items (item_id, invoice_id, position, description, quantity, rate, amount)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(item.item_id)
        .bind(item.invoice_id)
        .bind(item.position)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.rate)
        .bind(item.amount)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn lock_invoice(conn: &mut PgConnection, user_id: Uuid, invoice_id: Uuid) -> Result<(), DatabaseError> {
    sqlx::query_scalar::<_, Uuid>("SELECT invoice_id FROM invoices WHERE invoice_id = $1 AND user_id = $2 FOR UPDATE")
        .bind(invoice_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| DatabaseError::not_found("Invoice", invoice_id))
}

/// Names the unique constraint an invoice write tripped over
fn invoice_conflict(error: sqlx::Error, row: &InvoiceRow) -> DatabaseError {
    match DatabaseError::from(error) {
        DatabaseError::DuplicateEntry(constraint) if constraint == RECURRING_CYCLE_KEY => {
            DatabaseError::Conflict("Recurring cycle already materialized".to_string())
        }
        DatabaseError::DuplicateEntry(_) => {
            DatabaseError::Conflict(format!("Invoice number {} is already taken", row.invoice_number))
        }
        other => other,
    }
}
