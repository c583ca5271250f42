//! Invoice aggregate and lifecycle rules
//!
//! An invoice owns its line items and stores its computed totals. Status only
//! changes through explicit actions:
//!
//! ```text
//!   draft ──send──▶ sent ──payment──▶ paid
//!     │              │  └──sweep──▶ overdue ──payment──▶ paid
//!     └──cancel──────┴──cancel──▶ cancelled
//! ```
//!
//! `paid` and `cancelled` are terminal: items, tax rate and status are frozen.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{ClientId, Currency, InvoiceId, InvoiceItemId, Money, Rate, RecurringInvoiceId, UserId};

use crate::error::InvoicingError;

/// Invoice status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Being prepared, not visible to the client
    Draft,
    /// Delivered to the client and awaiting payment
    Sent,
    /// Fully paid
    Paid,
    /// Sent and past its due date
    Overdue,
    /// Voided
    Cancelled,
}

impl InvoiceStatus {
    /// Every status, in lifecycle order
    pub const ALL: [InvoiceStatus; 5] = [
        InvoiceStatus::Draft,
        InvoiceStatus::Sent,
        InvoiceStatus::Paid,
        InvoiceStatus::Overdue,
        InvoiceStatus::Cancelled,
    ];

    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    /// True for statuses that permit no further mutation
    pub fn is_terminal(&self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }

    /// True while the client owes money (sent or overdue)
    pub fn is_outstanding(&self) -> bool {
        matches!(self, InvoiceStatus::Sent | InvoiceStatus::Overdue)
    }

    /// Whether the lifecycle allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self, next),
            (Draft, Sent)
                | (Draft, Cancelled)
                | (Sent, Paid)
                | (Sent, Overdue)
                | (Sent, Cancelled)
                | (Overdue, Paid)
        )
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = InvoicingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InvoiceStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| InvoicingError::validation_field(format!("Unknown invoice status '{}'", s), "status"))
    }
}

/// A line item as entered by the owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemInput {
    pub description: String,
    pub quantity: Decimal,
    pub rate: Decimal,
}

impl LineItemInput {
    pub fn new(description: impl Into<String>, quantity: Decimal, rate: Decimal) -> Self {
        Self {
            description: description.into(),
            quantity,
            rate,
        }
    }

    fn validate(&self, index: usize) -> Result<(), InvoicingError> {
        if self.description.trim().is_empty() {
            return Err(InvoicingError::validation_field(
                format!("Item {} needs a description", index + 1),
                "items.description",
            ));
        }
        if self.quantity < Decimal::ZERO {
            return Err(InvoicingError::validation_field(
                format!("Item {} has a negative quantity", index + 1),
                "items.quantity",
            ));
        }
        if self.rate < Decimal::ZERO {
            return Err(InvoicingError::validation_field(
                format!("Item {} has a negative rate", index + 1),
                "items.rate",
            ));
        }
        Ok(())
    }
}

/// A stored line item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: InvoiceItemId,
    pub description: String,
    pub quantity: Decimal,
    /// Unit rate
    pub rate: Money,
    /// quantity × rate, rounded to the currency
    pub amount: Money,
}

impl InvoiceItem {
    /// Prices an entered line item in `currency`
    pub fn from_input(input: &LineItemInput, currency: Currency) -> Self {
        let rate = Money::new(input.rate, currency);
        Self {
            id: InvoiceItemId::new_v7(),
            description: input.description.trim().to_string(),
            quantity: input.quantity,
            rate,
            amount: rate.multiply(input.quantity).round_to_currency(),
        }
    }

    /// The entered form of this item, used when copying invoices
    pub fn to_input(&self) -> LineItemInput {
        LineItemInput::new(self.description.clone(), self.quantity, self.rate.amount())
    }
}

/// Computed totals of an invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
}

impl InvoiceTotals {
    /// subtotal = Σ amount, tax = subtotal × tax_rate / 100, total = subtotal + tax
    ///
    /// # Arguments
    ///
    /// * `items` - Priced line items
    /// * `tax_rate` - Tax rate in percent (0 to 100)
    /// * `currency` - Invoice currency
    pub fn compute(items: &[InvoiceItem], tax_rate: Decimal, currency: Currency) -> Result<Self, InvoicingError> {
        let subtotal = Money::sum(items.iter().map(|item| &item.amount), currency)?;
        let tax = Rate::from_percentage(tax_rate).apply(&subtotal).round_to_currency();
        let total = subtotal.checked_add(&tax)?;
        Ok(Self { subtotal, tax, total })
    }
}

/// Links a materialized invoice to the recurring cycle that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecurringSource {
    pub template_id: RecurringInvoiceId,
    /// Zero-based cycle index
    pub cycle: u32,
}

/// Everything needed to create an invoice except its number
#[derive(Debug, Clone)]
pub struct InvoiceDraft {
    pub user_id: UserId,
    pub client_id: ClientId,
    pub currency: Currency,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub tax_rate: Decimal,
    pub items: Vec<LineItemInput>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub recurring_source: Option<RecurringSource>,
}

impl InvoiceDraft {
    /// Checks the draft before a number is reserved for it
    pub fn validate(&self) -> Result<(), InvoicingError> {
        validate_items(&self.items)?;
        validate_tax_rate(self.tax_rate)?;
        validate_dates(self.issue_date, self.due_date)
    }
}

pub(crate) fn validate_items(items: &[LineItemInput]) -> Result<(), InvoicingError> {
    if items.is_empty() {
        return Err(InvoicingError::validation_field("An invoice needs at least one item", "items"));
    }
    items
        .iter()
        .enumerate()
        .try_for_each(|(index, item)| item.validate(index))
}

pub(crate) fn validate_tax_rate(tax_rate: Decimal) -> Result<(), InvoicingError> {
    if tax_rate < Decimal::ZERO || tax_rate > dec!(100) {
        return Err(InvoicingError::validation_field(
            format!("Tax rate {} must be between 0 and 100", tax_rate),
            "tax_rate",
        ));
    }
    Ok(())
}

fn validate_dates(issue_date: NaiveDate, due_date: NaiveDate) -> Result<(), InvoicingError> {
    if due_date < issue_date {
        return Err(InvoicingError::validation_field(
            "Due date cannot be before the issue date",
            "due_date",
        ));
    }
    Ok(())
}

/// An invoice issued by a user to one of their clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub user_id: UserId,
    pub client_id: ClientId,
    /// Human-readable number, unique per user
    pub number: String,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub currency: Currency,
    pub items: Vec<InvoiceItem>,
    /// Tax rate in percent
    pub tax_rate: Decimal,
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub reminder_count: u32,
    pub sent_at: Option<DateTime<Utc>>,
    pub recurring_source: Option<RecurringSource>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Builds a draft invoice from a validated draft and a reserved number
    pub fn from_draft(draft: InvoiceDraft, number: String, now: DateTime<Utc>) -> Result<Self, InvoicingError> {
        draft.validate()?;

        let items: Vec<InvoiceItem> = draft
            .items
            .iter()
            .map(|input| InvoiceItem::from_input(input, draft.currency))
            .collect();
        let totals = InvoiceTotals::compute(&items, draft.tax_rate, draft.currency)?;

        Ok(Self {
            id: InvoiceId::new_v7(),
            user_id: draft.user_id,
            client_id: draft.client_id,
            number,
            status: InvoiceStatus::Draft,
            issue_date: draft.issue_date,
            due_date: draft.due_date,
            currency: draft.currency,
            items,
            tax_rate: draft.tax_rate,
            subtotal: totals.subtotal,
            tax: totals.tax,
            total: totals.total,
            notes: draft.notes,
            terms: draft.terms,
            reminder_count: 0,
            sent_at: None,
            recurring_source: draft.recurring_source,
            created_at: now,
            updated_at: now,
        })
    }

    /// Stored totals
    pub fn totals(&self) -> InvoiceTotals {
        InvoiceTotals {
            subtotal: self.subtotal,
            tax: self.tax,
            total: self.total,
        }
    }

    /// Line items in entered form
    pub fn line_inputs(&self) -> Vec<LineItemInput> {
        self.items.iter().map(InvoiceItem::to_input).collect()
    }

    /// Rejects edits once the invoice is paid or cancelled
    pub fn ensure_editable(&self) -> Result<(), InvoicingError> {
        if self.status.is_terminal() {
            return Err(InvoicingError::InvoiceLocked {
                number: self.number.clone(),
                status: self.status,
            });
        }
        Ok(())
    }

    /// Replaces all line items and recomputes totals
    pub fn replace_items(&mut self, items: &[LineItemInput], now: DateTime<Utc>) -> Result<(), InvoicingError> {
        self.ensure_editable()?;
        validate_items(items)?;
        self.items = items
            .iter()
            .map(|input| InvoiceItem::from_input(input, self.currency))
            .collect();
        self.recalculate(now)
    }

    /// Changes the tax rate and recomputes totals
    pub fn set_tax_rate(&mut self, tax_rate: Decimal, now: DateTime<Utc>) -> Result<(), InvoicingError> {
        self.ensure_editable()?;
        validate_tax_rate(tax_rate)?;
        self.tax_rate = tax_rate;
        self.recalculate(now)
    }

    /// Moves the issue and due dates together
    pub fn reschedule(&mut self, issue_date: NaiveDate, due_date: NaiveDate, now: DateTime<Utc>) -> Result<(), InvoicingError> {
        self.ensure_editable()?;
        validate_dates(issue_date, due_date)?;
        self.issue_date = issue_date;
        self.due_date = due_date;
        self.updated_at = now;
        Ok(())
    }

    fn recalculate(&mut self, now: DateTime<Utc>) -> Result<(), InvoicingError> {
        let totals = InvoiceTotals::compute(&self.items, self.tax_rate, self.currency)?;
        self.subtotal = totals.subtotal;
        self.tax = totals.tax;
        self.total = totals.total;
        self.updated_at = now;
        Ok(())
    }

    /// Applies a lifecycle transition
    pub fn transition_to(&mut self, next: InvoiceStatus, now: DateTime<Utc>) -> Result<(), InvoicingError> {
        if !self.status.can_transition_to(next) {
            return Err(InvoicingError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Marks the invoice as sent; re-sending a sent invoice is allowed
    pub fn mark_sent(&mut self, now: DateTime<Utc>) -> Result<(), InvoicingError> {
        match self.status {
            InvoiceStatus::Draft => self.transition_to(InvoiceStatus::Sent, now)?,
            InvoiceStatus::Sent => self.updated_at = now,
            status => {
                return Err(InvoicingError::ActionNotAllowed { action: "send", status });
            }
        }
        self.sent_at = Some(now);
        Ok(())
    }

    /// Counts a payment reminder; status is unchanged
    pub fn record_reminder(&mut self, now: DateTime<Utc>) -> Result<(), InvoicingError> {
        if !self.status.is_outstanding() {
            return Err(InvoicingError::ActionNotAllowed {
                action: "send a reminder for",
                status: self.status,
            });
        }
        self.reminder_count += 1;
        self.updated_at = now;
        Ok(())
    }

    /// Voids a draft or sent invoice
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), InvoicingError> {
        self.transition_to(InvoiceStatus::Cancelled, now)
    }

    /// True when a sent invoice's due date is before `today`
    pub fn is_past_due(&self, today: NaiveDate) -> bool {
        self.status == InvoiceStatus::Sent && self.due_date < today
    }

    /// Flips a past-due sent invoice to overdue; returns whether it changed
    pub fn mark_overdue_if_due(&mut self, today: NaiveDate, now: DateTime<Utc>) -> bool {
        if !self.is_past_due(today) {
            return false;
        }
        self.status = InvoiceStatus::Overdue;
        self.updated_at = now;
        true
    }
}
