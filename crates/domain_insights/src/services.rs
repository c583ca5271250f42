//! Insights service
//!
//! Loads the owner's history through [`InvoicingPort`] and hands it to the
//! pure scorers. Nothing is written back.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use tracing::{debug, instrument};

use core_kernel::{ClientId, Clock, InvoiceId, UserId};
use domain_invoicing::{InvoiceQuery, InvoiceStatus, InvoicingPort, Payment, User};

use crate::duplicates::{detect_duplicates, DuplicateCandidate, DuplicateCheck};
use crate::error::InsightsError;
use crate::prediction::{predict_payment_date, PaymentHistoryEntry, PaymentPrediction};
use crate::scoring::{DUPLICATE_WINDOW_DAYS, FALLBACK_INVOICE_LIMIT, PREDICTION_HISTORY_LIMIT};
use crate::suggestions::{suggest_line_items, HistoricalItem, LineItemSuggestion, SuggestionSource};

/// Read-only heuristics over a user's invoices and payments
#[derive(Clone)]
pub struct InsightsService {
    port: Arc<dyn InvoicingPort>,
    clock: Arc<dyn Clock>,
}

impl InsightsService {
    pub fn new(port: Arc<dyn InvoicingPort>, clock: Arc<dyn Clock>) -> Self {
        Self { port, clock }
    }

    /// Predicts when `client_id` will pay an invoice of `total` due on `due_date`
    #[instrument(skip(self))]
    pub async fn predict_payment_date(
        &self,
        user_id: UserId,
        client_id: ClientId,
        total: Decimal,
        due_date: NaiveDate,
    ) -> Result<PaymentPrediction, InsightsError> {
        if total.is_sign_negative() {
            return Err(InsightsError::validation("Invoice total cannot be negative"));
        }
        let user = self.port.get_user(user_id).await?;
        self.port.get_client(user_id, client_id).await?;

        let history = self.payment_history(&user, client_id).await?;
        let today = user.timezone.today(self.clock.as_ref());
        let prediction = predict_payment_date(&history, total, due_date, today)?;
        debug!(
            history = history.len(),
            predicted = %prediction.predicted_date,
            risk = %prediction.risk,
            "Payment date predicted"
        );
        Ok(prediction)
    }

    /// Suggests line items for a new invoice to `client_id`
    ///
    /// Falls back to the user's whole recent history when the client has
    /// never been invoiced.
    #[instrument(skip(self))]
    pub async fn suggest_line_items(
        &self,
        user_id: UserId,
        client_id: ClientId,
        filter: Option<&str>,
    ) -> Result<Vec<LineItemSuggestion>, InsightsError> {
        self.port.get_client(user_id, client_id).await?;

        let client_items = self.historical_items(user_id, &InvoiceQuery::by_client(client_id)).await?;
        let (items, source) = if client_items.is_empty() {
            let fallback = InvoiceQuery::all().limit(FALLBACK_INVOICE_LIMIT);
            (self.historical_items(user_id, &fallback).await?, SuggestionSource::AllClients)
        } else {
            (client_items, SuggestionSource::Client)
        };

        let suggestions = suggest_line_items(&items, filter, source);
        debug!(count = suggestions.len(), ?source, "Line items suggested");
        Ok(suggestions)
    }

    /// Checks whether `candidate` looks like an invoice that already exists
    #[instrument(skip(self, candidate), fields(client_id = %candidate.client_id))]
    pub async fn detect_duplicate(
        &self,
        user_id: UserId,
        candidate: &DuplicateCandidate,
    ) -> Result<DuplicateCheck, InsightsError> {
        if candidate.total.is_sign_negative() {
            return Err(InsightsError::validation("Invoice total cannot be negative"));
        }
        self.port.get_client(user_id, candidate.client_id).await?;

        let window = Days::new(DUPLICATE_WINDOW_DAYS as u64);
        let (from, to) = candidate
            .issue_date
            .checked_sub_days(window)
            .zip(candidate.issue_date.checked_add_days(window))
            .ok_or_else(|| InsightsError::validation("Issue date is out of range"))?;
        let query = InvoiceQuery::by_client(candidate.client_id).issued_between(from, to);
        let existing = self.port.find_invoices(user_id, &query).await?;

        let check = detect_duplicates(candidate, &existing);
        debug!(
            compared = existing.len(),
            similar = check.similar.len(),
            is_duplicate = check.is_duplicate,
            "Duplicate check finished"
        );
        Ok(check)
    }

    /// The client's paid invoices with their first payment date, most recent first
    async fn payment_history(
        &self,
        user: &User,
        client_id: ClientId,
    ) -> Result<Vec<PaymentHistoryEntry>, InsightsError> {
        let query = InvoiceQuery::by_client(client_id).with_statuses([InvoiceStatus::Paid]);
        let invoices = self.port.find_invoices(user.id, &query).await?;
        let payments = self.port.list_user_payments(user.id).await?;
        let first_payments = first_payment_dates(user, &payments);

        Ok(invoices
            .iter()
            .filter_map(|invoice| {
                first_payments.get(&invoice.id).map(|paid_on| PaymentHistoryEntry {
                    invoice_id: invoice.id,
                    issue_date: invoice.issue_date,
                    first_payment_date: *paid_on,
                    total: invoice.total.amount(),
                })
            })
            .take(PREDICTION_HISTORY_LIMIT)
            .collect())
    }

    async fn historical_items(
        &self,
        user_id: UserId,
        query: &InvoiceQuery,
    ) -> Result<Vec<HistoricalItem>, InsightsError> {
        let invoices = self.port.find_invoices(user_id, query).await?;
        Ok(invoices
            .iter()
            .filter(|invoice| invoice.status != InvoiceStatus::Cancelled)
            .flat_map(|invoice| invoice.items.iter())
            .map(|item| HistoricalItem::new(item.description.clone(), item.quantity, item.rate.amount()))
            .collect())
    }
}

/// Earliest completed payment per invoice, as a date in the owner's timezone
fn first_payment_dates(user: &User, payments: &[Payment]) -> HashMap<InvoiceId, NaiveDate> {
    let mut first: HashMap<InvoiceId, NaiveDate> = HashMap::new();
    for payment in payments.iter().filter(|p| p.is_completed()) {
        let paid_on = user.timezone.local_date(payment.paid_at);
        first
            .entry(payment.invoice_id)
            .and_modify(|date| *date = (*date).min(paid_on))
            .or_insert(paid_on);
    }
    first
}
