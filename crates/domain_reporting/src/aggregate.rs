//! Report aggregation
//!
//! Group-by and sum transformations over a user's invoices and payments.
//! Every function is pure; "today" and the owner's timezone are passed in.
//! Only completed payments count as revenue.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use core_kernel::{ClientId, Currency, InvoiceId, MonthKey, Timezone};
use domain_invoicing::{Client, Invoice, InvoiceStatus, Payment, PaymentMethod};

use crate::error::ReportingError;

/// Default number of months in the revenue series
pub const DEFAULT_WINDOW_MONTHS: u32 = 12;

/// Longest revenue series a report may ask for
pub const MAX_WINDOW_MONTHS: u32 = 36;

/// Clients listed in the per-client ranking
pub const TOP_CLIENT_LIMIT: usize = 10;

/// Trailing window of calendar months ending with the current month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportWindow {
    pub months: u32,
}

impl ReportWindow {
    pub fn new(months: u32) -> Result<Self, ReportingError> {
        if months == 0 || months > MAX_WINDOW_MONTHS {
            return Err(ReportingError::InvalidWindow(format!(
                "months must be between 1 and {}, got {}",
                MAX_WINDOW_MONTHS, months
            )));
        }
        Ok(Self { months })
    }

    /// Month keys of the window, oldest first
    pub fn months_ending(&self, today: NaiveDate) -> Vec<MonthKey> {
        MonthKey::of(today).trailing(self.months)
    }
}

impl Default for ReportWindow {
    fn default() -> Self {
        Self {
            months: DEFAULT_WINDOW_MONTHS,
        }
    }
}

/// Revenue received in one calendar month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyRevenue {
    /// `YYYY-MM`
    pub month: String,
    pub revenue: Decimal,
    pub payment_count: u32,
}

/// Revenue received from one client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRevenue {
    pub client_id: ClientId,
    pub client_name: String,
    pub revenue: Decimal,
    pub payment_count: u32,
}

/// Invoices in one status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub status: InvoiceStatus,
    pub count: u32,
    pub total: Decimal,
}

/// Revenue received through one payment method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSummary {
    pub method: PaymentMethod,
    pub count: u32,
    pub total: Decimal,
}

/// Headline figures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportTotals {
    /// Totals of every invoice that is neither draft nor cancelled
    pub total_invoiced: Decimal,
    /// Sum of completed payments
    pub total_payments: Decimal,
    /// Balance due across sent and overdue invoices
    pub outstanding: Decimal,
    /// Payments as a percentage of invoiced, two decimal places
    pub collection_rate: Decimal,
}

/// Everything the reports page shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportBundle {
    pub currency: Currency,
    pub generated_on: NaiveDate,
    pub window: ReportWindow,
    pub monthly_revenue: Vec<MonthlyRevenue>,
    pub top_clients: Vec<ClientRevenue>,
    pub status_breakdown: Vec<StatusSummary>,
    pub method_breakdown: Vec<MethodSummary>,
    pub average_days_to_pay: i64,
    pub totals: ReportTotals,
}

fn completed(payments: &[Payment]) -> impl Iterator<Item = &Payment> {
    payments.iter().filter(|payment| payment.is_completed())
}

/// Revenue per month for the window ending with `today`'s month
///
/// Months without payments appear with zero revenue.
pub fn monthly_revenue(
    payments: &[Payment],
    timezone: &Timezone,
    window: ReportWindow,
    today: NaiveDate,
) -> Vec<MonthlyRevenue> {
    let months = window.months_ending(today);
    let mut buckets: HashMap<MonthKey, (Decimal, u32)> = months.iter().map(|m| (*m, (Decimal::ZERO, 0))).collect();

    for payment in completed(payments) {
        let month = MonthKey::of(timezone.local_date(payment.paid_at));
        if let Some((revenue, count)) = buckets.get_mut(&month) {
            *revenue += payment.amount.amount();
            *count += 1;
        }
    }

    months
        .into_iter()
        .map(|month| {
            let (revenue, payment_count) = buckets.get(&month).copied().unwrap_or_default();
            MonthlyRevenue {
                month: month.to_string(),
                revenue,
                payment_count,
            }
        })
        .collect()
}

/// Top clients by revenue received
///
/// Clients are ranked by revenue; equal revenue keeps the order in which the
/// client's first payment appears in `payments`. Payments on unknown
/// invoices are not attributed.
pub fn client_revenue(invoices: &[Invoice], payments: &[Payment], clients: &[Client]) -> Vec<ClientRevenue> {
    let owners: HashMap<InvoiceId, ClientId> = invoices.iter().map(|inv| (inv.id, inv.client_id)).collect();
    let names: HashMap<ClientId, &str> = clients.iter().map(|c| (c.id, c.name.as_str())).collect();

    let mut ranking: Vec<ClientRevenue> = Vec::new();
    let mut index: HashMap<ClientId, usize> = HashMap::new();

    for payment in completed(payments) {
        let Some(&client_id) = owners.get(&payment.invoice_id) else {
            continue;
        };
        let at = *index.entry(client_id).or_insert_with(|| {
            ranking.push(ClientRevenue {
                client_id,
                client_name: names.get(&client_id).map_or_else(|| "Unknown client".to_string(), |n| n.to_string()),
                revenue: Decimal::ZERO,
                payment_count: 0,
            });
            ranking.len() - 1
        });
        ranking[at].revenue += payment.amount.amount();
        ranking[at].payment_count += 1;
    }

    ranking.sort_by(|a, b| b.revenue.cmp(&a.revenue));
    ranking.truncate(TOP_CLIENT_LIMIT);
    ranking
}

/// Count and total per status, for all five statuses
pub fn status_breakdown(invoices: &[Invoice]) -> Vec<StatusSummary> {
    InvoiceStatus::ALL
        .iter()
        .map(|status| {
            let (count, total) = invoices
                .iter()
                .filter(|inv| inv.status == *status)
                .fold((0u32, Decimal::ZERO), |(count, total), inv| (count + 1, total + inv.total.amount()));
            StatusSummary {
                status: *status,
                count,
                total,
            }
        })
        .collect()
}

/// Count and revenue per payment method, for every method
pub fn method_breakdown(payments: &[Payment]) -> Vec<MethodSummary> {
    PaymentMethod::ALL
        .iter()
        .map(|method| {
            let (count, total) = completed(payments)
                .filter(|p| p.method == *method)
                .fold((0u32, Decimal::ZERO), |(count, total), p| (count + 1, total + p.amount.amount()));
            MethodSummary {
                method: *method,
                count,
                total,
            }
        })
        .collect()
}

/// Mean days from issue to first completed payment over paid invoices
///
/// Rounded to the nearest day; 0 when no paid invoice has a payment.
pub fn average_days_to_pay(invoices: &[Invoice], payments: &[Payment], timezone: &Timezone) -> i64 {
    let mut first_paid: HashMap<InvoiceId, NaiveDate> = HashMap::new();
    for payment in completed(payments) {
        let paid_on = timezone.local_date(payment.paid_at);
        first_paid
            .entry(payment.invoice_id)
            .and_modify(|date| *date = (*date).min(paid_on))
            .or_insert(paid_on);
    }

    let days: Vec<i64> = invoices
        .iter()
        .filter(|inv| inv.status == InvoiceStatus::Paid)
        .filter_map(|inv| first_paid.get(&inv.id).map(|paid_on| (*paid_on - inv.issue_date).num_days().max(0)))
        .collect();

    if days.is_empty() {
        return 0;
    }
    (days.iter().sum::<i64>() as f64 / days.len() as f64).round() as i64
}

/// Payments as a percentage of the amount invoiced
///
/// # Returns
///
/// `0` when nothing has been invoiced, otherwise the rate rounded to two
/// decimal places.
pub fn collection_rate(total_payments: Decimal, total_invoiced: Decimal) -> Decimal {
    if total_invoiced.is_zero() {
        return Decimal::ZERO;
    }
    (total_payments / total_invoiced * dec!(100)).round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

pub fn report_totals(invoices: &[Invoice], payments: &[Payment]) -> ReportTotals {
    let total_invoiced: Decimal = invoices
        .iter()
        .filter(|inv| !matches!(inv.status, InvoiceStatus::Draft | InvoiceStatus::Cancelled))
        .map(|inv| inv.total.amount())
        .sum();
    let total_payments: Decimal = completed(payments).map(|p| p.amount.amount()).sum();

    let mut paid_per_invoice: HashMap<InvoiceId, Decimal> = HashMap::new();
    for payment in completed(payments) {
        *paid_per_invoice.entry(payment.invoice_id).or_default() += payment.amount.amount();
    }
    let outstanding: Decimal = invoices
        .iter()
        .filter(|inv| inv.status.is_outstanding())
        .map(|inv| {
            let paid = paid_per_invoice.get(&inv.id).copied().unwrap_or_default();
            (inv.total.amount() - paid).max(Decimal::ZERO)
        })
        .sum();

    ReportTotals {
        total_invoiced,
        total_payments,
        outstanding,
        collection_rate: collection_rate(total_payments, total_invoiced),
    }
}

/// Builds the full bundle from already loaded records
pub fn build_report(
    currency: Currency,
    timezone: &Timezone,
    invoices: &[Invoice],
    payments: &[Payment],
    clients: &[Client],
    window: ReportWindow,
    today: NaiveDate,
) -> ReportBundle {
    ReportBundle {
        currency,
        generated_on: today,
        window,
        monthly_revenue: monthly_revenue(payments, timezone, window, today),
        top_clients: client_revenue(invoices, payments, clients),
        status_breakdown: status_breakdown(invoices),
        method_breakdown: method_breakdown(payments),
        average_days_to_pay: average_days_to_pay(invoices, payments, timezone),
        totals: report_totals(invoices, payments),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_bounds() {
        assert!(ReportWindow::new(0).is_err());
        assert!(ReportWindow::new(MAX_WINDOW_MONTHS + 1).is_err());
        assert_eq!(ReportWindow::new(6).unwrap().months, 6);
        assert_eq!(ReportWindow::default().months, 12);
    }

    #[test]
    fn test_window_crosses_year() {
        let today = NaiveDate::from_ymd_opt(2024, 2, 10).unwrap();
        let keys: Vec<String> = ReportWindow::new(3)
            .unwrap()
            .months_ending(today)
            .iter()
            .map(|m| m.to_string())
            .collect();
        assert_eq!(keys, vec!["2023-12", "2024-01", "2024-02"]);
    }

    #[test]
    fn test_collection_rate() {
        assert_eq!(collection_rate(dec!(500), dec!(0)), dec!(0));
        assert_eq!(collection_rate(dec!(1100), dec!(1100)), dec!(100));
        assert_eq!(collection_rate(dec!(1), dec!(3)), dec!(33.33));
    }
}
