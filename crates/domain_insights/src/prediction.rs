//! Payment-date prediction
//!
//! Estimates when a client will pay a new invoice from how quickly they paid
//! their previous ones. Recent invoices weigh more than old ones, and a
//! scattered history lowers the confidence.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::InvoiceId;

use crate::error::InsightsError;
use crate::scoring::*;

/// Payment risk levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentRisk {
    /// Expected on or before the due date
    Low,
    /// Expected up to two weeks late
    Medium,
    /// Expected more than two weeks late
    High,
}

impl PaymentRisk {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentRisk::Low => "low",
            PaymentRisk::Medium => "medium",
            PaymentRisk::High => "high",
        }
    }

    /// Classifies a predicted date against the due date
    pub fn classify(predicted: NaiveDate, due: NaiveDate) -> Self {
        let late_by = (predicted - due).num_days();
        if late_by <= 0 {
            PaymentRisk::Low
        } else if late_by <= MEDIUM_RISK_WINDOW_DAYS {
            PaymentRisk::Medium
        } else {
            PaymentRisk::High
        }
    }
}

impl std::fmt::Display for PaymentRisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One paid invoice of the client's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentHistoryEntry {
    pub invoice_id: InvoiceId,
    pub issue_date: NaiveDate,
    /// Date of the first completed payment
    pub first_payment_date: NaiveDate,
    pub total: Decimal,
}

impl PaymentHistoryEntry {
    /// Days between issue and first payment, never negative
    pub fn days_to_pay(&self) -> i64 {
        (self.first_payment_date - self.issue_date).num_days().max(0)
    }
}

/// Predicted payment date with its confidence and risk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPrediction {
    pub predicted_date: NaiveDate,
    /// 0-95
    pub confidence: u8,
    pub risk: PaymentRisk,
    /// Recency-weighted average days to pay, including any large-invoice allowance
    pub average_days: i64,
    pub history_count: usize,
    pub reasoning: String,
    pub notes: Vec<String>,
}

/// Predicts when an invoice will be paid
///
/// # Arguments
///
/// * `history` - The client's paid invoices, most recent first. Only the first
///   `PREDICTION_HISTORY_LIMIT` entries are used, both for days to pay and for
///   the client's average total behind the large-invoice allowance.
/// * `invoice_total` - Total of the invoice being predicted
/// * `due_date` - Its due date
/// * `today` - The owner's current local date
///
/// # Returns
///
/// A prediction never earlier than `due_date`.
pub fn predict_payment_date(
    history: &[PaymentHistoryEntry],
    invoice_total: Decimal,
    due_date: NaiveDate,
    today: NaiveDate,
) -> Result<PaymentPrediction, InsightsError> {
    let history = &history[..history.len().min(PREDICTION_HISTORY_LIMIT)];

    if history.is_empty() {
        let predicted_date = add_days(due_date, NO_HISTORY_GRACE_DAYS as i64)?;
        return Ok(PaymentPrediction {
            predicted_date,
            confidence: NO_HISTORY_CONFIDENCE,
            risk: PaymentRisk::Medium,
            average_days: 0,
            history_count: 0,
            reasoning: format!(
                "No payment history for this client yet; assuming payment about {} days after the due date.",
                NO_HISTORY_GRACE_DAYS
            ),
            notes: Vec::new(),
        });
    }

    let days: Vec<i64> = history.iter().map(PaymentHistoryEntry::days_to_pay).collect();
    let mut average_days = weighted_average(&days).round() as i64;
    let confidence = confidence(&days);

    let mut notes = Vec::new();
    let average_total = history.iter().map(|entry| entry.total).sum::<Decimal>() / Decimal::from(history.len());
    if invoice_total > average_total * LARGE_INVOICE_FACTOR {
        average_days += LARGE_INVOICE_EXTRA_DAYS;
        notes.push(format!(
            "This invoice is well above the client's average of {}; larger invoices tend to take about {} days longer.",
            average_total.round_dp(2),
            LARGE_INVOICE_EXTRA_DAYS
        ));
    }

    let predicted_date = add_days(today, average_days)?.max(due_date);
    let risk = PaymentRisk::classify(predicted_date, due_date);
    let reasoning = reasoning(risk, average_days, history.len(), (predicted_date - due_date).num_days());

    Ok(PaymentPrediction {
        predicted_date,
        confidence,
        risk,
        average_days,
        history_count: history.len(),
        reasoning,
        notes,
    })
}

/// Average where the most recent value weighs `n` and the oldest weighs 1
fn weighted_average(days: &[i64]) -> f64 {
    let n = days.len();
    let (weighted, weights) = days
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(sum, total), (rank, value)| {
            let weight = (n - rank) as f64;
            (sum + weight * *value as f64, total + weight)
        });
    if weights == 0.0 {
        0.0
    } else {
        weighted / weights
    }
}

fn population_std_dev(days: &[i64]) -> f64 {
    let n = days.len() as f64;
    let mean = days.iter().map(|d| *d as f64).sum::<f64>() / n;
    let variance = days.iter().map(|d| (*d as f64 - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

fn confidence(days: &[i64]) -> u8 {
    let consistency = (100.0 - STDDEV_PENALTY_PER_DAY * population_std_dev(days)).max(0.0);
    let history_points = (HISTORY_POINTS_PER_INVOICE * days.len() as f64).min(MAX_HISTORY_POINTS);
    let score = (CONSISTENCY_WEIGHT * consistency + history_points).round();
    score.min(f64::from(MAX_CONFIDENCE)) as u8
}

fn reasoning(risk: PaymentRisk, average_days: i64, count: usize, late_by: i64) -> String {
    let basis = format!(
        "Based on {} paid invoice{}, this client pays in about {} days.",
        count,
        if count == 1 { "" } else { "s" },
        average_days
    );
    match risk {
        PaymentRisk::Low => format!("{} Payment is expected on or before the due date.", basis),
        PaymentRisk::Medium => format!("{} Payment is likely to arrive {} days late.", basis, late_by),
        PaymentRisk::High => format!(
            "{} Payment is expected {} days after the due date; consider an early reminder.",
            basis, late_by
        ),
    }
}

fn add_days(date: NaiveDate, days: i64) -> Result<NaiveDate, InsightsError> {
    let shifted = if days >= 0 {
        date.checked_add_days(Days::new(days as u64))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    };
    shifted.ok_or_else(|| InsightsError::validation("Date is out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(days: u64, total: Decimal) -> PaymentHistoryEntry {
        let issue_date = date(2024, 1, 1);
        PaymentHistoryEntry {
            invoice_id: InvoiceId::new(),
            issue_date,
            first_payment_date: issue_date + Days::new(days),
            total,
        }
    }

    #[test]
    fn test_days_to_pay_floors_at_zero() {
        let mut prepaid = entry(0, dec!(100));
        prepaid.first_payment_date = date(2023, 12, 20);
        assert_eq!(prepaid.days_to_pay(), 0);
    }

    #[test]
    fn test_weighted_average_favours_recent() {
        // most recent first
        assert!((weighted_average(&[15, 10, 5]) - 70.0 / 6.0).abs() < 1e-9);
        assert!((weighted_average(&[7]) - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_formula() {
        // std 4.08 -> 0.7 * 79.59 + 12 = 67.7
        assert_eq!(confidence(&[15, 10, 5]), 68);
        // consistency tops out at 70 and history at 20
        assert_eq!(confidence(&[10; 20]), 90);
        assert_eq!(confidence(&[0, 40]), 8);
    }

    #[test]
    fn test_risk_classification() {
        let due = date(2024, 3, 31);
        assert_eq!(PaymentRisk::classify(due, due), PaymentRisk::Low);
        assert_eq!(PaymentRisk::classify(date(2024, 4, 14), due), PaymentRisk::Medium);
        assert_eq!(PaymentRisk::classify(date(2024, 4, 15), due), PaymentRisk::High);
    }

    #[test]
    fn test_history_is_capped() {
        let history: Vec<_> = (0..30).map(|_| entry(10, dec!(100))).collect();
        let prediction =
            predict_payment_date(&history, dec!(100), date(2024, 3, 1), date(2024, 3, 1)).unwrap();
        assert_eq!(prediction.history_count, PREDICTION_HISTORY_LIMIT);
    }
}
