//! Duplicate-invoice detection
//!
//! A candidate invoice is compared with the client's recent invoices. Each
//! pair gets a 0-100 similarity score made of three terms:
//!
//! | Term      | Points | Basis                                   |
//! |-----------|--------|-----------------------------------------|
//! | Amount    | 0-40   | Relative difference of the totals       |
//! | Date      | 0-20   | Days between the issue dates            |
//! | Items     | 0-40   | Share of matching line items            |

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{ClientId, InvoiceId};
use domain_invoicing::{Invoice, InvoiceItem, InvoiceStatus, LineItemInput};

use crate::scoring::*;

/// The invoice about to be created (or edited)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateCandidate {
    pub client_id: ClientId,
    pub total: Decimal,
    pub issue_date: NaiveDate,
    pub items: Vec<LineItemInput>,
    /// Invoice to leave out of the comparison, typically the one being edited
    #[serde(default)]
    pub exclude: Option<InvoiceId>,
}

impl DuplicateCandidate {
    pub fn new(client_id: ClientId, total: Decimal, issue_date: NaiveDate, items: Vec<LineItemInput>) -> Self {
        Self {
            client_id,
            total,
            issue_date,
            items,
            exclude: None,
        }
    }

    pub fn excluding(mut self, invoice_id: InvoiceId) -> Self {
        self.exclude = Some(invoice_id);
        self
    }

    /// Whether `invoice` should be compared against this candidate
    pub fn is_comparable(&self, invoice: &Invoice) -> bool {
        invoice.client_id == self.client_id
            && invoice.status != InvoiceStatus::Cancelled
            && Some(invoice.id) != self.exclude
            && (invoice.issue_date - self.issue_date).num_days().abs() <= DUPLICATE_WINDOW_DAYS
    }
}

/// An existing invoice that resembles the candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimilarInvoice {
    pub invoice_id: InvoiceId,
    pub number: String,
    /// 0-100
    pub similarity: u8,
    pub reason: String,
}

/// Result of a duplicate check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateCheck {
    pub is_duplicate: bool,
    pub confidence: u8,
    /// Most similar first
    pub similar: Vec<SimilarInvoice>,
}

impl DuplicateCheck {
    fn clear() -> Self {
        Self {
            is_duplicate: false,
            confidence: NOT_DUPLICATE_CONFIDENCE as u8,
            similar: Vec::new(),
        }
    }
}

/// Score of one candidate/existing pair with the terms that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Similarity {
    pub score: u8,
    pub amount_points: f64,
    pub date_points: f64,
    pub item_points: f64,
    pub matched_items: f64,
    pub day_gap: i64,
}

impl Similarity {
    /// Scores `existing` against the candidate
    pub fn between(candidate: &DuplicateCandidate, existing: &Invoice) -> Self {
        let amount_points = amount_points(candidate.total, existing.total.amount());
        let day_gap = (existing.issue_date - candidate.issue_date).num_days().abs();
        let date_points = date_points(day_gap);
        let matched_items = matched_items(&candidate.items, &existing.items);
        let denominator = candidate.items.len().max(existing.items.len());
        let item_points = if denominator == 0 {
            0.0
        } else {
            ITEM_OVERLAP_POINTS * matched_items / denominator as f64
        };

        let score = (amount_points + date_points + item_points).round().clamp(0.0, 100.0) as u8;
        Self {
            score,
            amount_points,
            date_points,
            item_points,
            matched_items,
            day_gap,
        }
    }

    fn reason(&self, candidate: &DuplicateCandidate, existing: &Invoice) -> String {
        let mut parts = Vec::new();
        if self.amount_points >= AMOUNT_EXACT_POINTS {
            parts.push("same total".to_string());
        } else if self.amount_points > 0.0 {
            parts.push(format!("similar total ({})", existing.total));
        }
        if self.date_points > 0.0 {
            parts.push(match self.day_gap {
                0 => "issued the same day".to_string(),
                1 => "issued 1 day apart".to_string(),
                gap => format!("issued {} days apart", gap),
            });
        }
        if self.item_points > 0.0 {
            let of = candidate.items.len().max(existing.items.len());
            parts.push(format!("{} of {} line items match", self.matched_items.ceil() as usize, of));
        }
        if parts.is_empty() {
            return format!("Invoice {} for the same client", existing.number);
        }
        format!("Invoice {}: {}", existing.number, parts.join(", "))
    }
}

fn amount_points(candidate: Decimal, existing: Decimal) -> f64 {
    if candidate == existing {
        return AMOUNT_EXACT_POINTS;
    }
    if existing.is_zero() {
        return 0.0;
    }
    let relative = (candidate - existing).abs() / existing.abs();
    AMOUNT_TIERS
        .iter()
        .find(|(below, _)| relative < *below)
        .map_or(0.0, |(_, points)| *points)
}

fn date_points(day_gap: i64) -> f64 {
    DATE_TIERS
        .iter()
        .find(|(below, _)| day_gap < *below)
        .map_or(0.0, |(_, points)| *points)
}

/// Weighted count of candidate items found on the existing invoice
///
/// Each existing item is matched at most once; for every candidate item the
/// first unused existing item with the same description decides the weight.
/// Pairing is one-to-one in both directions, so a repeated candidate line
/// cannot score twice against a single existing line.
fn matched_items(candidate: &[LineItemInput], existing: &[InvoiceItem]) -> f64 {
    let mut used = vec![false; existing.len()];
    let mut matched = 0.0;

    for item in candidate {
        let description = item.description.trim().to_lowercase();
        let found = existing
            .iter()
            .enumerate()
            .find(|(at, other)| !used[*at] && other.description.trim().to_lowercase() == description);
        if let Some((at, other)) = found {
            used[at] = true;
            let same_rate = other.rate.amount() == item.rate;
            let same_quantity = other.quantity == item.quantity;
            matched += match (same_rate, same_quantity) {
                (true, true) => ITEM_MATCH_FULL,
                (true, false) => ITEM_MATCH_DESCRIPTION_RATE,
                _ => ITEM_MATCH_DESCRIPTION,
            };
        }
    }
    matched
}

/// Checks a candidate against existing invoices
///
/// Invoices outside the ±30 day window, cancelled ones, other clients' and
/// the excluded one are ignored.
pub fn detect_duplicates(candidate: &DuplicateCandidate, existing: &[Invoice]) -> DuplicateCheck {
    let mut scored: Vec<(Similarity, &Invoice)> = existing
        .iter()
        .filter(|invoice| candidate.is_comparable(invoice))
        .map(|invoice| (Similarity::between(candidate, invoice), invoice))
        .collect();

    if scored.is_empty() {
        return DuplicateCheck::clear();
    }

    scored.retain(|(similarity, _)| similarity.score >= SIMILARITY_THRESHOLD);
    scored.sort_by(|a, b| b.0.score.cmp(&a.0.score));

    let highest = scored.first().map_or(0, |(similarity, _)| similarity.score);
    let is_duplicate = highest >= DUPLICATE_THRESHOLD;
    let confidence = if is_duplicate {
        highest
    } else {
        (NOT_DUPLICATE_CONFIDENCE - NOT_DUPLICATE_PENALTY * f64::from(highest)).round() as u8
    };

    let similar = scored
        .iter()
        .take(DUPLICATE_RESULT_LIMIT)
        .map(|(similarity, invoice)| SimilarInvoice {
            invoice_id: invoice.id,
            number: invoice.number.clone(),
            similarity: similarity.score,
            reason: similarity.reason(candidate, invoice),
        })
        .collect();

    DuplicateCheck {
        is_duplicate,
        confidence,
        similar,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_tiers() {
        assert_eq!(amount_points(dec!(1000), dec!(1000)), 40.0);
        assert_eq!(amount_points(dec!(1005), dec!(1000)), 35.0);
        assert_eq!(amount_points(dec!(1040), dec!(1000)), 20.0);
        assert_eq!(amount_points(dec!(1090), dec!(1000)), 10.0);
        assert_eq!(amount_points(dec!(1100), dec!(1000)), 0.0);
        assert_eq!(amount_points(dec!(5), dec!(0)), 0.0);
        assert_eq!(amount_points(dec!(0), dec!(0)), 40.0);
    }

    #[test]
    fn test_date_tiers() {
        assert_eq!(date_points(0), 20.0);
        assert_eq!(date_points(2), 15.0);
        assert_eq!(date_points(6), 10.0);
        assert_eq!(date_points(13), 5.0);
        assert_eq!(date_points(14), 0.0);
    }
}
