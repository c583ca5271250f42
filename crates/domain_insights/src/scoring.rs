//! Tunable constants for the insight heuristics
//!
//! Every weight, threshold and cap used by the three scorers lives here so it
//! can be adjusted and tested without touching the scoring code.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ----------------------------------------------------------------------------
// Payment-date prediction
// ----------------------------------------------------------------------------

/// Most recent paid invoices considered per client
pub const PREDICTION_HISTORY_LIMIT: usize = 20;

/// Days past the due date assumed when a client has no history
pub const NO_HISTORY_GRACE_DAYS: u64 = 3;

/// Confidence reported when a client has no history
pub const NO_HISTORY_CONFIDENCE: u8 = 30;

/// Ceiling for prediction and suggestion confidence
pub const MAX_CONFIDENCE: u8 = 95;

/// Confidence points lost per day of standard deviation
pub const STDDEV_PENALTY_PER_DAY: f64 = 5.0;

/// Share of the consistency score in the final confidence
pub const CONSISTENCY_WEIGHT: f64 = 0.7;

/// Confidence points per paid invoice in the history
pub const HISTORY_POINTS_PER_INVOICE: f64 = 4.0;

/// Cap on the history-size contribution
pub const MAX_HISTORY_POINTS: f64 = 20.0;

/// An invoice this many times the client's average total counts as large
pub const LARGE_INVOICE_FACTOR: Decimal = dec!(1.5);

/// Extra days expected for large invoices
pub const LARGE_INVOICE_EXTRA_DAYS: i64 = 3;

/// Lateness (days after due) still classified as medium risk
pub const MEDIUM_RISK_WINDOW_DAYS: i64 = 14;

// ----------------------------------------------------------------------------
// Line-item suggestions
// ----------------------------------------------------------------------------

/// Suggestions returned per call
pub const SUGGESTION_LIMIT: usize = 10;

/// Invoices scanned when falling back to the user's whole history
pub const FALLBACK_INVOICE_LIMIT: u32 = 100;

pub const CLIENT_BASE_CONFIDENCE: u32 = 50;
pub const CLIENT_CONFIDENCE_PER_USE: u32 = 10;
pub const CLIENT_MAX_CONFIDENCE: u32 = 95;

pub const FALLBACK_BASE_CONFIDENCE: u32 = 30;
pub const FALLBACK_CONFIDENCE_PER_USE: u32 = 5;
pub const FALLBACK_MAX_CONFIDENCE: u32 = 70;

// ----------------------------------------------------------------------------
// Duplicate detection
// ----------------------------------------------------------------------------

/// Existing invoices within this many days of the candidate are compared
pub const DUPLICATE_WINDOW_DAYS: i64 = 30;

/// Amount term: (relative difference below, points); exact match scores `AMOUNT_EXACT_POINTS`
pub const AMOUNT_EXACT_POINTS: f64 = 40.0;
pub const AMOUNT_TIERS: [(Decimal, f64); 3] = [(dec!(0.01), 35.0), (dec!(0.05), 20.0), (dec!(0.10), 10.0)];

/// Date term: (absolute day difference below, points)
pub const DATE_TIERS: [(i64, f64); 4] = [(1, 20.0), (3, 15.0), (7, 10.0), (14, 5.0)];

/// Item term ceiling
pub const ITEM_OVERLAP_POINTS: f64 = 40.0;

/// Item match weights
pub const ITEM_MATCH_FULL: f64 = 1.0;
pub const ITEM_MATCH_DESCRIPTION_RATE: f64 = 0.7;
pub const ITEM_MATCH_DESCRIPTION: f64 = 0.4;

/// Minimum score for an invoice to be listed as similar
pub const SIMILARITY_THRESHOLD: u8 = 30;

/// Score at which the candidate is flagged as a duplicate
pub const DUPLICATE_THRESHOLD: u8 = 75;

/// Similar invoices returned per check
pub const DUPLICATE_RESULT_LIMIT: usize = 5;

/// Confidence when nothing comparable exists
pub const NOT_DUPLICATE_CONFIDENCE: f64 = 95.0;

/// Confidence lost per similarity point when not a duplicate
pub const NOT_DUPLICATE_PENALTY: f64 = 0.5;
