//! Insights Domain - heuristic helpers for invoice authors
//!
//! Three read-only scorers over a user's history:
//!
//! - **Payment-date prediction** from a client's past days-to-pay
//! - **Line-item suggestions** from items billed before
//! - **Duplicate detection** against invoices issued around the same date
//!
//! The scorers are pure functions of their inputs and an explicit `today`;
//! [`InsightsService`] loads the history. All weights and thresholds are in
//! [`scoring`].

pub mod duplicates;
pub mod error;
pub mod prediction;
pub mod scoring;
pub mod services;
pub mod suggestions;

pub use duplicates::{detect_duplicates, DuplicateCandidate, DuplicateCheck, SimilarInvoice, Similarity};
pub use error::InsightsError;
pub use prediction::{predict_payment_date, PaymentHistoryEntry, PaymentPrediction, PaymentRisk};
pub use services::InsightsService;
pub use suggestions::{suggest_line_items, HistoricalItem, LineItemSuggestion, SuggestionSource};
