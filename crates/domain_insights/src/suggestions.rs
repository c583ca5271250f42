//! Line-item suggestions from past invoices

use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::scoring::*;

/// Where a suggestion's history came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionSource {
    /// The client's own invoices
    Client,
    /// All of the user's invoices, used when the client has none
    AllClients,
}

impl SuggestionSource {
    fn confidence(&self, frequency: u32) -> u8 {
        let (base, per_use, cap) = match self {
            SuggestionSource::Client => (CLIENT_BASE_CONFIDENCE, CLIENT_CONFIDENCE_PER_USE, CLIENT_MAX_CONFIDENCE),
            SuggestionSource::AllClients => {
                (FALLBACK_BASE_CONFIDENCE, FALLBACK_CONFIDENCE_PER_USE, FALLBACK_MAX_CONFIDENCE)
            }
        };
        base.saturating_add(per_use.saturating_mul(frequency)).min(cap) as u8
    }
}

/// A line item as it appeared on a past invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalItem {
    pub description: String,
    pub quantity: Decimal,
    pub rate: Decimal,
}

impl HistoricalItem {
    pub fn new(description: impl Into<String>, quantity: Decimal, rate: Decimal) -> Self {
        Self {
            description: description.into(),
            quantity,
            rate,
        }
    }
}

/// A suggested line item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemSuggestion {
    /// Wording of the most recent use
    pub description: String,
    /// Average quantity, one decimal place
    pub quantity: Decimal,
    /// Most recent rate
    pub rate: Decimal,
    /// Number of past uses
    pub frequency: u32,
    pub confidence: u8,
    pub source: SuggestionSource,
}

struct Group {
    description: String,
    rate: Decimal,
    quantity_sum: Decimal,
    count: u32,
}

/// Aggregates past items into ranked suggestions
///
/// `items` must be ordered most recent first; the first occurrence of each
/// description supplies the suggested wording and rate. A blank filter is
/// ignored.
pub fn suggest_line_items(
    items: &[HistoricalItem],
    filter: Option<&str>,
    source: SuggestionSource,
) -> Vec<LineItemSuggestion> {
    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for item in items {
        let key = normalize(&item.description);
        if key.is_empty() {
            continue;
        }
        match index.get(&key) {
            Some(&at) => {
                let group = &mut groups[at];
                group.quantity_sum += item.quantity;
                group.count += 1;
            }
            None => {
                index.insert(key, groups.len());
                groups.push(Group {
                    description: item.description.trim().to_string(),
                    rate: item.rate,
                    quantity_sum: item.quantity,
                    count: 1,
                });
            }
        }
    }

    let filter = filter.map(normalize).filter(|f| !f.is_empty());
    let mut suggestions: Vec<LineItemSuggestion> = groups
        .into_iter()
        .filter(|group| filter.as_deref().map_or(true, |f| matches_filter(&group.description, f)))
        .map(|group| LineItemSuggestion {
            quantity: (group.quantity_sum / Decimal::from(group.count))
                .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero),
            description: group.description,
            rate: group.rate,
            frequency: group.count,
            confidence: source.confidence(group.count),
            source,
        })
        .collect();

    // stable: equal frequencies keep most-recent-first order
    suggestions.sort_by(|a, b| b.frequency.cmp(&a.frequency));
    suggestions.truncate(SUGGESTION_LIMIT);
    suggestions
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Substring match or at least one shared word, case-insensitive
fn matches_filter(description: &str, filter: &str) -> bool {
    let description = normalize(description);
    if description.contains(filter) {
        return true;
    }
    let words: Vec<&str> = description.split_whitespace().collect();
    filter.split_whitespace().any(|token| words.contains(&token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_confidence_curves() {
        assert_eq!(SuggestionSource::Client.confidence(1), 60);
        assert_eq!(SuggestionSource::Client.confidence(5), 95);
        assert_eq!(SuggestionSource::AllClients.confidence(2), 40);
        assert_eq!(SuggestionSource::AllClients.confidence(10), 70);
    }

    #[test]
    fn test_filter_matching() {
        assert!(matches_filter("Website Hosting", "host"));
        assert!(matches_filter("Monthly retainer", "retainer fee"));
        assert!(!matches_filter("Design work", "hosting"));
    }

    #[test]
    fn test_blank_descriptions_are_ignored() {
        let items = vec![HistoricalItem::new("   ", dec!(1), dec!(10))];
        assert!(suggest_line_items(&items, None, SuggestionSource::Client).is_empty());
    }
}
