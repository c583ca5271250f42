//! Property-Based Test Generators
//!
//! Proptest strategies producing values that satisfy the invoicing
//! validation rules: non-empty descriptions, non-negative quantities and
//! rates, tax rates within 0..=100.

use proptest::prelude::*;
use rust_decimal::Decimal;

use core_kernel::{Currency, Money};
use domain_invoicing::{LineItemInput, PaymentMethod};

pub fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![
        Just(Currency::USD),
        Just(Currency::EUR),
        Just(Currency::GBP),
        Just(Currency::JPY),
        Just(Currency::CHF),
        Just(Currency::INR),
        Just(Currency::AUD),
        Just(Currency::CAD),
    ]
}

/// Positive amounts in minor units, up to ten million major units
pub fn positive_amount_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..1_000_000_000i64
}

pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    (positive_amount_minor_strategy(), currency_strategy())
        .prop_map(|(amount, currency)| Money::from_minor(amount, currency))
}

/// Rates with two decimal places between 0.00 and 5000.00
pub fn rate_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=500_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Quantities with up to two decimal places between 0.00 and 100.00
pub fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=10_000i64).prop_map(|hundredths| Decimal::new(hundredths, 2))
}

/// Tax rates between 0 and 100 percent in steps of 0.25
pub fn tax_rate_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=400i64).prop_map(|quarters| Decimal::new(quarters * 25, 2))
}

pub fn line_item_strategy() -> impl Strategy<Value = LineItemInput> {
    ("[A-Z][a-z]{2,12}( [a-z]{2,8})?", quantity_strategy(), rate_strategy())
        .prop_map(|(description, quantity, rate)| LineItemInput::new(description, quantity, rate))
}

/// Between one and `max` valid line items
pub fn line_items_strategy(max: usize) -> impl Strategy<Value = Vec<LineItemInput>> {
    prop::collection::vec(line_item_strategy(), 1..=max.max(1))
}

pub fn payment_method_strategy() -> impl Strategy<Value = PaymentMethod> {
    prop::sample::select(PaymentMethod::ALL.to_vec())
}
