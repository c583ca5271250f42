//! Custom Test Assertions
//!
//! Assertion helpers for invoicing types that give more meaningful failure
//! messages than a bare `assert_eq!`.

use rust_decimal::Decimal;

use core_kernel::{Currency, Money};
use domain_invoicing::{ErrorKind, Invoice, InvoiceStatus, InvoiceTotals, InvoicingError};

/// Asserts that a Money value has exactly `amount` in `currency`
pub fn assert_money_eq(actual: &Money, amount: Decimal, currency: Currency) {
    assert_eq!(
        actual.currency(),
        currency,
        "Currency mismatch: actual={}, expected={}",
        actual.currency(),
        currency
    );
    assert_eq!(
        actual.amount(),
        amount,
        "Amount mismatch: actual={}{}, expected={}{}",
        currency.symbol(),
        actual.amount(),
        currency.symbol(),
        amount
    );
}

/// Asserts that two Money values are approximately equal within a tolerance
///
/// # Panics
///
/// Panics if the currencies don't match or the amounts differ by more than tolerance
pub fn assert_money_approx_eq(actual: &Money, expected: &Money, tolerance: Decimal) {
    assert_eq!(actual.currency(), expected.currency(), "Currency mismatch");
    let diff = (actual.amount() - expected.amount()).abs();
    assert!(
        diff <= tolerance,
        "Money amounts differ by more than tolerance: actual={}, expected={}, diff={}, tolerance={}",
        actual.amount(),
        expected.amount(),
        diff,
        tolerance
    );
}

pub fn assert_money_zero(money: &Money) {
    assert!(
        money.is_zero(),
        "Expected zero money, got {} {}",
        money.currency().symbol(),
        money.amount()
    );
}

/// Asserts the stored subtotal, tax and total of an invoice
pub fn assert_totals(invoice: &Invoice, subtotal: Decimal, tax: Decimal, total: Decimal) {
    assert_eq!(
        (invoice.subtotal.amount(), invoice.tax.amount(), invoice.total.amount()),
        (subtotal, tax, total),
        "Totals of {} are (subtotal, tax, total) = ({}, {}, {})",
        invoice.number,
        invoice.subtotal.amount(),
        invoice.tax.amount(),
        invoice.total.amount()
    );
}

/// Asserts that stored totals agree with a fresh computation over the items
pub fn assert_totals_consistent(invoice: &Invoice) {
    let recomputed = InvoiceTotals::compute(&invoice.items, invoice.tax_rate, invoice.currency)
        .expect("items share the invoice currency");
    assert_eq!(
        invoice.totals(),
        recomputed,
        "Stored totals of {} drifted from its items",
        invoice.number
    );
    assert_eq!(invoice.total.amount(), invoice.subtotal.amount() + invoice.tax.amount());
}

pub fn assert_status(invoice: &Invoice, expected: InvoiceStatus) {
    assert_eq!(
        invoice.status, expected,
        "Invoice {} is {}, expected {}",
        invoice.number, invoice.status, expected
    );
}

/// Asserts that a result failed with an error of `kind`
pub fn assert_error_kind<T: std::fmt::Debug>(result: Result<T, InvoicingError>, kind: ErrorKind) -> InvoicingError {
    match result {
        Ok(value) => panic!("Expected a {:?} error, got Ok({:?})", kind, value),
        Err(err) => {
            assert_eq!(err.kind(), kind, "Expected a {:?} error, got {:?}", kind, err);
            err
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_assert_money_eq() {
        assert_money_eq(&Money::new(dec!(5.00), Currency::USD), dec!(5), Currency::USD);
    }

    #[test]
    #[should_panic(expected = "Currency mismatch")]
    fn test_assert_money_eq_currency() {
        assert_money_eq(&Money::new(dec!(5), Currency::EUR), dec!(5), Currency::USD);
    }

    #[test]
    fn test_assert_error_kind_returns_error() {
        let result: Result<(), InvoicingError> = Err(InvoicingError::conflict("taken"));
        let err = assert_error_kind(result, ErrorKind::Conflict);
        assert!(err.to_string().contains("taken"));
    }
}
