//! Payment reconciliation
//!
//! Balance due is never stored: it is the invoice total minus the sum of its
//! completed payments, recomputed whenever it is needed.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use core_kernel::{Currency, Money};

use crate::error::InvoicingError;
use crate::invoice::Invoice;
use crate::payment::Payment;

/// Difference below which cumulative payments count as the full total
pub const SETTLEMENT_TOLERANCE: Decimal = dec!(0.01);

/// Sum of completed payments
pub fn total_paid(payments: &[Payment], currency: Currency) -> Result<Money, InvoicingError> {
    let paid = Money::sum(
        payments.iter().filter(|p| p.is_completed()).map(|p| &p.amount),
        currency,
    )?;
    Ok(paid)
}

/// True when `paid` matches `total` within the settlement tolerance
pub fn is_settled(paid: &Money, total: &Money) -> bool {
    paid.approx_eq(total, SETTLEMENT_TOLERANCE)
}

/// Checks that `amount` may be added on top of `paid` without exceeding `total`
pub fn ensure_within_balance(total: &Money, paid: &Money, amount: &Money) -> Result<(), InvoicingError> {
    if !amount.is_positive() {
        return Err(InvoicingError::validation_field(
            "Payment amount must be greater than zero",
            "amount",
        ));
    }
    let after = paid.checked_add(amount)?;
    if after.amount() > total.amount() {
        return Err(InvoicingError::ExceedsBalance {
            amount: *amount,
            balance: total.checked_sub(paid)?,
        });
    }
    Ok(())
}

/// Payment position of one invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub total: Money,
    pub total_paid: Money,
    pub balance_due: Money,
    pub payment_count: usize,
    pub settled: bool,
}

impl Reconciliation {
    /// Reconciles `invoice` against its payments
    pub fn of(invoice: &Invoice, payments: &[Payment]) -> Result<Self, InvoicingError> {
        let paid = total_paid(payments, invoice.currency)?;
        Ok(Self {
            total: invoice.total,
            total_paid: paid,
            balance_due: invoice.total.checked_sub(&paid)?,
            payment_count: payments.iter().filter(|p| p.is_completed()).count(),
            settled: is_settled(&paid, &invoice.total),
        })
    }
}
