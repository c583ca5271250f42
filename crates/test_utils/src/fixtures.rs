//! Pre-built Test Fixtures
//!
//! Values are fixed so that expected numbers in tests can be worked out by
//! hand. The reference "today" is 2024-03-01.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{Currency, Money, UserId};
use domain_invoicing::{ClientDetails, LineItemInput, User};

/// Calendar date, panicking on an invalid literal
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid fixture date")
}

/// Midday UTC on `day`, far from any day boundary for UTC-near timezones
pub fn noon(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_opt(12, 0, 0).expect("valid time").and_utc()
}

/// Fixture for dates
pub struct DateFixtures;

impl DateFixtures {
    /// The reference "today" used by the harness clock
    pub fn today() -> NaiveDate {
        date(2024, 3, 1)
    }

    /// Net-30 due date for an invoice issued on `issue`
    pub fn net_30(issue: NaiveDate) -> NaiveDate {
        issue + chrono::Duration::days(30)
    }
}

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    pub fn usd(amount: Decimal) -> Money {
        Money::new(amount, Currency::USD)
    }

    pub fn usd_1000() -> Money {
        Money::new(dec!(1000.00), Currency::USD)
    }

    /// For currency mismatch tests
    pub fn eur_100() -> Money {
        Money::new(dec!(100.00), Currency::EUR)
    }

    /// Zero decimal places
    pub fn jpy_10000() -> Money {
        Money::new(dec!(10000), Currency::JPY)
    }
}

/// Fixture for line items
pub struct ItemFixtures;

impl ItemFixtures {
    /// 10 hours at 100
    pub fn design() -> LineItemInput {
        LineItemInput::new("Design work", dec!(10), dec!(100))
    }

    /// 1 month at 20
    pub fn hosting() -> LineItemInput {
        LineItemInput::new("Website hosting", dec!(1), dec!(20))
    }

    /// 1 × 500
    pub fn retainer() -> LineItemInput {
        LineItemInput::new("Monthly retainer", dec!(1), dec!(500))
    }

    /// A single line worth exactly `amount`
    pub fn flat(description: &str, amount: Decimal) -> LineItemInput {
        LineItemInput::new(description, dec!(1), amount)
    }
}

/// Fixture for users and their clients
pub struct AccountFixtures;

impl AccountFixtures {
    /// A USD account in UTC
    pub fn owner() -> User {
        User::new("owner@studio.test", "Sam Owner", Currency::USD).with_business_name("Studio Nine")
    }

    /// A second, unrelated account
    pub fn other_owner() -> User {
        User::new("other@elsewhere.test", "Alex Other", Currency::USD)
    }

    pub fn acme() -> ClientDetails {
        ClientDetails::new("Acme Corp", "ap@acme.test").with_company("Acme Corporation")
    }

    pub fn globex() -> ClientDetails {
        ClientDetails::new("Globex", "billing@globex.test")
    }

    /// An id that belongs to nobody
    pub fn stranger() -> UserId {
        UserId::new()
    }
}
