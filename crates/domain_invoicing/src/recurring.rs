//! Recurring invoice templates
//!
//! A template produces one invoice per cycle. Cycle dates are always computed
//! from an anchor (`anchor_date + k × cadence`) rather than by stepping from the
//! previous date, so a template anchored on the 31st keeps returning to the
//! month's last day instead of drifting to the 28th.

use chrono::{DateTime, Days, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{ClientId, Currency, Money, RecurringInvoiceId, UserId};

use crate::error::InvoicingError;
use crate::invoice::{validate_items, validate_tax_rate, InvoiceDraft, LineItemInput, RecurringSource};

/// Default payment window for materialized invoices
pub const DEFAULT_DUE_IN_DAYS: u32 = 30;

fn default_due_in_days() -> u32 {
    DEFAULT_DUE_IN_DAYS
}

/// Recurrence cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Weekly,
    Monthly,
    Quarterly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
        }
    }

    /// The `k`-th occurrence counted from `anchor` (k = 0 is the anchor itself)
    pub fn occurrence(&self, anchor: NaiveDate, k: u32) -> Option<NaiveDate> {
        match self {
            Frequency::Weekly => anchor.checked_add_days(Days::new(7 * u64::from(k))),
            Frequency::Monthly => anchor.checked_add_months(Months::new(k)),
            Frequency::Quarterly => anchor.checked_add_months(Months::new(k.checked_mul(3)?)),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = InvoicingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "quarterly" => Ok(Frequency::Quarterly),
            other => Err(InvoicingError::validation_field(
                format!("Unknown frequency '{}'", other),
                "frequency",
            )),
        }
    }
}

/// Invoice content copied into every cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringTemplate {
    pub items: Vec<LineItemInput>,
    #[serde(default)]
    pub tax_rate: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub terms: Option<String>,
    pub currency: Currency,
    #[serde(default = "default_due_in_days")]
    pub due_in_days: u32,
    /// Send each materialized invoice immediately
    #[serde(default)]
    pub auto_send: bool,
}

impl RecurringTemplate {
    pub fn new(items: Vec<LineItemInput>, currency: Currency) -> Self {
        Self {
            items,
            tax_rate: Decimal::ZERO,
            notes: None,
            terms: None,
            currency,
            due_in_days: DEFAULT_DUE_IN_DAYS,
            auto_send: false,
        }
    }

    pub fn with_tax_rate(mut self, tax_rate: Decimal) -> Self {
        self.tax_rate = tax_rate;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_due_in_days(mut self, days: u32) -> Self {
        self.due_in_days = days;
        self
    }

    pub fn with_auto_send(mut self, auto_send: bool) -> Self {
        self.auto_send = auto_send;
        self
    }

    pub fn validate(&self) -> Result<(), InvoicingError> {
        validate_items(&self.items)?;
        validate_tax_rate(self.tax_rate)
    }

    /// Templates bill in the owner's currency so reports never mix currencies
    pub fn ensure_currency(&self, owner_currency: Currency) -> Result<(), InvoicingError> {
        if self.currency != owner_currency {
            return Err(InvoicingError::validation_field(
                format!(
                    "Template currency {} does not match the account currency {}",
                    self.currency, owner_currency
                ),
                "template.currency",
            ));
        }
        Ok(())
    }

    /// Σ(quantity × rate) before tax, for display
    pub fn estimated_total(&self) -> Money {
        let amount: Decimal = self.items.iter().map(|item| item.quantity * item.rate).sum();
        Money::new(amount, self.currency).round_to_currency()
    }
}

/// A recurring invoice schedule owned by a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringInvoice {
    pub id: RecurringInvoiceId,
    pub user_id: UserId,
    pub client_id: ClientId,
    pub frequency: Frequency,
    /// First cycle date as created
    pub start_date: NaiveDate,
    /// Date of cycle `anchor_cycle`; moves when the cadence changes or on resume
    pub anchor_date: NaiveDate,
    pub anchor_cycle: u32,
    /// Date of the next cycle to materialize
    pub next_date: NaiveDate,
    /// Index of the next cycle; also the count of cycles consumed so far
    pub cycles_generated: u32,
    pub active: bool,
    pub template: RecurringTemplate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurringInvoice {
    /// Creates an active schedule whose first cycle falls on `start_date`
    pub fn new(
        user_id: UserId,
        client_id: ClientId,
        frequency: Frequency,
        start_date: NaiveDate,
        template: RecurringTemplate,
        now: DateTime<Utc>,
    ) -> Result<Self, InvoicingError> {
        template.validate()?;
        Ok(Self {
            id: RecurringInvoiceId::new_v7(),
            user_id,
            client_id,
            frequency,
            start_date,
            anchor_date: start_date,
            anchor_cycle: 0,
            next_date: start_date,
            cycles_generated: 0,
            active: true,
            template,
            created_at: now,
            updated_at: now,
        })
    }

    /// Date of `cycle`, counted from the current anchor
    pub fn cycle_date(&self, cycle: u32) -> Result<NaiveDate, InvoicingError> {
        let offset = cycle.checked_sub(self.anchor_cycle).ok_or_else(|| {
            InvoicingError::validation(format!("Cycle {} precedes the schedule anchor", cycle))
        })?;
        self.frequency
            .occurrence(self.anchor_date, offset)
            .ok_or_else(|| InvoicingError::validation("Recurring date is out of range"))
    }

    /// Active and the next cycle date has arrived
    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.active && self.next_date <= today
    }

    /// Draft for the pending cycle (`cycles_generated`)
    pub fn draft_for_next_cycle(&self) -> Result<InvoiceDraft, InvoicingError> {
        let issue_date = self.next_date;
        let due_date = issue_date
            .checked_add_days(Days::new(u64::from(self.template.due_in_days)))
            .ok_or_else(|| InvoicingError::validation("Due date is out of range"))?;

        Ok(InvoiceDraft {
            user_id: self.user_id,
            client_id: self.client_id,
            currency: self.template.currency,
            issue_date,
            due_date,
            tax_rate: self.template.tax_rate,
            items: self.template.items.clone(),
            notes: self.template.notes.clone(),
            terms: self.template.terms.clone(),
            recurring_source: Some(self.pending_source()),
        })
    }

    /// Idempotency key of the pending cycle
    pub fn pending_source(&self) -> RecurringSource {
        RecurringSource {
            template_id: self.id,
            cycle: self.cycles_generated,
        }
    }

    /// Consumes the pending cycle and moves `next_date` one cadence unit on
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<(), InvoicingError> {
        let next_cycle = self.cycles_generated + 1;
        self.next_date = self.cycle_date(next_cycle)?;
        self.cycles_generated = next_cycle;
        self.updated_at = now;
        Ok(())
    }

    /// Switches cadence; the pending date stays and later cycles follow the new cadence
    pub fn change_frequency(&mut self, frequency: Frequency, now: DateTime<Utc>) {
        if frequency == self.frequency {
            return;
        }
        self.anchor_date = self.next_date;
        self.anchor_cycle = self.cycles_generated;
        self.frequency = frequency;
        self.updated_at = now;
    }

    /// Stops materialization
    pub fn pause(&mut self, now: DateTime<Utc>) {
        self.active = false;
        self.updated_at = now;
    }

    /// Restarts materialization; cycles missed while paused are skipped
    pub fn resume(&mut self, today: NaiveDate, now: DateTime<Utc>) -> Result<(), InvoicingError> {
        if self.active {
            return Ok(());
        }
        if self.next_date < today {
            let mut offset = self.cycles_generated.saturating_sub(self.anchor_cycle);
            let mut date = self.next_date;
            while date < today {
                offset += 1;
                date = self
                    .frequency
                    .occurrence(self.anchor_date, offset)
                    .ok_or_else(|| InvoicingError::validation("Recurring date is out of range"))?;
            }
            self.anchor_date = date;
            self.anchor_cycle = self.cycles_generated;
            self.next_date = date;
        }
        self.active = true;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn schedule(frequency: Frequency, start: NaiveDate) -> RecurringInvoice {
        let template = RecurringTemplate::new(
            vec![LineItemInput::new("Retainer", dec!(1), dec!(500))],
            Currency::USD,
        );
        RecurringInvoice::new(UserId::new(), ClientId::new(), frequency, start, template, Utc::now()).unwrap()
    }

    #[test]
    fn test_monthly_month_end_does_not_drift() {
        let mut rec = schedule(Frequency::Monthly, date(2024, 1, 31));
        let mut dates = vec![rec.next_date];
        for _ in 0..3 {
            rec.advance(Utc::now()).unwrap();
            dates.push(rec.next_date);
        }
        assert_eq!(dates, vec![date(2024, 1, 31), date(2024, 2, 29), date(2024, 3, 31), date(2024, 4, 30)]);
    }

    #[test]
    fn test_weekly_and_quarterly_cadence() {
        assert_eq!(Frequency::Weekly.occurrence(date(2024, 1, 1), 2), Some(date(2024, 1, 15)));
        assert_eq!(Frequency::Quarterly.occurrence(date(2024, 11, 30), 1), Some(date(2025, 2, 28)));
    }

    #[test]
    fn test_resume_skips_missed_cycles() {
        let mut rec = schedule(Frequency::Weekly, date(2024, 1, 1));
        rec.pause(Utc::now());
        rec.resume(date(2024, 1, 20), Utc::now()).unwrap();
        assert_eq!(rec.next_date, date(2024, 1, 22));
        assert_eq!(rec.cycles_generated, 0);
        assert!(rec.active);
    }

    #[test]
    fn test_estimated_total_excludes_tax() {
        let template = RecurringTemplate::new(
            vec![
                LineItemInput::new("Hosting", dec!(2), dec!(50)),
                LineItemInput::new("Support", dec!(1), dec!(25)),
            ],
            Currency::USD,
        )
        .with_tax_rate(dec!(10));
        assert_eq!(template.estimated_total().amount(), dec!(125));
    }

    #[test]
    fn test_template_defaults_when_deserialized() {
        let json = r#"{"items":[{"description":"Retainer","quantity":"1","rate":"500"}],"currency":"USD"}"#;
        let template: RecurringTemplate = serde_json::from_str(json).unwrap();
        assert_eq!(template.due_in_days, 30);
        assert!(!template.auto_send);
    }
}
