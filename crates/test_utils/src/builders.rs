//! Test Data Builders
//!
//! Builders for invoices and payments with sensible defaults, for tests of the
//! pure functions in the reporting and insights crates. Tests name only the
//! fields they care about.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{ClientId, Currency, Money, UserId};
use domain_invoicing::{
    Invoice, InvoiceDraft, InvoiceStatus, LineItemInput, PayerInfo, Payment, PaymentMethod, PaymentStatus,
};

use crate::fixtures::{noon, DateFixtures, ItemFixtures};

/// Builder for stored-shape invoices
///
/// `build` runs the real `Invoice::from_draft` so totals are computed by the
/// domain, then walks the status graph to the requested status.
#[derive(Debug, Clone)]
pub struct InvoiceBuilder {
    user_id: UserId,
    client_id: ClientId,
    number: String,
    currency: Currency,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    tax_rate: Decimal,
    items: Vec<LineItemInput>,
    status: InvoiceStatus,
}

impl Default for InvoiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InvoiceBuilder {
    pub fn new() -> Self {
        let issue = DateFixtures::today();
        Self {
            user_id: UserId::new(),
            client_id: ClientId::new(),
            number: "INV-001".to_string(),
            currency: Currency::USD,
            issue_date: issue,
            due_date: DateFixtures::net_30(issue),
            tax_rate: Decimal::ZERO,
            items: vec![ItemFixtures::design()],
            status: InvoiceStatus::Draft,
        }
    }

    pub fn owned_by(mut self, user_id: UserId) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn for_client(mut self, client_id: ClientId) -> Self {
        self.client_id = client_id;
        self
    }

    pub fn number(mut self, number: impl Into<String>) -> Self {
        self.number = number.into();
        self
    }

    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    /// Sets the issue date; the due date moves with it to stay net-30
    pub fn issued(mut self, issue_date: NaiveDate) -> Self {
        self.issue_date = issue_date;
        self.due_date = DateFixtures::net_30(issue_date);
        self
    }

    pub fn due(mut self, due_date: NaiveDate) -> Self {
        self.due_date = due_date;
        self
    }

    pub fn tax_rate(mut self, tax_rate: Decimal) -> Self {
        self.tax_rate = tax_rate;
        self
    }

    pub fn items(mut self, items: Vec<LineItemInput>) -> Self {
        self.items = items;
        self
    }

    /// One line worth exactly `total` before tax
    pub fn total(mut self, total: Decimal) -> Self {
        self.items = vec![ItemFixtures::flat("Services", total)];
        self
    }

    pub fn status(mut self, status: InvoiceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn build(self) -> Invoice {
        let created = noon(self.issue_date);
        let draft = InvoiceDraft {
            user_id: self.user_id,
            client_id: self.client_id,
            currency: self.currency,
            issue_date: self.issue_date,
            due_date: self.due_date,
            tax_rate: self.tax_rate,
            items: self.items,
            notes: None,
            terms: None,
            recurring_source: None,
        };
        let mut invoice = Invoice::from_draft(draft, self.number, created).expect("builder draft should be valid");

        let path: &[InvoiceStatus] = match self.status {
            InvoiceStatus::Draft => &[],
            InvoiceStatus::Sent => &[InvoiceStatus::Sent],
            InvoiceStatus::Paid => &[InvoiceStatus::Sent, InvoiceStatus::Paid],
            InvoiceStatus::Overdue => &[InvoiceStatus::Sent, InvoiceStatus::Overdue],
            InvoiceStatus::Cancelled => &[InvoiceStatus::Cancelled],
        };
        for next in path {
            let step = match next {
                InvoiceStatus::Sent => invoice.mark_sent(created),
                other => invoice.transition_to(*other, created),
            };
            step.expect("builder path follows the status graph");
        }
        invoice
    }
}

/// Builder for payments against an invoice
#[derive(Debug, Clone)]
pub struct PaymentBuilder {
    user_id: UserId,
    invoice: Invoice,
    amount: Option<Decimal>,
    method: PaymentMethod,
    paid_at: DateTime<Utc>,
    status: PaymentStatus,
    payer: Option<PayerInfo>,
}

impl PaymentBuilder {
    /// A completed bank transfer for the full invoice total, paid on the issue date
    pub fn for_invoice(invoice: &Invoice) -> Self {
        Self {
            user_id: invoice.user_id,
            invoice: invoice.clone(),
            amount: None,
            method: PaymentMethod::BankTransfer,
            paid_at: noon(invoice.issue_date),
            status: PaymentStatus::Completed,
            payer: None,
        }
    }

    pub fn amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn method(mut self, method: PaymentMethod) -> Self {
        self.method = method;
        self
    }

    pub fn paid_at(mut self, paid_at: DateTime<Utc>) -> Self {
        self.paid_at = paid_at;
        self
    }

    /// Paid at noon UTC on `day`
    pub fn paid_on(self, day: NaiveDate) -> Self {
        self.paid_at(noon(day))
    }

    /// Paid `days` after the invoice was issued
    pub fn days_after_issue(self, days: i64) -> Self {
        let day = self.invoice.issue_date + Duration::days(days);
        self.paid_on(day)
    }

    pub fn status(mut self, status: PaymentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn online(mut self, payer: PayerInfo) -> Self {
        self.payer = Some(payer);
        self
    }

    pub fn build(self) -> Payment {
        let invoice = self.invoice;
        let amount = Money::new(self.amount.unwrap_or_else(|| invoice.total.amount()), invoice.currency);
        let mut payment = match self.payer {
            Some(payer) => Payment::online(self.user_id, invoice.id, amount, self.method, payer, self.paid_at),
            None => Payment::manual(self.user_id, invoice.id, amount, self.method, self.paid_at),
        };
        payment.status = self.status;
        payment
    }
}

/// A paid invoice together with the payment that settled it
pub fn paid_invoice(builder: InvoiceBuilder, days_to_pay: i64) -> (Invoice, Payment) {
    let invoice = builder.status(InvoiceStatus::Paid).build();
    let payment = PaymentBuilder::for_invoice(&invoice).days_after_issue(days_to_pay).build();
    (invoice, payment)
}

/// A half-and-half split used by partial payment tests
pub fn split_in_two(total: Decimal) -> (Decimal, Decimal) {
    let first = (total / dec!(2)).round_dp(2);
    (first, total - first)
}
