//! Integration Tests for the invoicing core
//!
//! Cross-crate workflows run through the `Ledger` facade over the in-memory
//! adapter: lifecycle, reconciliation, overdue sweeps, duplication,
//! recurring materialization, insights and reporting.

use chrono::Days;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use ledgerlight::insights::{DuplicateCandidate, PaymentRisk};
use ledgerlight::invoicing::services::{CreateRecurringRequest, RecordPaymentRequest};
use ledgerlight::invoicing::{
    ErrorKind, Frequency, InvoiceQuery, InvoiceStatus, InvoicingPort, LineItemInput, PaymentMethod,
    RecurringTemplate,
};
use ledgerlight::kernel::Currency;
use ledgerlight::reporting::ReportWindow;
use ledgerlight::Ledger;
use test_utils::{
    assert_error_kind, assert_money_eq, assert_money_zero, assert_status, assert_totals, assert_totals_consistent,
    date, line_items_strategy, noon, tax_rate_strategy, InvoiceBuilder, ItemFixtures, TestWorld,
};

fn ledger(world: &TestWorld) -> Ledger {
    Ledger::new(world.port.clone(), world.notifier.clone(), world.clock.clone())
}

mod lifecycle_workflow {
    use super::*;

    /// Create, send and pay a taxed invoice in one go
    #[tokio::test]
    async fn test_invoice_paid_in_full() {
        let world = TestWorld::new().await;
        let request = world
            .request(date(2024, 3, 1), vec![LineItemInput::new("Consulting", dec!(1), dec!(1000))])
            .with_tax_rate(dec!(10));
        let invoice = world.sent(request).await;

        assert_eq!(invoice.number, "INV-001");
        assert_totals(&invoice, dec!(1000), dec!(100), dec!(1100));
        assert_status(&invoice, InvoiceStatus::Sent);

        world.pay(invoice.id, dec!(1100)).await;

        let details = world.invoices.get_invoice(world.user.id, invoice.id).await.unwrap();
        assert_status(&details.invoice, InvoiceStatus::Paid);
        assert_money_zero(&details.balance_due());
        assert!(details.reconciliation.settled);

        let messages = world.notifier.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].to, "ap@acme.test");
        assert_eq!(messages[0].invoice_id, Some(invoice.id));
    }

    #[tokio::test]
    async fn test_untaxed_two_item_invoice() {
        let world = TestWorld::new().await;
        let items = vec![
            LineItemInput::new("Widgets", dec!(2), dec!(50)),
            LineItemInput::new("Setup", dec!(1), dec!(25)),
        ];
        let invoice = world.draft(world.request(date(2024, 3, 1), items)).await;

        assert_totals(&invoice, dec!(125), dec!(0), dec!(125));
        assert_eq!(invoice.items[0].amount.amount(), dec!(100));
        assert_status(&invoice, InvoiceStatus::Draft);
    }

    #[tokio::test]
    async fn test_overpayment_leaves_invoice_unchanged() {
        let world = TestWorld::new().await;
        let invoice = world
            .sent(world.request(date(2024, 3, 1), vec![ItemFixtures::flat("Audit", dec!(1000))]))
            .await;
        world.pay(invoice.id, dec!(400)).await;

        let result = world
            .invoices
            .record_payment(
                world.user.id,
                invoice.id,
                RecordPaymentRequest::new(dec!(600.01), PaymentMethod::Check),
            )
            .await;
        assert_error_kind(result, ErrorKind::Conflict);

        let details = world.invoices.get_invoice(world.user.id, invoice.id).await.unwrap();
        assert_status(&details.invoice, InvoiceStatus::Sent);
        assert_eq!(details.payments.len(), 1);
        assert_money_eq(&details.balance_due(), dec!(600), Currency::USD);

        world.pay(invoice.id, dec!(600)).await;
        assert_status(&world.reload(invoice.id).await, InvoiceStatus::Paid);
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let world = TestWorld::new().await;
        let late = world
            .sent(world.request(date(2024, 1, 15), vec![ItemFixtures::hosting()]))
            .await;
        let current = world
            .sent(world.request(date(2024, 2, 20), vec![ItemFixtures::hosting()]))
            .await;

        assert_eq!(world.invoices.sweep_overdue(world.user.id).await.unwrap(), 1);
        assert_eq!(world.invoices.sweep_overdue(world.user.id).await.unwrap(), 0);

        assert_status(&world.reload(late.id).await, InvoiceStatus::Overdue);
        assert_status(&world.reload(current.id).await, InvoiceStatus::Sent);

        // overdue invoices still take payments
        world.pay(late.id, dec!(20)).await;
        assert_status(&world.reload(late.id).await, InvoiceStatus::Paid);
    }

    #[tokio::test]
    async fn test_duplicate_is_fresh_draft() {
        let world = TestWorld::new().await;
        let source = world
            .sent(
                world
                    .request(date(2024, 2, 1), vec![ItemFixtures::design(), ItemFixtures::hosting()])
                    .with_tax_rate(dec!(8.25))
                    .with_notes("Thanks!"),
            )
            .await;
        world.pay(source.id, dec!(100)).await;

        let copy = world.invoices.duplicate_invoice(world.user.id, source.id).await.unwrap();

        assert_ne!(copy.id, source.id);
        assert_ne!(copy.number, source.number);
        assert_status(&copy, InvoiceStatus::Draft);
        assert_eq!(copy.line_inputs(), source.line_inputs());
        assert_eq!(copy.total, source.total);
        assert_eq!(copy.issue_date, date(2024, 3, 1));
        assert_eq!(copy.due_date, date(2024, 3, 31));
        assert_eq!(copy.notes.as_deref(), Some("Thanks!"));

        let details = world.invoices.get_invoice(world.user.id, copy.id).await.unwrap();
        assert!(details.payments.is_empty());
    }

    #[tokio::test]
    async fn test_numbers_never_repeat_after_delete() {
        let world = TestWorld::new().await;
        let first = world.draft(world.request(date(2024, 3, 1), vec![ItemFixtures::hosting()])).await;
        world.invoices.delete_invoice(world.user.id, first.id).await.unwrap();
        let second = world.draft(world.request(date(2024, 3, 1), vec![ItemFixtures::hosting()])).await;

        assert_eq!(first.number, "INV-001");
        assert_eq!(second.number, "INV-002");
    }
}

mod recurring_workflow {
    use super::*;

    #[tokio::test]
    async fn test_backfill_then_idempotent() {
        let world = TestWorld::new().await;
        let template = RecurringTemplate::new(vec![ItemFixtures::retainer()], Currency::USD).with_tax_rate(dec!(10));
        let schedule = world
            .recurring
            .create_recurring(
                world.user.id,
                CreateRecurringRequest {
                    client_id: world.client.id,
                    frequency: Frequency::Monthly,
                    start_date: date(2024, 1, 1),
                    template,
                },
            )
            .await
            .unwrap();

        let first = world.recurring.materialize_due().await.unwrap();
        assert_eq!(first.invoices_created.len(), 3);
        assert!(first.failures.is_empty());

        let second = world.recurring.materialize_due().await.unwrap();
        assert!(second.invoices_created.is_empty());

        let invoices = world
            .port
            .find_invoices(world.user.id, &InvoiceQuery::by_client(world.client.id))
            .await
            .unwrap();
        assert_eq!(invoices.len(), 3);
        for invoice in &invoices {
            assert_totals(invoice, dec!(500), dec!(50), dec!(550));
            assert_eq!(invoice.recurring_source.map(|s| s.template_id), Some(schedule.id));
        }
        let mut issued: Vec<_> = invoices.iter().map(|i| i.issue_date).collect();
        issued.sort();
        assert_eq!(issued, vec![date(2024, 1, 1), date(2024, 2, 1), date(2024, 3, 1)]);
    }
}

mod insights_workflow {
    use super::*;

    async fn settle(world: &TestWorld, issued: chrono::NaiveDate, days: u64) {
        let invoice = world
            .sent(world.request(issued, vec![ItemFixtures::flat("Consulting", dec!(1000))]))
            .await;
        world
            .invoices
            .record_payment(
                world.user.id,
                invoice.id,
                RecordPaymentRequest::new(dec!(1000), PaymentMethod::BankTransfer)
                    .paid_at(noon(issued + Days::new(days))),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_prediction_from_history() {
        let world = TestWorld::new().await;
        let ledger = ledger(&world);
        let due = date(2024, 3, 31);

        let cold = ledger
            .insights
            .predict_payment_date(world.user.id, world.client.id, dec!(1000), due)
            .await
            .unwrap();
        assert_eq!(cold.confidence, 30);
        assert_eq!(cold.predicted_date, date(2024, 4, 3));

        settle(&world, date(2024, 1, 1), 5).await;
        settle(&world, date(2024, 1, 15), 10).await;
        settle(&world, date(2024, 2, 1), 15).await;

        let warm = ledger
            .insights
            .predict_payment_date(world.user.id, world.client.id, dec!(1000), due)
            .await
            .unwrap();
        assert!(warm.average_days > 5 && warm.average_days < 15);
        assert!(warm.confidence < 95);
        assert_eq!(warm.risk, PaymentRisk::Low);
    }

    #[tokio::test]
    async fn test_duplicate_detection_and_suggestions() {
        let world = TestWorld::new().await;
        let ledger = ledger(&world);
        let items = vec![ItemFixtures::design()];

        let candidate = DuplicateCandidate::new(world.client.id, dec!(1000), date(2024, 3, 1), items.clone());
        let empty = ledger.insights.detect_duplicate(world.user.id, &candidate).await.unwrap();
        assert!(!empty.is_duplicate);
        assert_eq!(empty.confidence, 95);

        let existing = world.draft(world.request(date(2024, 3, 1), items)).await;
        let check = ledger.insights.detect_duplicate(world.user.id, &candidate).await.unwrap();
        assert!(check.is_duplicate);
        assert_eq!(check.similar[0].invoice_id, existing.id);

        let suggestions = ledger
            .insights
            .suggest_line_items(world.user.id, world.client.id, None)
            .await
            .unwrap();
        assert_eq!(suggestions[0].description, "Design work");
        assert_eq!(suggestions[0].rate, dec!(100));
    }
}

mod reporting_workflow {
    use super::*;

    #[tokio::test]
    async fn test_reports_after_a_month_of_billing() {
        let world = TestWorld::new().await;
        let ledger = ledger(&world);

        let paid = world
            .sent(
                world
                    .request(date(2024, 2, 1), vec![ItemFixtures::flat("Build", dec!(1000))])
                    .with_tax_rate(dec!(10)),
            )
            .await;
        world
            .invoices
            .record_payment(
                world.user.id,
                paid.id,
                RecordPaymentRequest::new(dec!(1100), PaymentMethod::Card).paid_at(noon(date(2024, 2, 11))),
            )
            .await
            .unwrap();

        let partial = world
            .sent(world.request(date(2024, 2, 15), vec![ItemFixtures::flat("Support", dec!(500))]))
            .await;
        world
            .invoices
            .record_payment(
                world.user.id,
                partial.id,
                RecordPaymentRequest::new(dec!(200), PaymentMethod::BankTransfer).paid_at(noon(date(2024, 2, 20))),
            )
            .await
            .unwrap();

        world.draft(world.request(date(2024, 2, 28), vec![ItemFixtures::flat("Later", dec!(300))])).await;

        let report = ledger
            .reporting
            .aggregate_reports(world.user.id, ReportWindow::new(3).unwrap())
            .await
            .unwrap();

        assert_eq!(report.totals.total_invoiced, dec!(1600));
        assert_eq!(report.totals.total_payments, dec!(1300));
        assert_eq!(report.totals.outstanding, dec!(300));
        assert_eq!(report.totals.collection_rate, dec!(81.25));
        assert_eq!(report.average_days_to_pay, 10);

        let months: Vec<(&str, Decimal)> = report
            .monthly_revenue
            .iter()
            .map(|m| (m.month.as_str(), m.revenue))
            .collect();
        assert_eq!(months, vec![("2024-01", dec!(0)), ("2024-02", dec!(1300)), ("2024-03", dec!(0))]);

        assert_eq!(report.top_clients.len(), 1);
        assert_eq!(report.top_clients[0].client_name, "Acme Corp");

        let drafts = report
            .status_breakdown
            .iter()
            .find(|s| s.status == InvoiceStatus::Draft)
            .unwrap();
        assert_eq!((drafts.count, drafts.total), (1, dec!(300)));
    }
}

proptest! {
    #[test]
    fn test_totals_follow_items(items in line_items_strategy(6), tax_rate in tax_rate_strategy()) {
        let invoice = InvoiceBuilder::new().items(items.clone()).tax_rate(tax_rate).build();

        assert_totals_consistent(&invoice);
        for (item, input) in invoice.items.iter().zip(&items) {
            let exact = input.quantity * input.rate;
            prop_assert!((item.amount.amount() - exact).abs() <= dec!(0.005));
        }
        let exact_tax = invoice.subtotal.amount() * tax_rate / dec!(100);
        prop_assert!((invoice.tax.amount() - exact_tax).abs() <= dec!(0.005));
    }
}
