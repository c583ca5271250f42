//! Service-level tests for domain_invoicing against the in-memory adapter

use chrono::{Duration, NaiveDate};
use rust_decimal_macros::dec;
use std::sync::Arc;

use core_kernel::{Currency, FixedClock, UserId};

use domain_invoicing::adapters::{InMemoryInvoicingAdapter, RecordingNotifier};
use domain_invoicing::client::{Client, ClientDetails};
use domain_invoicing::invoice::{InvoiceStatus, LineItemInput};
use domain_invoicing::payment::{PayerInfo, PaymentMethod};
use domain_invoicing::ports::{InvoiceQuery, InvoicingPort};
use domain_invoicing::recurring::{Frequency, RecurringTemplate};
use domain_invoicing::services::{
    ClientService, CreateInvoiceRequest, CreateRecurringRequest, InvoiceService, RecordPaymentRequest,
    RecurringService, UpdateInvoiceRequest, UpdateRecurringRequest,
};
use domain_invoicing::{ErrorKind, InvoicingError, User};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

struct Harness {
    port: Arc<InMemoryInvoicingAdapter>,
    notifier: Arc<RecordingNotifier>,
    clock: Arc<FixedClock>,
    invoices: InvoiceService,
    recurring: RecurringService,
    clients: ClientService,
    user: User,
    client: Client,
}

async fn harness() -> Harness {
    let port = Arc::new(InMemoryInvoicingAdapter::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let clock = Arc::new(FixedClock::on(date(2024, 3, 1)));

    let invoices = InvoiceService::new(port.clone(), notifier.clone(), clock.clone());
    let recurring = RecurringService::new(port.clone(), invoices.clone(), clock.clone());
    let clients = ClientService::new(port.clone());

    let user = User::new("owner@studio.test", "Sam Owner", Currency::USD).with_business_name("Studio Nine");
    port.insert_user(&user).await.unwrap();
    let client = clients
        .create_client(user.id, ClientDetails::new("Acme Corp", "ap@acme.test"))
        .await
        .unwrap();

    Harness {
        port,
        notifier,
        clock,
        invoices,
        recurring,
        clients,
        user,
        client,
    }
}

fn consulting_request(h: &Harness) -> CreateInvoiceRequest {
    CreateInvoiceRequest::new(
        h.client.id,
        date(2024, 3, 1),
        date(2024, 3, 31),
        vec![LineItemInput::new("Consulting", dec!(1), dec!(1000))],
    )
    .with_tax_rate(dec!(10))
}

// ============================================================================
// Creation and numbering
// ============================================================================

mod creation_tests {
    use super::*;

    #[tokio::test]
    async fn test_numbers_are_sequential() {
        let h = harness().await;
        let first = h.invoices.create_invoice(h.user.id, consulting_request(&h)).await.unwrap();
        let second = h.invoices.create_invoice(h.user.id, consulting_request(&h)).await.unwrap();

        assert_eq!(first.number, "INV-001");
        assert_eq!(second.number, "INV-002");
        assert_eq!(h.port.get_user(h.user.id).await.unwrap().invoice_counter, 2);
    }

    #[tokio::test]
    async fn test_rejected_request_does_not_burn_a_number() {
        let h = harness().await;
        let bad = CreateInvoiceRequest::new(h.client.id, date(2024, 3, 1), date(2024, 3, 31), vec![]);
        assert!(h.invoices.create_invoice(h.user.id, bad).await.is_err());

        let ok = h.invoices.create_invoice(h.user.id, consulting_request(&h)).await.unwrap();
        assert_eq!(ok.number, "INV-001");
    }

    #[tokio::test]
    async fn test_create_as_sent_notifies_client() {
        let h = harness().await;
        let invoice = h
            .invoices
            .create_invoice(h.user.id, consulting_request(&h).sent())
            .await
            .unwrap();

        assert_eq!(invoice.status, InvoiceStatus::Sent);
        let messages = h.notifier.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].to, "ap@acme.test");
        assert!(messages[0].subject.contains("INV-001"));
        assert!(messages[0].subject.contains("Studio Nine"));
    }

    #[tokio::test]
    async fn test_create_rejects_paid_status() {
        let h = harness().await;
        let mut request = consulting_request(&h);
        request.status = InvoiceStatus::Paid;
        let err = h.invoices.create_invoice(h.user.id, request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_other_users_client_is_not_found() {
        let h = harness().await;
        let stranger = User::new("other@biz.test", "Other", Currency::USD);
        h.port.insert_user(&stranger).await.unwrap();

        let err = h
            .invoices
            .create_invoice(stranger.id, consulting_request(&h))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}

// ============================================================================
// Editing, deleting, cancelling
// ============================================================================

mod editing_tests {
    use super::*;

    #[tokio::test]
    async fn test_update_replaces_items_and_totals() {
        let h = harness().await;
        let invoice = h.invoices.create_invoice(h.user.id, consulting_request(&h)).await.unwrap();

        let updated = h
            .invoices
            .update_invoice(
                h.user.id,
                invoice.id,
                UpdateInvoiceRequest::items(vec![
                    LineItemInput::new("Design", dec!(2), dec!(50)),
                    LineItemInput::new("Hosting", dec!(1), dec!(25)),
                ])
                .with_tax_rate(dec!(0)),
            )
            .await
            .unwrap();

        assert_eq!(updated.items.len(), 2);
        assert_eq!(updated.total.amount(), dec!(125));
        assert_eq!(updated.number, invoice.number);
    }

    #[tokio::test]
    async fn test_update_unknown_invoice_is_not_found() {
        let h = harness().await;
        let err = h
            .invoices
            .update_invoice(h.user.id, core_kernel::InvoiceId::new(), UpdateInvoiceRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_update_below_amount_paid_is_rejected() {
        let h = harness().await;
        let invoice = h.invoices.create_invoice(h.user.id, consulting_request(&h).sent()).await.unwrap();
        h.invoices
            .record_payment(h.user.id, invoice.id, RecordPaymentRequest::new(dec!(800), PaymentMethod::Card))
            .await
            .unwrap();

        let err = h
            .invoices
            .update_invoice(
                h.user.id,
                invoice.id,
                UpdateInvoiceRequest::items(vec![LineItemInput::new("Discounted", dec!(1), dec!(500))]),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let stored = h.invoices.get_invoice(h.user.id, invoice.id).await.unwrap();
        assert_eq!(stored.invoice.total.amount(), dec!(1100));
    }

    #[tokio::test]
    async fn test_update_down_to_amount_paid_settles_invoice() {
        let h = harness().await;
        let invoice = h.invoices.create_invoice(h.user.id, consulting_request(&h).sent()).await.unwrap();
        h.invoices
            .record_payment(h.user.id, invoice.id, RecordPaymentRequest::new(dec!(660), PaymentMethod::Card))
            .await
            .unwrap();

        let updated = h
            .invoices
            .update_invoice(
                h.user.id,
                invoice.id,
                UpdateInvoiceRequest::items(vec![LineItemInput::new("Consulting", dec!(1), dec!(600))]),
            )
            .await
            .unwrap();
        assert_eq!(updated.total.amount(), dec!(660));
        assert_eq!(updated.status, InvoiceStatus::Paid);

        let details = h.invoices.get_invoice(h.user.id, invoice.id).await.unwrap();
        assert_eq!(details.invoice.status, InvoiceStatus::Paid);
        assert!(details.balance_due().is_zero());

        h.clock.advance_days(60);
        assert_eq!(h.invoices.sweep_overdue(h.user.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_invoice_cannot_be_edited() {
        let h = harness().await;
        let invoice = h.invoices.create_invoice(h.user.id, consulting_request(&h)).await.unwrap();
        h.invoices.cancel_invoice(h.user.id, invoice.id).await.unwrap();

        let err = h
            .invoices
            .update_invoice(h.user.id, invoice.id, UpdateInvoiceRequest::default().with_tax_rate(dec!(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, InvoicingError::InvoiceLocked { .. }));
    }

    #[tokio::test]
    async fn test_delete_removes_payments_first() {
        let h = harness().await;
        let invoice = h.invoices.create_invoice(h.user.id, consulting_request(&h).sent()).await.unwrap();
        h.invoices
            .record_payment(h.user.id, invoice.id, RecordPaymentRequest::new(dec!(100), PaymentMethod::Cash))
            .await
            .unwrap();

        // The port alone refuses while payments remain
        assert!(h.port.delete_invoice(h.user.id, invoice.id).await.unwrap_err().is_conflict());

        h.invoices.delete_invoice(h.user.id, invoice.id).await.unwrap();
        assert!(h.port.list_user_payments(h.user.id).await.unwrap().is_empty());
        assert_eq!(
            h.invoices.get_invoice(h.user.id, invoice.id).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_client_with_invoices_cannot_be_deleted() {
        let h = harness().await;
        h.invoices.create_invoice(h.user.id, consulting_request(&h)).await.unwrap();
        let err = h.clients.delete_client(h.user.id, h.client.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}

// ============================================================================
// Sending, reminders, duplication, overdue sweep
// ============================================================================

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_reminder_increments_count_and_keeps_status() {
        let h = harness().await;
        let invoice = h.invoices.create_invoice(h.user.id, consulting_request(&h)).await.unwrap();
        assert!(h.invoices.send_reminder(h.user.id, invoice.id).await.is_err());

        h.invoices.send_invoice(h.user.id, invoice.id).await.unwrap();
        let reminded = h.invoices.send_reminder(h.user.id, invoice.id).await.unwrap();

        assert_eq!(reminded.reminder_count, 1);
        assert_eq!(reminded.status, InvoiceStatus::Sent);
        let messages = h.notifier.messages().await;
        assert_eq!(messages.len(), 2);
        assert!(messages[1].subject.starts_with("Reminder"));
    }

    #[tokio::test]
    async fn test_duplicate_is_fresh_draft() {
        let h = harness().await;
        let source = h
            .invoices
            .create_invoice(h.user.id, consulting_request(&h).with_notes("Net 30").sent())
            .await
            .unwrap();
        h.invoices
            .record_payment(h.user.id, source.id, RecordPaymentRequest::new(dec!(100), PaymentMethod::Card))
            .await
            .unwrap();
        h.clock.advance_days(10);

        let copy = h.invoices.duplicate_invoice(h.user.id, source.id).await.unwrap();

        assert_eq!(copy.status, InvoiceStatus::Draft);
        assert_ne!(copy.id, source.id);
        assert_eq!(copy.number, "INV-002");
        assert_eq!(copy.issue_date, date(2024, 3, 11));
        assert_eq!(copy.due_date, date(2024, 3, 11) + Duration::days(30));
        assert_eq!(copy.notes.as_deref(), Some("Net 30"));
        assert_eq!(copy.tax_rate, source.tax_rate);
        assert_eq!(copy.line_inputs(), source.line_inputs());
        let details = h.invoices.get_invoice(h.user.id, copy.id).await.unwrap();
        assert!(details.payments.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_overdue_is_idempotent() {
        let h = harness().await;
        let invoice = h.invoices.create_invoice(h.user.id, consulting_request(&h).sent()).await.unwrap();
        h.invoices.create_invoice(h.user.id, consulting_request(&h)).await.unwrap();

        assert_eq!(h.invoices.sweep_overdue(h.user.id).await.unwrap(), 0);
        h.clock.advance_days(31);
        assert_eq!(h.invoices.sweep_overdue(h.user.id).await.unwrap(), 1);
        assert_eq!(h.invoices.sweep_overdue(h.user.id).await.unwrap(), 0);

        let overdue = h
            .invoices
            .list_invoices(h.user.id, &InvoiceQuery::all().with_statuses(vec![InvoiceStatus::Overdue]))
            .await
            .unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, invoice.id);
    }
}

// ============================================================================
// Payments
// ============================================================================

mod payment_tests {
    use super::*;

    #[tokio::test]
    async fn test_exact_balance_marks_paid() {
        let h = harness().await;
        let invoice = h.invoices.create_invoice(h.user.id, consulting_request(&h).sent()).await.unwrap();
        assert_eq!(invoice.total.amount(), dec!(1100));

        h.invoices
            .record_payment(
                h.user.id,
                invoice.id,
                RecordPaymentRequest::new(dec!(1100), PaymentMethod::BankTransfer).with_reference("TRX-1"),
            )
            .await
            .unwrap();

        let details = h.invoices.get_invoice(h.user.id, invoice.id).await.unwrap();
        assert_eq!(details.invoice.status, InvoiceStatus::Paid);
        assert!(details.balance_due().is_zero());
    }

    #[tokio::test]
    async fn test_partial_payments_keep_sent_until_settled() {
        let h = harness().await;
        let invoice = h.invoices.create_invoice(h.user.id, consulting_request(&h).sent()).await.unwrap();

        h.invoices
            .record_payment(h.user.id, invoice.id, RecordPaymentRequest::new(dec!(600), PaymentMethod::Card))
            .await
            .unwrap();
        let details = h.invoices.get_invoice(h.user.id, invoice.id).await.unwrap();
        assert_eq!(details.invoice.status, InvoiceStatus::Sent);
        assert_eq!(details.balance_due().amount(), dec!(500));

        h.invoices
            .record_payment(h.user.id, invoice.id, RecordPaymentRequest::new(dec!(500), PaymentMethod::Card))
            .await
            .unwrap();
        let details = h.invoices.get_invoice(h.user.id, invoice.id).await.unwrap();
        assert_eq!(details.invoice.status, InvoiceStatus::Paid);
        assert_eq!(details.payments.len(), 2);
    }

    #[tokio::test]
    async fn test_overpayment_is_rejected_and_invoice_unchanged() {
        let h = harness().await;
        let invoice = h.invoices.create_invoice(h.user.id, consulting_request(&h).sent()).await.unwrap();

        let err = h
            .invoices
            .record_payment(h.user.id, invoice.id, RecordPaymentRequest::new(dec!(1100.01), PaymentMethod::Card))
            .await
            .unwrap_err();
        assert!(matches!(err, InvoicingError::ExceedsBalance { .. }));

        let details = h.invoices.get_invoice(h.user.id, invoice.id).await.unwrap();
        assert_eq!(details.invoice.status, InvoiceStatus::Sent);
        assert!(details.payments.is_empty());
    }

    #[tokio::test]
    async fn test_payment_on_draft_is_rejected() {
        let h = harness().await;
        let invoice = h.invoices.create_invoice(h.user.id, consulting_request(&h)).await.unwrap();
        let err = h
            .invoices
            .record_payment(h.user.id, invoice.id, RecordPaymentRequest::new(dec!(10), PaymentMethod::Cash))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_zero_payment_is_invalid() {
        let h = harness().await;
        let invoice = h.invoices.create_invoice(h.user.id, consulting_request(&h).sent()).await.unwrap();
        let err = h
            .invoices
            .record_payment(h.user.id, invoice.id, RecordPaymentRequest::new(dec!(0), PaymentMethod::Cash))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_overdue_invoice_can_be_paid_online() {
        let h = harness().await;
        let invoice = h.invoices.create_invoice(h.user.id, consulting_request(&h).sent()).await.unwrap();
        h.invoices
            .record_payment(h.user.id, invoice.id, RecordPaymentRequest::new(dec!(100), PaymentMethod::Cash))
            .await
            .unwrap();
        h.clock.advance_days(45);
        h.invoices.sweep_overdue(h.user.id).await.unwrap();

        let payment = h
            .invoices
            .process_online_payment(h.user.id, invoice.id, PaymentMethod::Card, PayerInfo::new("Jo", "jo@acme.test"))
            .await
            .unwrap();

        assert_eq!(payment.amount.amount(), dec!(1000));
        assert!(payment.reference.unwrap().starts_with("pay_"));
        let details = h.invoices.get_invoice(h.user.id, invoice.id).await.unwrap();
        assert_eq!(details.invoice.status, InvoiceStatus::Paid);
    }

    #[tokio::test]
    async fn test_online_payment_on_paid_invoice_is_rejected() {
        let h = harness().await;
        let invoice = h.invoices.create_invoice(h.user.id, consulting_request(&h).sent()).await.unwrap();
        h.invoices
            .process_online_payment(h.user.id, invoice.id, PaymentMethod::Card, PayerInfo::default())
            .await
            .unwrap();

        let err = h
            .invoices
            .process_online_payment(h.user.id, invoice.id, PaymentMethod::Card, PayerInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, InvoicingError::ActionNotAllowed { status: InvoiceStatus::Paid, .. }));
    }

    #[tokio::test]
    async fn test_concurrent_payments_cannot_overshoot() {
        let h = harness().await;
        let invoice = h.invoices.create_invoice(h.user.id, consulting_request(&h).sent()).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..5 {
            let service = h.invoices.clone();
            let user_id = h.user.id;
            let invoice_id = invoice.id;
            handles.push(tokio::spawn(async move {
                service
                    .record_payment(user_id, invoice_id, RecordPaymentRequest::new(dec!(400), PaymentMethod::Card))
                    .await
            }));
        }
        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 2);
        let details = h.invoices.get_invoice(h.user.id, invoice.id).await.unwrap();
        assert_eq!(details.reconciliation.total_paid.amount(), dec!(800));
    }
}

// ============================================================================
// Recurring
// ============================================================================

mod recurring_tests {
    use super::*;

    fn retainer(h: &Harness, start: NaiveDate) -> CreateRecurringRequest {
        CreateRecurringRequest {
            client_id: h.client.id,
            frequency: Frequency::Monthly,
            start_date: start,
            template: RecurringTemplate::new(vec![LineItemInput::new("Retainer", dec!(1), dec!(500))], Currency::USD)
                .with_tax_rate(dec!(10))
                .with_due_in_days(14),
        }
    }

    #[tokio::test]
    async fn test_materializes_each_missed_cycle_once() {
        let h = harness().await;
        let rec = h.recurring.create_recurring(h.user.id, retainer(&h, date(2024, 1, 15))).await.unwrap();

        let report = h.recurring.materialize_due().await.unwrap();
        assert_eq!(report.invoices_created.len(), 2);
        assert!(report.failures.is_empty());

        let invoices = h.invoices.list_invoices(h.user.id, &InvoiceQuery::all()).await.unwrap();
        let mut issue_dates: Vec<NaiveDate> = invoices.iter().map(|i| i.issue_date).collect();
        issue_dates.sort();
        assert_eq!(issue_dates, vec![date(2024, 1, 15), date(2024, 2, 15)]);
        assert!(invoices.iter().all(|i| i.total.amount() == dec!(550)));
        assert!(invoices.iter().all(|i| i.due_date == i.issue_date + Duration::days(14)));

        let stored = h.port.get_recurring(h.user.id, rec.id).await.unwrap();
        assert_eq!(stored.next_date, date(2024, 3, 15));
        assert_eq!(stored.cycles_generated, 2);

        let again = h.recurring.materialize_due().await.unwrap();
        assert!(again.invoices_created.is_empty());
    }

    #[tokio::test]
    async fn test_template_currency_must_match_account() {
        let h = harness().await;
        let mut request = retainer(&h, date(2024, 1, 1));
        request.template.currency = Currency::JPY;

        let err = h.recurring.create_recurring(h.user.id, request).await.unwrap_err();
        match err {
            InvoicingError::Validation { field, .. } => assert_eq!(field.as_deref(), Some("template.currency")),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(h.recurring.list_recurring(h.user.id).await.unwrap().is_empty());

        let rec = h.recurring.create_recurring(h.user.id, retainer(&h, date(2024, 3, 1))).await.unwrap();
        let mut yen = rec.template.clone();
        yen.currency = Currency::JPY;
        let err = h
            .recurring
            .update_recurring(h.user.id, rec.id, UpdateRecurringRequest { frequency: None, template: Some(yen) })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        h.recurring.materialize_due().await.unwrap();
        let invoices = h.invoices.list_invoices(h.user.id, &InvoiceQuery::all()).await.unwrap();
        assert!(invoices.iter().all(|i| i.currency == Currency::USD));
    }

    #[tokio::test]
    async fn test_paused_template_is_skipped() {
        let h = harness().await;
        let rec = h.recurring.create_recurring(h.user.id, retainer(&h, date(2024, 2, 1))).await.unwrap();
        h.recurring.set_active(h.user.id, rec.id, false).await.unwrap();

        let report = h.recurring.materialize_due().await.unwrap();
        assert_eq!(report.templates_processed, 0);

        h.clock.advance_days(40);
        let resumed = h.recurring.set_active(h.user.id, rec.id, true).await.unwrap();
        assert_eq!(resumed.next_date, date(2024, 5, 1));
    }

    #[tokio::test]
    async fn test_auto_send_sends_materialized_invoice() {
        let h = harness().await;
        let mut request = retainer(&h, date(2024, 3, 1));
        request.template = request.template.with_auto_send(true);
        h.recurring.create_recurring(h.user.id, request).await.unwrap();

        h.recurring.materialize_due().await.unwrap();
        let invoices = h.invoices.list_invoices(h.user.id, &InvoiceQuery::all()).await.unwrap();
        assert_eq!(invoices.len(), 1);
        assert_eq!(invoices[0].status, InvoiceStatus::Sent);
        assert_eq!(h.notifier.messages().await.len(), 1);
    }

    #[tokio::test]
    async fn test_frequency_change_keeps_pending_date() {
        let h = harness().await;
        let rec = h.recurring.create_recurring(h.user.id, retainer(&h, date(2024, 3, 1))).await.unwrap();
        h.recurring.materialize_due().await.unwrap();

        let updated = h
            .recurring
            .update_recurring(
                h.user.id,
                rec.id,
                UpdateRecurringRequest {
                    frequency: Some(Frequency::Weekly),
                    template: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.next_date, date(2024, 4, 1));

        h.clock.advance_days(38);
        let report = h.recurring.materialize_due().await.unwrap();
        assert_eq!(report.invoices_created.len(), 2);
        let stored = h.port.get_recurring(h.user.id, rec.id).await.unwrap();
        assert_eq!(stored.next_date, date(2024, 4, 15));
    }

    #[tokio::test]
    async fn test_delete_recurring() {
        let h = harness().await;
        let rec = h.recurring.create_recurring(h.user.id, retainer(&h, date(2024, 6, 1))).await.unwrap();
        assert_eq!(h.recurring.list_recurring(h.user.id).await.unwrap().len(), 1);
        h.recurring.delete_recurring(h.user.id, rec.id).await.unwrap();
        assert!(h.recurring.list_recurring(h.user.id).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let h = harness().await;
    let err = h.invoices.sweep_overdue(UserId::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
