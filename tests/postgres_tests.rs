//! PostgreSQL parity tests
//!
//! The same workflows as the in-memory integration tests, run through
//! `PostgresInvoicingAdapter`. Skipped unless `TEST_DATABASE_URL` is set.

use std::sync::Arc;

use rust_decimal_macros::dec;

use core_kernel::{FixedClock, HealthCheckable};
use infra_db::{DatabasePool, PostgresInvoicingAdapter};
use ledgerlight::invoicing::adapters::RecordingNotifier;
use ledgerlight::invoicing::services::{
    CreateInvoiceRequest, CreateRecurringRequest, RecordPaymentRequest, UpdateInvoiceRequest,
};
use ledgerlight::invoicing::{
    Client, ClientDetails, ErrorKind, Frequency, InvoiceQuery, InvoiceStatus, InvoicingPort, PaymentMethod,
    RecurringTemplate, User,
};
use ledgerlight::kernel::Currency;
use ledgerlight::Ledger;
use test_utils::{
    assert_error_kind, assert_status, assert_totals, date, unique_email, with_test_database, DateFixtures,
    ItemFixtures,
};

struct PgWorld {
    port: Arc<PostgresInvoicingAdapter>,
    ledger: Ledger,
    user: User,
    client: Client,
}

async fn world(pool: &DatabasePool) -> PgWorld {
    let port = Arc::new(PostgresInvoicingAdapter::new(pool.clone()));
    let clock = Arc::new(FixedClock::on(DateFixtures::today()));
    let ledger = Ledger::new(port.clone(), Arc::new(RecordingNotifier::new()), clock);

    let user = User::new(unique_email("owner"), "Sam Owner", Currency::USD);
    port.insert_user(&user).await.unwrap();
    let client = ledger
        .clients
        .create_client(user.id, ClientDetails::new("Acme Corp", "ap@acme.test"))
        .await
        .unwrap();

    PgWorld {
        port,
        ledger,
        user,
        client,
    }
}

#[tokio::test]
async fn test_health_check() {
    with_test_database!(db => {
        let adapter = PostgresInvoicingAdapter::new(db.pool().clone());
        let health = adapter.health_check().await;
        assert_eq!(health.adapter_id, "postgres-invoicing-adapter");
        assert!(health.message.is_none());
    });
}

#[tokio::test]
async fn test_invoice_round_trip_and_payment() {
    with_test_database!(db => {
        let w = world(db.pool()).await;
        let request = CreateInvoiceRequest::new(
            w.client.id,
            date(2024, 3, 1),
            date(2024, 3, 31),
            vec![ItemFixtures::design(), ItemFixtures::hosting()],
        )
        .with_tax_rate(dec!(10))
        .with_notes("Net 30")
        .sent();
        let created = w.ledger.invoices.create_invoice(w.user.id, request).await.unwrap();

        let stored = w.port.get_invoice(w.user.id, created.id).await.unwrap();
        assert_eq!(stored.number, "INV-001");
        assert_eq!(stored.items.len(), 2);
        assert_eq!(stored.items[0].description, "Design work");
        assert_totals(&stored, dec!(1020), dec!(102), dec!(1122));
        assert_eq!(stored.notes.as_deref(), Some("Net 30"));
        assert!(stored.sent_at.is_some());

        let over = w
            .ledger
            .invoices
            .record_payment(w.user.id, created.id, RecordPaymentRequest::new(dec!(1200), PaymentMethod::Card))
            .await;
        assert_error_kind(over, ErrorKind::Conflict);

        w.ledger
            .invoices
            .record_payment(w.user.id, created.id, RecordPaymentRequest::new(dec!(1122), PaymentMethod::Card))
            .await
            .unwrap();
        let details = w.ledger.invoices.get_invoice(w.user.id, created.id).await.unwrap();
        assert_status(&details.invoice, InvoiceStatus::Paid);
        assert!(details.balance_due().is_zero());
    });
}

#[tokio::test]
async fn test_update_replaces_items() {
    with_test_database!(db => {
        let w = world(db.pool()).await;
        let request = CreateInvoiceRequest::new(
            w.client.id,
            date(2024, 3, 1),
            date(2024, 3, 31),
            vec![ItemFixtures::design()],
        );
        let created = w.ledger.invoices.create_invoice(w.user.id, request).await.unwrap();

        w.ledger
            .invoices
            .update_invoice(w.user.id, created.id, UpdateInvoiceRequest::items(vec![ItemFixtures::hosting()]))
            .await
            .unwrap();

        let stored = w.port.get_invoice(w.user.id, created.id).await.unwrap();
        assert_eq!(stored.items.len(), 1);
        assert_totals(&stored, dec!(20), dec!(0), dec!(20));
    });
}

#[tokio::test]
async fn test_sweep_and_client_delete_guard() {
    with_test_database!(db => {
        let w = world(db.pool()).await;
        let request = CreateInvoiceRequest::new(
            w.client.id,
            date(2024, 1, 15),
            date(2024, 2, 14),
            vec![ItemFixtures::hosting()],
        )
        .sent();
        let late = w.ledger.invoices.create_invoice(w.user.id, request).await.unwrap();

        assert_eq!(w.ledger.invoices.sweep_overdue(w.user.id).await.unwrap(), 1);
        assert_eq!(w.ledger.invoices.sweep_overdue(w.user.id).await.unwrap(), 0);
        assert_status(&w.port.get_invoice(w.user.id, late.id).await.unwrap(), InvoiceStatus::Overdue);

        let blocked = w.ledger.clients.delete_client(w.user.id, w.client.id).await;
        assert_error_kind(blocked, ErrorKind::Conflict);
    });
}

#[tokio::test]
async fn test_recurring_materializes_once_per_cycle() {
    with_test_database!(db => {
        let w = world(db.pool()).await;
        let template = RecurringTemplate::new(vec![ItemFixtures::retainer()], Currency::USD);
        let schedule = w
            .ledger
            .recurring
            .create_recurring(
                w.user.id,
                CreateRecurringRequest {
                    client_id: w.client.id,
                    frequency: Frequency::Monthly,
                    start_date: date(2024, 1, 1),
                    template,
                },
            )
            .await
            .unwrap();

        // other tests share the database, so only this user's rows are checked
        w.ledger.recurring.materialize_due().await.unwrap();
        w.ledger.recurring.materialize_due().await.unwrap();

        let invoices = w
            .port
            .find_invoices(w.user.id, &InvoiceQuery::by_client(w.client.id))
            .await
            .unwrap();
        assert_eq!(invoices.len(), 3);
        assert!(invoices
            .iter()
            .all(|invoice| invoice.recurring_source.map(|s| s.template_id) == Some(schedule.id)));

        let stored = w.port.get_recurring(w.user.id, schedule.id).await.unwrap();
        assert_eq!(stored.next_date, date(2024, 4, 1));
    });
}

#[tokio::test]
async fn test_other_users_rows_are_invisible() {
    with_test_database!(db => {
        let w = world(db.pool()).await;
        let other = world(db.pool()).await;

        let foreign = w
            .ledger
            .invoices
            .list_invoices(other.user.id, &InvoiceQuery::by_client(w.client.id))
            .await
            .unwrap();
        assert!(foreign.is_empty());

        let err = w.port.get_client(other.user.id, w.client.id).await.unwrap_err();
        assert!(err.is_not_found());
    });
}
