//! In-memory service harness
//!
//! Wires the invoicing services to one `InMemoryInvoicingAdapter`, a
//! `RecordingNotifier` and a `FixedClock` set to `DateFixtures::today()`.
//! A user and one client are created up front. Insights and reporting
//! services can be built over `port` and `clock`.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use core_kernel::{FixedClock, InvoiceId};
use domain_invoicing::adapters::{InMemoryInvoicingAdapter, RecordingNotifier};
use domain_invoicing::services::{
    ClientService, CreateInvoiceRequest, InvoiceService, RecordPaymentRequest, RecurringService,
};
use domain_invoicing::{Client, ClientDetails, Invoice, InvoicingPort, LineItemInput, PaymentMethod, User};

use crate::fixtures::{DateFixtures, AccountFixtures};

pub struct TestWorld {
    pub port: Arc<InMemoryInvoicingAdapter>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<FixedClock>,
    pub invoices: InvoiceService,
    pub recurring: RecurringService,
    pub clients: ClientService,
    pub user: User,
    pub client: Client,
}

impl TestWorld {
    /// A world owned by `AccountFixtures::owner()` with client `AccountFixtures::acme()`
    pub async fn new() -> Self {
        Self::for_user(AccountFixtures::owner()).await
    }

    pub async fn for_user(user: User) -> Self {
        let port = Arc::new(InMemoryInvoicingAdapter::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let clock = Arc::new(FixedClock::on(DateFixtures::today()));

        let invoices = InvoiceService::new(port.clone(), notifier.clone(), clock.clone());
        let recurring = RecurringService::new(port.clone(), invoices.clone(), clock.clone());
        let clients = ClientService::new(port.clone());

        port.insert_user(&user).await.expect("insert fixture user");
        let client = clients
            .create_client(user.id, AccountFixtures::acme())
            .await
            .expect("create fixture client");

        Self {
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

    /// Adds another client for the world's user
    pub async fn add_client(&self, details: ClientDetails) -> Client {
        self.clients
            .create_client(self.user.id, details)
            .await
            .expect("create client")
    }

    /// A request for the world's client, issued on `issue` and due net-30
    pub fn request(&self, issue: NaiveDate, items: Vec<LineItemInput>) -> CreateInvoiceRequest {
        CreateInvoiceRequest::new(self.client.id, issue, DateFixtures::net_30(issue), items)
    }

    /// Creates a draft invoice
    pub async fn draft(&self, request: CreateInvoiceRequest) -> Invoice {
        self.invoices
            .create_invoice(self.user.id, request)
            .await
            .expect("create draft invoice")
    }

    /// Creates an invoice and sends it
    pub async fn sent(&self, request: CreateInvoiceRequest) -> Invoice {
        self.invoices
            .create_invoice(self.user.id, request.sent())
            .await
            .expect("create sent invoice")
    }

    /// Records a bank transfer of `amount`
    pub async fn pay(&self, invoice_id: InvoiceId, amount: Decimal) {
        self.invoices
            .record_payment(
                self.user.id,
                invoice_id,
                RecordPaymentRequest::new(amount, PaymentMethod::BankTransfer),
            )
            .await
            .expect("record payment");
    }

    /// Re-reads an invoice from the store
    pub async fn reload(&self, invoice_id: InvoiceId) -> Invoice {
        self.port
            .get_invoice(self.user.id, invoice_id)
            .await
            .expect("reload invoice")
    }
}
