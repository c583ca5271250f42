//! Ledgerlight - small-business invoicing core
//!
//! Facade over the workspace crates:
//!
//! - [`kernel`]: money, identifiers, clocks and port plumbing
//! - [`invoicing`]: clients, the invoice lifecycle, payments and recurring schedules
//! - [`insights`]: payment-date prediction, line-item suggestions and duplicate detection
//! - [`reporting`]: revenue and collection analytics
//!
//! [`Ledger`] wires every service to one persistence port, one notifier and
//! one clock. The PostgreSQL adapter lives in `infra_db` and the background
//! jobs in `interface_worker`.

use std::sync::Arc;

pub use core_kernel as kernel;
pub use domain_insights as insights;
pub use domain_invoicing as invoicing;
pub use domain_reporting as reporting;

use core_kernel::Clock;
use domain_insights::InsightsService;
use domain_invoicing::services::{ClientService, InvoiceService, RecurringService};
use domain_invoicing::{InvoicingPort, NotificationPort};
use domain_reporting::ReportingService;

/// Every application service over shared collaborators
#[derive(Clone)]
pub struct Ledger {
    pub clients: ClientService,
    pub invoices: InvoiceService,
    pub recurring: RecurringService,
    pub insights: InsightsService,
    pub reporting: ReportingService,
}

impl Ledger {
    pub fn new(port: Arc<dyn InvoicingPort>, notifier: Arc<dyn NotificationPort>, clock: Arc<dyn Clock>) -> Self {
        let invoices = InvoiceService::new(port.clone(), notifier, clock.clone());
        Self {
            clients: ClientService::new(port.clone()),
            recurring: RecurringService::new(port.clone(), invoices.clone(), clock.clone()),
            insights: InsightsService::new(port.clone(), clock.clone()),
            reporting: ReportingService::new(port, clock),
            invoices,
        }
    }
}
