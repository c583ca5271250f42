//! Reporting service

use std::sync::Arc;

use tracing::{info, instrument};

use core_kernel::{Clock, UserId};
use domain_invoicing::{InvoiceQuery, InvoicingPort};

use crate::aggregate::{build_report, ReportBundle, ReportWindow};
use crate::error::ReportingError;

/// Builds report bundles from the owner's stored records
#[derive(Clone)]
pub struct ReportingService {
    port: Arc<dyn InvoicingPort>,
    clock: Arc<dyn Clock>,
}

impl ReportingService {
    pub fn new(port: Arc<dyn InvoicingPort>, clock: Arc<dyn Clock>) -> Self {
        Self { port, clock }
    }

    /// Aggregates every report for `user_id` over `window`
    ///
    /// The window ends with the current month in the owner's timezone.
    #[instrument(skip(self))]
    pub async fn aggregate_reports(
        &self,
        user_id: UserId,
        window: ReportWindow,
    ) -> Result<ReportBundle, ReportingError> {
        let window = ReportWindow::new(window.months)?;
        let user = self.port.get_user(user_id).await?;
        let invoices = self.port.find_invoices(user_id, &InvoiceQuery::all()).await?;
        let payments = self.port.list_user_payments(user_id).await?;
        let clients = self.port.list_clients(user_id).await?;

        let today = user.timezone.today(self.clock.as_ref());
        let bundle = build_report(user.currency, &user.timezone, &invoices, &payments, &clients, window, today);
        info!(
            invoices = invoices.len(),
            payments = payments.len(),
            collection_rate = %bundle.totals.collection_rate,
            "Reports aggregated"
        );
        Ok(bundle)
    }
}
