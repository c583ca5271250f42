//! Recurring templates and their materialization into invoices

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

use core_kernel::{ClientId, Clock, InvoiceId, RecurringInvoiceId, UserId};

use crate::error::InvoicingError;
use crate::ports::InvoicingPort;
use crate::recurring::{Frequency, RecurringInvoice, RecurringTemplate};
use crate::services::InvoiceService;
use crate::user::User;

/// Input for `RecurringService::create_recurring`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecurringRequest {
    pub client_id: ClientId,
    pub frequency: Frequency,
    /// Date of the first invoice
    pub start_date: NaiveDate,
    pub template: RecurringTemplate,
}

/// Partial edit of a recurring schedule
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRecurringRequest {
    pub frequency: Option<Frequency>,
    pub template: Option<RecurringTemplate>,
}

/// A template that could not be materialized during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializationFailure {
    pub recurring_id: RecurringInvoiceId,
    pub user_id: UserId,
    pub error: String,
}

/// Outcome of one materialization run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializationReport {
    pub templates_processed: usize,
    pub invoices_created: Vec<InvoiceId>,
    /// Cycles whose invoice already existed
    pub skipped_existing: usize,
    pub failures: Vec<MaterializationFailure>,
}

/// Manages recurring schedules and turns due cycles into invoices
#[derive(Clone)]
pub struct RecurringService {
    port: Arc<dyn InvoicingPort>,
    invoices: InvoiceService,
    clock: Arc<dyn Clock>,
}

impl RecurringService {
    pub fn new(port: Arc<dyn InvoicingPort>, invoices: InvoiceService, clock: Arc<dyn Clock>) -> Self {
        Self { port, invoices, clock }
    }

    #[instrument(skip(self, request), fields(client_id = %request.client_id, frequency = %request.frequency))]
    pub async fn create_recurring(
        &self,
        user_id: UserId,
        request: CreateRecurringRequest,
    ) -> Result<RecurringInvoice, InvoicingError> {
        let user = self.port.get_user(user_id).await?;
        self.port.get_client(user_id, request.client_id).await?;
        request.template.ensure_currency(user.currency)?;
        let recurring = RecurringInvoice::new(
            user_id,
            request.client_id,
            request.frequency,
            request.start_date,
            request.template,
            self.clock.now(),
        )?;
        self.port.insert_recurring(&recurring).await?;
        info!(
            recurring_id = %recurring.id,
            next_date = %recurring.next_date,
            estimated_total = %recurring.template.estimated_total(),
            "Recurring invoice created"
        );
        Ok(recurring)
    }

    /// Changes cadence and/or template content; already issued invoices are untouched
    #[instrument(skip(self, request))]
    pub async fn update_recurring(
        &self,
        user_id: UserId,
        id: RecurringInvoiceId,
        request: UpdateRecurringRequest,
    ) -> Result<RecurringInvoice, InvoicingError> {
        let mut recurring = self.port.get_recurring(user_id, id).await?;
        let now = self.clock.now();
        if let Some(frequency) = request.frequency {
            recurring.change_frequency(frequency, now);
        }
        if let Some(template) = request.template {
            template.validate()?;
            let user = self.port.get_user(user_id).await?;
            template.ensure_currency(user.currency)?;
            recurring.template = template;
            recurring.updated_at = now;
        }
        self.port.update_recurring(&recurring).await?;
        Ok(recurring)
    }

    /// Pauses or resumes a schedule
    ///
    /// Resuming skips the cycles that fell inside the pause.
    #[instrument(skip(self))]
    pub async fn set_active(
        &self,
        user_id: UserId,
        id: RecurringInvoiceId,
        active: bool,
    ) -> Result<RecurringInvoice, InvoicingError> {
        let mut recurring = self.port.get_recurring(user_id, id).await?;
        let now = self.clock.now();
        if active {
            let user = self.port.get_user(user_id).await?;
            recurring.resume(user.timezone.today(self.clock.as_ref()), now)?;
        } else {
            recurring.pause(now);
        }
        self.port.update_recurring(&recurring).await?;
        info!(recurring_id = %id, active, next_date = %recurring.next_date, "Recurring invoice toggled");
        Ok(recurring)
    }

    #[instrument(skip(self))]
    pub async fn delete_recurring(&self, user_id: UserId, id: RecurringInvoiceId) -> Result<(), InvoicingError> {
        self.port.delete_recurring(user_id, id).await?;
        info!(recurring_id = %id, "Recurring invoice deleted");
        Ok(())
    }

    pub async fn list_recurring(&self, user_id: UserId) -> Result<Vec<RecurringInvoice>, InvoicingError> {
        Ok(self.port.list_recurring(user_id).await?)
    }

    /// Materializes every due cycle of every active template
    ///
    /// Due-ness is judged against each owner's local date. A template that
    /// fails is recorded in the report and the run continues with the next.
    #[instrument(skip(self))]
    pub async fn materialize_due(&self) -> Result<MaterializationReport, InvoicingError> {
        // Owners east of UTC may already be on the next day
        let horizon = self
            .clock
            .today()
            .checked_add_days(Days::new(1))
            .ok_or_else(|| InvoicingError::validation("Date is out of range"))?;
        let candidates = self.port.list_due_recurring(horizon).await?;

        let mut report = MaterializationReport::default();
        let mut users: HashMap<UserId, User> = HashMap::new();

        for recurring in candidates {
            let user = match users.get(&recurring.user_id) {
                Some(user) => user.clone(),
                None => match self.port.get_user(recurring.user_id).await {
                    Ok(user) => {
                        users.insert(user.id, user.clone());
                        user
                    }
                    Err(err) => {
                        report.failures.push(failure(&recurring, &InvoicingError::from(err)));
                        continue;
                    }
                },
            };

            let today = user.timezone.today(self.clock.as_ref());
            if !recurring.is_due(today) {
                continue;
            }

            report.templates_processed += 1;
            let id = recurring.id;
            if let Err(err) = self.materialize_template(&user, recurring.clone(), today, &mut report).await {
                error!(recurring_id = %id, error = %err, "Recurring materialization failed");
                report.failures.push(failure(&recurring, &err));
            }
        }

        info!(
            templates = report.templates_processed,
            created = report.invoices_created.len(),
            skipped = report.skipped_existing,
            failed = report.failures.len(),
            "Recurring materialization finished"
        );
        Ok(report)
    }

    async fn materialize_template(
        &self,
        user: &User,
        mut recurring: RecurringInvoice,
        today: NaiveDate,
        report: &mut MaterializationReport,
    ) -> Result<(), InvoicingError> {
        let client = self.port.get_client(user.id, recurring.client_id).await?;

        while recurring.is_due(today) {
            let source = recurring.pending_source();
            if self.port.find_by_recurring_source(user.id, source).await?.is_some() {
                debug!(recurring_id = %recurring.id, cycle = source.cycle, "Cycle already materialized");
                report.skipped_existing += 1;
            } else {
                let draft = recurring.draft_for_next_cycle()?;
                let invoice = self
                    .invoices
                    .issue(user, &client, draft, recurring.template.auto_send)
                    .await?;
                report.invoices_created.push(invoice.id);
            }

            recurring.advance(self.clock.now())?;
            self.port.update_recurring(&recurring).await?;
        }
        Ok(())
    }
}

fn failure(recurring: &RecurringInvoice, err: &InvoicingError) -> MaterializationFailure {
    MaterializationFailure {
        recurring_id: recurring.id,
        user_id: recurring.user_id,
        error: err.to_string(),
    }
}
