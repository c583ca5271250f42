//! Periodic jobs
//!
//! One tick does two things, in this order:
//!
//! 1. materializes every due recurring cycle
//! 2. sweeps each user's past-due sent invoices to overdue
//!
//! Cycles backfilled in step 1 may already be past due, so the sweep runs
//! second to catch them in the same tick. A failing user or template is
//! logged and skipped; a tick never aborts half-way.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument, warn};

use core_kernel::{Clock, UserId};
use domain_invoicing::services::{InvoiceService, MaterializationReport, RecurringService};
use domain_invoicing::{InvoicingPort, NotificationPort};

/// A user whose overdue sweep failed during a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepFailure {
    pub user_id: UserId,
    pub error: String,
}

/// What one tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub users_swept: usize,
    pub invoices_marked_overdue: u64,
    pub sweep_failures: Vec<SweepFailure>,
    /// `None` when the recurring run itself could not start
    pub materialization: Option<MaterializationReport>,
}

impl TickReport {
    pub fn invoices_created(&self) -> usize {
        self.materialization
            .as_ref()
            .map_or(0, |report| report.invoices_created.len())
    }

    /// Whether anything in the tick failed
    pub fn has_failures(&self) -> bool {
        !self.sweep_failures.is_empty()
            || self
                .materialization
                .as_ref()
                .map_or(true, |report| !report.failures.is_empty())
    }
}

/// Runs the background jobs against one invoicing port
#[derive(Clone)]
pub struct Scheduler {
    port: Arc<dyn InvoicingPort>,
    invoices: InvoiceService,
    recurring: RecurringService,
}

impl Scheduler {
    pub fn new(port: Arc<dyn InvoicingPort>, notifier: Arc<dyn NotificationPort>, clock: Arc<dyn Clock>) -> Self {
        let invoices = InvoiceService::new(port.clone(), notifier, clock.clone());
        let recurring = RecurringService::new(port.clone(), invoices.clone(), clock);
        Self {
            port,
            invoices,
            recurring,
        }
    }

    /// Runs both jobs once
    #[instrument(skip(self))]
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();

        match self.recurring.materialize_due().await {
            Ok(materialization) => report.materialization = Some(materialization),
            Err(err) => error!(error = %err, "Recurring materialization could not run"),
        }

        let users = match self.port.list_users().await {
            Ok(users) => users,
            Err(err) => {
                error!(error = %err, "Could not list users for the overdue sweep");
                return report;
            }
        };

        for user in users {
            match self.invoices.sweep_overdue(user.id).await {
                Ok(flipped) => {
                    report.users_swept += 1;
                    report.invoices_marked_overdue += flipped;
                }
                Err(err) => {
                    warn!(user_id = %user.id, error = %err, "Overdue sweep failed");
                    report.sweep_failures.push(SweepFailure {
                        user_id: user.id,
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            users = report.users_swept,
            overdue = report.invoices_marked_overdue,
            created = report.invoices_created(),
            "Tick finished"
        );
        report
    }

    /// Ticks every `period` until `shutdown` resolves; returns the number of ticks run
    ///
    /// With `run_on_start` the first tick runs before waiting. A tick in
    /// progress is finished before shutdown is observed.
    pub async fn run<F>(&self, period: Duration, run_on_start: bool, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        let mut ticks = 0;
        if run_on_start {
            self.tick().await;
            ticks += 1;
        }

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick of a tokio interval completes immediately
        interval.tick().await;

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    self.tick().await;
                    ticks += 1;
                }
            }
        }

        info!(ticks, "Scheduler stopped");
        ticks
    }
}
