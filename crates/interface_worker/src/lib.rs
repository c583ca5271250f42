//! Background Worker
//!
//! Runs the invoicing core's time-driven jobs: recurring invoice
//! materialization and the overdue sweep. There is no HTTP surface; the
//! `invoicing-worker` binary wires the PostgreSQL adapter, a log notifier and
//! the system clock into a [`scheduler::Scheduler`] and ticks on an interval.
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_worker::Scheduler;
//!
//! let scheduler = Scheduler::new(port, Arc::new(LogNotifier::new()), Arc::new(SystemClock));
//! let report = scheduler.tick().await;
//! ```

pub mod config;
pub mod scheduler;

pub use config::WorkerConfig;
pub use scheduler::{Scheduler, SweepFailure, TickReport};
