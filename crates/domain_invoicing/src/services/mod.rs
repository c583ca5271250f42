//! Invoicing application services
//!
//! Services hold their ports behind `Arc<dyn ...>` and are cheap to clone.

mod client_service;
mod invoice_service;
mod recurring_service;

pub use client_service::ClientService;
pub use invoice_service::{
    CreateInvoiceRequest, InvoiceDetails, InvoiceService, RecordPaymentRequest, UpdateInvoiceRequest,
    DUPLICATE_DUE_IN_DAYS,
};
pub use recurring_service::{
    CreateRecurringRequest, MaterializationFailure, MaterializationReport, RecurringService, UpdateRecurringRequest,
};
