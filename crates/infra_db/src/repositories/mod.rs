//! Repository implementations
//!
//! Repositories speak in rows and `DatabaseError`; the adapters translate
//! to domain types and `PortError`.

pub mod invoicing;

pub use invoicing::{
    ClientRow, InvoiceFilter, InvoiceItemRow, InvoiceRecord, InvoiceRow, InvoicingRepository, PaymentRow,
    RecurringRow, UserRow,
};
