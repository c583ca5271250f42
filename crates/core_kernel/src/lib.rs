//! Core Kernel - Foundational types shared by every invoicing crate
//!
//! This crate provides the building blocks used across the domain modules:
//! - Money types with fixed-point decimal arithmetic
//! - A clock abstraction so "today" can be pinned in tests
//! - Strongly-typed identifiers for tenants and their records
//! - Port infrastructure for swappable persistence and notification adapters

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod ports;

pub use money::{Money, Currency, MoneyError, Rate};
pub use temporal::{Clock, SystemClock, FixedClock, Timezone, MonthKey, TemporalError};
pub use identifiers::{
    UserId, ClientId, InvoiceId, InvoiceItemId, PaymentId, RecurringInvoiceId,
};
pub use ports::{PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth};
