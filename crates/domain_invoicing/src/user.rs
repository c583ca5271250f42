//! Business owners (tenants)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{Currency, Timezone, UserId};

/// A business owner; every other record is scoped to one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub business_name: Option<String>,
    /// Currency for new invoices
    pub currency: Currency,
    /// Last issued invoice sequence; only ever increases
    pub invoice_counter: u32,
    /// Used to decide the owner's local "today"
    pub timezone: Timezone,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: impl Into<String>, name: impl Into<String>, currency: Currency) -> Self {
        Self {
            id: UserId::new_v7(),
            email: email.into(),
            name: name.into(),
            business_name: None,
            currency,
            invoice_counter: 0,
            timezone: Timezone::default(),
            created_at: Utc::now(),
        }
    }

    pub fn with_business_name(mut self, business_name: impl Into<String>) -> Self {
        self.business_name = Some(business_name.into());
        self
    }

    pub fn with_timezone(mut self, timezone: Timezone) -> Self {
        self.timezone = timezone;
        self
    }

    /// Name shown to clients on invoices and emails
    pub fn display_name(&self) -> &str {
        self.business_name.as_deref().unwrap_or(&self.name)
    }
}
