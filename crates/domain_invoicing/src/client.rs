//! Clients billed by a user

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{ClientId, UserId};

use crate::error::InvoicingError;

/// A client belonging to exactly one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Client fields supplied by the owner
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDetails {
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub address: Option<String>,
}

impl ClientDetails {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            ..Default::default()
        }
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    /// Name must be present and the email must look like one
    pub fn validate(&self) -> Result<(), InvoicingError> {
        if self.name.trim().is_empty() {
            return Err(InvoicingError::validation_field("Client name is required", "name"));
        }
        if !self.email.contains('@') {
            return Err(InvoicingError::validation_field(
                format!("'{}' is not a valid email address", self.email),
                "email",
            ));
        }
        Ok(())
    }
}

impl Client {
    /// Creates a client from validated details
    pub fn new(user_id: UserId, details: ClientDetails) -> Result<Self, InvoicingError> {
        details.validate()?;
        let now = Utc::now();
        Ok(Self {
            id: ClientId::new_v7(),
            user_id,
            name: details.name.trim().to_string(),
            email: details.email.trim().to_string(),
            company: details.company,
            address: details.address,
            created_at: now,
            updated_at: now,
        })
    }

    /// Overwrites the editable fields
    pub fn apply(&mut self, details: ClientDetails) -> Result<(), InvoicingError> {
        details.validate()?;
        self.name = details.name.trim().to_string();
        self.email = details.email.trim().to_string();
        self.company = details.company;
        self.address = details.address;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_requires_email_at_sign() {
        let err = Client::new(UserId::new(), ClientDetails::new("Acme", "billing.acme.com")).unwrap_err();
        assert!(matches!(err, InvoicingError::Validation { field: Some(ref f), .. } if f == "email"));
    }

    #[test]
    fn test_client_trims_name() {
        let client = Client::new(UserId::new(), ClientDetails::new("  Acme  ", "ap@acme.test")).unwrap();
        assert_eq!(client.name, "Acme");
    }
}
