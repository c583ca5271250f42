//! Invoicing domain errors

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use core_kernel::{Money, MoneyError, PortError};

use crate::invoice::InvoiceStatus;

/// Errors that can occur in the invoicing domain
#[derive(Debug, Error)]
pub enum InvoicingError {
    /// Input failed validation
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Entity does not exist for this user
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Status change not allowed by the lifecycle
    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition {
        from: InvoiceStatus,
        to: InvoiceStatus,
    },

    /// Action not available in the invoice's current status
    #[error("Cannot {action} an invoice that is {status}")]
    ActionNotAllowed {
        action: &'static str,
        status: InvoiceStatus,
    },

    /// Paid and cancelled invoices are frozen
    #[error("Invoice {number} is {status} and can no longer be edited")]
    InvoiceLocked {
        number: String,
        status: InvoiceStatus,
    },

    /// Payment would push the cumulative amount past the invoice total
    #[error("Payment of {amount} exceeds remaining balance of {balance}")]
    ExceedsBalance { amount: Money, balance: Money },

    /// Operation conflicts with existing data
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Money arithmetic failed
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    /// Persistence failure the caller cannot fix
    #[error("Storage error: {0}")]
    Storage(PortError),
}

impl InvoicingError {
    /// Creates a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        InvoicingError::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Creates a validation error naming the offending field
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        InvoicingError::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a not-found error
    pub fn not_found(entity: impl Into<String>, id: impl std::fmt::Display) -> Self {
        InvoicingError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Creates a conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        InvoicingError::Conflict(message.into())
    }

    /// Classifies the error for callers
    pub fn kind(&self) -> ErrorKind {
        match self {
            InvoicingError::Validation { .. } => ErrorKind::Validation,
            InvoicingError::NotFound { .. } => ErrorKind::NotFound,
            InvoicingError::InvalidStatusTransition { .. }
            | InvoicingError::ActionNotAllowed { .. }
            | InvoicingError::InvoiceLocked { .. }
            | InvoicingError::ExceedsBalance { .. }
            | InvoicingError::Conflict(_) => ErrorKind::Conflict,
            InvoicingError::Money(MoneyError::CurrencyMismatch(..)) => ErrorKind::Validation,
            InvoicingError::Money(_) | InvoicingError::Storage(_) => ErrorKind::Internal,
        }
    }

    /// Converts to the user-visible error body
    ///
    /// Internal errors are logged here and replaced by a generic message so
    /// storage details never reach the caller.
    pub fn to_body(&self) -> ErrorBody {
        let kind = self.kind();
        let message = match kind {
            ErrorKind::Internal => {
                error!(error = %self, "Internal invoicing error");
                "An internal error occurred".to_string()
            }
            _ => self.to_string(),
        };
        ErrorBody { kind, message }
    }
}

impl From<PortError> for InvoicingError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { entity_type, id } => InvoicingError::NotFound {
                entity: entity_type,
                id,
            },
            PortError::Validation { message, field } => InvoicingError::Validation { message, field },
            PortError::Conflict { message } => InvoicingError::Conflict(message),
            other => InvoicingError::Storage(other),
        }
    }
}

/// Coarse error classification shared with the other domains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Internal,
}

/// Serializable error surfaced to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}
