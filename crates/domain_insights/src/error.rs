//! Insights domain errors

use thiserror::Error;

use core_kernel::PortError;
use domain_invoicing::{ErrorBody, ErrorKind, InvoicingError};

/// Errors that can occur while computing insights
#[derive(Debug, Error)]
pub enum InsightsError {
    /// Input rejected before any scoring
    #[error("Validation error: {0}")]
    Validation(String),

    /// Loading history failed (unknown client, storage error)
    #[error(transparent)]
    Invoicing(#[from] InvoicingError),
}

impl InsightsError {
    pub fn validation(message: impl Into<String>) -> Self {
        InsightsError::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            InsightsError::Validation(_) => ErrorKind::Validation,
            InsightsError::Invoicing(err) => err.kind(),
        }
    }

    /// User-visible form; internal details are logged and withheld
    pub fn to_body(&self) -> ErrorBody {
        match self {
            InsightsError::Validation(message) => ErrorBody {
                kind: ErrorKind::Validation,
                message: message.clone(),
            },
            InsightsError::Invoicing(err) => err.to_body(),
        }
    }
}

impl From<PortError> for InsightsError {
    fn from(err: PortError) -> Self {
        InsightsError::Invoicing(err.into())
    }
}
