//! Reporting domain errors

use thiserror::Error;

use core_kernel::{PortError, TemporalError};
use domain_invoicing::{ErrorKind, InvoicingError};

/// Errors that can occur while building reports
#[derive(Debug, Error)]
pub enum ReportingError {
    #[error("Invalid report window: {0}")]
    InvalidWindow(String),

    #[error(transparent)]
    Calendar(#[from] TemporalError),

    #[error(transparent)]
    Invoicing(#[from] InvoicingError),
}

impl ReportingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReportingError::InvalidWindow(_) => ErrorKind::Validation,
            ReportingError::Calendar(_) => ErrorKind::Validation,
            ReportingError::Invoicing(err) => err.kind(),
        }
    }
}

impl From<PortError> for ReportingError {
    fn from(err: PortError) -> Self {
        ReportingError::Invoicing(err.into())
    }
}
