//! Payments recorded against invoices

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use core_kernel::{InvoiceId, Money, PaymentId, UserId};

use crate::error::InvoicingError;

/// How the client paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    Card,
    Cash,
    Check,
    Paypal,
    Other,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 6] = [
        PaymentMethod::BankTransfer,
        PaymentMethod::Card,
        PaymentMethod::Cash,
        PaymentMethod::Check,
        PaymentMethod::Paypal,
        PaymentMethod::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Card => "card",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Check => "check",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::Other => "other",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = InvoicingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| InvoicingError::validation_field(format!("Unknown payment method '{}'", s), "method"))
    }
}

/// Channel that carried the payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentGateway {
    /// Recorded by the owner
    Manual,
    Stripe,
    Paypal,
}

impl PaymentGateway {
    /// Gateway used by the public pay action for `method`
    pub fn for_online(method: PaymentMethod) -> Self {
        match method {
            PaymentMethod::Paypal => PaymentGateway::Paypal,
            _ => PaymentGateway::Stripe,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentGateway::Manual => "manual",
            PaymentGateway::Stripe => "stripe",
            PaymentGateway::Paypal => "paypal",
        }
    }
}

impl FromStr for PaymentGateway {
    type Err = InvoicingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(PaymentGateway::Manual),
            "stripe" => Ok(PaymentGateway::Stripe),
            "paypal" => Ok(PaymentGateway::Paypal),
            other => Err(InvoicingError::validation_field(format!("Unknown gateway '{}'", other), "gateway")),
        }
    }
}

/// Payment status; only completed payments count toward the balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = InvoicingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(InvoicingError::validation_field(format!("Unknown payment status '{}'", other), "status")),
        }
    }
}

/// Who paid through the public pay link
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayerInfo {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl PayerInfo {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            email: Some(email.into()),
        }
    }
}

/// A payment record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub invoice_id: InvoiceId,
    pub user_id: UserId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub gateway: PaymentGateway,
    pub status: PaymentStatus,
    pub paid_at: DateTime<Utc>,
    /// Bank reference, check number or gateway id
    pub reference: Option<String>,
    pub payer: Option<PayerInfo>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// A completed payment entered by the owner
    ///
    /// # Arguments
    ///
    /// * `user_id` - Owner of the invoice
    /// * `invoice_id` - Invoice being paid
    /// * `amount` - Amount received, already in the invoice currency
    /// * `method` - How it was paid
    /// * `paid_at` - When the money arrived
    pub fn manual(
        user_id: UserId,
        invoice_id: InvoiceId,
        amount: Money,
        method: PaymentMethod,
        paid_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaymentId::new_v7(),
            invoice_id,
            user_id,
            amount,
            method,
            gateway: PaymentGateway::Manual,
            status: PaymentStatus::Completed,
            paid_at,
            reference: None,
            payer: None,
            created_at: Utc::now(),
        }
    }

    /// A completed payment taken through the public pay action
    pub fn online(
        user_id: UserId,
        invoice_id: InvoiceId,
        amount: Money,
        method: PaymentMethod,
        payer: PayerInfo,
        paid_at: DateTime<Utc>,
    ) -> Self {
        Self {
            gateway: PaymentGateway::for_online(method),
            reference: Some(generate_gateway_reference()),
            payer: Some(payer),
            ..Self::manual(user_id, invoice_id, amount, method, paid_at)
        }
    }

    /// Sets the external reference
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// True when the payment counts toward the invoice balance
    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }
}

/// Synthetic gateway transaction id: `pay_` followed by 24 hex characters
pub fn generate_gateway_reference() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("pay_{}", &hex[..24])
}
