//! Notification adapters
//!
//! `LogNotifier` writes each message through `tracing`; `RecordingNotifier`
//! keeps them in memory so tests can assert on what would have been sent.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use core_kernel::{DomainPort, PortError};

use crate::ports::{DeliveryReceipt, NotificationPort, OutboundMessage};

fn receipt() -> DeliveryReceipt {
    DeliveryReceipt {
        message_id: format!("msg_{}", Uuid::new_v4().simple()),
        accepted_at: Utc::now(),
    }
}

/// Logs outbound messages instead of delivering them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl DomainPort for LogNotifier {}

#[async_trait]
impl NotificationPort for LogNotifier {
    async fn submit(&self, message: OutboundMessage) -> Result<DeliveryReceipt, PortError> {
        let receipt = receipt();
        info!(
            message_id = %receipt.message_id,
            to = %message.to,
            subject = %message.subject,
            invoice_id = ?message.invoice_id,
            "Outbound message"
        );
        Ok(receipt)
    }
}

/// Captures outbound messages in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<OutboundMessage>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages submitted so far, oldest first
    pub async fn messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.clone()
    }
}

impl DomainPort for RecordingNotifier {}

#[async_trait]
impl NotificationPort for RecordingNotifier {
    async fn submit(&self, message: OutboundMessage) -> Result<DeliveryReceipt, PortError> {
        self.sent.lock().await.push(message);
        Ok(receipt())
    }
}
