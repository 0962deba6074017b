use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::core::{AppError, Result};

/// Borrower-facing messages emitted by servicing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    MandateAuthorizationRequested,
    MandateActivated,
    MandateCancelled,
    PaymentReceived,
    PaymentFailed,
    LoanClosed,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::MandateAuthorizationRequested => "mandate_authorization_requested",
            NotificationKind::MandateActivated => "mandate_activated",
            NotificationKind::MandateCancelled => "mandate_cancelled",
            NotificationKind::PaymentReceived => "payment_received",
            NotificationKind::PaymentFailed => "payment_failed",
            NotificationKind::LoanClosed => "loan_closed",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound notification channel.
///
/// Delivery is best-effort: `notify` reports success as a bool and callers
/// never roll back state because a notification failed.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient: &str, kind: NotificationKind, data: serde_json::Value) -> bool;
}

/// Writes notifications to the log only
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, recipient: &str, kind: NotificationKind, data: serde_json::Value) -> bool {
        info!(recipient, kind = %kind, data = %data, "Notification");
        true
    }
}

/// Posts notifications as JSON to a relay endpoint
pub struct HttpNotifier {
    client: Client,
    url: String,
}

impl HttpNotifier {
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, url })
    }
}

#[derive(Serialize)]
struct NotificationPayload<'a> {
    recipient: &'a str,
    kind: NotificationKind,
    data: serde_json::Value,
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, recipient: &str, kind: NotificationKind, data: serde_json::Value) -> bool {
        let payload = NotificationPayload {
            recipient,
            kind,
            data,
        };

        match self.client.post(&self.url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(
                    recipient,
                    kind = %kind,
                    status = response.status().as_u16(),
                    "Notification rejected by relay"
                );
                false
            }
            Err(e) => {
                warn!(recipient, kind = %kind, error = %e, "Notification delivery failed");
                false
            }
        }
    }
}

/// Build the notifier for the configured relay, falling back to logging
pub fn notifier_from_config(url: Option<&str>, timeout: Duration) -> Result<Arc<dyn Notifier>> {
    match url {
        Some(url) => Ok(Arc::new(HttpNotifier::new(url.to_string(), timeout)?)),
        None => Ok(Arc::new(LogNotifier)),
    }
}
