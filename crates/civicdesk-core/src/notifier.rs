//! Outbound notifications.
//!
//! Delivery is best-effort: [`dispatch`] logs failures and never hands
//! them back to the operation that triggered the notification.

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn new(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

pub trait Notifier: Send + Sync {
    fn notify(
        &self,
        notification: Notification,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Send a notification, logging and discarding any delivery failure.
pub async fn dispatch<N: Notifier>(notifier: &N, notification: Notification) {
    let recipient = notification.recipient.clone();
    let subject = notification.subject.clone();
    if let Err(e) = notifier.notify(notification).await {
        warn!(%recipient, %subject, error = %e, "Notification dropped");
    }
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        info!(
            recipient = %notification.recipient,
            subject = %notification.subject,
            "Notification"
        );
        Ok(())
    }
}

/// Keeps every notification in memory. Useful for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Notifier for MemoryNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .map_err(|e| NotifyError(e.to_string()))?
            .push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl Notifier for Failing {
        async fn notify(&self, _: Notification) -> Result<(), NotifyError> {
            Err(NotifyError("smtp unreachable".into()))
        }
    }

    #[tokio::test]
    async fn dispatch_swallows_failures() {
        dispatch(&Failing, Notification::new("a@b.in", "s", "b")).await;
    }

    #[tokio::test]
    async fn memory_notifier_records_in_order() {
        let notifier = MemoryNotifier::default();
        dispatch(&notifier, Notification::new("a@b.in", "first", "")).await;
        dispatch(&notifier, Notification::new("c@d.in", "second", "")).await;
        let subjects: Vec<_> = notifier.sent().into_iter().map(|n| n.subject).collect();
        assert_eq!(subjects, vec!["first", "second"]);
    }
}
