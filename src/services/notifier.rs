use chrono::{DateTime, Utc};
use std::fmt;
use tokio::sync::broadcast;

use crate::models::Signal;

const TOAST_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

impl fmt::Display for ToastLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToastLevel::Info => write!(f, "info"),
            ToastLevel::Success => write!(f, "ok"),
            ToastLevel::Error => write!(f, "error"),
        }
    }
}

/// A transient, non-blocking user notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

/// Broadcasts toasts to every attached view. Sending never blocks and never
/// fails the caller; with no view attached the toast is simply dropped.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Toast>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(TOAST_BUFFER);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Toast> {
        self.tx.subscribe()
    }

    pub fn info(&self, message: impl Into<String>) {
        self.send(ToastLevel::Info, message.into());
    }

    pub fn success(&self, message: impl Into<String>) {
        self.send(ToastLevel::Success, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(ToastLevel::Error, message.into());
    }

    fn send(&self, level: ToastLevel, message: String) {
        let toast = Toast {
            level,
            message,
            raised_at: Utc::now(),
        };
        // Err only means no view is listening.
        let _ = self.tx.send(toast);
    }
}

/// Toast text for a newly pushed signal.
pub fn format_signal_toast(signal: &Signal) -> String {
    format!(
        "New {} signal ({}% confidence)",
        signal.kind,
        signal.confidence_pct()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_toasts_reach_subscribers() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();

        notifier.error("Failed to load wallets");
        notifier.success("Wallet added");

        let first = rx.recv().await.unwrap();
        assert_eq!(first.level, ToastLevel::Error);
        assert_eq!(first.message, "Failed to load wallets");
        assert_eq!(rx.recv().await.unwrap().level, ToastLevel::Success);
    }

    #[test]
    fn test_send_without_subscribers_is_silent() {
        Notifier::new().info("nobody listening");
    }
}
