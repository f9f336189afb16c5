//! Notification sink: fire-and-forget toasts for the presentation layer.

use serde::{Deserialize, Serialize};
use shared::error::ApiError;
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub level: ToastLevel,
    pub title: String,
    pub description: String,
}

impl Toast {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Success,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn error(title: impl Into<String>, error: &ApiError) -> Self {
        Self {
            level: ToastLevel::Error,
            title: title.into(),
            description: error.message.clone(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == ToastLevel::Error
    }
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Writes toasts to the log; the default sink for headless use.
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, toast: Toast) {
        match toast.level {
            ToastLevel::Success => info!(title = %toast.title, "{}", toast.description),
            ToastLevel::Error => warn!(title = %toast.title, "{}", toast.description),
        }
    }
}

/// Fans toasts out to UI subscribers. Dropped when nobody listens.
#[derive(Clone)]
pub struct ChannelSink {
    tx: broadcast::Sender<Toast>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Toast> {
        self.tx.subscribe()
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, toast: Toast) {
        let _ = self.tx.send(toast);
    }
}
