use crate::error::NotifyError;
use crate::model::AlertId;
use crate::ui::core::alerts::TransitionEvent;
use log::{info, warn};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub key: AlertId,
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn completed(event: &TransitionEvent) -> Self {
        Self {
            key: event.id.clone(),
            kind: NotificationKind::Success,
            message: format!("Alert {} completed", event.id),
        }
    }
}

/// Sink for user-facing notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Turns transition events into notification requests.
///
/// Every event of a merge is sent to every registered notifier. A failing
/// notifier is logged and skipped.
#[derive(Default)]
pub struct NotificationDispatcher {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, notifier: Box<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    /// Returns the number of notification requests that were accepted.
    pub fn dispatch(&self, events: &[TransitionEvent]) -> usize {
        let mut delivered = 0;
        for event in events {
            let notification = Notification::completed(event);
            for notifier in &self.notifiers {
                match notifier.notify(&notification) {
                    Ok(()) => delivered += 1,
                    Err(e) => warn!("Notification for alert {} failed: {}", event.id, e),
                }
            }
        }
        delivered
    }
}

pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!("[notify:{}] {}", notification.key, notification.message);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub kind: NotificationKind,
    pub message: String,
    pub expires_at: Instant,
}

/// Toasts shown at the bottom of the dashboard.
#[derive(Clone)]
pub struct ToastBoard {
    toasts: Arc<Mutex<VecDeque<Toast>>>,
    ttl: Duration,
    capacity: usize,
}

impl ToastBoard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            toasts: Arc::new(Mutex::new(VecDeque::new())),
            ttl,
            capacity: 5,
        }
    }

    pub fn push(&self, kind: NotificationKind, message: impl Into<String>) {
        let mut toasts = self.toasts.lock().unwrap();
        toasts.push_back(Toast {
            kind,
            message: message.into(),
            expires_at: Instant::now() + self.ttl,
        });
        while toasts.len() > self.capacity {
            toasts.pop_front();
        }
    }

    /// Drops expired toasts and returns what is still visible, oldest first.
    pub fn visible(&self, now: Instant) -> Vec<Toast> {
        let mut toasts = self.toasts.lock().unwrap();
        toasts.retain(|t| t.expires_at > now);
        toasts.iter().cloned().collect()
    }
}

impl Notifier for ToastBoard {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.push(notification.kind, notification.message.clone());
        Ok(())
    }
}
