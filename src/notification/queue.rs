//! Delivery sinks and the per-user notification queue.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tracing::{debug, warn};

use super::types::Notification;

/// Receives notifications for a recipient.
///
/// Delivery is best-effort: implementations must not block the caller and
/// never report failure back.
pub trait NotificationSink: Send + Sync {
    /// Delivers `notification` to `recipient`.
    fn deliver(&self, recipient: &str, notification: Notification);
}

/// Per-user bounded queue of pending notifications.
///
/// When a user's queue is full the oldest pending notification is dropped.
#[derive(Debug)]
pub struct NotificationQueue {
    capacity: usize,
    pending: Mutex<HashMap<String, VecDeque<Notification>>>,
    dropped: AtomicU64,
}

impl NotificationQueue {
    /// Creates a queue holding up to `capacity_per_user` notifications per user.
    #[must_use]
    pub fn new(capacity_per_user: usize) -> Self {
        Self {
            capacity: capacity_per_user.max(1),
            pending: Mutex::new(HashMap::new()),
            dropped: AtomicU64::new(0),
        }
    }

    /// Queues a notification for `username`.
    pub fn queue(&self, username: &str, notification: Notification) {
        let Ok(mut guard) = self.pending.lock() else {
            warn!(user = username, "notification queue lock poisoned, dropping notification");
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };

        let queue = guard.entry(username.to_string()).or_default();
        if queue.len() >= self.capacity {
            warn!(user = username, capacity = self.capacity, "notification queue full, dropping oldest");
            queue.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        debug!(user = username, entity_type = %notification.entity_type(), "notification queued");
        queue.push_back(notification);
    }

    /// Drains and returns every pending notification for `username`, oldest first.
    #[must_use]
    pub fn retrieve_new(&self, username: &str) -> Vec<Notification> {
        self.pending
            .lock()
            .ok()
            .and_then(|mut guard| guard.remove(username))
            .map(Vec::from)
            .unwrap_or_default()
    }

    /// Number of notifications waiting for `username`.
    #[must_use]
    pub fn pending(&self, username: &str) -> usize {
        self.pending
            .lock()
            .map(|guard| guard.get(username).map_or(0, VecDeque::len))
            .unwrap_or(0)
    }

    /// Notifications discarded due to overflow.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl NotificationSink for NotificationQueue {
    fn deliver(&self, recipient: &str, notification: Notification) {
        self.queue(recipient, notification);
    }
}
