//! Live per-user notification streams.
//!
//! Each subscriber owns a bounded channel. Delivery uses non-blocking
//! `try_send`; notifications that do not fit are counted and dropped so a
//! slow client never stalls a poll.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use tracing::{debug, warn};

use crate::error::StreamError;

use super::queue::NotificationSink;
use super::types::Notification;

/// Identifies one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Raw id.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

type Subscribers = HashMap<String, Vec<(SubscriptionId, Sender<Notification>)>>;

#[derive(Debug, Default)]
struct Registry {
    subscribers: Mutex<Subscribers>,
    next_id: AtomicU64,
    dropped: AtomicU64,
}

impl Registry {
    fn unregister(&self, user: &str, id: SubscriptionId) {
        let Ok(mut guard) = self.subscribers.lock() else {
            return;
        };
        if let Some(senders) = guard.get_mut(user) {
            senders.retain(|(sid, _)| *sid != id);
            if senders.is_empty() {
                guard.remove(user);
            }
        }
        debug!(user, subscription = id.0, "notification stream unsubscribed");
    }
}

/// Fans notifications out to every open stream of the recipient.
#[derive(Debug, Clone)]
pub struct NotificationBroadcaster {
    capacity: usize,
    registry: Arc<Registry>,
}

impl NotificationBroadcaster {
    /// Creates a broadcaster whose streams buffer up to `stream_capacity`
    /// notifications.
    #[must_use]
    pub fn new(stream_capacity: usize) -> Self {
        Self {
            capacity: stream_capacity.max(1),
            registry: Arc::new(Registry::default()),
        }
    }

    /// Opens a new stream for `user`.
    #[must_use]
    pub fn subscribe(&self, user: impl Into<String>) -> NotificationStream {
        let user = user.into();
        let id = SubscriptionId(self.registry.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = bounded(self.capacity);

        match self.registry.subscribers.lock() {
            Ok(mut guard) => guard.entry(user.clone()).or_default().push((id, tx)),
            // The stream is returned disconnected: its sender is dropped here.
            Err(_) => warn!(user = %user, "subscriber registry lock poisoned"),
        }
        debug!(user = %user, subscription = id.0, "notification stream subscribed");

        NotificationStream {
            id,
            user,
            rx,
            registry: Arc::clone(&self.registry),
            unregistered: AtomicBool::new(false),
        }
    }

    /// Number of open streams for `user`.
    #[must_use]
    pub fn subscriber_count(&self, user: &str) -> usize {
        self.registry
            .subscribers
            .lock()
            .map(|guard| guard.get(user).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Deliveries dropped because a stream was full or gone.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.registry.dropped.load(Ordering::Relaxed)
    }
}

impl NotificationSink for NotificationBroadcaster {
    fn deliver(&self, recipient: &str, notification: Notification) {
        let Ok(mut guard) = self.registry.subscribers.lock() else {
            self.registry.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };
        let Some(senders) = guard.get_mut(recipient) else {
            return;
        };

        senders.retain(|(_, tx)| match tx.try_send(notification.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(user = recipient, "notification stream full, dropping notification");
                self.registry.dropped.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Disconnected(_)) => {
                self.registry.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        });
        if senders.is_empty() {
            guard.remove(recipient);
        }
    }
}

/// A subscription stream for one user's notifications.
///
/// Dropping this stream unsubscribes it.
#[derive(Debug)]
pub struct NotificationStream {
    id: SubscriptionId,
    user: String,
    rx: Receiver<Notification>,
    registry: Arc<Registry>,
    unregistered: AtomicBool,
}

impl NotificationStream {
    /// Id of this subscription.
    #[must_use]
    pub const fn subscription_id(&self) -> SubscriptionId {
        self.id
    }

    /// User this stream belongs to.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Explicit unregistration. Idempotent.
    ///
    /// Notifications already buffered remain readable.
    pub fn unsubscribe(&self) {
        if self.unregistered.swap(true, Ordering::AcqRel) {
            return;
        }
        self.registry.unregister(&self.user, self.id);
    }

    /// Receive the next notification (blocking).
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Disconnected` once the stream is unsubscribed
    /// and drained.
    pub fn recv(&self) -> Result<Notification, StreamError> {
        self.rx.recv().map_err(|_| self.disconnected())
    }

    /// Receive the next notification, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// `StreamError::Timeout` if nothing arrived in time,
    /// `StreamError::Disconnected` if the stream is closed.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Notification, StreamError> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => StreamError::Timeout {
                duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            },
            RecvTimeoutError::Disconnected => self.disconnected(),
        })
    }

    /// Returns a buffered notification if one is ready.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Disconnected` if the stream is closed and empty.
    pub fn try_recv(&self) -> Result<Option<Notification>, StreamError> {
        match self.rx.try_recv() {
            Ok(notification) => Ok(Some(notification)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(self.disconnected()),
        }
    }

    fn disconnected(&self) -> StreamError {
        StreamError::Disconnected {
            user: self.user.clone(),
        }
    }
}

impl Drop for NotificationStream {
    fn drop(&mut self) {
        if !self.unregistered.swap(true, Ordering::AcqRel) {
            self.registry.unregister(&self.user, self.id);
        }
    }
}
