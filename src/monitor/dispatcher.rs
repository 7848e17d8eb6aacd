//! Monitor driver.
//!
//! Tracks which monitor each user is focused on, polls every live monitor
//! once per round and fans emitted notifications out to that monitor's
//! subscribers. Monitors never retry internally; repeated failures get a
//! monitor evicted here.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::config::MonitorConfig;
use crate::error::{AuthoringError, AuthoringResult};
use crate::notification::NotificationSink;

use super::monitors::{Monitor, MonitorKey};

/// Outcome of one polling round.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Monitors polled this round.
    pub polled: usize,
    /// Monitors that reported a change.
    pub changed: usize,
    /// Notifications handed to the sink (one per subscriber).
    pub delivered: usize,
    pub failed: usize,
    /// Monitors removed after too many consecutive failures.
    pub evicted: usize,
    /// User focuses that timed out before the round.
    pub expired_focus: usize,
}

struct MonitorEntry {
    monitor: Arc<dyn Monitor>,
    subscribers: BTreeSet<String>,
    consecutive_failures: u32,
}

#[derive(Debug)]
struct UserFocus {
    key: MonitorKey,
    refreshed_at: Instant,
}

#[derive(Default)]
struct Registry {
    monitors: HashMap<MonitorKey, MonitorEntry>,
    focus: HashMap<String, UserFocus>,
}

impl Registry {
    fn unsubscribe(&mut self, user: &str, key: &MonitorKey) {
        if let Some(entry) = self.monitors.get_mut(key) {
            entry.subscribers.remove(user);
            if entry.subscribers.is_empty() {
                self.monitors.remove(key);
                debug!(monitor = %key, "monitor removed, no subscribers left");
            }
        }
    }

    fn expire(&mut self, now: Instant, timeout: std::time::Duration) -> usize {
        let expired: Vec<String> = self
            .focus
            .iter()
            .filter(|(_, focus)| now.saturating_duration_since(focus.refreshed_at) > timeout)
            .map(|(user, _)| user.clone())
            .collect();

        for user in &expired {
            if let Some(focus) = self.focus.remove(user) {
                debug!(user = %user, monitor = %focus.key, "user focus expired");
                self.unsubscribe(user, &focus.key);
            }
        }
        expired.len()
    }

    fn evict(&mut self, key: &MonitorKey) {
        if let Some(entry) = self.monitors.remove(key) {
            for user in &entry.subscribers {
                if self.focus.get(user).is_some_and(|focus| &focus.key == key) {
                    self.focus.remove(user);
                }
            }
        }
    }
}

/// Registry of monitors and the users focused on them.
pub struct MonitorService {
    cfg: MonitorConfig,
    sink: Arc<dyn NotificationSink>,
    registry: Mutex<Registry>,
}

impl MonitorService {
    /// Creates a service delivering to `sink`.
    #[must_use]
    pub fn new(cfg: MonitorConfig, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            cfg,
            sink,
            registry: Mutex::new(Registry::default()),
        }
    }

    /// The monitor configuration.
    #[must_use]
    pub const fn config(&self) -> &MonitorConfig {
        &self.cfg
    }

    fn registry(&self) -> AuthoringResult<MutexGuard<'_, Registry>> {
        self.registry
            .lock()
            .map_err(|_| AuthoringError::internal("poisoned lock: monitor registry"))
    }

    /// Focuses `user` on `monitor`, replacing any previous focus.
    ///
    /// A monitor whose key is already registered is reused, so its last
    /// observed state survives; the passed instance is then discarded.
    ///
    /// # Errors
    ///
    /// Fails only if the registry lock is poisoned.
    pub fn update_user_focus(&self, user: &str, monitor: Arc<dyn Monitor>) -> AuthoringResult<()> {
        self.update_user_focus_at(user, monitor, Instant::now())
    }

    /// [`update_user_focus`](Self::update_user_focus) with an explicit clock.
    ///
    /// # Errors
    ///
    /// Fails only if the registry lock is poisoned.
    pub fn update_user_focus_at(&self, user: &str, monitor: Arc<dyn Monitor>, now: Instant) -> AuthoringResult<()> {
        let key = monitor.key().clone();
        let mut registry = self.registry()?;

        let previous = registry.focus.insert(
            user.to_string(),
            UserFocus {
                key: key.clone(),
                refreshed_at: now,
            },
        );
        if let Some(previous) = previous.filter(|focus| focus.key != key) {
            registry.unsubscribe(user, &previous.key);
        }

        registry
            .monitors
            .entry(key.clone())
            .or_insert_with(|| {
                info!(monitor = %key, "monitor registered");
                MonitorEntry {
                    monitor,
                    subscribers: BTreeSet::new(),
                    consecutive_failures: 0,
                }
            })
            .subscribers
            .insert(user.to_string());
        Ok(())
    }

    /// Removes `user`'s focus. Returns whether the user had one.
    ///
    /// # Errors
    ///
    /// Fails only if the registry lock is poisoned.
    pub fn clear_user_focus(&self, user: &str) -> AuthoringResult<bool> {
        let mut registry = self.registry()?;
        let Some(focus) = registry.focus.remove(user) else {
            return Ok(false);
        };
        registry.unsubscribe(user, &focus.key);
        Ok(true)
    }

    /// Runs one polling round.
    ///
    /// # Errors
    ///
    /// Fails only if the registry lock is poisoned. Individual monitor
    /// failures are logged and counted in the summary.
    pub fn poll_once(&self) -> AuthoringResult<PollSummary> {
        self.poll_once_at(Instant::now())
    }

    /// [`poll_once`](Self::poll_once) with an explicit clock.
    ///
    /// # Errors
    ///
    /// Fails only if the registry lock is poisoned.
    pub fn poll_once_at(&self, now: Instant) -> AuthoringResult<PollSummary> {
        let mut summary = PollSummary::default();

        let batch: Vec<(Arc<dyn Monitor>, Vec<String>)> = {
            let mut registry = self.registry()?;
            summary.expired_focus = registry.expire(now, self.cfg.focus_timeout());
            registry
                .monitors
                .values()
                .map(|entry| (Arc::clone(&entry.monitor), entry.subscribers.iter().cloned().collect()))
                .collect()
        };

        // Monitors are polled without holding the registry lock.
        let mut results: Vec<(MonitorKey, bool)> = Vec::with_capacity(batch.len());
        for (monitor, subscribers) in batch {
            summary.polled += 1;
            match monitor.run_once() {
                Ok(Some(notification)) => {
                    summary.changed += 1;
                    for user in &subscribers {
                        self.sink.deliver(user, notification.clone());
                        summary.delivered += 1;
                    }
                    results.push((monitor.key().clone(), true));
                }
                Ok(None) => results.push((monitor.key().clone(), true)),
                Err(err) => {
                    warn!(monitor = %monitor.key(), error = %err, "monitor poll failed");
                    summary.failed += 1;
                    results.push((monitor.key().clone(), false));
                }
            }
        }

        let mut registry = self.registry()?;
        for (key, ok) in results {
            let Some(entry) = registry.monitors.get_mut(&key) else {
                continue;
            };
            if ok {
                entry.consecutive_failures = 0;
                continue;
            }
            entry.consecutive_failures += 1;
            if entry.consecutive_failures >= self.cfg.max_consecutive_failures {
                error!(
                    monitor = %key,
                    failures = entry.consecutive_failures,
                    "evicting monitor after repeated failures"
                );
                registry.evict(&key);
                summary.evicted += 1;
            }
        }

        if summary.changed > 0 || summary.failed > 0 {
            info!(
                polled = summary.polled,
                changed = summary.changed,
                delivered = summary.delivered,
                failed = summary.failed,
                evicted = summary.evicted,
                "monitor poll complete"
            );
        }
        Ok(summary)
    }

    /// Number of live monitors.
    #[must_use]
    pub fn monitor_count(&self) -> usize {
        self.registry.lock().map(|r| r.monitors.len()).unwrap_or(0)
    }

    /// Users subscribed to the monitor with `key`, sorted.
    #[must_use]
    pub fn subscribers(&self, key: &MonitorKey) -> Vec<String> {
        self.registry
            .lock()
            .ok()
            .and_then(|r| r.monitors.get(key).map(|entry| entry.subscribers.iter().cloned().collect()))
            .unwrap_or_default()
    }

    /// Key of the monitor `user` is focused on.
    #[must_use]
    pub fn focus_of(&self, user: &str) -> Option<MonitorKey> {
        self.registry
            .lock()
            .ok()
            .and_then(|r| r.focus.get(user).map(|focus| focus.key.clone()))
    }
}

impl std::fmt::Debug for MonitorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorService")
            .field("cfg", &self.cfg)
            .field("monitors", &self.monitor_count())
            .finish_non_exhaustive()
    }
}
