//! Monitors: single-shot change detectors over an external state source.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use crate::branch::{BranchPath, BranchStateSource, MAIN};
use crate::error::MonitorError;
use crate::notification::{EntityType, Notification};
use crate::task::TaskKey;

/// What a monitor watches. Two monitors with the same key are the same monitor.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MonitorKey {
    Task { project: String, task: String },
    Branch { path: BranchPath },
}

impl fmt::Display for MonitorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task { project, task } => write!(f, "task:{project}/{task}"),
            Self::Branch { path } => write!(f, "branch:{path}"),
        }
    }
}

/// A change detector polled by the monitor driver.
pub trait Monitor: Send + Sync {
    /// Identity of the watched entity.
    fn key(&self) -> &MonitorKey;

    /// Fetches the current state once.
    ///
    /// Returns a notification when the state differs from the last observed
    /// value, `None` when it does not.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::Fetch` when the state source fails; the last
    /// observed value is left untouched.
    fn run_once(&self) -> Result<Option<Notification>, MonitorError>;
}

/// Compares `current` against the stored value, storing it on change.
fn observe<T: PartialEq>(last: &mut Option<T>, current: T) -> bool {
    if last.as_ref() == Some(&current) {
        return false;
    }
    *last = Some(current);
    true
}

/// Watches the state of a task branch (up to date, behind, diverged...).
pub struct BranchStateMonitor {
    key: MonitorKey,
    task: TaskKey,
    path: BranchPath,
    source: Arc<dyn BranchStateSource>,
    last_observed: Mutex<Option<String>>,
}

impl BranchStateMonitor {
    /// Monitors the branch of `task`.
    #[must_use]
    pub fn new(task: TaskKey, source: Arc<dyn BranchStateSource>) -> Self {
        let path = BranchPath::for_task(&task.project, &task.task);
        Self {
            key: MonitorKey::Task {
                project: task.project.clone(),
                task: task.task.clone(),
            },
            task,
            path,
            source,
            last_observed: Mutex::new(None),
        }
    }

    /// Seeds the last observed state so the first poll only reports a change.
    #[must_use]
    pub fn with_initial_state(self, token: impl Into<String>) -> Self {
        Self {
            last_observed: Mutex::new(Some(token.into())),
            ..self
        }
    }

    /// Last state token seen, if any.
    #[must_use]
    pub fn last_observed(&self) -> Option<String> {
        self.last_observed.lock().ok().and_then(|guard| guard.clone())
    }
}

impl Monitor for BranchStateMonitor {
    fn key(&self) -> &MonitorKey {
        &self.key
    }

    fn run_once(&self) -> Result<Option<Notification>, MonitorError> {
        // Held across the fetch so concurrent polls of one instance serialise.
        let mut last = self.last_observed.lock().map_err(|_| MonitorError::LockPoisoned {
            key: self.key.to_string(),
        })?;

        let snapshot = self.source.fetch_branch(&self.path).map_err(|source| MonitorError::Fetch {
            key: self.key.to_string(),
            source,
        })?;

        let token = snapshot.state.as_token();
        if !observe(&mut last, token.to_string()) {
            return Ok(None);
        }
        Ok(Some(Notification::for_task(&self.task, EntityType::BranchState, token)))
    }
}

/// Watches the head commit of any branch.
pub struct BranchMonitor {
    key: MonitorKey,
    path: BranchPath,
    source: Arc<dyn BranchStateSource>,
    last_observed: Mutex<Option<i64>>,
}

impl BranchMonitor {
    /// Monitors the head of `path`.
    #[must_use]
    pub fn new(path: BranchPath, source: Arc<dyn BranchStateSource>) -> Self {
        Self {
            key: MonitorKey::Branch { path: path.clone() },
            path,
            source,
            last_observed: Mutex::new(None),
        }
    }

    /// Seeds the head timestamp so an unchanged first poll is silent.
    #[must_use]
    pub fn with_initial_head(self, head_timestamp: i64) -> Self {
        Self {
            last_observed: Mutex::new(Some(head_timestamp)),
            ..self
        }
    }

    /// Last head timestamp seen, if any.
    #[must_use]
    pub fn last_observed(&self) -> Option<i64> {
        self.last_observed.lock().ok().and_then(|guard| *guard)
    }

    fn notification(&self, head_timestamp: i64) -> Notification {
        let project = self.path.project().unwrap_or(MAIN);
        Notification::new(
            project,
            self.path.task().map(str::to_string),
            EntityType::BranchHead,
            head_timestamp.to_string(),
        )
    }
}

impl Monitor for BranchMonitor {
    fn key(&self) -> &MonitorKey {
        &self.key
    }

    fn run_once(&self) -> Result<Option<Notification>, MonitorError> {
        let mut last = self.last_observed.lock().map_err(|_| MonitorError::LockPoisoned {
            key: self.key.to_string(),
        })?;

        let snapshot = self.source.fetch_branch(&self.path).map_err(|source| MonitorError::Fetch {
            key: self.key.to_string(),
            source,
        })?;

        if !observe(&mut last, snapshot.head_timestamp) {
            return Ok(None);
        }
        Ok(Some(self.notification(snapshot.head_timestamp)))
    }
}

macro_rules! identity_by_key {
    ($($ty:ty),*) => {$(
        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.key == other.key
            }
        }

        impl Eq for $ty {}

        impl Hash for $ty {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.key.hash(state);
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($ty))
                    .field("key", &self.key)
                    .field("last_observed", &self.last_observed())
                    .finish_non_exhaustive()
            }
        }
    )*};
}

identity_by_key!(BranchStateMonitor, BranchMonitor);

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::branch::{BranchSnapshot, BranchState};
    use crate::error::ServiceError;

    /// Replays a fixed script of responses, repeating the last one.
    struct Scripted {
        responses: Vec<Result<(BranchState, i64), ServiceError>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(responses: Vec<Result<(BranchState, i64), ServiceError>>) -> Arc<Self> {
            Arc::new(Self {
                responses,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl BranchStateSource for Scripted {
        fn fetch_branch(&self, path: &BranchPath) -> Result<BranchSnapshot, ServiceError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let idx = n.min(self.responses.len() - 1);
            self.responses[idx].clone().map(|(state, head)| BranchSnapshot {
                path: path.clone(),
                state,
                head_timestamp: head,
                base_timestamp: 0,
            })
        }
    }

    fn task() -> TaskKey {
        TaskKey::new("PROJ", "PROJ-1")
    }

    #[test]
    fn first_poll_emits_then_same_state_is_silent() {
        let source = Scripted::new(vec![Ok((BranchState::UpToDate, 1))]);
        let monitor = BranchStateMonitor::new(task(), source);

        let first = monitor.run_once().unwrap().unwrap();
        assert_eq!(first.entity_type(), EntityType::BranchState);
        assert_eq!(first.event(), "UP_TO_DATE");
        assert_eq!(first.task(), Some("PROJ-1"));

        assert!(monitor.run_once().unwrap().is_none());
        assert!(monitor.run_once().unwrap().is_none());
    }

    #[test]
    fn state_change_emits_once() {
        let source = Scripted::new(vec![Ok((BranchState::UpToDate, 1)), Ok((BranchState::Behind, 1))]);
        let monitor = BranchStateMonitor::new(task(), source).with_initial_state("UP_TO_DATE");

        assert!(monitor.run_once().unwrap().is_none());
        assert_eq!(monitor.run_once().unwrap().unwrap().event(), "BEHIND");
        assert!(monitor.run_once().unwrap().is_none());
        assert_eq!(monitor.last_observed().as_deref(), Some("BEHIND"));
    }

    #[test]
    fn fetch_failure_leaves_state_untouched() {
        let source = Scripted::new(vec![
            Ok((BranchState::Forward, 1)),
            Err(ServiceError::unavailable("terminology server down")),
            Ok((BranchState::Forward, 1)),
        ]);
        let monitor = BranchStateMonitor::new(task(), source);

        assert!(monitor.run_once().unwrap().is_some());
        let err = monitor.run_once().unwrap_err();
        assert_eq!(err.key(), "task:PROJ/PROJ-1");
        assert!(matches!(err, MonitorError::Fetch { .. }));
        assert_eq!(monitor.last_observed().as_deref(), Some("FORWARD"));
        assert!(monitor.run_once().unwrap().is_none());
    }

    #[test]
    fn branch_monitor_tracks_head() {
        let source = Scripted::new(vec![
            Ok((BranchState::UpToDate, 100)),
            Ok((BranchState::Diverged, 100)),
            Ok((BranchState::Diverged, 200)),
        ]);
        let monitor = BranchMonitor::new(BranchPath::for_task("PROJ", "PROJ-3"), source);

        let first = monitor.run_once().unwrap().unwrap();
        assert_eq!(first.entity_type(), EntityType::BranchHead);
        assert_eq!(first.project(), "PROJ");
        assert_eq!(first.task(), Some("PROJ-3"));
        assert_eq!(first.event(), "100");

        // State changed but head did not.
        assert!(monitor.run_once().unwrap().is_none());
        assert_eq!(monitor.run_once().unwrap().unwrap().event(), "200");
    }

    #[test]
    fn project_branch_monitor_has_no_task() {
        let source = Scripted::new(vec![Ok((BranchState::UpToDate, 5))]);
        let monitor = BranchMonitor::new(BranchPath::for_project("PROJ"), source).with_initial_head(4);
        let n = monitor.run_once().unwrap().unwrap();
        assert_eq!(n.project(), "PROJ");
        assert!(n.task().is_none());
    }

    #[test]
    fn identity_is_by_key() {
        let a = BranchStateMonitor::new(task(), Scripted::new(vec![Ok((BranchState::UpToDate, 1))]));
        let b = BranchStateMonitor::new(task(), Scripted::new(vec![Ok((BranchState::Stale, 9))]))
            .with_initial_state("STALE");
        let c = BranchStateMonitor::new(
            TaskKey::new("PROJ", "PROJ-2"),
            Scripted::new(vec![Ok((BranchState::UpToDate, 1))]),
        );

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<BranchStateMonitor> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn concurrent_polls_emit_exactly_once() {
        let source = Scripted::new(vec![Ok((BranchState::Diverged, 1))]);
        let monitor = Arc::new(BranchStateMonitor::new(task(), source));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let monitor = Arc::clone(&monitor);
                std::thread::spawn(move || monitor.run_once().unwrap().is_some())
            })
            .collect();
        let emitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|emitted| *emitted)
            .count();
        assert_eq!(emitted, 1);
    }
}
