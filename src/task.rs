//! Authoring task lookup.
//!
//! Tasks live either in the external issue tracker or in the in-process
//! [`LocalTaskStore`]. The choice is made once, from configuration, when a
//! [`TaskDirectory`] is resolved; call sites only ever call
//! [`TaskDirectory::lookup`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::branch::BranchPath;
use crate::config::TaskBackend;
use crate::error::{AuthoringResult, ConfigError, ServiceError};

/// Project + task identity.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskKey {
    pub project: String,
    pub task: String,
}

impl TaskKey {
    /// Creates a task key.
    #[must_use]
    pub fn new(project: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            task: task.into(),
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project, self.task)
    }
}

/// The parts of a task the core cares about.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSummary {
    pub key: TaskKey,
    pub summary: String,
    pub assignee: Option<String>,
    pub reviewers: Vec<String>,
    pub branch_path: BranchPath,
}

impl TaskSummary {
    /// A task with no assignee or reviewers on its default branch.
    #[must_use]
    pub fn new(key: TaskKey, summary: impl Into<String>) -> Self {
        let branch_path = BranchPath::for_task(&key.project, &key.task);
        Self {
            key,
            summary: summary.into(),
            assignee: None,
            reviewers: Vec::new(),
            branch_path,
        }
    }

    /// Sets the assignee.
    #[must_use]
    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    /// Adds a reviewer.
    #[must_use]
    pub fn with_reviewer(mut self, reviewer: impl Into<String>) -> Self {
        self.reviewers.push(reviewer.into());
        self
    }
}

/// Task lookup collaborator.
pub trait TaskLookup: Send + Sync {
    /// Returns the task, or `ServiceError::NotFound`.
    fn get_task(&self, key: &TaskKey) -> Result<TaskSummary, ServiceError>;
}

fn lock_err(context: &'static str) -> ServiceError {
    ServiceError::backend(format!("poisoned lock: {context}"))
}

/// In-memory task store.
#[derive(Debug, Default)]
pub struct LocalTaskStore {
    tasks: RwLock<HashMap<TaskKey, TaskSummary>>,
}

impl LocalTaskStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a task.
    ///
    /// # Errors
    ///
    /// Fails only if the store lock is poisoned.
    pub fn insert(&self, task: TaskSummary) -> Result<(), ServiceError> {
        let mut guard = self.tasks.write().map_err(|_| lock_err("tasks.insert"))?;
        guard.insert(task.key.clone(), task);
        Ok(())
    }

    /// Removes a task, returning it if present.
    ///
    /// # Errors
    ///
    /// Fails only if the store lock is poisoned.
    pub fn remove(&self, key: &TaskKey) -> Result<Option<TaskSummary>, ServiceError> {
        let mut guard = self.tasks.write().map_err(|_| lock_err("tasks.remove"))?;
        Ok(guard.remove(key))
    }
}

impl TaskLookup for LocalTaskStore {
    fn get_task(&self, key: &TaskKey) -> Result<TaskSummary, ServiceError> {
        let guard = self.tasks.read().map_err(|_| lock_err("tasks.get"))?;
        guard
            .get(key)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("task {key}")))
    }
}

/// Task lookup strategy, resolved once from [`TaskBackend`].
#[derive(Clone)]
pub enum TaskDirectory {
    /// Delegates to the issue tracker client.
    IssueTracker(Arc<dyn TaskLookup>),
    /// Uses the in-process store.
    Local(Arc<LocalTaskStore>),
}

impl TaskDirectory {
    /// Picks the implementation named by `backend`.
    ///
    /// # Errors
    ///
    /// Returns a config error when the issue tracker backend is selected but
    /// no client is supplied.
    pub fn resolve(
        backend: TaskBackend,
        issue_tracker: Option<Arc<dyn TaskLookup>>,
        local: Arc<LocalTaskStore>,
    ) -> AuthoringResult<Self> {
        match backend {
            TaskBackend::IssueTracker => issue_tracker.map(Self::IssueTracker).ok_or_else(|| {
                ConfigError::Invalid {
                    field: "tasks.backend".to_string(),
                    reason: "issue_tracker selected but no issue tracker client supplied".to_string(),
                }
                .into()
            }),
            TaskBackend::Local => Ok(Self::Local(local)),
        }
    }

    /// Which backend this directory was resolved to.
    #[must_use]
    pub const fn backend(&self) -> TaskBackend {
        match self {
            Self::IssueTracker(_) => TaskBackend::IssueTracker,
            Self::Local(_) => TaskBackend::Local,
        }
    }

    /// Looks a task up in the resolved backend.
    ///
    /// # Errors
    ///
    /// Propagates the backend's error.
    pub fn lookup(&self, key: &TaskKey) -> Result<TaskSummary, ServiceError> {
        match self {
            Self::IssueTracker(client) => client.get_task(key),
            Self::Local(store) => store.get_task(key),
        }
    }
}

impl fmt::Debug for TaskDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TaskDirectory").field(&self.backend()).finish()
    }
}
