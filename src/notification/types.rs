//! Notification values.
//!
//! A notification is an immutable record of something that changed on a
//! project or task. Wire serialisation lives in [`crate::wire`].

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::task::TaskKey;

/// What kind of entity a notification refers to.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    BranchState,
    BranchHead,
    Feedback,
    Classification,
    Validation,
    Rebase,
    Promotion,
    ConflictReport,
}

impl EntityType {
    /// Wire name of the entity type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BranchState => "BranchState",
            Self::BranchHead => "BranchHead",
            Self::Feedback => "Feedback",
            Self::Classification => "Classification",
            Self::Validation => "Validation",
            Self::Rebase => "Rebase",
            Self::Promotion => "Promotion",
            Self::ConflictReport => "ConflictReport",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change event for delivery to users or clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    id: Uuid,
    project: String,
    task: Option<String>,
    entity_type: EntityType,
    event: String,
    timestamp: DateTime<Utc>,
}

impl Notification {
    /// Creates a notification stamped with a fresh id and the current time.
    #[must_use]
    pub fn new(
        project: impl Into<String>,
        task: Option<String>,
        entity_type: EntityType,
        event: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project: project.into(),
            task,
            entity_type,
            event: event.into(),
            timestamp: Utc::now(),
        }
    }

    /// Notification scoped to a task.
    #[must_use]
    pub fn for_task(key: &TaskKey, entity_type: EntityType, event: impl Into<String>) -> Self {
        Self::new(key.project.clone(), Some(key.task.clone()), entity_type, event)
    }

    /// Notification scoped to a whole project.
    #[must_use]
    pub fn for_project(project: impl Into<String>, entity_type: EntityType, event: impl Into<String>) -> Self {
        Self::new(project, None, entity_type, event)
    }

    /// Unique notification id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Project key.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Task key, if task-scoped.
    #[must_use]
    pub fn task(&self) -> Option<&str> {
        self.task.as_deref()
    }

    /// What kind of entity changed.
    #[must_use]
    pub const fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// Free-form payload, e.g. the new branch state.
    #[must_use]
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Creation time.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_notification_carries_both_keys() {
        let n = Notification::for_task(&TaskKey::new("PROJ", "PROJ-4"), EntityType::BranchState, "DIVERGED");
        assert_eq!(n.project(), "PROJ");
        assert_eq!(n.task(), Some("PROJ-4"));
        assert_eq!(n.entity_type(), EntityType::BranchState);
        assert_eq!(n.event(), "DIVERGED");
    }

    #[test]
    fn ids_are_unique() {
        let a = Notification::for_project("PROJ", EntityType::Promotion, "done");
        let b = Notification::for_project("PROJ", EntityType::Promotion, "done");
        assert_ne!(a.id(), b.id());
        assert!(a.task().is_none());
    }
}
