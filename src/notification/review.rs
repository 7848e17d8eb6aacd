//! Review message notifications.

use std::sync::Arc;

use tracing::{debug, error};

use crate::task::{TaskDirectory, TaskKey};

use super::queue::NotificationSink;
use super::types::{EntityType, Notification};

/// A message posted on a task review.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewMessageEvent {
    pub task: TaskKey,
    pub author: String,
    pub message_id: String,
}

impl ReviewMessageEvent {
    /// Creates an event for a message on `task`.
    #[must_use]
    pub fn new(task: TaskKey, author: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            task,
            author: author.into(),
            message_id: message_id.into(),
        }
    }
}

/// Notifies the people working on a task when someone posts a review message.
pub struct ReviewMessageHandler {
    tasks: TaskDirectory,
    sink: Arc<dyn NotificationSink>,
}

impl ReviewMessageHandler {
    /// Creates a handler resolving task people through `tasks`.
    #[must_use]
    pub fn new(tasks: TaskDirectory, sink: Arc<dyn NotificationSink>) -> Self {
        Self { tasks, sink }
    }

    /// Enqueues one `Feedback` notification per interested user and returns
    /// how many were sent.
    ///
    /// Interested users are the assignee and reviewers, minus the author.
    /// A failed task lookup is logged and yields zero; it never reaches the
    /// caller.
    pub fn message_sent(&self, event: &ReviewMessageEvent) -> usize {
        let task = match self.tasks.lookup(&event.task) {
            Ok(task) => task,
            Err(err) => {
                error!(
                    task = %event.task,
                    message_id = %event.message_id,
                    error = %err,
                    "failed to resolve task for review message notification"
                );
                return 0;
            }
        };

        let mut recipients: Vec<&str> = Vec::with_capacity(task.reviewers.len() + 1);
        for user in task.assignee.iter().chain(task.reviewers.iter()) {
            let user = user.as_str();
            if user != event.author && !recipients.contains(&user) {
                recipients.push(user);
            }
        }

        for user in &recipients {
            let notification = Notification::for_task(&event.task, EntityType::Feedback, event.message_id.as_str());
            self.sink.deliver(user, notification);
        }
        debug!(task = %event.task, recipients = recipients.len(), "review message notifications sent");
        recipients.len()
    }
}

impl std::fmt::Debug for ReviewMessageHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewMessageHandler")
            .field("tasks", &self.tasks)
            .finish_non_exhaustive()
    }
}
