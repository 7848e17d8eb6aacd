//! Notifications and their delivery.

/// Per-user queue and the sink trait.
pub mod queue;
/// Review message handler.
pub mod review;
/// Live subscription streams.
pub mod stream;
/// Notification values.
pub mod types;

pub use queue::{NotificationQueue, NotificationSink};
pub use review::{ReviewMessageEvent, ReviewMessageHandler};
pub use stream::{NotificationBroadcaster, NotificationStream, SubscriptionId};
pub use types::{EntityType, Notification};
