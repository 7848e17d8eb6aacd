//! Change monitors and the driver that polls them.
//!
//! A [`Monitor`] compares one external value against what it saw last time
//! and emits a notification on change. The [`MonitorService`] keeps one
//! monitor per key, tracks which users are focused on it, and delivers what
//! a poll emits to those users. [`MonitorScheduler`] runs the polling rounds
//! on a background thread.

/// Focus registry and polling rounds.
pub mod dispatcher;
/// Monitor trait and the branch monitors.
pub mod monitors;
/// Background polling thread.
pub mod scheduler;

pub use dispatcher::{MonitorService, PollSummary};
pub use monitors::{BranchMonitor, BranchStateMonitor, Monitor, MonitorKey};
pub use scheduler::MonitorScheduler;
