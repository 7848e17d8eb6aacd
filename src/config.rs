//! Configuration for the authoring services core.
//!
//! Every section has working defaults, so an empty TOML document is a valid
//! configuration. Strategy choices (such as the task backend) are resolved
//! once from here rather than at call sites.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Monitor driver settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Delay between polling rounds.
    pub poll_interval_ms: u64,
    /// A user's focus expires after this long without a refresh.
    pub focus_timeout_secs: u64,
    /// A monitor is evicted after this many consecutive failed polls.
    pub max_consecutive_failures: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            focus_timeout_secs: 300,
            max_consecutive_failures: 5,
        }
    }
}

impl MonitorConfig {
    /// Poll interval as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Focus timeout as a [`Duration`].
    #[must_use]
    pub const fn focus_timeout(&self) -> Duration {
        Duration::from_secs(self.focus_timeout_secs)
    }
}

/// Notification delivery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Per-subscriber stream buffer capacity.
    pub stream_capacity: usize,
    /// Per-user pending notification queue capacity.
    pub queue_capacity_per_user: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            stream_capacity: 256,
            queue_capacity_per_user: 500,
        }
    }
}

/// Batch import settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchImportConfig {
    /// Expressions longer than this are rejected before parsing.
    pub max_expression_len: usize,
    /// Require every attribute type to be a concept model attribute.
    pub validate_attribute_hierarchy: bool,
}

impl Default for BatchImportConfig {
    fn default() -> Self {
        Self {
            max_expression_len: 16 * 1024,
            validate_attribute_hierarchy: false,
        }
    }
}

/// Which task lookup implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskBackend {
    /// Tasks live in the external issue tracker.
    IssueTracker,
    /// Tasks live in the in-process store.
    #[default]
    Local,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub backend: TaskBackend,
}

/// Root configuration.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthoringConfig {
    pub monitor: MonitorConfig,
    pub notifications: NotificationConfig,
    pub batch_import: BatchImportConfig,
    pub tasks: TaskConfig,
}

impl AuthoringConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML and
    /// [`ConfigError::Invalid`] when a value is out of range.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read, otherwise
    /// as [`AuthoringConfig::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Rejects zero intervals and capacities.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&str, bool); 6] = [
            ("monitor.poll_interval_ms", self.monitor.poll_interval_ms > 0),
            ("monitor.focus_timeout_secs", self.monitor.focus_timeout_secs > 0),
            ("monitor.max_consecutive_failures", self.monitor.max_consecutive_failures > 0),
            ("notifications.stream_capacity", self.notifications.stream_capacity > 0),
            ("notifications.queue_capacity_per_user", self.notifications.queue_capacity_per_user > 0),
            ("batch_import.max_expression_len", self.batch_import.max_expression_len > 0),
        ];

        for (field, ok) in checks {
            if !ok {
                return Err(ConfigError::Invalid {
                    field: field.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_yields_defaults() {
        let config = AuthoringConfig::from_toml_str("").unwrap();
        assert_eq!(config, AuthoringConfig::default());
        assert_eq!(config.monitor.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.tasks.backend, TaskBackend::Local);
    }

    #[test]
    fn partial_sections_override_only_given_fields() {
        let config = AuthoringConfig::from_toml_str(
            r#"
            [monitor]
            poll_interval_ms = 250

            [tasks]
            backend = "issue_tracker"

            [batch_import]
            validate_attribute_hierarchy = true
            "#,
        )
        .unwrap();

        assert_eq!(config.monitor.poll_interval_ms, 250);
        assert_eq!(config.monitor.focus_timeout_secs, 300);
        assert_eq!(config.tasks.backend, TaskBackend::IssueTracker);
        assert!(config.batch_import.validate_attribute_hierarchy);
        assert_eq!(config.batch_import.max_expression_len, 16 * 1024);
    }

    #[test]
    fn zero_values_are_rejected() {
        let err = AuthoringConfig::from_toml_str("[notifications]\nstream_capacity = 0\n").unwrap_err();
        match err {
            ConfigError::Invalid { field, .. } => assert_eq!(field, "notifications.stream_capacity"),
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = AuthoringConfig::from_toml_str("[monitor\npoll_interval_ms = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn load_reads_file_and_reports_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("authoring.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[monitor]\nmax_consecutive_failures = 2").unwrap();

        let config = AuthoringConfig::load(&path).unwrap();
        assert_eq!(config.monitor.max_consecutive_failures, 2);

        let missing = dir.path().join("missing.toml");
        assert!(matches!(AuthoringConfig::load(&missing), Err(ConfigError::Read { .. })));
    }
}
