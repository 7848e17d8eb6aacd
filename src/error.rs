//! Error types for the authoring services core.
//!
//! All errors are strongly typed using thiserror. Each concern (batch import,
//! monitoring, external collaborators, configuration) owns its own enum and
//! the top-level [`AuthoringError`] unifies them. Mapping an error to a
//! transport status code is a thin translation at the boundary
//! ([`AuthoringError::status_code`]), not part of the core contract.

use std::fmt;

use thiserror::Error;

/// Which side of a `type=value` attribute failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeSide {
    /// The attribute type (left of `=`).
    Type,
    /// The attribute destination (right of `=`).
    Destination,
}

impl fmt::Display for AttributeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type => write!(f, "type"),
            Self::Destination => write!(f, "destination"),
        }
    }
}

/// Errors raised while parsing or importing a batch import expression.
///
/// Always fatal to the single expression being processed. Every variant
/// carries the substring at fault.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessingError {
    #[error("Expression is empty")]
    EmptyExpression,

    #[error("Expression has no focus concept: '{expression}'")]
    MissingFocusConcept { expression: String },

    #[error("Focus concept '{token}' is not a valid concept identifier")]
    InvalidFocusConcept { token: String },

    #[error("Attribute '{attribute}' must have exactly one '=' separating type and value")]
    MalformedAttribute { attribute: String },

    #[error("Attribute {side} '{value}' in '{attribute}' is not a valid concept identifier")]
    InvalidAttribute {
        side: AttributeSide,
        value: String,
        attribute: String,
    },

    #[error("Unbalanced braces in attribute section '{section}'")]
    UnbalancedBraces { section: String },

    #[error("Nested attribute groups are not supported: '{section}'")]
    NestedGroup { section: String },

    #[error("Attribute group {group_number} is empty")]
    EmptyGroup { group_number: u32 },

    #[error("Expression exceeds maximum length of {max_length} (actual: {actual})")]
    ExpressionTooLong { max_length: usize, actual: usize },

    #[error("Attribute type {type_id} is not a concept model attribute")]
    AttributeTypeOutsideModel { type_id: String },
}

/// Failures of the external collaborators (terminology server, issue
/// tracker, task store).
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Service unavailable: {message}")]
    Unavailable { message: String },

    #[error("Backend error: {message}")]
    Backend { message: String },
}

impl ServiceError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Creates an unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a backend error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// Errors raised by a single monitor poll.
///
/// The monitor never retries internally; the driver decides what to do.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Failed to fetch state for monitor {key}: {source}")]
    Fetch {
        key: String,
        #[source]
        source: ServiceError,
    },

    #[error("Monitor {key} state lock poisoned")]
    LockPoisoned { key: String },
}

impl MonitorError {
    /// Returns the key of the monitor that failed.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Fetch { key, .. } | Self::LockPoisoned { key } => key,
        }
    }
}

/// Errors receiving from a notification stream.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("Timed out after {duration_ms}ms waiting for a notification")]
    Timeout { duration_ms: u64 },

    #[error("Notification stream for '{user}' is disconnected")]
    Disconnected { user: String },
}

/// Configuration loading and validation errors.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse config: {message}")]
    Parse { message: String },

    #[error("Invalid config value for '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

/// Top-level error type for the authoring services core.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum AuthoringError {
    #[error("Processing error: {0}")]
    Processing(#[from] ProcessingError),

    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AuthoringError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a processing (bad input) error.
    #[must_use]
    pub const fn is_processing(&self) -> bool {
        matches!(self, Self::Processing(_))
    }

    /// Returns true if this is a monitor error.
    #[must_use]
    pub const fn is_monitor(&self) -> bool {
        matches!(self, Self::Monitor(_))
    }

    /// Returns true if the underlying cause is a missing resource.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Service(ServiceError::NotFound { .. })
                | Self::Monitor(MonitorError::Fetch {
                    source: ServiceError::NotFound { .. },
                    ..
                })
        )
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Processing(_) | Self::Config(_) | Self::Internal { .. } => false,
            Self::Stream(e) => matches!(e, StreamError::Timeout { .. }),
            Self::Service(e) => matches!(e, ServiceError::Unavailable { .. }),
            Self::Monitor(e) => matches!(
                e,
                MonitorError::Fetch {
                    source: ServiceError::Unavailable { .. },
                    ..
                }
            ),
        }
    }

    /// Translates this error into an HTTP-style status code for the
    /// transport boundary.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Processing(_) => 400,
            Self::Service(e) | Self::Monitor(MonitorError::Fetch { source: e, .. }) => match e {
                ServiceError::NotFound { .. } => 404,
                ServiceError::BadRequest { .. } => 400,
                ServiceError::Unavailable { .. } => 503,
                ServiceError::Backend { .. } => 502,
            },
            Self::Stream(StreamError::Timeout { .. }) => 504,
            Self::Stream(StreamError::Disconnected { .. }) => 503,
            Self::Monitor(MonitorError::LockPoisoned { .. })
            | Self::Config(_)
            | Self::Internal { .. } => 500,
        }
    }
}

/// Result type alias for authoring services operations.
pub type AuthoringResult<T> = Result<T, AuthoringError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_attribute_names_substring() {
        let err = ProcessingError::MalformedAttribute {
            attribute: "363698007 38848004".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("363698007 38848004"));
        assert!(msg.contains("exactly one '='"));
    }

    #[test]
    fn test_invalid_attribute_names_side() {
        let err = ProcessingError::InvalidAttribute {
            side: AttributeSide::Destination,
            value: "38848005".to_string(),
            attribute: "363698007=38848005".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("destination"));
        assert!(msg.contains("38848005"));
    }

    #[test]
    fn test_monitor_error_wraps_cause() {
        let err = MonitorError::Fetch {
            key: "task:PROJ/PROJ-1".to_string(),
            source: ServiceError::unavailable("connection refused"),
        };
        assert_eq!(err.key(), "task:PROJ/PROJ-1");
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("connection refused"));
    }

    #[test]
    fn test_authoring_error_from_processing() {
        let err: AuthoringError = ProcessingError::EmptyExpression.into();
        assert!(err.is_processing());
        assert!(!err.is_retryable());
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_authoring_error_not_found() {
        let err: AuthoringError = ServiceError::not_found("task PROJ-9").into();
        assert!(err.is_not_found());
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_monitor_fetch_status_follows_cause() {
        let err: AuthoringError = MonitorError::Fetch {
            key: "branch:MAIN/PROJ".to_string(),
            source: ServiceError::unavailable("timeout"),
        }
        .into();
        assert!(err.is_monitor());
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), 503);
    }

    #[test]
    fn test_authoring_error_internal() {
        let err = AuthoringError::internal("unexpected state");
        assert_eq!(err.status_code(), 500);
        assert!(format!("{err}").contains("unexpected state"));
    }

    #[test]
    fn test_stream_timeout_is_retryable() {
        let err: AuthoringError = StreamError::Timeout { duration_ms: 50 }.into();
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), 504);
    }

    #[test]
    fn test_backend_maps_to_bad_gateway() {
        let err: AuthoringError = ServiceError::backend("500 from upstream").into();
        assert_eq!(err.status_code(), 502);
        assert!(!err.is_retryable());
    }
}
