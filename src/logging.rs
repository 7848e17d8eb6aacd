//! Tracing subscriber setup for binaries and tests.

use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;

/// Installs a global `fmt` subscriber.
///
/// The filter comes from `RUST_LOG`; `default_directive` (for example
/// `"info"` or `"authoring=debug"`) applies when it is unset. Returns
/// `Ok(false)` if a global subscriber was already installed.
///
/// # Errors
///
/// Returns `ConfigError::Invalid` if `default_directive` does not parse.
pub fn init_tracing(default_directive: &str) -> Result<bool, ConfigError> {
    let directive: Directive = default_directive.parse().map_err(|e| ConfigError::Invalid {
        field: "log_level".to_string(),
        reason: format!("{e}"),
    })?;

    let filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    Ok(tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok())
}
