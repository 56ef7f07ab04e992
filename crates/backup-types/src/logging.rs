//! Tracing subscriber setup for hosts of the backup worker.
//!
//! The worker crates only emit `tracing` events; the host installs a
//! subscriber once at startup, filtered by `Settings::log_level` unless
//! `RUST_LOG` is set.

use tracing_subscriber::EnvFilter;

use crate::{ConfigError, Settings};

/// Filter for `level`, with `RUST_LOG` taking precedence when it parses.
pub fn log_filter(level: &str) -> Result<EnvFilter, ConfigError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => parse_level(level),
    }
}

pub(crate) fn parse_level(level: &str) -> Result<EnvFilter, ConfigError> {
    EnvFilter::try_new(level)
        .map_err(|e| ConfigError::Invalid(format!("log_level '{}': {}", level, e)))
}

/// Install a global fmt subscriber.
///
/// # Errors
///
/// Fails if `log_level` is not a valid filter or a global subscriber is
/// already set.
pub fn init_logging(settings: &Settings) -> Result<(), ConfigError> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(&settings.log_level)?)
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))
}
