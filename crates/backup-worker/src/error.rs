//! Error types for backup runs and backup providers.

use thiserror::Error;

use crate::report::BackupTarget;

/// Errors a backup run can end with.
#[derive(Debug, Error)]
pub enum BackupError {
    /// Another run holds the gate; nothing was started
    #[error("backup already running")]
    AlreadyRunning,

    /// A provider failed.
    ///
    /// Recorded in the run report and logged; `BackupWorker::start`
    /// never returns it.
    #[error("backup: {message} ({target})")]
    Provider {
        target: BackupTarget,
        message: String,
    },

    /// Cancellation was requested before the album stage
    #[error("backup: canceled")]
    Canceled,

    /// The run panicked; the gate has been released
    #[error("backup: {message} (worker panic)\nstack: {trace}")]
    InternalFault { message: String, trace: String },
}

impl BackupError {
    /// Whether the run was turned away at admission.
    pub fn is_already_running(&self) -> bool {
        matches!(self, BackupError::AlreadyRunning)
    }
}

/// Errors returned by index and album providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Failed(String),
}

impl From<String> for ProviderError {
    fn from(message: String) -> Self {
        ProviderError::Failed(message)
    }
}

impl From<&str> for ProviderError {
    fn from(message: &str) -> Self {
        ProviderError::Failed(message.to_string())
    }
}
