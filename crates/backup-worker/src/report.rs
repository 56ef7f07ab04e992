//! Run requests and per-run reports.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::ConfigurationProvider;

/// The two things a run can back up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupTarget {
    Index,
    Albums,
}

impl fmt::Display for BackupTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupTarget::Index => f.write_str("index"),
            BackupTarget::Albums => f.write_str("albums"),
        }
    }
}

/// What happened to one target during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StageOutcome {
    /// Not requested, or not reached
    #[default]
    Skipped,
    Succeeded,
    /// The provider failed; the run went on without it
    Failed(String),
}

impl StageOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StageOutcome::Failed(_))
    }
}

/// Arguments of a single backup run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackupRequest {
    pub index: bool,
    pub albums: bool,
    /// Recreate output even when nothing changed
    pub force: bool,
    pub retain: u32,
}

impl BackupRequest {
    pub fn new(index: bool, albums: bool, force: bool, retain: u32) -> Self {
        Self {
            index,
            albums,
            force,
            retain,
        }
    }

    /// The request a scheduled run makes: targets and retention from the
    /// configuration, always forced.
    pub fn scheduled(config: &dyn ConfigurationProvider) -> Self {
        Self {
            index: config.backup_index_enabled(),
            albums: config.backup_albums_enabled(),
            force: true,
            retain: config.backup_retain(),
        }
    }

    /// Whether there is nothing to back up.
    pub fn is_empty(&self) -> bool {
        !self.index && !self.albums
    }

    /// Human readable summary of the planned work.
    pub fn describe(&self) -> &'static str {
        match (self.index, self.albums) {
            (true, true) => "creating index and album backups",
            (true, false) => "creating index backup",
            (false, true) => "creating album backup",
            (false, false) => "nothing to back up",
        }
    }
}

/// Outcome of a run that was not rejected, canceled or aborted.
///
/// Provider failures show up here and in the log only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReport {
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub index: StageOutcome,
    pub albums: StageOutcome,
    /// Album descriptor files written
    pub album_count: usize,
}

impl BackupReport {
    /// Report for a run with nothing to do.
    pub fn noop() -> Self {
        Self::started(Utc::now())
    }

    pub(crate) fn started(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            elapsed: Duration::ZERO,
            index: StageOutcome::Skipped,
            albums: StageOutcome::Skipped,
            album_count: 0,
        }
    }

    /// Whether neither target ran.
    pub fn is_noop(&self) -> bool {
        self.index == StageOutcome::Skipped && self.albums == StageOutcome::Skipped
    }

    pub fn has_failures(&self) -> bool {
        self.index.is_failed() || self.albums.is_failed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct FixedConfig;

    impl ConfigurationProvider for FixedConfig {
        fn backup_index_enabled(&self) -> bool {
            true
        }
        fn backup_albums_enabled(&self) -> bool {
            false
        }
        fn index_backup_path(&self) -> PathBuf {
            PathBuf::from("/tmp/index")
        }
        fn albums_backup_path(&self) -> PathBuf {
            PathBuf::from("/tmp/albums")
        }
        fn backup_retain(&self) -> u32 {
            4
        }
    }

    #[test]
    fn test_scheduled_request_is_forced() {
        let request = BackupRequest::scheduled(&FixedConfig);
        assert_eq!(request, BackupRequest::new(true, false, true, 4));
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            BackupRequest::new(true, true, false, 0).describe(),
            "creating index and album backups"
        );
        assert_eq!(
            BackupRequest::new(true, false, false, 0).describe(),
            "creating index backup"
        );
        assert_eq!(
            BackupRequest::new(false, true, false, 0).describe(),
            "creating album backup"
        );
        assert!(BackupRequest::default().is_empty());
    }

    #[test]
    fn test_report_flags() {
        let mut report = BackupReport::noop();
        assert!(report.is_noop());
        assert!(!report.has_failures());

        report.index = StageOutcome::Failed("disk full".into());
        report.albums = StageOutcome::Succeeded;
        assert!(!report.is_noop());
        assert!(report.has_failures());
    }

    #[test]
    fn test_target_display() {
        assert_eq!(BackupTarget::Index.to_string(), "index");
        assert_eq!(BackupTarget::Albums.to_string(), "albums");
    }
}
