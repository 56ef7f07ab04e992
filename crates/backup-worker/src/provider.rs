//! Contracts for the collaborators a backup run drives.
//!
//! The worker does not know how an index is dumped or how an album is
//! encoded. It reads its inputs through `ConfigurationProvider` and hands
//! the actual work to `IndexBackupProvider` and `AlbumExportProvider`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use backup_types::Settings;

use crate::ProviderError;

/// Read-only view of the backup configuration.
pub trait ConfigurationProvider: Send + Sync {
    fn backup_index_enabled(&self) -> bool;

    fn backup_albums_enabled(&self) -> bool;

    fn index_backup_path(&self) -> PathBuf;

    fn albums_backup_path(&self) -> PathBuf;

    /// Maximum number of index backups to keep.
    fn backup_retain(&self) -> u32;
}

impl ConfigurationProvider for Settings {
    fn backup_index_enabled(&self) -> bool {
        self.backup_index
    }

    fn backup_albums_enabled(&self) -> bool {
        self.backup_albums
    }

    fn index_backup_path(&self) -> PathBuf {
        Settings::index_backup_path(self)
    }

    fn albums_backup_path(&self) -> PathBuf {
        Settings::albums_backup_path(self)
    }

    fn backup_retain(&self) -> u32 {
        self.backup_retain
    }
}

/// Writes a snapshot of the index database.
#[async_trait]
pub trait IndexBackupProvider: Send + Sync {
    /// Back up the index into `path`.
    ///
    /// `label` names the backup (empty for the default name), `force`
    /// overwrites an existing backup, and `retain` bounds how many
    /// backups are kept.
    async fn backup(
        &self,
        path: &Path,
        label: &str,
        incremental: bool,
        force: bool,
        retain: u32,
    ) -> Result<(), ProviderError>;
}

/// Writes one descriptor file per album.
#[async_trait]
pub trait AlbumExportProvider: Send + Sync {
    /// Export albums into `path`, returning how many files were written.
    async fn export(&self, path: &Path, force: bool) -> Result<usize, ProviderError>;
}
