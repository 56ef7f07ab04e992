//! Settings loading for the backup worker.
//!
//! Layered config: defaults -> config file -> explicit file -> env vars.
//! The default config file lives at ~/.config/backup-worker/config.toml
//! (platform equivalent via `directories`).

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::logging;

const APP_NAME: &str = "backup-worker";

/// When the scheduled backup fires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleSettings {
    /// Cron expression, 6-field (sec min hour day month weekday)
    #[serde(default = "default_cron")]
    pub cron: String,

    /// IANA timezone the cron expression is evaluated in
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Upper bound for the random delay applied before each run
    #[serde(default = "default_jitter_secs")]
    pub jitter_secs: u64,
}

fn default_cron() -> String {
    "0 30 2 * * *".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_jitter_secs() -> u64 {
    600
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            cron: default_cron(),
            timezone: default_timezone(),
            jitter_secs: default_jitter_secs(),
        }
    }
}

/// Backup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Create index (metadata store) backups
    #[serde(default = "default_true")]
    pub backup_index: bool,

    /// Export albums as descriptor files
    #[serde(default = "default_true")]
    pub backup_albums: bool,

    /// Base directory for all backups
    #[serde(default = "default_backup_path")]
    pub backup_path: String,

    /// Index backup directory, defaults to `<backup_path>/index`
    #[serde(default)]
    pub index_path: Option<String>,

    /// Album export directory, defaults to `<backup_path>/albums`
    #[serde(default)]
    pub albums_path: Option<String>,

    /// Number of index backups to keep
    #[serde(default = "default_backup_retain")]
    pub backup_retain: u32,

    /// Log level or `EnvFilter` directives, applied by `init_logging`
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub schedule: ScheduleSettings,
}

fn default_true() -> bool {
    true
}

fn default_backup_path() -> String {
    ProjectDirs::from("", "", APP_NAME)
        .map(|p| p.data_local_dir().join("backup"))
        .unwrap_or_else(|| PathBuf::from("./backup"))
        .to_string_lossy()
        .to_string()
}

fn default_backup_retain() -> u32 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backup_index: true,
            backup_albums: true,
            backup_path: default_backup_path(),
            index_path: None,
            albums_path: None,
            backup_retain: default_backup_retain(),
            log_level: default_log_level(),
            schedule: ScheduleSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Default config file (~/.config/backup-worker/config.toml)
    /// 3. Explicit config file (optional, must exist when given)
    /// 4. Environment variables (BACKUP_*, nested keys separated by `__`)
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_dir = ProjectDirs::from("", "", APP_NAME)
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("backup_index", true)?
            .set_default("backup_albums", true)?
            .set_default("backup_path", default_backup_path())?
            .set_default("backup_retain", default_backup_retain() as i64)?
            .set_default("log_level", default_log_level())?
            .set_default("schedule.cron", default_cron())?
            .set_default("schedule.timezone", default_timezone())?
            .set_default("schedule.jitter_secs", default_jitter_secs() as i64)?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // BACKUP_BACKUP_RETAIN, BACKUP_SCHEDULE__CRON, ...
        builder = builder.add_source(
            Environment::with_prefix("BACKUP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings that cannot produce a working schedule or log filter.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backup_path.trim().is_empty() {
            return Err(ConfigError::Invalid("backup_path must not be empty".into()));
        }
        if self.schedule.cron.trim().is_empty() {
            return Err(ConfigError::Invalid("schedule.cron must not be empty".into()));
        }
        logging::parse_level(&self.log_level)?;
        Ok(())
    }

    /// Directory index backups are written to.
    pub fn index_backup_path(&self) -> PathBuf {
        match &self.index_path {
            Some(path) => expand_home(path),
            None => expand_home(&self.backup_path).join("index"),
        }
    }

    /// Directory album descriptor files are written to.
    pub fn albums_backup_path(&self) -> PathBuf {
        match &self.albums_path {
            Some(path) => expand_home(path),
            None => expand_home(&self.backup_path).join("albums"),
        }
    }
}

/// Expand a leading `~/` to the user's home directory.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}
