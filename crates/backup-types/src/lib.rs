//! # backup-types
//!
//! Settings shared by the backup worker and its scheduler.
//!
//! Settings are layered: built-in defaults, the default config file,
//! an explicit config file, then `BACKUP_*` environment variables.
//!
//! ```no_run
//! use backup_types::Settings;
//!
//! let settings = Settings::load(None)?;
//! backup_types::init_logging(&settings)?;
//! println!("index backups go to {}", settings.index_backup_path().display());
//! # Ok::<(), backup_types::ConfigError>(())
//! ```

pub mod error;
pub mod logging;
pub mod settings;

pub use error::ConfigError;
pub use logging::{init_logging, log_filter};
pub use settings::{ScheduleSettings, Settings};
