//! Job definitions registered with the scheduler.

pub mod backup;

pub use backup::{create_backup_job, BackupJobConfig, BACKUP_JOB_NAME};
