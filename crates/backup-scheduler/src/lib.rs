//! Scheduled trigger for the backup worker.
//!
//! Wraps `tokio-cron-scheduler` with timezone support, jitter, pause and
//! resume, a registry of job outcomes, and graceful shutdown that asks a
//! running backup to stop at its cancellation checkpoint.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use backup_scheduler::{create_backup_job, BackupJobConfig, SchedulerConfig, SchedulerService};
//!
//! let scheduler = SchedulerService::new(SchedulerConfig::default()).await?;
//! create_backup_job(&scheduler, worker.clone(), BackupJobConfig::from(&settings.schedule)).await?;
//! scheduler.start().await?;
//!
//! let status = scheduler.registry().get_status("backup");
//! ```

mod config;
mod error;
mod jitter;
pub mod jobs;
mod registry;
mod scheduler;

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use jitter::JitterConfig;
pub use jobs::{create_backup_job, BackupJobConfig, BACKUP_JOB_NAME};
pub use registry::{BackupSummary, JobOutcome, JobRegistry, JobResult, JobStatus};
pub use scheduler::{validate_cron_expression, SchedulerService};
