//! Scheduled backup job.
//!
//! Each tick calls `BackupWorker::start_scheduled`, which reads targets and
//! retention from the live configuration and forces output. A tick that
//! finds the gate busy is recorded as skipped. When the scheduler shuts
//! down, cancellation is requested on the worker's gate so a run in
//! progress stops before the album export, and a tick that has not yet
//! taken the gate does not start a run.

use std::sync::Arc;
use std::time::Duration;

use backup_types::ScheduleSettings;
use backup_worker::{BackupWorker, ExclusiveGate};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{JitterConfig, JobOutcome, JobRegistry, SchedulerError, SchedulerService};

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Registry name of the backup job.
pub const BACKUP_JOB_NAME: &str = "backup";

/// Configuration for the backup job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupJobConfig {
    /// Cron expression (default: "0 30 2 * * *" = 2:30 AM daily)
    pub cron: String,

    /// Timezone (default: "UTC")
    pub timezone: String,

    /// Max jitter in seconds (default: 600 = 10 min)
    pub jitter_secs: u64,
}

impl Default for BackupJobConfig {
    fn default() -> Self {
        Self::from(&ScheduleSettings::default())
    }
}

impl From<&ScheduleSettings> for BackupJobConfig {
    fn from(schedule: &ScheduleSettings) -> Self {
        Self {
            cron: schedule.cron.clone(),
            timezone: schedule.timezone.clone(),
            jitter_secs: schedule.jitter_secs,
        }
    }
}

/// Register the backup job with the scheduler.
///
/// # Errors
///
/// Returns error if job registration fails (invalid cron, invalid timezone).
pub async fn create_backup_job(
    scheduler: &SchedulerService,
    worker: Arc<BackupWorker>,
    config: BackupJobConfig,
) -> Result<Uuid, SchedulerError> {
    let job_worker = worker.clone();
    let job_token = scheduler.shutdown_token();
    let uuid = scheduler
        .register_job(
            BACKUP_JOB_NAME,
            &config.cron,
            Some(&config.timezone),
            JitterConfig::new(config.jitter_secs),
            move || {
                let worker = job_worker.clone();
                let token = job_token.clone();
                async move { run_scheduled_backup(&worker, &token).await }
            },
        )
        .await?;

    tokio::spawn(cancel_on_shutdown(
        scheduler.shutdown_token(),
        worker.gate().clone(),
        scheduler.registry(),
    ));

    info!(cron = %config.cron, timezone = %config.timezone, "Registered backup job");
    Ok(uuid)
}

/// One scheduled tick. Nothing runs once shutdown has begun.
async fn run_scheduled_backup(worker: &BackupWorker, token: &CancellationToken) -> JobOutcome {
    if token.is_cancelled() {
        debug!("backup: scheduler shutting down, not starting");
        return JobOutcome::skipped("scheduler shutting down");
    }
    JobOutcome::from(worker.start_scheduled().await)
}

/// Request cancellation on the gate once shutdown begins.
///
/// A tick marked running in the registry may not have taken the gate yet,
/// so the request is repeated until it lands or the tick ends. A tick that
/// is not yet marked running checks the token itself before starting.
async fn cancel_on_shutdown(
    token: CancellationToken,
    gate: ExclusiveGate,
    registry: Arc<JobRegistry>,
) {
    token.cancelled().await;
    loop {
        if gate.cancel() {
            info!("backup: cancellation requested by scheduler shutdown");
            return;
        }
        if !registry.is_running(BACKUP_JOB_NAME) {
            return;
        }
        tokio::time::sleep(CANCEL_POLL_INTERVAL).await;
    }
}
