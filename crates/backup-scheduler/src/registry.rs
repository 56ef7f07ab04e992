//! Job registry for tracking scheduled backup runs.
//!
//! The registry keeps one `JobStatus` per registered job: when it last ran,
//! how long it took, how it ended, and what the last completed backup
//! produced.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use backup_worker::{BackupReport, ScheduledRun, StageOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a scheduled execution ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobResult {
    Success,
    /// Failed with an error message
    Failed(String),
    /// Not executed, with the reason (paused, gate busy)
    Skipped(String),
}

/// What a completed backup produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupSummary {
    pub index: StageOutcome,
    pub albums: StageOutcome,
    pub album_count: usize,
}

impl From<&BackupReport> for BackupSummary {
    fn from(report: &BackupReport) -> Self {
        Self {
            index: report.index.clone(),
            albums: report.albums.clone(),
            album_count: report.album_count,
        }
    }
}

/// Value a job function hands back to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub result: JobResult,
    pub summary: Option<BackupSummary>,
}

impl JobOutcome {
    pub fn success() -> Self {
        Self {
            result: JobResult::Success,
            summary: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            result: JobResult::Failed(message.into()),
            summary: None,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            result: JobResult::Skipped(reason.into()),
            summary: None,
        }
    }
}

impl From<ScheduledRun> for JobOutcome {
    fn from(run: ScheduledRun) -> Self {
        match run {
            ScheduledRun::Completed(report) => Self {
                result: JobResult::Success,
                summary: Some(BackupSummary::from(&report)),
            },
            ScheduledRun::Skipped => Self::skipped("backup already running"),
            ScheduledRun::Failed(message) => Self::failed(message),
        }
    }
}

/// Status of a registered job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_name: String,
    /// Cron expression for the job schedule
    pub cron_expr: String,
    /// When the job last finished an execution (if ever)
    pub last_run: Option<DateTime<Utc>>,
    pub last_duration_ms: Option<u64>,
    pub last_result: Option<JobResult>,
    /// Executions that actually ran, failed ones included
    pub run_count: u64,
    pub error_count: u64,
    pub skip_count: u64,
    pub is_running: bool,
    pub is_paused: bool,
    /// Output of the last execution that completed a backup
    #[serde(default)]
    pub last_backup: Option<BackupSummary>,
}

impl JobStatus {
    pub fn new(job_name: String, cron_expr: String) -> Self {
        Self {
            job_name,
            cron_expr,
            last_run: None,
            last_duration_ms: None,
            last_result: None,
            run_count: 0,
            error_count: 0,
            skip_count: 0,
            is_running: false,
            is_paused: false,
            last_backup: None,
        }
    }
}

/// Thread-safe registry of job statuses.
///
/// ```
/// use backup_scheduler::{JobOutcome, JobRegistry, JobResult};
///
/// let registry = JobRegistry::new();
/// registry.register("backup", "0 30 2 * * *");
///
/// registry.record_start("backup");
/// assert!(registry.is_running("backup"));
///
/// registry.record_complete("backup", JobOutcome::success(), 1500);
/// assert_eq!(
///     registry.get_status("backup").unwrap().last_result,
///     Some(JobResult::Success)
/// );
/// ```
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, JobStatus>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, JobStatus>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, JobStatus>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a job, replacing any previous entry with the same name.
    pub fn register(&self, job_name: &str, cron_expr: &str) {
        self.write().insert(
            job_name.to_string(),
            JobStatus::new(job_name.to_string(), cron_expr.to_string()),
        );
    }

    pub fn record_start(&self, job_name: &str) {
        if let Some(status) = self.write().get_mut(job_name) {
            status.is_running = true;
        }
    }

    /// Record the end of an execution.
    ///
    /// Skipped executions bump `skip_count` only; everything else counts
    /// as a run.
    pub fn record_complete(&self, job_name: &str, outcome: JobOutcome, duration_ms: u64) {
        let mut jobs = self.write();
        let Some(status) = jobs.get_mut(job_name) else {
            return;
        };

        status.is_running = false;
        status.last_run = Some(Utc::now());
        status.last_duration_ms = Some(duration_ms);
        match &outcome.result {
            JobResult::Skipped(_) => status.skip_count += 1,
            JobResult::Failed(_) => {
                status.run_count += 1;
                status.error_count += 1;
            }
            JobResult::Success => status.run_count += 1,
        }
        if outcome.summary.is_some() {
            status.last_backup = outcome.summary;
        }
        status.last_result = Some(outcome.result);
    }

    pub fn set_paused(&self, job_name: &str, paused: bool) {
        if let Some(status) = self.write().get_mut(job_name) {
            status.is_paused = paused;
        }
    }

    /// Returns `None` if the job is not registered.
    pub fn get_status(&self, job_name: &str) -> Option<JobStatus> {
        self.read().get(job_name).cloned()
    }

    pub fn get_all_status(&self) -> Vec<JobStatus> {
        self.read().values().cloned().collect()
    }

    /// Returns `false` for unknown jobs.
    pub fn is_running(&self, job_name: &str) -> bool {
        self.read().get(job_name).is_some_and(|s| s.is_running)
    }

    pub fn is_registered(&self, job_name: &str) -> bool {
        self.read().contains_key(job_name)
    }

    /// Returns `false` for unknown jobs.
    pub fn is_paused(&self, job_name: &str) -> bool {
        self.read().get(job_name).is_some_and(|s| s.is_paused)
    }

    pub fn job_count(&self) -> usize {
        self.read().len()
    }
}
