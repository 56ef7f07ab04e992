//! The backup worker.
//!
//! A run backs up the index first, then checks for cancellation, then
//! exports albums. Provider failures are logged and recorded in the report
//! without stopping the run. Only admission, cancellation and panics fail
//! the run as a whole.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tracing::{debug, error, info, trace, warn};

use crate::fault;
use crate::gate::ExclusiveGate;
use crate::provider::{AlbumExportProvider, ConfigurationProvider, IndexBackupProvider};
use crate::report::{BackupReport, BackupRequest, BackupTarget, StageOutcome};
use crate::BackupError;

/// Result of a scheduled run, for callers that record outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduledRun {
    Completed(BackupReport),
    /// Another run held the gate
    Skipped,
    Failed(String),
}

/// Creates index and album backups, one run at a time.
pub struct BackupWorker {
    config: Arc<dyn ConfigurationProvider>,
    index: Arc<dyn IndexBackupProvider>,
    albums: Arc<dyn AlbumExportProvider>,
    gate: ExclusiveGate,
    last_run: Mutex<Option<DateTime<Utc>>>,
}

impl BackupWorker {
    /// Create a worker guarded by the process-wide backup gate.
    pub fn new(
        config: Arc<dyn ConfigurationProvider>,
        index: Arc<dyn IndexBackupProvider>,
        albums: Arc<dyn AlbumExportProvider>,
    ) -> Self {
        Self {
            config,
            index,
            albums,
            gate: ExclusiveGate::backup(),
            last_run: Mutex::new(None),
        }
    }

    /// Use `gate` instead of the process-wide backup gate.
    pub fn with_gate(mut self, gate: ExclusiveGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn gate(&self) -> &ExclusiveGate {
        &self.gate
    }

    /// When the last run completed, if any.
    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        *self.last_run.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The request a scheduled run makes with the current configuration.
    pub fn scheduled_request(&self) -> BackupRequest {
        BackupRequest::scheduled(self.config.as_ref())
    }

    /// Run with the configured targets and retention, forcing output.
    ///
    /// Errors are logged here and never propagated.
    pub async fn start_scheduled(&self) -> ScheduledRun {
        match self.start(self.scheduled_request()).await {
            Ok(report) => ScheduledRun::Completed(report),
            Err(err) => {
                error!("scheduler: {} (backup)", err);
                if err.is_already_running() {
                    ScheduledRun::Skipped
                } else {
                    ScheduledRun::Failed(err.to_string())
                }
            }
        }
    }

    /// Create the requested backups.
    ///
    /// # Errors
    ///
    /// - `AlreadyRunning` if another run holds the gate
    /// - `Canceled` if cancellation was requested before the album stage
    /// - `InternalFault` if the run panicked
    pub async fn start(&self, request: BackupRequest) -> Result<BackupReport, BackupError> {
        if request.is_empty() {
            trace!("backup: nothing to back up");
            return Ok(BackupReport::noop());
        }

        let mut guard = self.gate.try_acquire()?;
        fault::install_trace_hook();
        fault::clear_panic_trace();
        let outcome = AssertUnwindSafe(self.run_stages(request))
            .catch_unwind()
            .await;
        guard.release();

        match outcome {
            Ok(result) => result,
            Err(payload) => {
                let err = BackupError::InternalFault {
                    message: panic_message(payload.as_ref()),
                    trace: fault::take_panic_trace(),
                };
                error!("{}", err);
                Err(err)
            }
        }
    }

    async fn run_stages(&self, request: BackupRequest) -> Result<BackupReport, BackupError> {
        let start = Instant::now();
        let mut report = BackupReport::started(Utc::now());

        info!("backup: {}", request.describe());

        if request.index {
            report.index = self.backup_index(&request).await;
        }

        if self.gate.is_canceled() {
            warn!("backup: canceled before album export");
            return Err(BackupError::Canceled);
        }

        if request.albums {
            let (outcome, count) = self.export_albums(&request).await;
            report.albums = outcome;
            report.album_count = count;
        }

        self.touch_last_run();
        report.elapsed = start.elapsed();
        info!(
            duration_ms = report.elapsed.as_millis() as u64,
            "backup: completed in {:?}", report.elapsed
        );

        Ok(report)
    }

    async fn backup_index(&self, request: &BackupRequest) -> StageOutcome {
        let path = self.config.index_backup_path();

        match self
            .index
            .backup(&path, "", false, request.force, request.retain)
            .await
        {
            Ok(()) => StageOutcome::Succeeded,
            Err(e) => stage_failure(BackupTarget::Index, e.to_string()),
        }
    }

    async fn export_albums(&self, request: &BackupRequest) -> (StageOutcome, usize) {
        let path = self.config.albums_backup_path();
        info!("backup: creating album files in {}", path.display());

        match self.albums.export(&path, request.force).await {
            Ok(count) => {
                if count > 0 {
                    debug!("backup: {} albums saved as yaml files", count);
                }
                (StageOutcome::Succeeded, count)
            }
            Err(e) => (stage_failure(BackupTarget::Albums, e.to_string()), 0),
        }
    }

    fn touch_last_run(&self) {
        let now = Utc::now();
        let mut last_run = self.last_run.lock().unwrap_or_else(PoisonError::into_inner);
        if last_run.map_or(true, |prev| prev < now) {
            *last_run = Some(now);
        }
    }
}

fn stage_failure(target: BackupTarget, message: String) -> StageOutcome {
    let err = BackupError::Provider {
        target,
        message: message.clone(),
    };
    error!("{}", err);
    StageOutcome::Failed(message)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
