//! Scheduler service wrapper around tokio-cron-scheduler.
//!
//! The service owns the cron scheduler, the job registry and the shutdown
//! token. Timing is entirely up to the cron expression; the service only
//! decides whether a tick runs (paused, shutting down) and records how it
//! went.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono_tz::Tz;
use futures::FutureExt;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{JitterConfig, JobOutcome, JobRegistry, JobResult, SchedulerConfig, SchedulerError};

const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Validate a cron expression.
///
/// Expressions use the 6-field format: second minute hour day-of-month
/// month day-of-week.
///
/// ```
/// use backup_scheduler::validate_cron_expression;
///
/// assert!(validate_cron_expression("0 30 2 * * *").is_ok()); // 2:30 AM daily
/// assert!(validate_cron_expression("daily").is_err());
/// ```
pub fn validate_cron_expression(expr: &str) -> Result<(), SchedulerError> {
    Job::new_async(expr, |_uuid, _lock| Box::pin(async {}))
        .map(|_| ())
        .map_err(|e| SchedulerError::InvalidCron(format!("'{}': {}", expr, e)))
}

/// Lifecycle management for scheduled backup jobs.
pub struct SchedulerService {
    scheduler: JobScheduler,
    config: SchedulerConfig,
    registry: Arc<JobRegistry>,
    shutdown_token: CancellationToken,
    is_running: AtomicBool,
}

impl SchedulerService {
    /// Create a scheduler service. Call `start()` to begin executing jobs.
    pub async fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        // Fail early on a bad default timezone
        config.parse_timezone()?;

        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            config,
            registry: Arc::new(JobRegistry::new()),
            shutdown_token: CancellationToken::new(),
            is_running: AtomicBool::new(false),
        })
    }

    /// Start executing jobs on their schedules.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::AlreadyRunning` if already started.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning);
        }

        if let Err(e) = self.scheduler.start().await {
            self.is_running.store(false, Ordering::SeqCst);
            return Err(e.into());
        }
        info!("Scheduler started");

        Ok(())
    }

    /// Shut down gracefully.
    ///
    /// Cancels the shutdown token, gives running jobs up to
    /// `shutdown_timeout_secs` to finish, then stops the cron scheduler.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::NotRunning` if the scheduler is not started.
    pub async fn shutdown(&mut self) -> Result<(), SchedulerError> {
        if !self.is_running.load(Ordering::SeqCst) {
            return Err(SchedulerError::NotRunning);
        }

        info!("Initiating scheduler shutdown");
        self.shutdown_token.cancel();

        let deadline = Instant::now() + Duration::from_secs(self.config.shutdown_timeout_secs);
        while self.has_running_jobs() && Instant::now() < deadline {
            tokio::time::sleep(SHUTDOWN_POLL_INTERVAL).await;
        }
        if self.has_running_jobs() {
            warn!("Jobs still running after shutdown timeout");
        }

        if let Err(e) = self.scheduler.shutdown().await {
            warn!("Error during scheduler shutdown: {}", e);
        }

        self.is_running.store(false, Ordering::SeqCst);
        info!("Scheduler shutdown complete");

        Ok(())
    }

    fn has_running_jobs(&self) -> bool {
        self.registry
            .get_all_status()
            .iter()
            .any(|status| status.is_running)
    }

    /// Token cancelled when shutdown begins.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn registry(&self) -> Arc<JobRegistry> {
        self.registry.clone()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Register a job that runs `job_fn` on a cron schedule.
    ///
    /// Each tick skips while the job is paused or the scheduler is shutting
    /// down, waits out the jitter, then runs `job_fn` and records its
    /// outcome in the registry. A panicking `job_fn` is recorded as a
    /// failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the cron expression or timezone is invalid.
    pub async fn register_job<F, Fut>(
        &self,
        name: &str,
        cron_expr: &str,
        timezone: Option<&str>,
        jitter: JitterConfig,
        job_fn: F,
    ) -> Result<Uuid, SchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = JobOutcome> + Send + 'static,
    {
        let tz = match timezone {
            Some(tz_str) => Self::parse_timezone(tz_str)?,
            None => self.config.parse_timezone()?,
        };
        validate_cron_expression(cron_expr)?;

        let job_name = name.to_string();
        let job_fn = Arc::new(job_fn);
        let registry = self.registry.clone();
        let shutdown_token = self.shutdown_token.clone();

        let job = Job::new_async_tz(cron_expr, tz, move |_uuid, _lock| {
            let name = job_name.clone();
            let job_fn = job_fn.clone();
            let registry = registry.clone();
            let token = shutdown_token.clone();

            Box::pin(async move {
                execute_tick(&name, &registry, jitter, &token, job_fn.as_ref()).await;
            })
        })
        .map_err(|e| SchedulerError::InvalidCron(e.to_string()))?;

        self.registry.register(name, cron_expr);
        let uuid = self.scheduler.add(job).await?;
        info!(job = %name, uuid = %uuid, cron = %cron_expr, timezone = %tz.name(), "Job registered");

        Ok(uuid)
    }

    /// Stop a job from running until resumed.
    pub fn pause_job(&self, name: &str) -> Result<(), SchedulerError> {
        if !self.registry.is_registered(name) {
            return Err(SchedulerError::JobNotFound(name.to_string()));
        }
        self.registry.set_paused(name, true);
        info!(job = %name, "Job paused");
        Ok(())
    }

    pub fn resume_job(&self, name: &str) -> Result<(), SchedulerError> {
        if !self.registry.is_registered(name) {
            return Err(SchedulerError::JobNotFound(name.to_string()));
        }
        self.registry.set_paused(name, false);
        info!(job = %name, "Job resumed");
        Ok(())
    }

    /// Parse an IANA timezone name.
    pub fn parse_timezone(tz_str: &str) -> Result<Tz, SchedulerError> {
        tz_str
            .parse()
            .map_err(|_| SchedulerError::InvalidTimezone(tz_str.to_string()))
    }
}

async fn execute_tick<F, Fut>(
    name: &str,
    registry: &JobRegistry,
    jitter: JitterConfig,
    token: &CancellationToken,
    job_fn: &F,
) where
    F: Fn() -> Fut,
    Fut: Future<Output = JobOutcome>,
{
    if registry.is_paused(name) {
        debug!(job = %name, "Job paused, skipping tick");
        return;
    }

    tokio::select! {
        biased;
        _ = token.cancelled() => {
            debug!(job = %name, "Shutdown during jitter, skipping tick");
            return;
        }
        _ = jitter.delay() => {}
    }

    // Shutdown may have begun while the delay was completing
    if token.is_cancelled() {
        debug!(job = %name, "Shutdown before run, skipping tick");
        return;
    }

    registry.record_start(name);
    let start = Instant::now();
    let outcome = match AssertUnwindSafe(async { job_fn().await })
        .catch_unwind()
        .await
    {
        Ok(outcome) => outcome,
        Err(payload) => {
            JobOutcome::failed(format!("job panicked: {}", panic_message(payload.as_ref())))
        }
    };
    let duration_ms = start.elapsed().as_millis() as u64;

    match &outcome.result {
        JobResult::Success => info!(job = %name, duration_ms, "Job completed"),
        JobResult::Failed(e) => warn!(job = %name, duration_ms, error = %e, "Job failed"),
        JobResult::Skipped(reason) => info!(job = %name, reason = %reason, "Job skipped"),
    }
    registry.record_complete(name, outcome, duration_ms);
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn fast_config() -> SchedulerConfig {
        SchedulerConfig {
            shutdown_timeout_secs: 1,
            ..Default::default()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_scheduler_start_stop() {
        let mut scheduler = SchedulerService::new(fast_config()).await.unwrap();
        assert!(!scheduler.is_running());

        scheduler.start().await.unwrap();
        assert!(scheduler.is_running());
        assert!(matches!(
            scheduler.start().await,
            Err(SchedulerError::AlreadyRunning)
        ));

        scheduler.shutdown().await.unwrap();
        assert!(!scheduler.is_running());
        assert!(matches!(
            scheduler.shutdown().await,
            Err(SchedulerError::NotRunning)
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shutdown_cancels_token() {
        let mut scheduler = SchedulerService::new(fast_config()).await.unwrap();
        let token = scheduler.shutdown_token();
        assert!(!token.is_cancelled());

        scheduler.start().await.unwrap();
        scheduler.shutdown().await.unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_timezone_config() {
        let config = SchedulerConfig {
            default_timezone: "Invalid/Zone".to_string(),
            ..Default::default()
        };
        let result = SchedulerService::new(config).await;
        assert!(matches!(result, Err(SchedulerError::InvalidTimezone(_))));
    }

    #[test]
    fn test_validate_cron_expression() {
        assert!(validate_cron_expression("0 30 2 * * *").is_ok());
        assert!(validate_cron_expression("*/10 * * * * *").is_ok());
        assert!(validate_cron_expression("0 0 0 * * SUN").is_ok());

        assert!(validate_cron_expression("invalid").is_err());
        assert!(validate_cron_expression("").is_err());
        assert!(validate_cron_expression("* * *").is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_register_job_appears_in_registry() {
        let scheduler = SchedulerService::new(SchedulerConfig::default())
            .await
            .unwrap();

        let uuid = scheduler
            .register_job(
                "backup",
                "0 30 2 * * *",
                Some("Europe/Berlin"),
                JitterConfig::none(),
                || async { JobOutcome::success() },
            )
            .await
            .unwrap();

        assert!(!uuid.is_nil());
        let status = scheduler.registry().get_status("backup").unwrap();
        assert_eq!(status.cron_expr, "0 30 2 * * *");
        assert_eq!(status.run_count, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_register_job_rejects_bad_input() {
        let scheduler = SchedulerService::new(SchedulerConfig::default())
            .await
            .unwrap();

        let result = scheduler
            .register_job("bad-cron", "nightly", None, JitterConfig::none(), || async {
                JobOutcome::success()
            })
            .await;
        assert!(matches!(result, Err(SchedulerError::InvalidCron(_))));

        let result = scheduler
            .register_job(
                "bad-tz",
                "0 0 * * * *",
                Some("Invalid/Timezone"),
                JitterConfig::none(),
                || async { JobOutcome::success() },
            )
            .await;
        assert!(matches!(result, Err(SchedulerError::InvalidTimezone(_))));

        assert_eq!(scheduler.registry().job_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pause_resume() {
        let scheduler = SchedulerService::new(SchedulerConfig::default())
            .await
            .unwrap();
        scheduler
            .register_job("backup", "0 0 * * * *", None, JitterConfig::none(), || async {
                JobOutcome::success()
            })
            .await
            .unwrap();

        scheduler.pause_job("backup").unwrap();
        assert!(scheduler.registry().is_paused("backup"));
        scheduler.resume_job("backup").unwrap();
        assert!(!scheduler.registry().is_paused("backup"));

        assert!(matches!(
            scheduler.pause_job("missing"),
            Err(SchedulerError::JobNotFound(_))
        ));
        assert!(matches!(
            scheduler.resume_job("missing"),
            Err(SchedulerError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_execute_tick_records_outcome() {
        let registry = JobRegistry::new();
        registry.register("backup", "0 0 * * * *");
        let token = CancellationToken::new();

        execute_tick("backup", &registry, JitterConfig::none(), &token, &|| async {
            JobOutcome::failed("backup: canceled")
        })
        .await;

        let status = registry.get_status("backup").unwrap();
        assert!(!status.is_running);
        assert_eq!(status.error_count, 1);
    }

    #[tokio::test]
    async fn test_execute_tick_skips_when_paused_or_shutting_down() {
        let registry = JobRegistry::new();
        registry.register("backup", "0 0 * * * *");
        let calls = Arc::new(AtomicU32::new(0));
        let job = {
            let calls = calls.clone();
            move || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    JobOutcome::success()
                }
            }
        };

        registry.set_paused("backup", true);
        let token = CancellationToken::new();
        execute_tick("backup", &registry, JitterConfig::none(), &token, &job).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        registry.set_paused("backup", false);
        token.cancel();
        execute_tick("backup", &registry, JitterConfig::new(60), &token, &job).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let fresh = CancellationToken::new();
        execute_tick("backup", &registry, JitterConfig::none(), &fresh, &job).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.get_status("backup").unwrap().run_count, 1);
    }

    #[tokio::test]
    async fn test_panicking_job_is_recorded_as_failure() {
        let registry = JobRegistry::new();
        registry.register("backup", "0 0 * * * *");
        let token = CancellationToken::new();

        execute_tick("backup", &registry, JitterConfig::none(), &token, &|| async {
            if true {
                panic!("provider exploded");
            }
            JobOutcome::success()
        })
        .await;

        let status = registry.get_status("backup").unwrap();
        assert!(!status.is_running);
        assert_eq!(status.error_count, 1);
        assert_eq!(
            status.last_result,
            Some(JobResult::Failed("job panicked: provider exploded".into()))
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shutdown_not_delayed_by_panicked_job() {
        let mut scheduler = SchedulerService::new(SchedulerConfig {
            shutdown_timeout_secs: 30,
            ..Default::default()
        })
        .await
        .unwrap();

        scheduler
            .register_job("exploding", "*/1 * * * * *", None, JitterConfig::none(), || async {
                if true {
                    panic!("provider exploded");
                }
                JobOutcome::success()
            })
            .await
            .unwrap();

        scheduler.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;

        let status = scheduler.registry().get_status("exploding").unwrap();
        assert!(status.error_count >= 1);

        let begun = Instant::now();
        scheduler.shutdown().await.unwrap();
        assert!(begun.elapsed() < Duration::from_secs(5));
        assert!(!scheduler.registry().is_running("exploding"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_job_fires_on_schedule() {
        let mut scheduler = SchedulerService::new(fast_config()).await.unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        scheduler
            .register_job("every-second", "*/1 * * * * *", None, JitterConfig::none(), move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    JobOutcome::success()
                }
            })
            .await
            .unwrap();

        scheduler.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        scheduler.shutdown().await.unwrap();

        assert!(calls.load(Ordering::SeqCst) >= 1);
        let status = scheduler.registry().get_status("every-second").unwrap();
        assert!(status.run_count >= 1);
        assert_eq!(status.last_result, Some(JobResult::Success));
    }
}
