//! Single-flight backup worker.
//!
//! Creates an index backup and an album export on demand or on a
//! schedule, with at most one run active per gate.
//!
//! # Features
//!
//! - Exclusive execution: a second run is rejected, never queued
//! - Cooperative cancellation, checked between the index and album stages
//! - Provider failures are logged and recorded without aborting the run
//! - Panics inside a run are caught, reported as `InternalFault`, and the
//!   gate is released
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use backup_worker::{BackupRequest, BackupWorker};
//!
//! let worker = BackupWorker::new(Arc::new(settings), index_provider, album_provider);
//! let report = worker.start(BackupRequest::new(true, true, false, 3)).await?;
//! println!("{} albums exported", report.album_count);
//! ```

mod error;
mod fault;
pub mod gate;
pub mod provider;
mod report;
mod worker;

pub use error::{BackupError, ProviderError};
pub use gate::{ExclusiveGate, GateGuard};
pub use provider::{AlbumExportProvider, ConfigurationProvider, IndexBackupProvider};
pub use report::{BackupReport, BackupRequest, BackupTarget, StageOutcome};
pub use worker::{BackupWorker, ScheduledRun};
