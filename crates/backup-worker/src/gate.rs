//! Exclusive execution gate for single-flight backup runs.
//!
//! A gate admits one holder at a time. A second caller is turned away
//! immediately with `BackupError::AlreadyRunning`; nothing queues. The
//! holder can be asked to stop through a cancellation request that it polls
//! between stages.
//!
//! Admission and cancellation share one atomic state word, so a request
//! can only land on a held gate and is never wiped by a concurrent
//! acquisition.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::BackupError;

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const CANCEL_REQUESTED: u8 = 2;

static BACKUP_GATE: OnceLock<ExclusiveGate> = OnceLock::new();

/// Admission control plus cooperative cancellation for one job kind.
///
/// Clones share state, so a clone handed to a scheduler can cancel the
/// run held through another clone.
#[derive(Debug, Clone)]
pub struct ExclusiveGate {
    name: &'static str,
    state: Arc<AtomicU8>,
}

impl ExclusiveGate {
    /// Create a standalone gate.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::new(AtomicU8::new(IDLE)),
        }
    }

    /// The process-wide gate shared by every backup worker.
    pub fn backup() -> Self {
        BACKUP_GATE.get_or_init(|| ExclusiveGate::new("backup")).clone()
    }

    /// Attempt to become the holder.
    ///
    /// A fresh holder never starts canceled. The returned guard releases
    /// the gate when dropped.
    pub fn try_acquire(&self) -> Result<GateGuard, BackupError> {
        if self
            .state
            .compare_exchange(IDLE, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(gate = self.name, "Gate busy, rejecting run");
            return Err(BackupError::AlreadyRunning);
        }

        Ok(GateGuard {
            name: self.name,
            state: self.state.clone(),
            released: false,
        })
    }

    /// Ask the current holder to stop at its next checkpoint.
    ///
    /// Returns `true` when a run holds the gate and will observe the
    /// request. While idle the call does nothing and returns `false`.
    pub fn cancel(&self) -> bool {
        match self.state.compare_exchange(
            RUNNING,
            CANCEL_REQUESTED,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => true,
            Err(current) => current == CANCEL_REQUESTED,
        }
    }

    /// Whether cancellation has been requested. Never blocks.
    pub fn is_canceled(&self) -> bool {
        self.state.load(Ordering::SeqCst) == CANCEL_REQUESTED
    }

    /// Whether a run currently holds the gate.
    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::SeqCst) != IDLE
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Proof of holding an `ExclusiveGate`.
///
/// Dropping the guard releases the gate, so it is released even when the
/// holder unwinds.
#[derive(Debug)]
pub struct GateGuard {
    name: &'static str,
    state: Arc<AtomicU8>,
    released: bool,
}

impl GateGuard {
    /// Release the gate, dropping any pending cancellation. Calling it more
    /// than once is a no-op.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.state.store(IDLE, Ordering::SeqCst);
        debug!(gate = self.name, "Gate released");
    }
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.release();
    }
}
