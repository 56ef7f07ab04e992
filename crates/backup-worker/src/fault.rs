//! Panic-site backtraces for faulted runs.
//!
//! By the time `catch_unwind` hands back a payload the panicking frames are
//! gone, so a process-wide hook records a backtrace on the panicking thread
//! and the worker collects it after the catch. The hook chains to the one
//! installed before it, so the host's panic output is unchanged.

use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic;
use std::sync::Once;

static INSTALL_HOOK: Once = Once::new();

thread_local! {
    static PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Install the recording hook. Only the first call has an effect.
pub(crate) fn install_trace_hook() {
    INSTALL_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture().to_string();
            let _ = PANIC_TRACE.try_with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

/// Forget any trace left by an earlier panic on this thread.
pub(crate) fn clear_panic_trace() {
    let _ = PANIC_TRACE.try_with(|slot| slot.borrow_mut().take());
}

/// Trace recorded by the most recent panic on this thread.
///
/// Falls back to a backtrace of the caller when the hook did not run, for
/// example because the host replaced it afterwards.
pub(crate) fn take_panic_trace() -> String {
    PANIC_TRACE
        .try_with(|slot| slot.borrow_mut().take())
        .ok()
        .flatten()
        .unwrap_or_else(|| Backtrace::force_capture().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[inline(never)]
    fn failing_step() {
        panic!("step failed");
    }

    #[test]
    fn test_trace_points_at_panic_site() {
        install_trace_hook();
        clear_panic_trace();

        let result = panic::catch_unwind(failing_step);
        assert!(result.is_err());

        let trace = take_panic_trace();
        assert!(trace.contains("failing_step"), "trace was:\n{}", trace);

        // Taken traces are not handed out twice
        PANIC_TRACE.with(|slot| assert!(slot.borrow().is_none()));
    }

    #[test]
    fn test_install_is_idempotent() {
        install_trace_hook();
        install_trace_hook();

        let result = panic::catch_unwind(|| panic!("second hook call"));
        assert!(result.is_err());
        assert!(!take_panic_trace().is_empty());
    }
}
