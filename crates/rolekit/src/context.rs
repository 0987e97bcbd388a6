//! Progress and cancellation hooks
//!
//! These let callers observe and stop a run without the engine depending on
//! any particular UI.

use crate::types::Operation;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Receiver of progress notifications.
///
/// Notifications are advisory. Executors call these from worker threads, so
/// implementations must be thread-safe and should return quickly.
pub trait ProgressSink: Send + Sync {
    /// Called when a phase with `count` operations begins
    fn on_phase_start(&self, _operation: Operation, _count: usize) {}

    /// Called right before an operation is sent to the remote service
    fn on_operation_start(&self, operation: Operation, role: &str);

    /// Called once the remote call for an operation returns
    fn on_operation_complete(&self, operation: Operation, role: &str, success: bool);

    /// Called when a phase has drained
    fn on_phase_complete(&self, _operation: Operation) {}

    /// Free-text notification (rollback, membership changes)
    fn message(&self, _text: &str) {}
}

/// No-op progress sink
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_operation_start(&self, _operation: Operation, _role: &str) {}
    fn on_operation_complete(&self, _operation: Operation, _role: &str, _success: bool) {}
}

/// Progress sink that forwards everything to the `log` facade
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_phase_start(&self, operation: Operation, count: usize) {
        log::info!("{operation} phase: {count} roles");
    }

    fn on_operation_start(&self, operation: Operation, role: &str) {
        log::debug!("{operation} {role}: started");
    }

    fn on_operation_complete(&self, operation: Operation, role: &str, success: bool) {
        if success {
            log::debug!("{operation} {role}: done");
        } else {
            log::debug!("{operation} {role}: failed");
        }
    }

    fn message(&self, text: &str) {
        log::info!("{text}");
    }
}

/// Shared flag a caller trips to stop a run.
///
/// Executors check it before dispatching each operation; work already sent to
/// the remote service is allowed to finish.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(!other.is_cancelled());
        flag.cancel();
        assert!(other.is_cancelled());
    }
}
