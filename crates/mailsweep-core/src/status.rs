//! Observable progress for long-running scans.

use std::sync::{Arc, Mutex};

use serde::Serialize;

/// Operation text while a scan is running.
pub(crate) const OP_PROCESSING: &str = "Processing emails";
/// Operation text after a successful scan.
pub(crate) const OP_COMPLETED: &str = "Completed";
/// Operation text after a failed operation.
pub(crate) const OP_ERROR: &str = "Error occurred";
/// Operation text after a caller-requested cancellation.
pub(crate) const OP_CANCELLED: &str = "Cancelled";

/// Point-in-time snapshot of scan progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingStatus {
    /// True while a scan is running.
    pub is_processing: bool,
    /// Total messages the scan will process.
    pub total_emails: u64,
    /// Messages processed so far.
    pub processed_emails: u64,
    /// Batch currently being processed, counted from 1.
    pub current_batch: u64,
    /// Total number of batches.
    pub total_batches: u64,
    /// Human-readable phase description.
    pub current_operation: String,
}

impl Default for ProcessingStatus {
    fn default() -> Self {
        Self {
            is_processing: false,
            total_emails: 0,
            processed_emails: 0,
            current_batch: 0,
            total_batches: 0,
            current_operation: "Idle".to_string(),
        }
    }
}

impl ProcessingStatus {
    /// Completion percentage in `[0, 100]`; zero when nothing is scheduled.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress_percentage(&self) -> f64 {
        if self.total_emails == 0 {
            0.0
        } else {
            self.processed_emails as f64 / self.total_emails as f64 * 100.0
        }
    }
}

/// Shared handle to scan progress, cloneable across tasks.
#[derive(Debug, Clone, Default)]
pub struct StatusHandle {
    inner: Arc<Mutex<ProcessingStatus>>,
}

impl StatusHandle {
    /// Returns a copy of the current status.
    #[must_use]
    pub fn snapshot(&self) -> ProcessingStatus {
        self.lock().clone()
    }

    /// Resets counters for a new scan over `total` messages.
    pub(crate) fn begin(&self, total: u64, total_batches: u64) {
        *self.lock() = ProcessingStatus {
            is_processing: true,
            total_emails: total,
            processed_emails: 0,
            current_batch: 0,
            total_batches,
            current_operation: OP_PROCESSING.to_string(),
        };
    }

    /// Advances to the next batch.
    pub(crate) fn start_batch(&self) {
        self.lock().current_batch += 1;
    }

    /// Counts one processed message.
    pub(crate) fn record_processed(&self) {
        self.lock().processed_emails += 1;
    }

    /// Marks the scan finished with the given operation text.
    pub(crate) fn finish(&self, operation: &str) {
        let mut status = self.lock();
        status.is_processing = false;
        status.current_operation = operation.to_string();
    }

    /// Status is plain data; a poisoned lock still holds a usable value.
    fn lock(&self) -> std::sync::MutexGuard<'_, ProcessingStatus> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn default_is_idle() {
        let status = ProcessingStatus::default();
        assert!(!status.is_processing);
        assert_eq!(status.current_operation, "Idle");
        assert!((status.progress_percentage() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn lifecycle_updates_are_visible_through_clones() {
        let handle = StatusHandle::default();
        let observer = handle.clone();

        handle.begin(10, 2);
        assert!(observer.snapshot().is_processing);
        assert_eq!(observer.snapshot().total_emails, 10);

        handle.start_batch();
        for _ in 0..5 {
            handle.record_processed();
        }
        let snap = observer.snapshot();
        assert_eq!(snap.current_batch, 1);
        assert_eq!(snap.processed_emails, 5);
        assert!((snap.progress_percentage() - 50.0).abs() < f64::EPSILON);

        handle.finish(OP_COMPLETED);
        let snap = observer.snapshot();
        assert!(!snap.is_processing);
        assert_eq!(snap.current_operation, OP_COMPLETED);
    }

    #[test]
    fn percentage_never_exceeds_hundred() {
        let handle = StatusHandle::default();
        handle.begin(4, 1);
        for _ in 0..4 {
            handle.record_processed();
        }
        assert!((handle.snapshot().progress_percentage() - 100.0).abs() < f64::EPSILON);
    }
}
