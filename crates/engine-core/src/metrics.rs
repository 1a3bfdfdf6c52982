use model::summary::RunSummary;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    objects_copied: AtomicU64,
    batches_completed: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    failure_count: AtomicU64,
}

/// Cheap-to-clone handle over shared counters. Worker loops and chain
/// stages bump these; the run folds a snapshot into its summary at the end.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub objects_copied: u64,
    pub batches_completed: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub failure_count: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_objects(&self, count: u64) {
        self.inner.objects_copied.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_batches(&self, count: u64) {
        self.inner
            .batches_completed
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_bytes_read(&self, count: u64) {
        self.inner.bytes_read.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_bytes_written(&self, count: u64) {
        self.inner.bytes_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_failures(&self, count: u64) {
        self.inner.failure_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            objects_copied: self.inner.objects_copied.load(Ordering::Relaxed),
            batches_completed: self.inner.batches_completed.load(Ordering::Relaxed),
            bytes_read: self.inner.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.inner.bytes_written.load(Ordering::Relaxed),
            failure_count: self.inner.failure_count.load(Ordering::Relaxed),
        }
    }
}

impl From<MetricsSnapshot> for RunSummary {
    fn from(snapshot: MetricsSnapshot) -> Self {
        RunSummary {
            objects_copied: snapshot.objects_copied,
            batches_completed: snapshot.batches_completed,
            bytes_read: snapshot.bytes_read,
            bytes_written: snapshot.bytes_written,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_counters() {
        let metrics = Metrics::new();
        let other = metrics.clone();
        metrics.add_objects(2);
        other.add_objects(3);
        other.add_bytes_written(100);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.objects_copied, 5);
        assert_eq!(snapshot.bytes_written, 100);
        assert_eq!(snapshot.failure_count, 0);
    }

    #[test]
    fn snapshot_converts_to_summary() {
        let metrics = Metrics::new();
        metrics.add_objects(7);
        metrics.add_batches(2);
        let summary: RunSummary = metrics.snapshot().into();
        assert_eq!(summary.objects_copied, 7);
        assert_eq!(summary.batches_completed, 2);
        assert!(!summary.is_noop());
    }
}
