use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Counters for workflow transitions handled by this process
#[derive(Debug, Default)]
pub struct WorkflowMetrics {
    pub transitions_applied: AtomicU64,
    pub transitions_rejected: AtomicU64,
    pub noop_decisions: AtomicU64,
    pub concurrency_conflicts: AtomicU64,
    pub retries_exhausted: AtomicU64,
}

impl WorkflowMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_applied(&self) {
        self.transitions_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.transitions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_noop(&self) {
        self.noop_decisions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_conflict(&self) {
        self.concurrency_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retries_exhausted(&self) {
        self.retries_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> WorkflowStats {
        WorkflowStats {
            transitions_applied: self.transitions_applied.load(Ordering::Relaxed),
            transitions_rejected: self.transitions_rejected.load(Ordering::Relaxed),
            noop_decisions: self.noop_decisions.load(Ordering::Relaxed),
            concurrency_conflicts: self.concurrency_conflicts.load(Ordering::Relaxed),
            retries_exhausted: self.retries_exhausted.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            applied = stats.transitions_applied,
            rejected = stats.transitions_rejected,
            noop = stats.noop_decisions,
            conflicts = stats.concurrency_conflicts,
            exhausted = stats.retries_exhausted,
            "Workflow metrics"
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowStats {
    pub transitions_applied: u64,
    pub transitions_rejected: u64,
    pub noop_decisions: u64,
    pub concurrency_conflicts: u64,
    pub retries_exhausted: u64,
}

/// Global metrics instance
static WORKFLOW_METRICS: std::sync::LazyLock<WorkflowMetrics> =
    std::sync::LazyLock::new(WorkflowMetrics::new);

pub fn workflow_metrics() -> &'static WorkflowMetrics {
    &WORKFLOW_METRICS
}

/// Time an operation and log its duration on `finish`
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        info!(
            operation = %self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = WorkflowMetrics::new();
        metrics.record_applied();
        metrics.record_applied();
        metrics.record_conflict();

        let stats = metrics.get_stats();
        assert_eq!(stats.transitions_applied, 2);
        assert_eq!(stats.concurrency_conflicts, 1);
        assert_eq!(stats.transitions_rejected, 0);
    }
}
