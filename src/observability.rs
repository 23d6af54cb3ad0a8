use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Remark workflow counters
#[derive(Debug, Default)]
pub struct WorkflowMetrics {
    pub transitions_applied: AtomicU64,
    pub transitions_rejected: AtomicU64,
    pub conflicts: AtomicU64,
    pub table_loads: AtomicU64,
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

    pub fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_table_load(&self) {
        self.table_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> WorkflowStats {
        WorkflowStats {
            transitions_applied: self.transitions_applied.load(Ordering::Relaxed),
            transitions_rejected: self.transitions_rejected.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            table_loads: self.table_loads.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Workflow metrics: applied={}, rejected={}, conflicts={}, table_loads={}",
            stats.transitions_applied, stats.transitions_rejected, stats.conflicts, stats.table_loads
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct WorkflowStats {
    pub transitions_applied: u64,
    pub transitions_rejected: u64,
    pub conflicts: u64,
    pub table_loads: u64,
}

/// Global metrics instance
static WORKFLOW_METRICS: std::sync::LazyLock<WorkflowMetrics> =
    std::sync::LazyLock::new(WorkflowMetrics::new);

pub fn workflow_metrics() -> &'static WorkflowMetrics {
    &WORKFLOW_METRICS
}

/// Time an operation and log its duration
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
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}
