// Dashboard Remarks Library - record data plus the remark workflow engine
// This exposes the core components for testing and integration

pub mod access;
pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod observability;
pub mod records;
pub mod shutdown;
pub mod store;
pub mod telemetry;
pub mod workflows;

// Re-export key types for easy access
pub use access::{AccessPolicy, Actor, OpenPolicy, Role, RolePolicy, TokenAuthenticator};
pub use app::Services;
pub use config::DashboardConfig;
pub use dashboard::{dashboard_rows, detailed_stats, DashboardQuery, DashboardRow, DetailedStats};
pub use observability::{workflow_metrics, OperationTimer, WorkflowMetrics};
pub use records::{RecordId, RecordStore, SourceError, Table, TableRecordStore};
pub use shutdown::{shutdown_signal, ShutdownCoordinator};
pub use store::{
    open_repository, InMemoryRepository, JsonFileRepository, RemarkRepository, RemarkSummary,
    StoreError,
};
pub use telemetry::{create_remark_span, generate_correlation_id, init_telemetry, shutdown_telemetry};
pub use workflows::{
    History, HistoryEntry, Remark, Stage, StageCatalog, StageConfigError, WorkflowEngine,
    WorkflowError,
};
