//! Business records the remarks are attached to, loaded from a local table
//! file or a Google Sheet and cached in memory.

pub mod local;
pub mod sheets;
pub mod table;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[cfg(test)]
use mockall::automock;

pub use local::LocalTableSource;
pub use sheets::{extract_sheet_id, SheetsTableSource};
pub use table::{NumericSummary, RecordRow, Table, TableQuery, TableStats};

use crate::config::{SourceConfig, SourceKind};
use crate::observability::{workflow_metrics, OperationTimer};

/// Zero-based row index of a record in the source table.
pub type RecordId = u64;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read table file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed table data: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("sheet request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid Google Sheet URL: {0}")]
    InvalidSheetUrl(String),

    #[error("source is not configured: {0}")]
    NotConfigured(String),

    #[error("table has no header row")]
    EmptyTable,

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    /// A load failure shared by every caller that waited on the same fetch.
    #[error(transparent)]
    Shared(Arc<SourceError>),
}

/// The single capability the workflow engine needs from the record layer.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn record_exists(&self, record_id: RecordId) -> Result<bool, SourceError>;
}

/// Somewhere a full table can be fetched from.
#[async_trait]
pub trait TableSource: Send + Sync {
    /// Human-readable source name reported in dashboard stats.
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<Table, SourceError>;

    /// When the underlying data last changed, if the source can tell.
    async fn last_modified(&self) -> Option<DateTime<Utc>> {
        None
    }
}

/// Record store over a cached table snapshot.
pub struct TableRecordStore {
    source: Arc<dyn TableSource>,
    cache: Cache<(), Arc<Table>>,
}

impl TableRecordStore {
    pub fn new(source: Arc<dyn TableSource>, ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(1).time_to_live(ttl).build();
        Self { source, cache }
    }

    pub fn from_config(config: &SourceConfig) -> Result<Self, SourceError> {
        let source: Arc<dyn TableSource> = match config.kind {
            SourceKind::Local => Arc::new(LocalTableSource::new(&config.local_path)),
            SourceKind::GoogleSheets => Arc::new(SheetsTableSource::from_config(config)?),
        };
        info!(source = source.name(), "Record source configured");
        Ok(Self::new(
            source,
            Duration::from_secs(config.cache_ttl_seconds),
        ))
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Current table snapshot, fetched from the source when the cached copy
    /// is missing or expired. Concurrent callers on a cold cache share one
    /// fetch.
    pub async fn table(&self) -> Result<Arc<Table>, SourceError> {
        self.cache
            .try_get_with((), self.load())
            .await
            .map_err(|err| Arc::try_unwrap(err).unwrap_or_else(SourceError::Shared))
    }

    async fn load(&self) -> Result<Arc<Table>, SourceError> {
        let timer = OperationTimer::new("load_record_table");
        let table = self.source.fetch().await?;
        timer.finish();
        workflow_metrics().record_table_load();

        info!(
            source = self.source.name(),
            rows = table.len(),
            columns = table.columns.len(),
            "Loaded record table"
        );
        Ok(Arc::new(table))
    }

    /// Drop the cached snapshot so the next read goes back to the source.
    pub async fn refresh(&self) {
        self.cache.invalidate(&()).await;
        info!(source = self.source.name(), "Record table cache cleared");
    }

    pub async fn query(&self, query: &TableQuery) -> Result<Vec<RecordRow>, SourceError> {
        self.table().await?.query(query)
    }

    pub async fn stats(&self) -> Result<TableStats, SourceError> {
        let mut stats = self.table().await?.stats(self.source.name());
        stats.last_modified = self.source.last_modified().await;
        Ok(stats)
    }

    pub async fn distinct(&self, column: &str) -> Result<Vec<String>, SourceError> {
        self.table().await?.distinct(column)
    }
}

#[async_trait]
impl RecordStore for TableRecordStore {
    async fn record_exists(&self, record_id: RecordId) -> Result<bool, SourceError> {
        Ok(self.table().await?.contains(record_id))
    }
}

/// Fixed in-memory source, handy for wiring tests and demos.
pub struct StaticTableSource {
    table: Table,
}

impl StaticTableSource {
    pub fn new(table: Table) -> Self {
        Self { table }
    }
}

#[async_trait]
impl TableSource for StaticTableSource {
    fn name(&self) -> &str {
        "Static table"
    }

    async fn fetch(&self) -> Result<Table, SourceError> {
        Ok(self.table.clone())
    }
}
