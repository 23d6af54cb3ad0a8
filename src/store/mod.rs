//! Remark persistence. Every backend commits a whole remark at once under an
//! optimistic version check, so a failed commit leaves the stored remark as
//! it was.

#[cfg(feature = "database")]
pub mod database;
pub mod file;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[cfg(test)]
use mockall::automock;

#[cfg(feature = "database")]
pub use database::SqliteRepository;
pub use file::JsonFileRepository;
pub use memory::InMemoryRepository;

use crate::access::Actor;
use crate::config::{StorageBackend, StorageConfig};
use crate::records::RecordId;
use crate::workflows::{History, HistoryEntry, Remark, StageCatalog};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("version conflict on record {record_id}: expected {expected}, found {found}")]
    VersionConflict {
        record_id: RecordId,
        expected: u64,
        found: u64,
    },

    #[error("stored remark data is corrupt: {reason}")]
    Corrupt { reason: String },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[cfg(feature = "database")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Where remarks live between requests.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RemarkRepository: Send + Sync {
    /// The committed remark for a record, if any transition has happened.
    async fn load(&self, record_id: RecordId) -> Result<Option<Remark>, StoreError>;

    /// Replace the stored remark with `remark` if the stored version still
    /// equals `expected_version` (0 when no remark exists yet).
    async fn commit(&self, remark: &Remark, expected_version: u64) -> Result<(), StoreError>;

    /// Latest stage and text of every annotated record.
    async fn summaries(&self) -> Result<BTreeMap<RecordId, RemarkSummary>, StoreError>;

    /// Release backend resources. Called once on shutdown.
    async fn close(&self) {}
}

/// Current state of a remark without its log, for joining onto table rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemarkSummary {
    pub stage: String,
    pub text: String,
    pub version: u64,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
}

impl From<&Remark> for RemarkSummary {
    fn from(remark: &Remark) -> Self {
        Self {
            stage: remark.stage().label().to_string(),
            text: remark.text().to_string(),
            version: remark.version(),
            updated_at: remark.updated_at(),
            updated_by: remark.updated_by().map(|actor| actor.name().to_string()),
        }
    }
}

/// Serialized form of one history entry. Stage labels are re-resolved
/// against the catalog on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub stage: String,
    pub text: String,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&HistoryEntry> for StoredEntry {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            stage: entry.stage.label().to_string(),
            text: entry.text.clone(),
            actor: entry.actor.name().to_string(),
            timestamp: entry.timestamp,
        }
    }
}

/// Rebuild a remark from its persisted log.
pub fn remark_from_stored(
    catalog: &StageCatalog,
    record_id: RecordId,
    stored: Vec<StoredEntry>,
) -> Result<Option<Remark>, StoreError> {
    let entries = stored
        .into_iter()
        .map(|entry| {
            let stage = catalog.resolve(&entry.stage).map_err(|_| StoreError::Corrupt {
                reason: format!(
                    "record {record_id} references unknown stage {:?}",
                    entry.stage
                ),
            })?;
            Ok(HistoryEntry::new(
                stage,
                entry.text,
                Actor::new(entry.actor),
                entry.timestamp,
            ))
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

    Ok(Remark::from_history(record_id, History::from_entries(entries)))
}

/// Open the repository selected by configuration.
pub async fn open_repository(
    config: &StorageConfig,
    catalog: Arc<StageCatalog>,
) -> Result<Arc<dyn RemarkRepository>, StoreError> {
    match config.backend {
        StorageBackend::Memory => {
            info!("Using in-memory remark storage; remarks are lost on exit");
            Ok(Arc::new(InMemoryRepository::new()))
        }
        StorageBackend::File => {
            info!(path = %config.file_path.display(), "Using JSON file remark storage");
            Ok(Arc::new(JsonFileRepository::new(&config.file_path, catalog)))
        }
        #[cfg(feature = "database")]
        StorageBackend::Sqlite => Ok(Arc::new(
            SqliteRepository::connect(&config.database_url, config.max_connections, catalog)
                .await?,
        )),
        #[cfg(not(feature = "database"))]
        StorageBackend::Sqlite => {
            let _ = catalog;
            Err(StoreError::Unavailable(
                "sqlite storage requires the `database` feature".to_string(),
            ))
        }
    }
}
