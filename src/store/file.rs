use async_trait::async_trait;
use fd_lock::RwLock as FileLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::{remark_from_stored, RemarkRepository, RemarkSummary, StoreError, StoredEntry};
use crate::records::RecordId;
use crate::workflows::{Remark, StageCatalog};

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct RemarkFile {
    format_version: u32,
    remarks: BTreeMap<RecordId, Vec<StoredEntry>>,
}

/// Remarks persisted as one JSON document.
///
/// Commits hold an exclusive `fd-lock` on a sibling `.lock` file for the
/// read-check-write cycle, and replace the document through a rename, so
/// several processes can share the file and readers never see a torn write.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
    catalog: Arc<StageCatalog>,
}

impl JsonFileRepository {
    pub fn new(path: impl AsRef<Path>, catalog: Arc<StageCatalog>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            catalog,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read_document(path: &Path) -> Result<RemarkFile, StoreError> {
        match fs::read_to_string(path) {
            Ok(raw) => {
                let document: RemarkFile = serde_json::from_str(&raw)?;
                if document.format_version != FORMAT_VERSION {
                    return Err(StoreError::Corrupt {
                        reason: format!(
                            "unsupported remark file format {} (expected {FORMAT_VERSION})",
                            document.format_version
                        ),
                    });
                }
                Ok(document)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RemarkFile {
                format_version: FORMAT_VERSION,
                remarks: BTreeMap::new(),
            }),
            Err(source) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    async fn read(&self) -> Result<RemarkFile, StoreError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || Self::read_document(&path))
            .await
            .map_err(|e| StoreError::Unavailable(format!("remark file reader panicked: {e}")))?
    }

    fn commit_blocking(&self, remark: &Remark, expected_version: u64) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let lock_path = self.path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| self.io_error(e))?;
        let mut lock = FileLock::new(lock_file);
        let _guard = lock.write().map_err(|e| self.io_error(e))?;

        let mut document = Self::read_document(&self.path)?;
        let record_id = remark.record_id();
        let found = document
            .remarks
            .get(&record_id)
            .map_or(0, |entries| entries.len() as u64);
        if found != expected_version {
            return Err(StoreError::VersionConflict {
                record_id,
                expected: expected_version,
                found,
            });
        }

        document
            .remarks
            .insert(record_id, remark.history().iter().map(StoredEntry::from).collect());

        let staging = self.path.with_extension("json.tmp");
        {
            let file = File::create(&staging).map_err(|e| self.io_error(e))?;
            serde_json::to_writer_pretty(&file, &document)?;
            file.sync_all().map_err(|e| self.io_error(e))?;
        }
        fs::rename(&staging, &self.path).map_err(|e| self.io_error(e))?;

        debug!(record_id, version = remark.version(), path = %self.path.display(), "Remark file updated");
        Ok(())
    }
}

#[async_trait]
impl RemarkRepository for JsonFileRepository {
    async fn load(&self, record_id: RecordId) -> Result<Option<Remark>, StoreError> {
        let document = self.read().await?;
        match document.remarks.get(&record_id) {
            Some(entries) => remark_from_stored(&self.catalog, record_id, entries.clone()),
            None => Ok(None),
        }
    }

    async fn summaries(&self) -> Result<BTreeMap<RecordId, RemarkSummary>, StoreError> {
        let document = self.read().await?;
        let mut summaries = BTreeMap::new();
        for (record_id, entries) in document.remarks {
            if let Some(remark) = remark_from_stored(&self.catalog, record_id, entries)? {
                summaries.insert(record_id, RemarkSummary::from(&remark));
            }
        }
        Ok(summaries)
    }

    async fn commit(&self, remark: &Remark, expected_version: u64) -> Result<(), StoreError> {
        let repository = self.clone();
        let remark = remark.clone();
        tokio::task::spawn_blocking(move || repository.commit_blocking(&remark, expected_version))
            .await
            .map_err(|e| StoreError::Unavailable(format!("remark file writer panicked: {e}")))?
    }
}
