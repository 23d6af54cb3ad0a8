use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::{RemarkRepository, RemarkSummary, StoreError};
use crate::records::RecordId;
use crate::workflows::Remark;

/// Process-local repository. Commits swap the whole remark under a write
/// lock, so readers see either the old or the new value.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    remarks: RwLock<HashMap<RecordId, Remark>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.remarks.read().await.len()
    }
}

#[async_trait]
impl RemarkRepository for InMemoryRepository {
    async fn load(&self, record_id: RecordId) -> Result<Option<Remark>, StoreError> {
        Ok(self.remarks.read().await.get(&record_id).cloned())
    }

    async fn commit(&self, remark: &Remark, expected_version: u64) -> Result<(), StoreError> {
        let mut remarks = self.remarks.write().await;
        let found = remarks
            .get(&remark.record_id())
            .map_or(0, Remark::version);
        if found != expected_version {
            return Err(StoreError::VersionConflict {
                record_id: remark.record_id(),
                expected: expected_version,
                found,
            });
        }
        remarks.insert(remark.record_id(), remark.clone());
        Ok(())
    }

    async fn summaries(&self) -> Result<BTreeMap<RecordId, RemarkSummary>, StoreError> {
        Ok(self
            .remarks
            .read()
            .await
            .iter()
            .map(|(record_id, remark)| (*record_id, RemarkSummary::from(remark)))
            .collect())
    }
}
