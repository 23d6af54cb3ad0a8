use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::sync::Arc;

use super::stages::Stage;
use crate::access::Actor;
use crate::records::RecordId;

/// One immutable audit record of a past transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub stage: Stage,
    pub text: String,
    pub actor: Actor,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(stage: Stage, text: impl Into<String>, actor: Actor, timestamp: DateTime<Utc>) -> Self {
        Self {
            stage,
            text: text.into(),
            actor,
            timestamp,
        }
    }
}

/// Append-only transition log.
///
/// Entries live behind a shared slice; appending builds a new log and leaves
/// every existing snapshot untouched, so readers holding an older `History`
/// keep seeing exactly what they loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    entries: Arc<[HistoryEntry]>,
}

impl Default for History {
    fn default() -> Self {
        Self {
            entries: Arc::from(Vec::new()),
        }
    }
}

impl History {
    pub(crate) fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        Self {
            entries: Arc::from(entries),
        }
    }

    pub(crate) fn appended(&self, entry: HistoryEntry) -> Self {
        let mut entries = Vec::with_capacity(self.entries.len() + 1);
        entries.extend_from_slice(&self.entries);
        entries.push(entry);
        Self::from_entries(entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// Oldest-to-newest. Each call starts a fresh pass over the same snapshot.
    pub fn iter(&self) -> std::slice::Iter<'_, HistoryEntry> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[HistoryEntry] {
        &self.entries
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a HistoryEntry;
    type IntoIter = std::slice::Iter<'a, HistoryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Serialize for History {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.iter())
    }
}

/// Stage, annotation and audit trail attached to one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Remark {
    record_id: RecordId,
    stage: Stage,
    text: String,
    history: History,
}

impl Remark {
    /// Remark created by the first transition a record receives.
    pub(crate) fn first(record_id: RecordId, entry: HistoryEntry) -> Self {
        Self {
            record_id,
            stage: entry.stage.clone(),
            text: entry.text.clone(),
            history: History::default().appended(entry),
        }
    }

    /// The remark that results from appending `entry`. `self` is unchanged.
    pub(crate) fn advanced(&self, entry: HistoryEntry) -> Self {
        Self {
            record_id: self.record_id,
            stage: entry.stage.clone(),
            text: entry.text.clone(),
            history: self.history.appended(entry),
        }
    }

    /// Rebuild a remark from a persisted log. Returns `None` for an empty log.
    pub(crate) fn from_history(record_id: RecordId, history: History) -> Option<Self> {
        let latest = history.latest()?.clone();
        Some(Self {
            record_id,
            stage: latest.stage,
            text: latest.text,
            history,
        })
    }

    pub fn record_id(&self) -> RecordId {
        self.record_id
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Optimistic concurrency token: the number of recorded transitions.
    pub fn version(&self) -> u64 {
        self.history.len() as u64
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.history.latest().map(|entry| entry.timestamp)
    }

    pub fn updated_by(&self) -> Option<&Actor> {
        self.history.latest().map(|entry| &entry.actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::StageCatalog;

    fn entry(catalog: &StageCatalog, stage: &str, text: &str, actor: &str) -> HistoryEntry {
        HistoryEntry::new(
            catalog.resolve(stage).unwrap(),
            text,
            Actor::new(actor),
            Utc::now(),
        )
    }

    #[test]
    fn test_first_remark_tracks_its_entry() {
        let catalog = StageCatalog::default();
        let remark = Remark::first(7, entry(&catalog, "CONTACTED", "called", "alice"));

        assert_eq!(remark.record_id(), 7);
        assert_eq!(remark.stage().label(), "CONTACTED");
        assert_eq!(remark.text(), "called");
        assert_eq!(remark.version(), 1);
        assert_eq!(remark.updated_by().map(Actor::name), Some("alice"));
    }

    #[test]
    fn test_advancing_leaves_previous_snapshot_intact() {
        let catalog = StageCatalog::default();
        let first = Remark::first(1, entry(&catalog, "NEW", "imported", "alice"));
        let second = first.advanced(entry(&catalog, "QUALIFIED", "good fit", "bob"));

        assert_eq!(first.history().len(), 1);
        assert_eq!(second.history().len(), 2);
        assert_eq!(second.history().as_slice()[0], first.history().as_slice()[0]);
        assert_eq!(second.history().latest().unwrap().stage, *second.stage());
    }

    #[test]
    fn test_history_iteration_is_restartable() {
        let catalog = StageCatalog::default();
        let remark = Remark::first(1, entry(&catalog, "NEW", "a", "alice"))
            .advanced(entry(&catalog, "CONTACTED", "b", "alice"));

        let history = remark.history().clone();
        let first_pass: Vec<_> = history.iter().map(|e| e.text.clone()).collect();
        let second_pass: Vec<_> = (&history).into_iter().map(|e| e.text.clone()).collect();
        assert_eq!(first_pass, vec!["a", "b"]);
        assert_eq!(first_pass, second_pass);
    }

    #[test]
    fn test_from_history_rejects_empty_log() {
        assert!(Remark::from_history(3, History::default()).is_none());
    }
}
