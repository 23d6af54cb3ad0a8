// Remark workflow engine
// Transitions are all-or-nothing: a call either commits one new history entry
// or leaves the stored remark exactly as it was.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

use super::errors::WorkflowError;
use super::locks::RecordLocks;
use super::remark::{History, HistoryEntry, Remark};
use super::stages::{Stage, StageCatalog};
use crate::access::{AccessPolicy, Actor};
use crate::observability::workflow_metrics;
use crate::records::{RecordId, RecordStore};
use crate::store::{RemarkRepository, RemarkSummary};
use crate::telemetry::{create_remark_span, generate_correlation_id};

/// Default cap on remark text, in characters.
pub const DEFAULT_MAX_TEXT_LEN: usize = 2000;

pub struct WorkflowEngine {
    catalog: Arc<StageCatalog>,
    records: Arc<dyn RecordStore>,
    repository: Arc<dyn RemarkRepository>,
    policy: Arc<dyn AccessPolicy>,
    locks: RecordLocks,
    max_text_len: usize,
}

impl WorkflowEngine {
    pub fn new(
        catalog: Arc<StageCatalog>,
        records: Arc<dyn RecordStore>,
        repository: Arc<dyn RemarkRepository>,
        policy: Arc<dyn AccessPolicy>,
    ) -> Self {
        Self {
            catalog,
            records,
            repository,
            policy,
            locks: RecordLocks::new(),
            max_text_len: DEFAULT_MAX_TEXT_LEN,
        }
    }

    pub fn with_max_text_len(mut self, max_text_len: usize) -> Self {
        self.max_text_len = max_text_len;
        self
    }

    pub fn catalog(&self) -> &StageCatalog {
        &self.catalog
    }

    /// Current remark of a record. Records that were never annotated are
    /// `NotFound`, the same as records that do not exist.
    pub async fn get_current_state(&self, record_id: RecordId) -> Result<Remark, WorkflowError> {
        let span = create_remark_span(
            "get_current_state",
            record_id,
            None,
            &generate_correlation_id(),
        );
        async {
            self.repository
                .load(record_id)
                .await?
                .ok_or_else(|| WorkflowError::NotFound {
                    record_id,
                    detail: "no remark has been recorded".to_string(),
                })
        }
        .instrument(span)
        .await
    }

    /// Transition log, oldest first. Empty when the record has no remark.
    pub async fn get_history(&self, record_id: RecordId) -> Result<History, WorkflowError> {
        let span = create_remark_span("get_history", record_id, None, &generate_correlation_id());
        async {
            let remark = self.repository.load(record_id).await?;
            Ok::<_, WorkflowError>(
                remark
                    .map(|remark| remark.history().clone())
                    .unwrap_or_default(),
            )
        }
        .instrument(span)
        .await
    }

    /// Latest remark of every annotated record, keyed by record id.
    pub async fn remark_summaries(
        &self,
    ) -> Result<BTreeMap<RecordId, RemarkSummary>, WorkflowError> {
        Ok(self.repository.summaries().await?)
    }

    /// Move a record to `target` with new annotation `text`, on behalf of `actor`.
    pub async fn apply_transition(
        &self,
        record_id: RecordId,
        target: &str,
        text: &str,
        actor: &Actor,
    ) -> Result<Remark, WorkflowError> {
        let correlation_id = generate_correlation_id();
        let span = create_remark_span(
            "apply_transition",
            record_id,
            Some(actor.name()),
            &correlation_id,
        );

        async {
            let result = self.transition(record_id, target, text, actor).await;
            let metrics = workflow_metrics();
            match &result {
                Ok(remark) => {
                    metrics.record_applied();
                    info!(
                        stage = %remark.stage(),
                        version = remark.version(),
                        "Remark transition applied"
                    );
                }
                Err(WorkflowError::Conflict { .. }) => {
                    metrics.record_conflict();
                    warn!("Remark transition lost a concurrent update race");
                }
                Err(e) => {
                    metrics.record_rejected();
                    warn!(error.kind = e.kind(), "Remark transition rejected: {}", e);
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn transition(
        &self,
        record_id: RecordId,
        target: &str,
        text: &str,
        actor: &Actor,
    ) -> Result<Remark, WorkflowError> {
        let to = self.catalog.resolve(target)?;
        self.validate_text(text)?;

        if !self.records.record_exists(record_id).await? {
            return Err(WorkflowError::NotFound {
                record_id,
                detail: "no such record in the source table".to_string(),
            });
        }

        let _guard = self.locks.acquire(record_id).await;
        let current = self.repository.load(record_id).await?;
        let from = current.as_ref().map(Remark::stage);

        if !self.policy.can_transition(actor, record_id, from, &to) {
            return Err(WorkflowError::Permission {
                actor: actor.name().to_string(),
                record_id,
                to: to.label().to_string(),
            });
        }

        if let Some(from) = from {
            self.check_terminal_lock(record_id, from, &to, actor)?;
        }

        let entry = HistoryEntry::new(to, text, actor.clone(), Utc::now());
        let (next, expected_version) = match &current {
            Some(remark) => (remark.advanced(entry), remark.version()),
            None => (Remark::first(record_id, entry), 0),
        };

        self.repository.commit(&next, expected_version).await?;
        debug!(version = next.version(), "Remark committed");
        Ok(next)
    }

    fn check_terminal_lock(
        &self,
        record_id: RecordId,
        from: &Stage,
        to: &Stage,
        actor: &Actor,
    ) -> Result<(), WorkflowError> {
        if !self.catalog.is_terminal(from) {
            return Ok(());
        }
        if self.policy.can_override_terminal(actor, record_id) {
            info!(from = %from, to = %to, "Terminal stage overridden");
            return Ok(());
        }
        Err(WorkflowError::InvalidTransition {
            record_id,
            from: from.label().to_string(),
            to: to.label().to_string(),
            reason: format!("{from} is terminal and {actor} cannot override it"),
        })
    }

    fn validate_text(&self, text: &str) -> Result<(), WorkflowError> {
        let length = text.chars().count();
        if length > self.max_text_len {
            return Err(WorkflowError::Validation {
                reason: format!(
                    "remark text is {length} characters; the limit is {}",
                    self.max_text_len
                ),
            });
        }
        if text
            .chars()
            .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
        {
            return Err(WorkflowError::Validation {
                reason: "remark text contains control characters".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{MockRecordStore, SourceError};
    use crate::store::{InMemoryRepository, MockRemarkRepository, StoreError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Policy double: fixed answers, counts how often it is asked.
    #[derive(Default)]
    struct FixedPolicy {
        deny: bool,
        override_terminal: bool,
        transition_checks: AtomicUsize,
    }

    impl AccessPolicy for FixedPolicy {
        fn can_transition(&self, _: &Actor, _: RecordId, _: Option<&Stage>, _: &Stage) -> bool {
            self.transition_checks.fetch_add(1, Ordering::SeqCst);
            !self.deny
        }

        fn can_override_terminal(&self, _: &Actor, _: RecordId) -> bool {
            self.override_terminal
        }
    }

    fn existing_records() -> MockRecordStore {
        let mut records = MockRecordStore::new();
        records.expect_record_exists().returning(|id| Ok(id < 10));
        records
    }

    fn engine_with(policy: FixedPolicy) -> (WorkflowEngine, Arc<FixedPolicy>) {
        let policy = Arc::new(policy);
        let engine = WorkflowEngine::new(
            Arc::new(StageCatalog::default()),
            Arc::new(existing_records()),
            Arc::new(InMemoryRepository::new()),
            policy.clone(),
        );
        (engine, policy)
    }

    fn alice() -> Actor {
        Actor::new("alice")
    }

    #[tokio::test]
    async fn test_first_transition_creates_remark() {
        let (engine, _) = engine_with(FixedPolicy::default());
        let remark = engine
            .apply_transition(1, "CONTACTED", "called", &alice())
            .await
            .unwrap();

        assert_eq!(remark.stage().label(), "CONTACTED");
        assert_eq!(remark.text(), "called");
        assert_eq!(remark.history().len(), 1);
        assert_eq!(engine.get_current_state(1).await.unwrap(), remark);
    }

    #[tokio::test]
    async fn test_unknown_stage_is_validation_before_record_lookup() {
        let mut records = MockRecordStore::new();
        records.expect_record_exists().never();
        let engine = WorkflowEngine::new(
            Arc::new(StageCatalog::default()),
            Arc::new(records),
            Arc::new(InMemoryRepository::new()),
            Arc::new(FixedPolicy::default()),
        );

        let err = engine
            .apply_transition(1, "ARCHIVED", "", &alice())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_text_limits() {
        let (engine, _) = engine_with(FixedPolicy::default());
        let engine = engine.with_max_text_len(5);

        assert!(engine.apply_transition(1, "NEW", "12345", &alice()).await.is_ok());
        let too_long = engine.apply_transition(1, "NEW", "123456", &alice()).await;
        assert!(matches!(too_long, Err(WorkflowError::Validation { .. })));
        let control = engine.apply_transition(1, "NEW", "a\u{7}", &alice()).await;
        assert!(matches!(control, Err(WorkflowError::Validation { .. })));
        assert!(engine.apply_transition(1, "NEW", "a\nb", &alice()).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_record_is_not_found() {
        let (engine, policy) = engine_with(FixedPolicy::default());
        let err = engine
            .apply_transition(42, "NEW", "", &alice())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound { record_id: 42, .. }));
        assert_eq!(policy.transition_checks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_denied_actor_is_permission_error() {
        let (engine, policy) = engine_with(FixedPolicy {
            deny: true,
            ..FixedPolicy::default()
        });
        let err = engine
            .apply_transition(1, "NEW", "", &alice())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Permission { .. }));
        assert_eq!(policy.transition_checks.load(Ordering::SeqCst), 1);
        assert!(engine.get_history(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_terminal_lock_without_override() {
        let (engine, _) = engine_with(FixedPolicy::default());
        engine.apply_transition(3, "NEGOTIATION", "close", &alice()).await.unwrap();
        engine.apply_transition(3, "WON", "signed", &alice()).await.unwrap();

        for target in ["NEGOTIATION", "WON", "LOST", "NEW"] {
            let err = engine
                .apply_transition(3, target, "reopen", &alice())
                .await
                .unwrap_err();
            assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
        }

        let remark = engine.get_current_state(3).await.unwrap();
        assert_eq!(remark.stage().label(), "WON");
        assert_eq!(remark.history().len(), 2);
    }

    #[tokio::test]
    async fn test_override_reopens_terminal_remark() {
        let (engine, _) = engine_with(FixedPolicy {
            override_terminal: true,
            ..FixedPolicy::default()
        });
        engine.apply_transition(3, "LOST", "no budget", &alice()).await.unwrap();
        let reopened = engine
            .apply_transition(3, "QUALIFIED", "budget found", &alice())
            .await
            .unwrap();
        assert_eq!(reopened.stage().label(), "QUALIFIED");
        assert_eq!(reopened.version(), 2);
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_state_untouched() {
        let catalog = Arc::new(StageCatalog::default());
        let existing = Remark::first(
            2,
            HistoryEntry::new(catalog.resolve("NEW").unwrap(), "imported", alice(), Utc::now()),
        );

        let mut repository = MockRemarkRepository::new();
        let loaded = existing.clone();
        repository
            .expect_load()
            .returning(move |_| Ok(Some(loaded.clone())));
        repository
            .expect_commit()
            .times(1)
            .returning(|_, _| Err(StoreError::Unavailable("disk full".to_string())));

        let engine = WorkflowEngine::new(
            catalog,
            Arc::new(existing_records()),
            Arc::new(repository),
            Arc::new(FixedPolicy::default()),
        );

        let err = engine
            .apply_transition(2, "CONTACTED", "called", &alice())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Storage(_)));
        assert_eq!(engine.get_current_state(2).await.unwrap(), existing);
    }

    #[tokio::test]
    async fn test_version_conflict_surfaces_as_conflict() {
        let mut repository = MockRemarkRepository::new();
        repository.expect_load().returning(|_| Ok(None));
        repository.expect_commit().returning(|remark, expected| {
            Err(StoreError::VersionConflict {
                record_id: remark.record_id(),
                expected,
                found: expected + 1,
            })
        });

        let engine = WorkflowEngine::new(
            Arc::new(StageCatalog::default()),
            Arc::new(existing_records()),
            Arc::new(repository),
            Arc::new(FixedPolicy::default()),
        );
        let err = engine
            .apply_transition(1, "NEW", "", &alice())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Conflict {
                expected: 0,
                found: 1,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_source_failure_is_propagated() {
        let mut records = MockRecordStore::new();
        records
            .expect_record_exists()
            .returning(|_| Err(SourceError::NotConfigured("sheet_url".to_string())));
        let engine = WorkflowEngine::new(
            Arc::new(StageCatalog::default()),
            Arc::new(records),
            Arc::new(InMemoryRepository::new()),
            Arc::new(FixedPolicy::default()),
        );

        let err = engine
            .apply_transition(1, "NEW", "", &alice())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "source_unavailable");
    }

    #[tokio::test]
    async fn test_unannotated_record_reads() {
        let (engine, _) = engine_with(FixedPolicy::default());
        assert!(matches!(
            engine.get_current_state(4).await,
            Err(WorkflowError::NotFound { .. })
        ));
        assert!(engine.get_history(4).await.unwrap().is_empty());
    }
}
