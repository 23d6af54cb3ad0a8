use thiserror::Error;

use crate::records::{RecordId, SourceError};
use crate::store::StoreError;

/// Failures surfaced by the remark workflow engine.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("record {record_id} not found: {detail}")]
    NotFound { record_id: RecordId, detail: String },

    #[error("validation failed: {reason}")]
    Validation { reason: String },

    #[error("cannot move record {record_id} from {from} to {to}: {reason}")]
    InvalidTransition {
        record_id: RecordId,
        from: String,
        to: String,
        reason: String,
    },

    #[error("actor {actor} is not permitted to move record {record_id} to {to}")]
    Permission {
        actor: String,
        record_id: RecordId,
        to: String,
    },

    #[error("concurrent update on record {record_id}: expected version {expected}, found {found}")]
    Conflict {
        record_id: RecordId,
        expected: u64,
        found: u64,
    },

    #[error("record source unavailable: {0}")]
    Source(#[from] SourceError),

    #[error("remark storage failed: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict {
                record_id,
                expected,
                found,
            } => WorkflowError::Conflict {
                record_id,
                expected,
                found,
            },
            other => WorkflowError::Storage(other),
        }
    }
}

impl WorkflowError {
    /// Stable machine-readable name for the error family.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::NotFound { .. } => "not_found",
            WorkflowError::Validation { .. } => "validation",
            WorkflowError::InvalidTransition { .. } => "invalid_transition",
            WorkflowError::Permission { .. } => "permission",
            WorkflowError::Conflict { .. } => "conflict",
            WorkflowError::Source(_) => "source_unavailable",
            WorkflowError::Storage(_) => "storage",
        }
    }
}
