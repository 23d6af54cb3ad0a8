// Remark workflow: stage catalog, remark values and the transition engine

pub mod errors;
pub mod locks;
pub mod remark;
pub mod stages;
pub mod state_machine;

pub use errors::WorkflowError;
pub use locks::RecordLocks;
pub use remark::{History, HistoryEntry, Remark};
pub use stages::{Stage, StageCatalog, StageConfigError, StageDescriptor, STAGE_COUNT};
pub use state_machine::{WorkflowEngine, DEFAULT_MAX_TEXT_LEN};
