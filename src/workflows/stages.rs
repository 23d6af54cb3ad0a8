use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::errors::WorkflowError;
use crate::config::WorkflowConfig;

/// Number of stages every workflow configuration must define.
pub const STAGE_COUNT: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StageConfigError {
    #[error("expected exactly {STAGE_COUNT} stages, found {found}")]
    WrongStageCount { found: usize },
    #[error("stage label at position {position} is empty")]
    EmptyLabel { position: usize },
    #[error("stage label {label:?} is defined more than once")]
    DuplicateLabel { label: String },
    #[error("terminal stage {label:?} is not one of the configured stages")]
    UnknownTerminal { label: String },
    #[error("at least one terminal stage must be configured")]
    NoTerminalStages,
}

/// A stage label resolved against the configured catalog.
///
/// Only [`StageCatalog::resolve`] hands these out, so holding a `Stage` means
/// the label is one of the configured values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Stage {
    position: usize,
    label: Arc<str>,
}

impl Stage {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Zero-based position in the ordered stage list.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

impl Serialize for Stage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageDescriptor {
    pub label: String,
    pub position: usize,
    pub terminal: bool,
}

/// Ordered, immutable set of workflow stages loaded at startup.
#[derive(Debug, Clone)]
pub struct StageCatalog {
    stages: Vec<Stage>,
    terminal: Vec<bool>,
}

impl StageCatalog {
    pub fn from_config(config: &WorkflowConfig) -> Result<Self, StageConfigError> {
        Self::new(&config.stages, &config.terminal_stages)
    }

    pub fn new<S: AsRef<str>>(labels: &[S], terminal: &[S]) -> Result<Self, StageConfigError> {
        if labels.len() != STAGE_COUNT {
            return Err(StageConfigError::WrongStageCount {
                found: labels.len(),
            });
        }

        let mut stages: Vec<Stage> = Vec::with_capacity(STAGE_COUNT);
        for (position, label) in labels.iter().enumerate() {
            let label = label.as_ref().trim();
            if label.is_empty() {
                return Err(StageConfigError::EmptyLabel { position });
            }
            if stages
                .iter()
                .any(|existing| existing.label.eq_ignore_ascii_case(label))
            {
                return Err(StageConfigError::DuplicateLabel {
                    label: label.to_string(),
                });
            }
            stages.push(Stage {
                position,
                label: Arc::from(label),
            });
        }

        if terminal.is_empty() {
            return Err(StageConfigError::NoTerminalStages);
        }

        let mut flags = vec![false; STAGE_COUNT];
        for label in terminal {
            let label = label.as_ref().trim();
            let stage = stages
                .iter()
                .find(|stage| stage.label.eq_ignore_ascii_case(label))
                .ok_or_else(|| StageConfigError::UnknownTerminal {
                    label: label.to_string(),
                })?;
            flags[stage.position] = true;
        }

        Ok(Self {
            stages,
            terminal: flags,
        })
    }

    /// Resolve a caller-supplied label. Matching ignores ASCII case and
    /// surrounding whitespace.
    pub fn resolve(&self, label: &str) -> Result<Stage, WorkflowError> {
        let wanted = label.trim();
        self.stages
            .iter()
            .find(|stage| stage.label.eq_ignore_ascii_case(wanted))
            .cloned()
            .ok_or_else(|| WorkflowError::Validation {
                reason: format!(
                    "unknown stage {label:?}; expected one of: {}",
                    self.labels().collect::<Vec<_>>().join(", ")
                ),
            })
    }

    pub fn is_terminal(&self, stage: &Stage) -> bool {
        self.terminal.get(stage.position).copied().unwrap_or(false)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(Stage::label)
    }

    pub fn describe(&self) -> Vec<StageDescriptor> {
        self.stages
            .iter()
            .map(|stage| StageDescriptor {
                label: stage.label.to_string(),
                position: stage.position,
                terminal: self.is_terminal(stage),
            })
            .collect()
    }
}

impl Default for StageCatalog {
    fn default() -> Self {
        let config = WorkflowConfig::default();
        // The built-in labels are known to be valid.
        match Self::from_config(&config) {
            Ok(catalog) => catalog,
            Err(e) => unreachable!("default stage configuration is invalid: {e}"),
        }
    }
}
