//! Wiring shared by the HTTP server and the CLI: one catalog, one record
//! store, one repository and the engine built over them.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::access::AccessPolicy;
use crate::config::DashboardConfig;
use crate::records::TableRecordStore;
use crate::store::{open_repository, RemarkRepository};
use crate::workflows::{StageCatalog, WorkflowEngine};

pub struct Services {
    pub catalog: Arc<StageCatalog>,
    pub records: Arc<TableRecordStore>,
    pub repository: Arc<dyn RemarkRepository>,
    pub engine: Arc<WorkflowEngine>,
}

impl Services {
    pub async fn build(config: &DashboardConfig, policy: Arc<dyn AccessPolicy>) -> Result<Self> {
        let catalog = Arc::new(
            StageCatalog::from_config(&config.workflow).context("invalid workflow stages")?,
        );
        let records = Arc::new(
            TableRecordStore::from_config(&config.source).context("invalid record source")?,
        );
        let repository = open_repository(&config.storage, catalog.clone())
            .await
            .context("failed to open remark storage")?;

        let engine = Arc::new(
            WorkflowEngine::new(
                catalog.clone(),
                records.clone(),
                repository.clone(),
                policy,
            )
            .with_max_text_len(config.workflow.max_text_len),
        );

        info!(
            stages = catalog.describe().len(),
            source = records.source_name(),
            "Remark workflow ready"
        );

        Ok(Self {
            catalog,
            records,
            repository,
            engine,
        })
    }
}
