use anyhow::{Context, Result};

use super::Command;
use crate::config::DashboardConfig;
use crate::workflows::StageCatalog;

pub struct StagesCommand {
    config: DashboardConfig,
}

impl StagesCommand {
    pub fn new(config: DashboardConfig) -> Self {
        Self { config }
    }
}

impl Command for StagesCommand {
    async fn execute(&self) -> Result<()> {
        let catalog =
            StageCatalog::from_config(&self.config.workflow).context("invalid workflow stages")?;

        println!("🏷️  WORKFLOW STAGES");
        println!("==================");
        for stage in catalog.describe() {
            let marker = if stage.terminal { "🔒 terminal" } else { "" };
            println!("  {}. {:<16} {}", stage.position + 1, stage.label, marker);
        }
        Ok(())
    }
}
