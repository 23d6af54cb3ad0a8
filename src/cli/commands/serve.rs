use anyhow::Result;

use super::Command;
use crate::api;
use crate::config::DashboardConfig;

pub struct ServeCommand {
    config: DashboardConfig,
}

impl ServeCommand {
    pub fn new(config: DashboardConfig) -> Self {
        Self { config }
    }
}

impl Command for ServeCommand {
    async fn execute(&self) -> Result<()> {
        println!(
            "🚀 Serving dashboard API on http://{}",
            self.config.server.bind_address
        );
        api::serve(&self.config).await
    }
}
