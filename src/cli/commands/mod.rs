use anyhow::Result;
use std::sync::Arc;

use crate::access::AccessPolicy;
use crate::app::Services;
use crate::config::DashboardConfig;

pub mod records;
pub mod remark;
pub mod serve;
pub mod stages;

#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(&self) -> Result<()>;
}

/// Build the shared services for one CLI invocation.
pub async fn with_services<F, Fut, R>(
    config: &DashboardConfig,
    policy: Arc<dyn AccessPolicy>,
    f: F,
) -> Result<R>
where
    F: FnOnce(Services) -> Fut,
    Fut: std::future::Future<Output = Result<R>>,
{
    let services = Services::build(config, policy).await?;
    let repository = services.repository.clone();
    let result = f(services).await;
    repository.close().await;
    result
}

pub async fn show_usage() -> Result<()> {
    println!("📋 Dashboard Remarks - Record data with an 8-stage remark workflow");
    println!();
    println!("To get started:");
    println!("  🚀 dashboard-remarks serve                      # Run the HTTP API");
    println!("  🏷️  dashboard-remarks stages                     # List workflow stages");
    println!("  📊 dashboard-remarks records --filter Country=India");
    println!("  📊 dashboard-remarks records --stage WON");
    println!();
    println!("Remarks:");
    println!("  👁️  dashboard-remarks remark show <id>");
    println!("  ✏️  dashboard-remarks remark set <id> <STAGE> --text '...' --as <name>");
    println!("  📜 dashboard-remarks remark history <id>");
    Ok(())
}
