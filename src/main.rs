use anyhow::Result;
use clap::Parser;

use dashboard_remarks::cli::commands::{
    records::RecordsCommand, remark::RemarkCommand, serve::ServeCommand, show_usage,
    stages::StagesCommand, Command,
};
use dashboard_remarks::cli::{Cli, Commands};
use dashboard_remarks::config::DashboardConfig;
use dashboard_remarks::telemetry::{init_telemetry, shutdown_telemetry};

fn main() -> Result<()> {
    let cli = Cli::parse();

    DashboardConfig::load_env_file()?;
    let config = DashboardConfig::load(cli.config.as_deref())?;
    init_telemetry(&config.observability)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(async move {
        match cli.command {
            None => show_usage().await,
            Some(Commands::Serve) => ServeCommand::new(config).execute().await,
            Some(Commands::Stages) => StagesCommand::new(config).execute().await,
            Some(Commands::Records {
                limit,
                filters,
                stage,
            }) => RecordsCommand::new(config, limit, filters, stage).execute().await,
            Some(Commands::Remark { action }) => RemarkCommand::new(config, action).execute().await,
        }
    });

    shutdown_telemetry();
    result
}
