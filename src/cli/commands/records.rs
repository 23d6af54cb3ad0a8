use anyhow::{bail, Result};
use std::sync::Arc;

use super::{with_services, Command};
use crate::access::OpenPolicy;
use crate::config::DashboardConfig;
use crate::dashboard::{dashboard_rows, DashboardQuery};
use crate::records::TableQuery;

pub struct RecordsCommand {
    config: DashboardConfig,
    limit: usize,
    filters: Vec<String>,
    stage: Option<String>,
}

impl RecordsCommand {
    pub fn new(
        config: DashboardConfig,
        limit: usize,
        filters: Vec<String>,
        stage: Option<String>,
    ) -> Self {
        Self {
            config,
            limit,
            filters,
            stage,
        }
    }
}

/// Split `COLUMN=VALUE` arguments.
pub fn parse_filters(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|filter| match filter.split_once('=') {
            Some((column, value)) if !column.trim().is_empty() => {
                Ok((column.trim().to_string(), value.trim().to_string()))
            }
            _ => bail!("filter {filter:?} must look like COLUMN=VALUE"),
        })
        .collect()
}

impl Command for RecordsCommand {
    async fn execute(&self) -> Result<()> {
        let query = DashboardQuery {
            table: TableQuery {
                limit: Some(self.limit),
                filters: parse_filters(&self.filters)?,
            },
            stage: self.stage.clone(),
        };

        with_services(&self.config, Arc::new(OpenPolicy::default()), |services| async move {
            let stats = services.records.stats().await?;
            let rows = dashboard_rows(&services.records, &services.engine, &query).await?;

            println!(
                "📊 {} ({} records, {} columns)",
                stats.source, stats.total_records, stats.total_columns
            );
            println!();
            if rows.is_empty() {
                println!("📋 No matching records");
                return Ok(());
            }
            for row in rows {
                let summary: Vec<String> = row
                    .row
                    .values
                    .iter()
                    .filter(|(_, value)| !value.is_empty())
                    .map(|(column, value)| format!("{column}={value}"))
                    .collect();
                let stage = row.remark.as_ref().map_or("-", |remark| remark.stage.as_str());
                println!("  #{:<5} [{stage}] {}", row.row.row_index, summary.join(", "));
            }
            Ok(())
        })
        .await
    }
}
