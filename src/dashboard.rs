//! Dashboard views over the record table: rows joined with their current
//! remark, and statistics across the table and the workflow.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::records::{NumericSummary, RecordRow, TableQuery, TableRecordStore, TableStats};
use crate::store::RemarkSummary;
use crate::workflows::{WorkflowEngine, WorkflowError};

/// Row selection plus an optional remark stage every row must be in.
#[derive(Debug, Clone, Default)]
pub struct DashboardQuery {
    pub table: TableQuery,
    pub stage: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardRow {
    #[serde(flatten)]
    pub row: RecordRow,
    /// `None` until the record's first transition.
    pub remark: Option<RemarkSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailedStats {
    #[serde(flatten)]
    pub table: TableStats,
    pub numeric_columns: Vec<String>,
    pub numeric_stats: BTreeMap<String, NumericSummary>,
    pub annotated_records: usize,
    /// Records currently in each stage; every configured stage is present.
    pub stage_counts: BTreeMap<String, usize>,
}

/// Matching rows in sheet order, each with its current remark. The limit
/// applies after the stage filter.
pub async fn dashboard_rows(
    records: &TableRecordStore,
    engine: &WorkflowEngine,
    query: &DashboardQuery,
) -> Result<Vec<DashboardRow>, WorkflowError> {
    let stage = query
        .stage
        .as_deref()
        .map(|label| engine.catalog().resolve(label))
        .transpose()?;

    let rows = match &stage {
        None => records.query(&query.table).await?,
        Some(_) => {
            records
                .query(&TableQuery {
                    limit: None,
                    filters: query.table.filters.clone(),
                })
                .await?
        }
    };
    let mut summaries = engine.remark_summaries().await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let remark = summaries.remove(&row.row_index);
            DashboardRow { row, remark }
        })
        .filter(|row| match (&stage, &row.remark) {
            (None, _) => true,
            (Some(wanted), Some(remark)) => remark.stage == wanted.label(),
            (Some(_), None) => false,
        })
        .take(query.table.limit.unwrap_or(usize::MAX))
        .collect())
}

pub async fn detailed_stats(
    records: &TableRecordStore,
    engine: &WorkflowEngine,
) -> Result<DetailedStats, WorkflowError> {
    let table = records.table().await?;
    let numeric_stats = table.numeric_summaries();
    let summaries = engine.remark_summaries().await?;

    let mut stage_counts: BTreeMap<String, usize> = engine
        .catalog()
        .labels()
        .map(|label| (label.to_string(), 0))
        .collect();
    let mut annotated_records = 0;
    for (record_id, summary) in &summaries {
        if table.contains(*record_id) {
            annotated_records += 1;
            *stage_counts.entry(summary.stage.clone()).or_default() += 1;
        }
    }

    Ok(DetailedStats {
        table: records.stats().await?,
        numeric_columns: numeric_stats.keys().cloned().collect(),
        numeric_stats,
        annotated_records,
        stage_counts,
    })
}
