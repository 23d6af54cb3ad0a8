use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{RecordId, SourceError};

/// Tabular company data: a header row plus string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// One row keyed by column name, tagged with its record id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordRow {
    pub row_index: RecordId,
    pub values: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableStats {
    pub total_records: usize,
    pub total_columns: usize,
    pub columns: Vec<String>,
    pub source: String,
    /// Modification time of the backing file; `None` for live sources.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Summary of a column whose non-blank cells are all numbers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; absent with fewer than two values.
    pub std: Option<f64>,
    pub min: f64,
    pub median: f64,
    pub max: f64,
}

impl NumericSummary {
    fn from_values(mut values: Vec<f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        values.sort_by(f64::total_cmp);

        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let std = (count > 1).then(|| {
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            variance.sqrt()
        });
        let median = if count % 2 == 0 {
            (values[count / 2 - 1] + values[count / 2]) / 2.0
        } else {
            values[count / 2]
        };

        Some(Self {
            count,
            mean,
            std,
            min: values[0],
            median,
            max: values[count - 1],
        })
    }
}

/// Row selection for the dashboard data view.
#[derive(Debug, Clone, Default)]
pub struct TableQuery {
    pub limit: Option<usize>,
    /// Column/value pairs; a row must match every pair.
    pub filters: Vec<(String, String)>,
}

impl Table {
    /// Build a table from raw sheet values where the first row is the header.
    /// Short rows are padded, since sheet exports drop trailing blank cells.
    pub fn from_values(mut values: Vec<Vec<String>>) -> Result<Self, SourceError> {
        if values.is_empty() {
            return Err(SourceError::EmptyTable);
        }
        let columns: Vec<String> = values
            .remove(0)
            .into_iter()
            .map(|c| c.trim().to_string())
            .collect();
        if columns.iter().all(String::is_empty) {
            return Err(SourceError::EmptyTable);
        }

        let width = columns.len();
        let rows = values
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();

        Ok(Self { columns, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, record_id: RecordId) -> bool {
        usize::try_from(record_id).is_ok_and(|index| index < self.rows.len())
    }

    fn column_index(&self, name: &str) -> Result<usize, SourceError> {
        let wanted = name.trim();
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| SourceError::UnknownColumn(name.to_string()))
    }

    fn cell(row: &[String], column: usize) -> &str {
        row.get(column).map_or("", String::as_str)
    }

    fn row_at(&self, index: usize) -> Option<RecordRow> {
        let cells = self.rows.get(index)?;
        Some(RecordRow {
            row_index: index as RecordId,
            values: self
                .columns
                .iter()
                .cloned()
                .enumerate()
                .map(|(column, name)| (name, Self::cell(cells, column).to_string()))
                .collect(),
        })
    }

    pub fn row(&self, record_id: RecordId) -> Option<RecordRow> {
        usize::try_from(record_id).ok().and_then(|i| self.row_at(i))
    }

    /// Rows matching every filter (case-insensitive equality), in sheet order.
    pub fn query(&self, query: &TableQuery) -> Result<Vec<RecordRow>, SourceError> {
        let filters = query
            .filters
            .iter()
            .map(|(column, value)| Ok((self.column_index(column)?, value.trim())))
            .collect::<Result<Vec<_>, SourceError>>()?;

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                filters
                    .iter()
                    .all(|(col, value)| Self::cell(row, *col).trim().eq_ignore_ascii_case(value))
            })
            .take(limit)
            .filter_map(|(index, _)| self.row_at(index))
            .collect())
    }

    /// Sorted distinct non-blank values of one column, for filter dropdowns.
    /// Values differing only in case collapse into one entry, since filters
    /// match case-insensitively.
    pub fn distinct(&self, column: &str) -> Result<Vec<String>, SourceError> {
        let index = self.column_index(column)?;
        let mut values: Vec<String> = self
            .rows
            .iter()
            .map(|row| Self::cell(row, index).trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect();
        values.sort_by(|a, b| {
            a.to_ascii_lowercase()
                .cmp(&b.to_ascii_lowercase())
                .then_with(|| a.cmp(b))
        });
        values.dedup_by(|later, earlier| later.eq_ignore_ascii_case(earlier));
        Ok(values)
    }

    /// Summaries of every column whose non-blank cells all parse as numbers.
    pub fn numeric_summaries(&self) -> BTreeMap<String, NumericSummary> {
        self.columns
            .iter()
            .enumerate()
            .filter_map(|(index, name)| {
                let mut values = Vec::new();
                for row in &self.rows {
                    let cell = Self::cell(row, index).trim();
                    if cell.is_empty() {
                        continue;
                    }
                    match cell.parse::<f64>() {
                        Ok(value) if value.is_finite() => values.push(value),
                        _ => return None,
                    }
                }
                NumericSummary::from_values(values).map(|summary| (name.clone(), summary))
            })
            .collect()
    }

    pub fn stats(&self, source: &str) -> TableStats {
        TableStats {
            total_records: self.rows.len(),
            total_columns: self.columns.len(),
            columns: self.columns.clone(),
            source: source.to_string(),
            last_modified: None,
        }
    }
}
