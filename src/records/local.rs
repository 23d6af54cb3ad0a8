use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{SourceError, Table, TableSource};

/// Table stored as a JSON file of the form
/// `{ "columns": [...], "rows": [[...], ...] }`.
#[derive(Debug, Clone)]
pub struct LocalTableSource {
    path: PathBuf,
}

impl LocalTableSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl TableSource for LocalTableSource {
    fn name(&self) -> &str {
        "Local table"
    }

    async fn fetch(&self) -> Result<Table, SourceError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })?;
        let Table { columns, rows } = serde_json::from_str(&raw)?;

        let mut values = Vec::with_capacity(rows.len() + 1);
        values.push(columns);
        values.extend(rows);
        Table::from_values(values)
    }

    async fn last_modified(&self) -> Option<DateTime<Utc>> {
        match tokio::fs::metadata(&self.path).await.and_then(|m| m.modified()) {
            Ok(modified) => Some(DateTime::<Utc>::from(modified)),
            Err(e) => {
                debug!(path = %self.path.display(), "No modification time for table file: {}", e);
                None
            }
        }
    }
}
