use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::{remark_from_stored, RemarkRepository, RemarkSummary, StoreError, StoredEntry};
use crate::records::RecordId;
use crate::workflows::{HistoryEntry, Remark, StageCatalog};

/// How long a connection waits for another writer before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

const CREATE_TABLES: [&str; 2] = [
    r#"
    CREATE TABLE IF NOT EXISTS remarks (
        record_id INTEGER PRIMARY KEY,
        stage TEXT NOT NULL,
        text TEXT NOT NULL,
        version INTEGER NOT NULL,
        updated_at TEXT NOT NULL,
        updated_by TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS remark_history (
        record_id INTEGER NOT NULL,
        seq INTEGER NOT NULL,
        stage TEXT NOT NULL,
        text TEXT NOT NULL,
        actor TEXT NOT NULL,
        recorded_at TEXT NOT NULL,
        PRIMARY KEY (record_id, seq)
    )
    "#,
];

/// SQLite-backed remark storage.
///
/// `remarks` holds the current stage per record, `remark_history` the
/// append-only log. Both are written in one `BEGIN IMMEDIATE` transaction
/// per commit, so the version check and the write hold the same lock.
pub struct SqliteRepository {
    pool: SqlitePool,
    catalog: Arc<StageCatalog>,
}

impl SqliteRepository {
    /// Connect, creating the database file and tables when missing.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        catalog: Arc<StageCatalog>,
    ) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        for statement in CREATE_TABLES {
            sqlx::query(statement).execute(&pool).await?;
        }
        info!("Remark tables ready in {}", database_url);

        Ok(Self { pool, catalog })
    }

    async fn commit_immediate(
        pool: &SqlitePool,
        remark: &Remark,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let record_id = remark.record_id();
        let entry = remark
            .history()
            .latest()
            .ok_or_else(|| StoreError::Corrupt {
                reason: format!("remark for record {record_id} has no history"),
            })?;

        let mut conn = pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let result = match Self::write_entry(&mut conn, remark, entry, expected_version).await {
            Ok(()) => sqlx::query("COMMIT")
                .execute(&mut *conn)
                .await
                .map(|_| ())
                .map_err(StoreError::from),
            Err(err) => Err(err),
        };

        if result.is_err() {
            if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                warn!(record_id, "Rollback after failed commit failed: {}", e);
            }
        }
        result
    }

    async fn write_entry(
        conn: &mut SqliteConnection,
        remark: &Remark,
        entry: &HistoryEntry,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let record_id = remark.record_id();
        let found: i64 = sqlx::query("SELECT version FROM remarks WHERE record_id = ?1")
            .bind(record_id as i64)
            .fetch_optional(&mut *conn)
            .await?
            .map(|row| row.try_get::<i64, _>("version"))
            .transpose()?
            .unwrap_or(0);
        if found as u64 != expected_version {
            return Err(StoreError::VersionConflict {
                record_id,
                expected: expected_version,
                found: found as u64,
            });
        }

        let recorded_at = entry.timestamp.to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO remark_history (record_id, seq, stage, text, actor, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(record_id as i64)
        .bind(expected_version as i64)
        .bind(entry.stage.label())
        .bind(&entry.text)
        .bind(entry.actor.name())
        .bind(&recorded_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| history_conflict(e, record_id, expected_version))?;

        sqlx::query(
            r#"
            INSERT INTO remarks (record_id, stage, text, version, updated_at, updated_by)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(record_id) DO UPDATE SET
                stage = excluded.stage,
                text = excluded.text,
                version = excluded.version,
                updated_at = excluded.updated_at,
                updated_by = excluded.updated_by
            "#,
        )
        .bind(record_id as i64)
        .bind(remark.stage().label())
        .bind(remark.text())
        .bind(remark.version() as i64)
        .bind(&recorded_at)
        .bind(entry.actor.name())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

/// A duplicate `(record_id, seq)` means another writer already appended
/// this version.
fn history_conflict(err: sqlx::Error, record_id: RecordId, expected: u64) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::VersionConflict {
            record_id,
            expected,
            found: expected + 1,
        },
        _ => StoreError::Database(err),
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            reason: format!("bad timestamp {raw:?}: {e}"),
        })
}

#[async_trait]
impl RemarkRepository for SqliteRepository {
    async fn load(&self, record_id: RecordId) -> Result<Option<Remark>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT stage, text, actor, recorded_at
            FROM remark_history
            WHERE record_id = ?1
            ORDER BY seq ASC
            "#,
        )
        .bind(record_id as i64)
        .fetch_all(&self.pool)
        .await?;

        let stored = rows
            .into_iter()
            .map(|row| {
                let recorded_at: String = row.try_get("recorded_at")?;
                Ok(StoredEntry {
                    stage: row.try_get("stage")?,
                    text: row.try_get("text")?,
                    actor: row.try_get("actor")?,
                    timestamp: parse_timestamp(&recorded_at)?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        remark_from_stored(&self.catalog, record_id, stored)
    }

    async fn commit(&self, remark: &Remark, expected_version: u64) -> Result<(), StoreError> {
        if remark.version() != expected_version + 1 {
            return Err(StoreError::Corrupt {
                reason: format!(
                    "commit must append exactly one entry (version {} over {expected_version})",
                    remark.version()
                ),
            });
        }

        // Spawned so a dropped caller cannot leave the connection inside an
        // open transaction.
        let pool = self.pool.clone();
        let remark = remark.clone();
        tokio::spawn(async move { Self::commit_immediate(&pool, &remark, expected_version).await })
            .await
            .map_err(|e| StoreError::Unavailable(format!("sqlite writer panicked: {e}")))?
    }

    async fn summaries(&self) -> Result<BTreeMap<RecordId, RemarkSummary>, StoreError> {
        let rows = sqlx::query(
            "SELECT record_id, stage, text, version, updated_at, updated_by FROM remarks",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<(RecordId, RemarkSummary), StoreError> {
                let record_id: i64 = row.try_get("record_id")?;
                let version: i64 = row.try_get("version")?;
                let updated_at: String = row.try_get("updated_at")?;
                let stage: String = row.try_get("stage")?;
                let stage = self.catalog.resolve(&stage).map_err(|_| StoreError::Corrupt {
                    reason: format!("record {record_id} references unknown stage {stage:?}"),
                })?;
                Ok((
                    record_id as RecordId,
                    RemarkSummary {
                        stage: stage.label().to_string(),
                        text: row.try_get("text")?,
                        version: version as u64,
                        updated_at: Some(parse_timestamp(&updated_at)?),
                        updated_by: Some(row.try_get("updated_by")?),
                    },
                ))
            })
            .collect()
    }

    /// Close database connections gracefully
    async fn close(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
        info!("Database connections closed");
    }
}
