// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2020 Joyent, Inc.
// Copyright 2026 Edgecast Cloud LLC.

//! SQLite-based state store
//!
//! One connection guarded by an async mutex. The database runs in WAL mode
//! so reporting commands can read while a run is writing. Writes that hit
//! `SQLITE_BUSY`/`SQLITE_LOCKED` (another process holding the write lock)
//! are retried with a doubling delay, releasing the mutex between attempts.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior, params};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::error::StateError;
use super::schema;
use super::types::{
    ItemDescriptor, ItemFilter, ItemOutcome, ItemRecord, ItemStatus, StoreAggregate,
    TransitionFields, UnitFilter, UnitRecord, UnitStatus,
};
use super::StateStore;
use crate::stores::UnitRef;

const UNIT_COLUMNS: &str = "unit_id, group_id, status, items_total, items_processed, \
     error_message, started_at, completed_at";

const ITEM_COLUMNS: &str = "unit_id, group_id, filename, source_locator, target_name, status, \
     error_message, bytes, content_md5, completed_at";

/// Connection tuning for [`SqliteStateStore`]
#[derive(Clone, Debug)]
pub struct StoreOptions {
    /// How long SQLite itself waits on a lock before reporting busy
    pub busy_timeout: Duration,
    /// Attempts per operation when the database stays locked
    pub contention_attempts: u32,
    /// Delay before the first contention retry; doubles each time
    pub contention_base_delay: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            contention_attempts: 5,
            contention_base_delay: Duration::from_millis(100),
        }
    }
}

/// SQLite-backed [`StateStore`]
#[derive(Clone)]
pub struct SqliteStateStore {
    conn: Arc<Mutex<Connection>>,
    options: StoreOptions,
}

impl SqliteStateStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StateError> {
        Self::open_with(path, StoreOptions::default())
    }

    pub fn open_with(path: &Path, options: StoreOptions) -> Result<Self, StateError> {
        let open_err = |source| StateError::Open {
            path: path.display().to_string(),
            source,
        };
        let conn = Connection::open(path).map_err(open_err)?;
        Self::configure(conn, options).map_err(open_err)
    }

    /// A private in-memory database, for tests and dry runs.
    pub fn open_in_memory() -> Result<Self, StateError> {
        let open_err = |source| StateError::Open {
            path: ":memory:".to_string(),
            source,
        };
        let conn = Connection::open_in_memory().map_err(open_err)?;
        Self::configure(conn, StoreOptions::default()).map_err(open_err)
    }

    fn configure(conn: Connection, options: StoreOptions) -> rusqlite::Result<Self> {
        conn.busy_timeout(options.busy_timeout)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::init(&conn)?;
        debug!(journal_mode = %mode, "State store opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            options,
        })
    }

    /// Run `f` against the connection, retrying while the database is locked
    /// by another writer.
    async fn with_conn<T, F>(&self, op: &'static str, mut f: F) -> Result<T, StateError>
    where
        F: FnMut(&mut Connection) -> rusqlite::Result<T> + Send,
        T: Send,
    {
        let attempts = self.options.contention_attempts.max(1);
        let mut delay = self.options.contention_base_delay;

        for attempt in 1..=attempts {
            let result = {
                let mut conn = self.conn.lock().await;
                f(&mut conn)
            };
            match result {
                Ok(value) => return Ok(value),
                Err(e) if is_contention(&e) => {
                    if attempt == attempts {
                        break;
                    }
                    warn!(
                        op,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "State store locked, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                Err(source) => return Err(StateError::Query { op, source }),
            }
        }

        Err(StateError::Contended { op, attempts })
    }
}

fn is_contention(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if matches!(err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn count_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<u64>> {
    Ok(row.get::<_, Option<i64>>(idx)?.map(|n| n.max(0) as u64))
}

fn unit_from_row(row: &Row<'_>) -> rusqlite::Result<UnitRecord> {
    Ok(UnitRecord {
        unit_id: row.get(0)?,
        group_id: row.get(1)?,
        status: parse_column(row, 2)?,
        items_total: count_column(row, 3)?,
        items_processed: count_column(row, 4)?.unwrap_or(0),
        error_message: row.get(5)?,
        started_at: time_column(row, 6)?,
        completed_at: time_column(row, 7)?,
    })
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<ItemRecord> {
    Ok(ItemRecord {
        unit_id: row.get(0)?,
        group_id: row.get(1)?,
        filename: row.get(2)?,
        source_locator: row.get(3)?,
        target_name: row.get(4)?,
        status: parse_column(row, 5)?,
        error_message: row.get(6)?,
        bytes: count_column(row, 7)?,
        content_md5: row.get(8)?,
        completed_at: time_column(row, 9)?,
    })
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn upsert_units(&self, units: &[UnitRef]) -> Result<usize, StateError> {
        if units.is_empty() {
            return Ok(0);
        }
        let created_at = now();
        self.with_conn("upsert_units", |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut inserted = 0;
            {
                let mut stmt = tx.prepare(
                    r#"INSERT INTO units (unit_id, group_id, status, created_at)
                       VALUES (?1, ?2, 'pending', ?3)
                       ON CONFLICT(unit_id) DO NOTHING"#,
                )?;
                for unit in units {
                    inserted += stmt.execute(params![unit.unit_id, unit.group_id, created_at])?;
                }
            }
            tx.commit()?;
            Ok(inserted)
        })
        .await
    }

    async fn get_unit(&self, unit_id: &str) -> Result<Option<UnitRecord>, StateError> {
        let sql = format!("SELECT {UNIT_COLUMNS} FROM units WHERE unit_id = ?1");
        self.with_conn("get_unit", |conn| {
            conn.query_row(&sql, params![unit_id], unit_from_row)
                .optional()
        })
        .await
    }

    async fn transition_unit(
        &self,
        unit_id: &str,
        from: &[UnitStatus],
        to: UnitStatus,
        fields: TransitionFields,
    ) -> Result<bool, StateError> {
        let stamp = now();
        let started_at = (to == UnitStatus::InProgress).then_some(stamp.as_str());
        let completed_at = to.is_terminal().then_some(stamp.as_str());

        let applied = self
            .with_conn("transition_unit", |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let current: Option<String> = tx
                    .query_row(
                        "SELECT status FROM units WHERE unit_id = ?1",
                        params![unit_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                let Some(current) = current else {
                    return Ok(None);
                };
                if !from.iter().any(|s| s.as_str() == current) {
                    return Ok(Some(false));
                }
                tx.execute(
                    r#"UPDATE units
                       SET status = ?2,
                           error_message = ?3,
                           started_at = COALESCE(?4, started_at),
                           completed_at = ?5
                       WHERE unit_id = ?1"#,
                    params![
                        unit_id,
                        to.as_str(),
                        fields.error_message,
                        started_at,
                        completed_at
                    ],
                )?;
                tx.commit()?;
                Ok(Some(true))
            })
            .await?;

        applied.ok_or_else(|| StateError::UnitNotFound(unit_id.to_string()))
    }

    async fn upsert_items(&self, items: &[ItemDescriptor]) -> Result<usize, StateError> {
        if items.is_empty() {
            return Ok(0);
        }
        self.with_conn("upsert_items", |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut inserted = 0;
            {
                let mut stmt = tx.prepare(
                    r#"INSERT INTO items
                       (unit_id, group_id, filename, source_locator, target_name, status)
                       VALUES (?1, ?2, ?3, ?4, ?5, 'pending')
                       ON CONFLICT(unit_id, filename) DO NOTHING"#,
                )?;
                for item in items {
                    inserted += stmt.execute(params![
                        item.unit_id,
                        item.group_id,
                        item.filename,
                        item.source_locator,
                        item.target_name,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(inserted)
        })
        .await
    }

    async fn record_items_total(&self, unit_id: &str) -> Result<u64, StateError> {
        let total = self
            .with_conn("record_items_total", |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let updated = tx.execute(
                    r#"UPDATE units
                       SET items_total = (SELECT COUNT(*) FROM items WHERE unit_id = ?1),
                           items_processed = MAX(items_processed,
                               (SELECT COUNT(*) FROM items
                                WHERE unit_id = ?1 AND status != 'pending'))
                       WHERE unit_id = ?1"#,
                    params![unit_id],
                )?;
                if updated == 0 {
                    return Ok(None);
                }
                let total: i64 = tx.query_row(
                    "SELECT items_total FROM units WHERE unit_id = ?1",
                    params![unit_id],
                    |row| row.get(0),
                )?;
                tx.commit()?;
                Ok(Some(total.max(0) as u64))
            })
            .await?;

        total.ok_or_else(|| StateError::UnitNotFound(unit_id.to_string()))
    }

    async fn mark_item(
        &self,
        unit_id: &str,
        filename: &str,
        outcome: &ItemOutcome,
    ) -> Result<bool, StateError> {
        let (error, bytes, content_md5) = match outcome {
            ItemOutcome::Completed { bytes, content_md5 } => {
                (None, bytes.map(|b| b as i64), content_md5.as_deref())
            }
            ItemOutcome::Failed { error } => (Some(error.as_str()), None, None),
        };
        let status = outcome.status().as_str();
        let completed_at = now();

        self.with_conn("mark_item", |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let changed = tx.execute(
                r#"UPDATE items
                   SET status = ?3, error_message = ?4, bytes = ?5, content_md5 = ?6,
                       completed_at = ?7
                   WHERE unit_id = ?1 AND filename = ?2 AND status IN ('pending', 'failed')"#,
                params![
                    unit_id,
                    filename,
                    status,
                    error,
                    bytes,
                    content_md5,
                    completed_at
                ],
            )?;
            if changed > 0 {
                tx.execute(
                    r#"UPDATE units
                       SET items_processed = MAX(items_processed,
                           (SELECT COUNT(*) FROM items
                            WHERE unit_id = ?1 AND status != 'pending'))
                       WHERE unit_id = ?1"#,
                    params![unit_id],
                )?;
            }
            tx.commit()?;
            Ok(changed > 0)
        })
        .await
    }

    async fn get_items(&self, unit_id: &str) -> Result<Vec<ItemRecord>, StateError> {
        self.query_items(&ItemFilter {
            unit_id: Some(unit_id.to_string()),
            status: None,
        })
        .await
    }

    async fn query_units(&self, filter: &UnitFilter) -> Result<Vec<UnitRecord>, StateError> {
        let sql = format!(
            "SELECT {UNIT_COLUMNS} FROM units \
             WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR group_id = ?2) \
             ORDER BY unit_id"
        );
        let status = filter.status.map(|s| s.as_str());
        let group_id = filter.group_id.as_deref();
        self.with_conn("query_units", |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let units = stmt
                .query_map(params![status, group_id], unit_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(units)
        })
        .await
    }

    async fn query_items(&self, filter: &ItemFilter) -> Result<Vec<ItemRecord>, StateError> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items \
             WHERE (?1 IS NULL OR unit_id = ?1) AND (?2 IS NULL OR status = ?2) \
             ORDER BY unit_id, filename"
        );
        let unit_id = filter.unit_id.as_deref();
        let status = filter.status.map(|s| s.as_str());
        self.with_conn("query_items", |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let items = stmt
                .query_map(params![unit_id, status], item_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(items)
        })
        .await
    }

    async fn aggregate(&self) -> Result<StoreAggregate, StateError> {
        self.with_conn("aggregate", |conn| {
            let mut aggregate = StoreAggregate::default();

            let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM units GROUP BY status")?;
            let rows = stmt.query_map([], |row| {
                Ok((parse_column::<UnitStatus>(row, 0)?, count_column(row, 1)?))
            })?;
            for row in rows {
                let (status, n) = row?;
                aggregate.units.add(status, n.unwrap_or(0));
            }

            let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM items GROUP BY status")?;
            let rows = stmt.query_map([], |row| {
                Ok((parse_column::<ItemStatus>(row, 0)?, count_column(row, 1)?))
            })?;
            for row in rows {
                let (status, n) = row?;
                aggregate.items.add(status, n.unwrap_or(0));
            }

            Ok(aggregate)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn unit(id: &str) -> UnitRef {
        UnitRef::new("G1", id)
    }

    fn item(unit_id: &str, filename: &str) -> ItemDescriptor {
        ItemDescriptor {
            unit_id: unit_id.to_string(),
            group_id: "G1".to_string(),
            filename: filename.to_string(),
            source_locator: format!("loc://{filename}"),
            target_name: format!("{unit_id}-{filename}"),
        }
    }

    fn completed(bytes: u64) -> ItemOutcome {
        ItemOutcome::Completed {
            bytes: Some(bytes),
            content_md5: Some("1B2M2Y8AsgTpgAmY7PhCfg==".to_string()),
        }
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = SqliteStateStore::open(&dir.path().join("state.db")).unwrap();

        assert!(store.upsert_unit(&unit("U1")).await.unwrap());
        store
            .transition_unit(
                "U1",
                &[UnitStatus::Pending],
                UnitStatus::InProgress,
                TransitionFields::default(),
            )
            .await
            .unwrap();

        // A second seed, even with a different group, changes nothing.
        assert!(!store.upsert_unit(&UnitRef::new("G2", "U1")).await.unwrap());
        let record = store.get_unit("U1").await.unwrap().unwrap();
        assert_eq!(record.status, UnitStatus::InProgress);
        assert_eq!(record.group_id, "G1");
        assert!(record.started_at.is_some());

        let inserted = store
            .upsert_units(&[unit("U1"), unit("U2"), unit("U2")])
            .await
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(store.aggregate().await.unwrap().units.total(), 2);
    }

    #[tokio::test]
    async fn test_transition_requires_allowed_status() {
        let store = SqliteStateStore::open_in_memory().unwrap();
        store.upsert_unit(&unit("U1")).await.unwrap();

        let from = [UnitStatus::Pending, UnitStatus::Failed, UnitStatus::InProgress];
        assert!(
            store
                .transition_unit("U1", &from, UnitStatus::InProgress, TransitionFields::default())
                .await
                .unwrap()
        );
        assert!(
            store
                .transition_unit(
                    "U1",
                    &[UnitStatus::InProgress],
                    UnitStatus::Completed,
                    TransitionFields::default()
                )
                .await
                .unwrap()
        );

        // A restarted worker must not pull a completed unit back.
        assert!(
            !store
                .transition_unit("U1", &from, UnitStatus::InProgress, TransitionFields::default())
                .await
                .unwrap()
        );
        let record = store.get_unit("U1").await.unwrap().unwrap();
        assert_eq!(record.status, UnitStatus::Completed);
        assert!(record.completed_at.is_some());

        let missing = store
            .transition_unit("nope", &from, UnitStatus::InProgress, TransitionFields::default())
            .await;
        assert!(matches!(missing, Err(StateError::UnitNotFound(_))));
    }

    #[tokio::test]
    async fn test_failed_transition_records_error() {
        let store = SqliteStateStore::open_in_memory().unwrap();
        store.upsert_unit(&unit("U1")).await.unwrap();
        store
            .transition_unit(
                "U1",
                &[UnitStatus::Pending],
                UnitStatus::Failed,
                TransitionFields::error("lookup returned HTTP 500"),
            )
            .await
            .unwrap();

        let failed = store
            .query_units(&UnitFilter::with_status(UnitStatus::Failed))
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(
            failed[0].error_message.as_deref(),
            Some("lookup returned HTTP 500")
        );

        // Re-entering in_progress clears the previous error.
        store
            .transition_unit(
                "U1",
                &[UnitStatus::Failed],
                UnitStatus::InProgress,
                TransitionFields::default(),
            )
            .await
            .unwrap();
        let record = store.get_unit("U1").await.unwrap().unwrap();
        assert_eq!(record.error_message, None);
        assert_eq!(record.completed_at, None);
    }

    #[tokio::test]
    async fn test_mark_item_updates_progress() {
        let store = SqliteStateStore::open_in_memory().unwrap();
        store.upsert_unit(&unit("U1")).await.unwrap();
        store
            .upsert_items(&[item("U1", "f1"), item("U1", "f2"), item("U1", "f3")])
            .await
            .unwrap();
        assert_eq!(store.record_items_total("U1").await.unwrap(), 3);

        assert!(store.mark_item("U1", "f1", &completed(10)).await.unwrap());
        assert!(
            store
                .mark_item(
                    "U1",
                    "f2",
                    &ItemOutcome::Failed {
                        error: "source object not found".to_string()
                    }
                )
                .await
                .unwrap()
        );

        let record = store.get_unit("U1").await.unwrap().unwrap();
        assert_eq!(record.items_total, Some(3));
        assert_eq!(record.items_processed, 2);

        // Completed items are never overwritten.
        assert!(
            !store
                .mark_item(
                    "U1",
                    "f1",
                    &ItemOutcome::Failed {
                        error: "late".to_string()
                    }
                )
                .await
                .unwrap()
        );

        // A failed item may be retried to completion; the count stays put.
        assert!(store.mark_item("U1", "f2", &completed(20)).await.unwrap());
        let record = store.get_unit("U1").await.unwrap().unwrap();
        assert_eq!(record.items_processed, 2);

        let items = store.get_items("U1").await.unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].filename, "f1");
        assert_eq!(items[0].status, ItemStatus::Completed);
        assert_eq!(items[0].bytes, Some(10));
        assert_eq!(items[1].status, ItemStatus::Completed);
        assert_eq!(items[1].error_message, None);
        assert_eq!(items[2].status, ItemStatus::Pending);
    }

    #[tokio::test]
    async fn test_item_seed_is_idempotent() {
        let store = SqliteStateStore::open_in_memory().unwrap();
        store.upsert_unit(&unit("U1")).await.unwrap();
        assert!(store.upsert_item(&item("U1", "f1")).await.unwrap());
        store.mark_item("U1", "f1", &completed(1)).await.unwrap();
        assert!(!store.upsert_item(&item("U1", "f1")).await.unwrap());

        let items = store.get_items("U1").await.unwrap();
        assert_eq!(items[0].status, ItemStatus::Completed);
        assert_eq!(store.record_items_total("U1").await.unwrap(), 1);
        let record = store.get_unit("U1").await.unwrap().unwrap();
        assert_eq!(record.items_processed, 1);
    }

    #[tokio::test]
    async fn test_items_require_known_unit() {
        let store = SqliteStateStore::open_in_memory().unwrap();
        let result = store.upsert_item(&item("ghost", "f1")).await;
        assert!(matches!(result, Err(StateError::Query { .. })));
        assert!(matches!(
            store.record_items_total("ghost").await,
            Err(StateError::UnitNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_query_and_aggregate() {
        let store = SqliteStateStore::open_in_memory().unwrap();
        store
            .upsert_units(&[unit("U1"), unit("U2"), UnitRef::new("G2", "U3")])
            .await
            .unwrap();
        store
            .transition_unit(
                "U2",
                &[UnitStatus::Pending],
                UnitStatus::Completed,
                TransitionFields::default(),
            )
            .await
            .unwrap();
        store.upsert_items(&[item("U1", "a"), item("U1", "b")]).await.unwrap();
        store
            .mark_item("U1", "a", &ItemOutcome::Failed { error: "x".into() })
            .await
            .unwrap();

        let in_g2 = store
            .query_units(&UnitFilter {
                status: None,
                group_id: Some("G2".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(in_g2.len(), 1);
        assert_eq!(in_g2[0].unit_id, "U3");

        let failed_items = store
            .query_items(&ItemFilter {
                unit_id: None,
                status: Some(ItemStatus::Failed),
            })
            .await
            .unwrap();
        assert_eq!(failed_items.len(), 1);
        assert_eq!(failed_items[0].error_message.as_deref(), Some("x"));

        let aggregate = store.aggregate().await.unwrap();
        assert_eq!(aggregate.units.pending, 2);
        assert_eq!(aggregate.units.completed, 1);
        assert_eq!(aggregate.items.pending, 1);
        assert_eq!(aggregate.items.failed, 1);
    }

    #[tokio::test]
    async fn test_progress_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.db");
        {
            let store = SqliteStateStore::open(&path).unwrap();
            store.upsert_unit(&unit("U1")).await.unwrap();
            store
                .transition_unit(
                    "U1",
                    &[UnitStatus::Pending],
                    UnitStatus::Completed,
                    TransitionFields::default(),
                )
                .await
                .unwrap();
        }
        let store = SqliteStateStore::open(&path).unwrap();
        let record = store.get_unit("U1").await.unwrap().unwrap();
        assert_eq!(record.status, UnitStatus::Completed);
    }

    #[tokio::test]
    async fn test_lock_contention_is_bounded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.db");
        let store = SqliteStateStore::open_with(
            &path,
            StoreOptions {
                busy_timeout: Duration::ZERO,
                contention_attempts: 3,
                contention_base_delay: Duration::from_millis(1),
            },
        )
        .unwrap();

        let locker = Connection::open(&path).unwrap();
        locker.execute_batch("BEGIN EXCLUSIVE").unwrap();

        let result = store.upsert_unit(&unit("U1")).await;
        assert!(matches!(
            result,
            Err(StateError::Contended { attempts: 3, .. })
        ));

        locker.execute_batch("COMMIT").unwrap();
        assert!(store.upsert_unit(&unit("U1")).await.unwrap());
    }
}
