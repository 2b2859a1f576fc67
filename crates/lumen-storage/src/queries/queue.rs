// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generation queue operations.
//!
//! Every status change is a single conditional `UPDATE`, so a transition only
//! lands when the row is still in a legal predecessor state.

use std::str::FromStr;

use lumen_core::{LumenError, now_timestamp};
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, map_tr_err};
use crate::models::{GenerationRequest, JobStatus, QueueCounts, QueueItem, StatusUpdate};
use crate::queries::{conversion_err, status_list};

const ITEM_COLUMNS: &str = "id, status, request_json, created_at, started_at, completed_at, \
                            error, result_seed";

fn row_to_item(row: &Row<'_>) -> Result<QueueItem, rusqlite::Error> {
    let status: String = row.get(1)?;
    let request_json: String = row.get(2)?;
    Ok(QueueItem {
        id: row.get(0)?,
        status: JobStatus::from_str(&status).map_err(|e| conversion_err(1, e))?,
        request: serde_json::from_str(&request_json).map_err(|e| conversion_err(2, e))?,
        created_at: row.get(3)?,
        started_at: row.get(4)?,
        completed_at: row.get(5)?,
        error: row.get(6)?,
        result_seed: row.get(7)?,
    })
}

/// Insert a new `pending` item. A duplicate id is a storage error.
pub async fn enqueue(
    db: &Database,
    id: &str,
    request: &GenerationRequest,
) -> Result<QueueItem, LumenError> {
    let request_json = serde_json::to_string(request).map_err(LumenError::storage)?;
    let item = QueueItem {
        id: id.to_string(),
        status: JobStatus::Pending,
        request: request.clone(),
        created_at: now_timestamp(),
        started_at: None,
        completed_at: None,
        error: None,
        result_seed: None,
    };

    let id = item.id.clone();
    let created_at = item.created_at.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO generation_queue (id, status, request_json, created_at)
                 VALUES (?1, 'pending', ?2, ?3)",
                params![id, request_json, created_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

    Ok(item)
}

/// Get an item by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<QueueItem>, LumenError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<QueueItem>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM generation_queue WHERE id = ?1"),
                params![id],
                row_to_item,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// The oldest pending item: smallest `created_at`, ties broken by insertion order.
pub async fn next_pending(db: &Database) -> Result<Option<QueueItem>, LumenError> {
    db.connection()
        .call(|conn| -> Result<Option<QueueItem>, rusqlite::Error> {
            conn.query_row(
                &format!(
                    "SELECT {ITEM_COLUMNS} FROM generation_queue
                     WHERE status = 'pending'
                     ORDER BY created_at ASC, seq ASC
                     LIMIT 1"
                ),
                [],
                row_to_item,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Move an item to `status`, writing only the fields present in `update`.
///
/// Returns `false` when the item is unknown or not in a legal predecessor state.
pub async fn update_status(
    db: &Database,
    id: &str,
    status: JobStatus,
    update: StatusUpdate,
) -> Result<bool, LumenError> {
    let id = id.to_string();
    let sql = format!(
        "UPDATE generation_queue SET status = ?2,
             started_at = COALESCE(?3, started_at),
             completed_at = COALESCE(?4, completed_at),
             error = COALESCE(?5, error),
             result_seed = COALESCE(?6, result_seed)
         WHERE id = ?1 AND status IN ({})",
        status_list(status.predecessors())
    );
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                &sql,
                params![
                    id,
                    status.as_str(),
                    update.started_at,
                    update.completed_at,
                    update.error,
                    update.result_seed,
                ],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete an item regardless of status.
pub async fn delete(db: &Database, id: &str) -> Result<bool, LumenError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute("DELETE FROM generation_queue WHERE id = ?1", params![id])?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete an item only while its status is one of `statuses`.
pub async fn delete_if_status(
    db: &Database,
    id: &str,
    statuses: &[JobStatus],
) -> Result<bool, LumenError> {
    if statuses.is_empty() {
        return Ok(false);
    }
    let id = id.to_string();
    let sql = format!(
        "DELETE FROM generation_queue WHERE id = ?1 AND status IN ({})",
        status_list(statuses)
    );
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            Ok(conn.execute(&sql, params![id])? > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// List items in FIFO order, optionally filtered by status.
pub async fn list(db: &Database, status: Option<JobStatus>) -> Result<Vec<QueueItem>, LumenError> {
    let status = status.map(|s| s.as_str());
    db.connection()
        .call(move |conn| -> Result<Vec<QueueItem>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ITEM_COLUMNS} FROM generation_queue
                 WHERE (?1 IS NULL OR status = ?1)
                 ORDER BY created_at ASC, seq ASC"
            ))?;
            let rows = stmt.query_map(params![status], row_to_item)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Per-status counts plus the id of the generating item, read in one transaction.
pub async fn counts_by_status(db: &Database) -> Result<QueueCounts, LumenError> {
    db.connection()
        .call(|conn| -> Result<QueueCounts, rusqlite::Error> {
            let tx = conn.transaction()?;
            let mut counts = QueueCounts::default();
            {
                let mut stmt =
                    tx.prepare("SELECT status, COUNT(*) FROM generation_queue GROUP BY status")?;
                let mut rows = stmt.query([])?;
                while let Some(row) = rows.next()? {
                    let status: String = row.get(0)?;
                    let count = row.get::<_, i64>(1)?.max(0) as u64;
                    match JobStatus::from_str(&status) {
                        Ok(JobStatus::Pending) => counts.pending = count,
                        Ok(JobStatus::Generating) => counts.generating = count,
                        Ok(JobStatus::Complete) => counts.completed = count,
                        Ok(JobStatus::Failed) => counts.failed = count,
                        Err(e) => return Err(conversion_err(0, e)),
                    }
                }
            }
            counts.generating_id = tx
                .query_row(
                    "SELECT id FROM generation_queue WHERE status = 'generating' LIMIT 1",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            tx.commit()?;
            Ok(counts)
        })
        .await
        .map_err(map_tr_err)
}

/// Reset a `failed` or `generating` item to `pending`, clearing its
/// timestamps, error and seed. `created_at` is kept, so the item keeps its
/// original place in line.
pub async fn reset_to_pending(db: &Database, id: &str) -> Result<bool, LumenError> {
    let id = id.to_string();
    let sql = format!(
        "UPDATE generation_queue SET status = 'pending',
             started_at = NULL, completed_at = NULL, error = NULL, result_seed = NULL
         WHERE id = ?1 AND status IN ({})",
        status_list(JobStatus::Pending.predecessors())
    );
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            Ok(conn.execute(&sql, params![id])? > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Crash recovery: return every `generating` item to `pending`.
///
/// Returns the number of items recovered.
pub async fn recover_interrupted(db: &Database) -> Result<usize, LumenError> {
    db.connection()
        .call(|conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE generation_queue SET status = 'pending',
                     started_at = NULL, completed_at = NULL, error = NULL, result_seed = NULL
                 WHERE status = 'generating'",
                [],
            )
        })
        .await
        .map_err(map_tr_err)
}
