//! Operation row operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use s3gc_core::errors::VaultError;
use s3gc_core::models::{
    CycleStatus, GcMode, GcOperation, OperationCounters, OperationId, VaultAggregates,
};

use super::parse_ts;
use crate::to_store_err;

const OPERATION_COLUMNS: &str = "id, mode, status, started_at, finished_at, config_digest,
    candidates_found, verified_orphans, deleted_count, excluded_count,
    retained_count, registry_stale_count, bytes_original, bytes_stored, error_count";

pub fn insert_started(conn: &Connection, op: &GcOperation) -> Result<(), VaultError> {
    conn.execute(
        "INSERT INTO operations (id, mode, status, started_at, config_digest)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            op.id.as_str(),
            op.mode.as_str(),
            op.status.as_str(),
            op.started_at.to_rfc3339(),
            op.config_digest,
        ],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

/// Close an operation: counters and final status land exactly once.
pub fn close(
    conn: &Connection,
    id: &OperationId,
    status: CycleStatus,
    counters: &OperationCounters,
    finished_at: DateTime<Utc>,
) -> Result<(), VaultError> {
    let changed = conn
        .execute(
            "UPDATE operations SET
                status = ?2, finished_at = ?3,
                candidates_found = ?4, verified_orphans = ?5, deleted_count = ?6,
                excluded_count = ?7, retained_count = ?8, registry_stale_count = ?9,
                bytes_original = ?10, bytes_stored = ?11, error_count = ?12
             WHERE id = ?1 AND finished_at IS NULL",
            params![
                id.as_str(),
                status.as_str(),
                finished_at.to_rfc3339(),
                counters.candidates_found as i64,
                counters.verified_orphans as i64,
                counters.deleted_count as i64,
                counters.excluded_count as i64,
                counters.retained_count as i64,
                counters.registry_stale_count as i64,
                counters.bytes_original as i64,
                counters.bytes_stored as i64,
                counters.error_count as i64,
            ],
        )
        .map_err(|e| to_store_err(e.to_string()))?;
    if changed == 0 {
        return Err(VaultError::UnknownOperation {
            operation_id: id.to_string(),
        });
    }
    Ok(())
}

pub fn get(conn: &Connection, id: &OperationId) -> Result<Option<GcOperation>, VaultError> {
    let sql = format!("SELECT {OPERATION_COLUMNS} FROM operations WHERE id = ?1");
    conn.query_row(&sql, params![id.as_str()], row_to_operation)
        .optional()
        .map_err(|e| to_store_err(e.to_string()))?
        .transpose()
}

/// Page of operations, newest first. `cursor` is the id to continue below.
pub fn list(
    conn: &Connection,
    limit: usize,
    cursor: Option<&str>,
) -> Result<Vec<GcOperation>, VaultError> {
    let sql = format!(
        "SELECT {OPERATION_COLUMNS} FROM operations
         WHERE (?1 IS NULL OR id < ?1)
         ORDER BY id DESC LIMIT ?2"
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| to_store_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![cursor, limit as i64], row_to_operation)
        .map_err(|e| to_store_err(e.to_string()))?;

    let mut ops = Vec::new();
    for row in rows {
        ops.push(row.map_err(|e| to_store_err(e.to_string()))??);
    }
    Ok(ops)
}

/// Most recently finished operation, if any.
pub fn last_finished(conn: &Connection) -> Result<Option<GcOperation>, VaultError> {
    let sql = format!(
        "SELECT {OPERATION_COLUMNS} FROM operations
         WHERE finished_at IS NOT NULL
         ORDER BY finished_at DESC, id DESC LIMIT 1"
    );
    conn.query_row(&sql, [], row_to_operation)
        .optional()
        .map_err(|e| to_store_err(e.to_string()))?
        .transpose()
}

pub fn aggregates(conn: &Connection) -> Result<VaultAggregates, VaultError> {
    let (total_operations, total_deleted, bytes_original, bytes_stored, last_run_at) = conn
        .query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(deleted_count), 0),
                    COALESCE(SUM(bytes_original), 0),
                    COALESCE(SUM(bytes_stored), 0),
                    MAX(finished_at)
             FROM operations WHERE finished_at IS NOT NULL",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            },
        )
        .map_err(|e| to_store_err(e.to_string()))?;

    let total_restored: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM deletion_records WHERE restored_at IS NOT NULL",
            [],
            |row| row.get(0),
        )
        .map_err(|e| to_store_err(e.to_string()))?;

    Ok(VaultAggregates {
        total_operations: total_operations.max(0) as u64,
        total_deleted: total_deleted.max(0) as u64,
        total_restored: total_restored.max(0) as u64,
        bytes_original: bytes_original.max(0) as u64,
        bytes_stored: bytes_stored.max(0) as u64,
        last_run_at: last_run_at.as_deref().map(parse_ts).transpose()?,
    })
}

fn row_to_operation(row: &Row<'_>) -> rusqlite::Result<Result<GcOperation, VaultError>> {
    let id: String = row.get(0)?;
    let mode: String = row.get(1)?;
    let status: String = row.get(2)?;
    let started_at: String = row.get(3)?;
    let finished_at: Option<String> = row.get(4)?;
    let config_digest: String = row.get(5)?;
    let counters = OperationCounters {
        candidates_found: row.get::<_, i64>(6)?.max(0) as u64,
        verified_orphans: row.get::<_, i64>(7)?.max(0) as u64,
        deleted_count: row.get::<_, i64>(8)?.max(0) as u64,
        excluded_count: row.get::<_, i64>(9)?.max(0) as u64,
        retained_count: row.get::<_, i64>(10)?.max(0) as u64,
        registry_stale_count: row.get::<_, i64>(11)?.max(0) as u64,
        bytes_original: row.get::<_, i64>(12)?.max(0) as u64,
        bytes_stored: row.get::<_, i64>(13)?.max(0) as u64,
        error_count: row.get::<_, i64>(14)?.max(0) as u64,
    };

    Ok((|| {
        Ok(GcOperation {
            id: OperationId::parse(&id)
                .ok_or_else(|| to_store_err(format!("bad operation id {id:?}")))?,
            mode: mode
                .parse::<GcMode>()
                .map_err(|_| to_store_err(format!("bad mode {mode:?}")))?,
            status: status
                .parse::<CycleStatus>()
                .map_err(|_| to_store_err(format!("bad status {status:?}")))?,
            started_at: parse_ts(&started_at)?,
            finished_at: finished_at.as_deref().map(parse_ts).transpose()?,
            counters,
            config_digest,
        })
    })())
}
