//! Deletion record operations.
//!
//! The only UPDATE path is `mark_restored`, and its WHERE clause carries
//! `restored_at IS NULL` so the null→set transition can happen once.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};

use s3gc_core::errors::VaultError;
use s3gc_core::models::{Codec, OperationId, VaultRecord};

use super::parse_ts;
use crate::to_store_err;

const RECORD_COLUMNS: &str = "operation_id, s3_key, original_size, stored_size, codec,
    content_hash, blob_path, deleted_at, restored_at, restore_operation_id";

pub fn insert(conn: &Connection, rec: &VaultRecord) -> Result<(), VaultError> {
    let result = conn.execute(
        "INSERT INTO deletion_records (
            operation_id, s3_key, original_size, stored_size, codec,
            content_hash, blob_path, deleted_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            rec.operation_id.as_str(),
            rec.s3_key,
            rec.original_size as i64,
            rec.stored_size as i64,
            rec.codec.as_str(),
            rec.content_hash,
            rec.blob_path,
            rec.deleted_at.to_rfc3339(),
        ],
    );

    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == ErrorCode::ConstraintViolation =>
        {
            Err(VaultError::Conflict {
                operation_id: rec.operation_id.to_string(),
                key: rec.s3_key.clone(),
            })
        }
        Err(e) => Err(to_store_err(e.to_string())),
    }
}

/// Latest record for `key` that has not been restored yet.
pub fn latest_undone_by_key(
    conn: &Connection,
    key: &str,
) -> Result<Option<VaultRecord>, VaultError> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM deletion_records
         WHERE s3_key = ?1 AND restored_at IS NULL
         ORDER BY deleted_at DESC, operation_id DESC LIMIT 1"
    );
    conn.query_row(&sql, params![key], row_to_record)
        .optional()
        .map_err(|e| to_store_err(e.to_string()))?
        .transpose()
}

pub fn by_operation(
    conn: &Connection,
    operation_id: &OperationId,
) -> Result<Vec<VaultRecord>, VaultError> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM deletion_records
         WHERE operation_id = ?1 ORDER BY s3_key"
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| to_store_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![operation_id.as_str()], row_to_record)
        .map_err(|e| to_store_err(e.to_string()))?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row.map_err(|e| to_store_err(e.to_string()))??);
    }
    Ok(records)
}

/// Set `restored_at` + `restore_operation_id`, exactly once.
pub fn mark_restored(
    conn: &Connection,
    operation_id: &OperationId,
    key: &str,
    restore_operation_id: &OperationId,
    now: DateTime<Utc>,
) -> Result<(), VaultError> {
    let changed = conn
        .execute(
            "UPDATE deletion_records
             SET restored_at = ?3, restore_operation_id = ?4
             WHERE operation_id = ?1 AND s3_key = ?2 AND restored_at IS NULL",
            params![
                operation_id.as_str(),
                key,
                now.to_rfc3339(),
                restore_operation_id.as_str(),
            ],
        )
        .map_err(|e| to_store_err(e.to_string()))?;

    if changed > 0 {
        return Ok(());
    }

    // Distinguish "already restored" from "no such record".
    let exists: bool = conn
        .query_row(
            "SELECT 1 FROM deletion_records WHERE operation_id = ?1 AND s3_key = ?2",
            params![operation_id.as_str(), key],
            |_| Ok(true),
        )
        .optional()
        .map_err(|e| to_store_err(e.to_string()))?
        .unwrap_or(false);

    if exists {
        Err(VaultError::AlreadyRestored {
            operation_id: operation_id.to_string(),
            key: key.to_string(),
        })
    } else {
        Err(to_store_err(format!(
            "no deletion record for {operation_id}/{key}"
        )))
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<Result<VaultRecord, VaultError>> {
    let operation_id: String = row.get(0)?;
    let s3_key: String = row.get(1)?;
    let original_size: i64 = row.get(2)?;
    let stored_size: i64 = row.get(3)?;
    let codec: String = row.get(4)?;
    let content_hash: String = row.get(5)?;
    let blob_path: String = row.get(6)?;
    let deleted_at: String = row.get(7)?;
    let restored_at: Option<String> = row.get(8)?;
    let restore_operation_id: Option<String> = row.get(9)?;

    Ok((|| {
        Ok(VaultRecord {
            operation_id: OperationId::parse(&operation_id)
                .ok_or_else(|| to_store_err(format!("bad operation id {operation_id:?}")))?,
            s3_key,
            original_size: original_size.max(0) as u64,
            stored_size: stored_size.max(0) as u64,
            codec: codec.parse::<Codec>()?,
            content_hash,
            blob_path,
            deleted_at: parse_ts(&deleted_at)?,
            restored_at: restored_at.as_deref().map(parse_ts).transpose()?,
            restore_operation_id: restore_operation_id
                .as_deref()
                .map(|id| {
                    OperationId::parse(id)
                        .ok_or_else(|| to_store_err(format!("bad restore operation id {id:?}")))
                })
                .transpose()?,
        })
    })())
}
