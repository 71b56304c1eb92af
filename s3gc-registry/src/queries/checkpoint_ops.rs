//! CDC checkpoint row operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use s3gc_core::errors::RegistryError;
use s3gc_core::models::{CdcCursor, Checkpoint};

use crate::to_store_err;

pub fn get(conn: &Connection, stream: &str) -> Result<Option<Checkpoint>, RegistryError> {
    conn.query_row(
        "SELECT cursor, seq FROM cdc_checkpoints WHERE stream = ?1",
        params![stream],
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
    )
    .optional()
    .map_err(|e| to_store_err(e.to_string()))?
    .map(|(cursor_json, seq)| {
        let cursor: CdcCursor = serde_json::from_str(&cursor_json)
            .map_err(|e| to_store_err(format!("bad checkpoint cursor: {e}")))?;
        Ok(Checkpoint {
            stream: stream.to_string(),
            cursor,
            seq: seq.max(0) as u64,
        })
    })
    .transpose()
}

pub fn upsert(
    conn: &Connection,
    checkpoint: &Checkpoint,
    now: DateTime<Utc>,
) -> Result<(), RegistryError> {
    let cursor_json = serde_json::to_string(&checkpoint.cursor)
        .map_err(|e| to_store_err(format!("encode checkpoint cursor: {e}")))?;
    conn.execute(
        "INSERT INTO cdc_checkpoints (stream, cursor, seq, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(stream) DO UPDATE SET
             cursor     = excluded.cursor,
             seq        = excluded.seq,
             updated_at = excluded.updated_at",
        params![
            checkpoint.stream,
            cursor_json,
            checkpoint.seq as i64,
            now.to_rfc3339()
        ],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}
