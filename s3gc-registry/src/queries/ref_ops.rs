//! Refcount row operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use s3gc_core::errors::RegistryError;
use s3gc_core::models::RegistryEntry;

use crate::to_store_err;

/// Raise `key` by one, creating the row lazily.
pub fn upsert_increment(
    conn: &Connection,
    key: &str,
    now: DateTime<Utc>,
) -> Result<(), RegistryError> {
    conn.execute(
        "INSERT INTO object_refs (key, ref_count, first_seen_at, last_seen_at)
         VALUES (?1, 1, ?2, ?2)
         ON CONFLICT(key) DO UPDATE SET
             ref_count    = ref_count + 1,
             last_seen_at = excluded.last_seen_at",
        params![key, now.to_rfc3339()],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

/// Lower `key` by one. Returns false when the row is missing or already
/// at zero (the caller decides whether that is fatal).
pub fn decrement(conn: &Connection, key: &str, now: DateTime<Utc>) -> Result<bool, RegistryError> {
    let changed = conn
        .execute(
            "UPDATE object_refs
             SET ref_count = ref_count - 1, last_seen_at = ?2
             WHERE key = ?1 AND ref_count > 0",
            params![key, now.to_rfc3339()],
        )
        .map_err(|e| to_store_err(e.to_string()))?;
    Ok(changed > 0)
}

/// Point lookup; 0 for missing rows.
pub fn get_count(conn: &Connection, key: &str) -> Result<u64, RegistryError> {
    conn.query_row(
        "SELECT ref_count FROM object_refs WHERE key = ?1",
        params![key],
        |row| row.get::<_, i64>(0),
    )
    .optional()
    .map_err(|e| to_store_err(e.to_string()))
    .map(|c| c.unwrap_or(0).max(0) as u64)
}

pub fn get_entry(conn: &Connection, key: &str) -> Result<Option<RegistryEntry>, RegistryError> {
    conn.query_row(
        "SELECT key, ref_count, first_seen_at, last_seen_at
         FROM object_refs WHERE key = ?1",
        params![key],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        },
    )
    .optional()
    .map_err(|e| to_store_err(e.to_string()))?
    .map(|(key, count, first, last)| {
        Ok(RegistryEntry {
            key,
            ref_count: count.max(0) as u64,
            first_seen_at: parse_ts(&first)?,
            last_seen_at: parse_ts(&last)?,
        })
    })
    .transpose()
}

/// Overwrite the count for `key` (scan rebuild). Creates the row when
/// missing, keeps `first_seen_at` when present.
pub fn replace_count(
    conn: &Connection,
    key: &str,
    count: u64,
    now: DateTime<Utc>,
) -> Result<(), RegistryError> {
    conn.execute(
        "INSERT INTO object_refs (key, ref_count, first_seen_at, last_seen_at)
         VALUES (?1, ?2, ?3, ?3)
         ON CONFLICT(key) DO UPDATE SET
             ref_count    = excluded.ref_count,
             last_seen_at = excluded.last_seen_at",
        params![key, count as i64, now.to_rfc3339()],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

pub fn key_count(conn: &Connection) -> Result<u64, RegistryError> {
    conn.query_row("SELECT COUNT(*) FROM object_refs", [], |row| {
        row.get::<_, i64>(0)
    })
    .map_err(|e| to_store_err(e.to_string()))
    .map(|c| c.max(0) as u64)
}

pub fn zero_ref_count(conn: &Connection) -> Result<u64, RegistryError> {
    conn.query_row(
        "SELECT COUNT(*) FROM object_refs WHERE ref_count = 0",
        [],
        |row| row.get::<_, i64>(0),
    )
    .map_err(|e| to_store_err(e.to_string()))
    .map(|c| c.max(0) as u64)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, RegistryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| to_store_err(format!("bad timestamp {raw:?}: {e}")))
}
