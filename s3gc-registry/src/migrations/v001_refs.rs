//! v001: object_refs.

use rusqlite::Connection;

use s3gc_core::errors::RegistryError;

use crate::to_store_err;

pub fn migrate(conn: &Connection) -> Result<(), RegistryError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS object_refs (
            key           TEXT PRIMARY KEY,
            ref_count     INTEGER NOT NULL DEFAULT 0 CHECK (ref_count >= 0),
            first_seen_at TEXT NOT NULL,
            last_seen_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_refs_zero ON object_refs(key) WHERE ref_count = 0;
        ",
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}
