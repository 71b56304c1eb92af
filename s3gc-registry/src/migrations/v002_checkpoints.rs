//! v002: cdc_checkpoints.

use rusqlite::Connection;

use s3gc_core::errors::RegistryError;

use crate::to_store_err;

pub fn migrate(conn: &Connection) -> Result<(), RegistryError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS cdc_checkpoints (
            stream     TEXT PRIMARY KEY,
            cursor     TEXT NOT NULL,
            seq        INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );
        ",
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}
