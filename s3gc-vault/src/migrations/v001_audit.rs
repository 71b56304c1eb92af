//! v001: operations, deletion_records.

use rusqlite::Connection;

use s3gc_core::errors::VaultError;

use crate::to_store_err;

pub fn migrate(conn: &Connection) -> Result<(), VaultError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS operations (
            id                   TEXT PRIMARY KEY,
            mode                 TEXT NOT NULL,
            status               TEXT NOT NULL,
            started_at           TEXT NOT NULL,
            finished_at          TEXT,
            config_digest        TEXT NOT NULL,
            candidates_found     INTEGER NOT NULL DEFAULT 0,
            verified_orphans     INTEGER NOT NULL DEFAULT 0,
            deleted_count        INTEGER NOT NULL DEFAULT 0,
            excluded_count       INTEGER NOT NULL DEFAULT 0,
            retained_count       INTEGER NOT NULL DEFAULT 0,
            registry_stale_count INTEGER NOT NULL DEFAULT 0,
            bytes_original       INTEGER NOT NULL DEFAULT 0,
            bytes_stored         INTEGER NOT NULL DEFAULT 0,
            error_count          INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS deletion_records (
            operation_id         TEXT NOT NULL,
            s3_key               TEXT NOT NULL,
            original_size        INTEGER NOT NULL,
            stored_size          INTEGER NOT NULL,
            codec                TEXT NOT NULL,
            content_hash         TEXT NOT NULL,
            blob_path            TEXT NOT NULL,
            deleted_at           TEXT NOT NULL,
            restored_at          TEXT,
            restore_operation_id TEXT,
            PRIMARY KEY (operation_id, s3_key)
        );

        CREATE INDEX IF NOT EXISTS idx_records_key
            ON deletion_records(s3_key, deleted_at);
        CREATE INDEX IF NOT EXISTS idx_records_undone
            ON deletion_records(s3_key) WHERE restored_at IS NULL;
        ",
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}
