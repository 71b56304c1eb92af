//! Audit DB schema migrations.

mod v001_audit;

use rusqlite::Connection;

use s3gc_core::errors::VaultError;

use crate::to_store_err;

const MIGRATIONS: &[(u32, fn(&Connection) -> Result<(), VaultError>)] = &[(1, v001_audit::migrate)];

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), VaultError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )",
    )
    .map_err(|e| to_store_err(e.to_string()))?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .map_err(|e| to_store_err(e.to_string()))?;

    for (version, migrate) in MIGRATIONS {
        if *version > current {
            migrate(conn)?;
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [version],
            )
            .map_err(|e| to_store_err(e.to_string()))?;
            tracing::info!(version, "vault migration applied");
        }
    }
    Ok(())
}
