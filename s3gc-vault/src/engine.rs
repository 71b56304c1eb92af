//! VaultStore — audit DB plus blob directory behind one handle.
//!
//! Writes are serialized behind a single connection; reads go through a
//! second connection (WAL keeps them concurrent with the writer).

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use s3gc_core::constants::VAULT_AUDIT_DB;
use s3gc_core::errors::VaultError;
use s3gc_core::models::{
    CycleStatus, GcOperation, OperationCounters, OperationId, VaultAggregates, VaultRecord,
};

use crate::blobs::BlobStore;
use crate::queries::{operation_ops, record_ops};
use crate::{migrations, to_store_err};

/// The vault: append-only deletion records, operations, restore marks,
/// and the backup blob directory.
pub struct VaultStore {
    writer: Mutex<Connection>,
    reader: Option<Mutex<Connection>>,
    blobs: BlobStore,
}

impl VaultStore {
    /// Open (creating if needed) the vault under `vault_root`.
    pub fn open(vault_root: &Path) -> Result<Self, VaultError> {
        fs::create_dir_all(vault_root)
            .map_err(|e| to_store_err(format!("create vault root: {e}")))?;
        let db_path = vault_root.join(VAULT_AUDIT_DB);

        let writer = Connection::open(&db_path).map_err(|e| to_store_err(e.to_string()))?;
        apply_pragmas(&writer)?;
        migrations::run_migrations(&writer)?;

        let reader = Connection::open(&db_path).map_err(|e| to_store_err(e.to_string()))?;
        apply_pragmas(&reader)?;

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Some(Mutex::new(reader)),
            blobs: BlobStore::new(vault_root),
        })
    }

    /// In-memory audit DB with a tempdir-less blob store rooted at `root`
    /// (for tests that only exercise the audit side, point it anywhere).
    pub fn open_in_memory(blob_root: &Path) -> Result<Self, VaultError> {
        let writer = Connection::open_in_memory().map_err(|e| to_store_err(e.to_string()))?;
        migrations::run_migrations(&writer)?;
        Ok(Self {
            writer: Mutex::new(writer),
            reader: None,
            blobs: BlobStore::new(blob_root),
        })
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    fn with_writer<F, T>(&self, f: F) -> Result<T, VaultError>
    where
        F: FnOnce(&Connection) -> Result<T, VaultError>,
    {
        let guard = self
            .writer
            .lock()
            .map_err(|e| to_store_err(format!("vault writer lock poisoned: {e}")))?;
        f(&guard)
    }

    fn with_reader<F, T>(&self, f: F) -> Result<T, VaultError>
    where
        F: FnOnce(&Connection) -> Result<T, VaultError>,
    {
        match &self.reader {
            Some(reader) => {
                let guard = reader
                    .lock()
                    .map_err(|e| to_store_err(format!("vault reader lock poisoned: {e}")))?;
                f(&guard)
            }
            None => self.with_writer(f),
        }
    }

    /// Persist a cycle-started record.
    pub fn begin_operation(&self, op: &GcOperation) -> Result<(), VaultError> {
        self.with_writer(|conn| operation_ops::insert_started(conn, op))
    }

    /// Append one deletion record. `Conflict` when `(operation_id, s3_key)`
    /// already exists, which is the dedup guarantee for double-listed keys.
    pub fn record_deletion(&self, rec: &VaultRecord) -> Result<(), VaultError> {
        self.with_writer(|conn| record_ops::insert(conn, rec))
    }

    /// Close an operation with its final counters.
    pub fn end_operation(
        &self,
        id: &OperationId,
        status: CycleStatus,
        counters: &OperationCounters,
        finished_at: DateTime<Utc>,
    ) -> Result<(), VaultError> {
        self.with_writer(|conn| operation_ops::close(conn, id, status, counters, finished_at))
    }

    /// Latest record for `key` with `restored_at` still null.
    pub fn lookup_by_key(&self, key: &str) -> Result<Option<VaultRecord>, VaultError> {
        self.with_reader(|conn| record_ops::latest_undone_by_key(conn, key))
    }

    pub fn lookup_by_operation(
        &self,
        operation_id: &OperationId,
    ) -> Result<Vec<VaultRecord>, VaultError> {
        self.with_reader(|conn| record_ops::by_operation(conn, operation_id))
    }

    /// Mark one record restored, exactly once.
    pub fn mark_restored(
        &self,
        operation_id: &OperationId,
        key: &str,
        restore_operation_id: &OperationId,
    ) -> Result<(), VaultError> {
        self.with_writer(|conn| {
            record_ops::mark_restored(conn, operation_id, key, restore_operation_id, Utc::now())
        })
    }

    pub fn get_operation(&self, id: &OperationId) -> Result<Option<GcOperation>, VaultError> {
        self.with_reader(|conn| operation_ops::get(conn, id))
    }

    /// Newest-first page; returns the cursor for the next page when full.
    pub fn list_operations(
        &self,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<(Vec<GcOperation>, Option<String>), VaultError> {
        self.with_reader(|conn| {
            let ops = operation_ops::list(conn, limit, cursor)?;
            let next = if ops.len() == limit {
                ops.last().map(|op| op.id.to_string())
            } else {
                None
            };
            Ok((ops, next))
        })
    }

    pub fn last_finished(&self) -> Result<Option<GcOperation>, VaultError> {
        self.with_reader(operation_ops::last_finished)
    }

    pub fn aggregates(&self) -> Result<VaultAggregates, VaultError> {
        self.with_reader(operation_ops::aggregates)
    }

    /// Cheap probe used by the health endpoint.
    pub fn accessible(&self) -> bool {
        self.with_reader(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))
                .map_err(|e| to_store_err(e.to_string()))
        })
        .is_ok()
    }
}

fn apply_pragmas(conn: &Connection) -> Result<(), VaultError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        PRAGMA foreign_keys = ON;
        ",
    )
    .map_err(|e| to_store_err(e.to_string()))
}
