//! SQLite access for the registry.
//!
//! The registry needs exactly two things from its store: a single
//! serialized write path (delta ordering within a CDC stream is nothing
//! more than this mutex) and point-lookup reads that stay on a WAL
//! snapshot while a batch commits. There is no general pool here; the
//! shape follows those two needs.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rusqlite::Connection;

use s3gc_core::errors::RegistryError;

use crate::to_store_err;

/// Read handles kept open for lookups. Reads are single-row probes from
/// the GC workers plus the occasional aggregate; two handles keep a slow
/// aggregate from stalling the ingester's checkpoint reads.
const READ_HANDLES: usize = 2;

pub(crate) struct RegistryDb {
    writer: Mutex<Connection>,
    /// Empty in in-memory mode, where separate connections would be
    /// separate databases; reads then go through the writer.
    readers: Vec<Mutex<Connection>>,
    next_reader: AtomicUsize,
}

impl RegistryDb {
    pub fn open(path: &Path) -> Result<Self, RegistryError> {
        let writer = Connection::open(path).map_err(|e| to_store_err(e.to_string()))?;
        // WAL is what lets the readers below hold snapshots while a delta
        // batch commits; NORMAL sync still fsyncs the WAL on commit.
        writer
            .execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA busy_timeout = 5000;
                ",
            )
            .map_err(|e| to_store_err(e.to_string()))?;

        let mut readers = Vec::with_capacity(READ_HANDLES);
        for _ in 0..READ_HANDLES {
            let conn = Connection::open_with_flags(
                path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(|e| to_store_err(e.to_string()))?;
            conn.execute_batch("PRAGMA busy_timeout = 5000;")
                .map_err(|e| to_store_err(e.to_string()))?;
            readers.push(Mutex::new(conn));
        }

        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            next_reader: AtomicUsize::new(0),
        })
    }

    /// In-memory registry for tests: one connection does everything.
    pub fn open_in_memory() -> Result<Self, RegistryError> {
        let writer = Connection::open_in_memory().map_err(|e| to_store_err(e.to_string()))?;
        Ok(Self {
            writer: Mutex::new(writer),
            readers: Vec::new(),
            next_reader: AtomicUsize::new(0),
        })
    }

    /// Serialized write access.
    pub fn write<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let conn = self
            .writer
            .lock()
            .map_err(|e| to_store_err(format!("registry writer poisoned: {e}")))?;
        f(&conn)
    }

    /// Serialized write access inside one transaction. An error from `f`
    /// drops the transaction, which rolls everything back; `label` tags
    /// begin/commit failures in the error message.
    pub fn write_tx<T>(
        &self,
        label: &str,
        f: impl FnOnce(&Connection) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        self.write(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| to_store_err(format!("{label} begin: {e}")))?;
            let out = f(&tx)?;
            tx.commit()
                .map_err(|e| to_store_err(format!("{label} commit: {e}")))?;
            Ok(out)
        })
    }

    /// Point-lookup read access, rotating over the read handles.
    pub fn read<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        if self.readers.is_empty() {
            return self.write(f);
        }
        let idx = self.next_reader.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[idx]
            .lock()
            .map_err(|e| to_store_err(format!("registry reader poisoned: {e}")))?;
        f(&conn)
    }
}
