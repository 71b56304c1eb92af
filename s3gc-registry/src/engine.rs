//! RegistryEngine — the durable `key → refcount` map, with checkpoints
//! committed in the same transaction as the deltas they cover.

use std::path::Path;

use chrono::Utc;

use s3gc_core::errors::RegistryError;
use s3gc_core::models::{Checkpoint, DeltaOp, RefDelta, RegistryEntry, WatchedColumn};

use crate::db::RegistryDb;
use crate::migrations;
use crate::queries::{checkpoint_ops, ref_ops};

/// What came out of one `apply_batch` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub applied: usize,
    /// Decrements skipped because the row was missing or at zero. Treated
    /// as already-applied duplicates on the CDC path.
    pub underflows: usize,
}

/// The reference registry. All mutation funnels through the store's
/// serialized write path; reads see WAL snapshots.
pub struct RegistryEngine {
    db: RegistryDb,
}

impl RegistryEngine {
    /// Open a registry backed by a file on disk.
    pub fn open(path: &Path) -> Result<Self, RegistryError> {
        let engine = Self {
            db: RegistryDb::open(path)?,
        };
        engine.db.write(migrations::run_migrations)?;
        Ok(engine)
    }

    /// Open an in-memory registry (for testing).
    pub fn open_in_memory() -> Result<Self, RegistryError> {
        let engine = Self {
            db: RegistryDb::open_in_memory()?,
        };
        engine.db.write(migrations::run_migrations)?;
        Ok(engine)
    }

    /// Atomically raise `key` by one, creating the row at zero first when
    /// absent. The source tag goes to the debug log only.
    pub fn increment(&self, key: &str, source: &WatchedColumn) -> Result<(), RegistryError> {
        tracing::debug!(key = %key, source = %source, "registry increment");
        self.db
            .write(|conn| ref_ops::upsert_increment(conn, key, Utc::now()))
    }

    /// Atomically lower `key` by one. `Underflow` when the row is missing
    /// or already at zero; CDC callers swallow it, scan rebuilds must not.
    pub fn decrement(&self, key: &str, source: &WatchedColumn) -> Result<(), RegistryError> {
        tracing::debug!(key = %key, source = %source, "registry decrement");
        self.db.write(|conn| {
            if ref_ops::decrement(conn, key, Utc::now())? {
                Ok(())
            } else {
                Err(RegistryError::Underflow {
                    key: key.to_string(),
                })
            }
        })
    }

    /// Point lookup; 0 for missing rows.
    pub fn count_of(&self, key: &str) -> Result<u64, RegistryError> {
        self.db.read(|conn| ref_ops::get_count(conn, key))
    }

    pub fn entry(&self, key: &str) -> Result<Option<RegistryEntry>, RegistryError> {
        self.db.read(|conn| ref_ops::get_entry(conn, key))
    }

    /// Apply an ordered list of deltas and the new checkpoint in one
    /// transaction. Either all of it commits or none does, which is the
    /// durability contract the CDC ingester resumes on.
    ///
    /// Underflowing decrements are logged, counted, and skipped; the rest
    /// of the batch and the checkpoint still commit. A checkpoint whose
    /// seq does not advance past the persisted one aborts the whole batch.
    pub fn apply_batch(
        &self,
        deltas: &[RefDelta],
        checkpoint: &Checkpoint,
    ) -> Result<BatchOutcome, RegistryError> {
        self.db.write_tx("apply_batch", |conn| {
            let now = Utc::now();
            let mut outcome = BatchOutcome::default();

            for delta in deltas {
                match delta.op {
                    DeltaOp::Increment => {
                        ref_ops::upsert_increment(conn, &delta.key, now)?;
                        outcome.applied += 1;
                    }
                    DeltaOp::Decrement => {
                        if ref_ops::decrement(conn, &delta.key, now)? {
                            outcome.applied += 1;
                        } else {
                            tracing::warn!(
                                key = %delta.key,
                                source = %delta.source,
                                "registry underflow in CDC batch, treating as duplicate"
                            );
                            outcome.underflows += 1;
                        }
                    }
                }
            }

            if let Some(existing) = checkpoint_ops::get(conn, &checkpoint.stream)? {
                if checkpoint.seq <= existing.seq {
                    return Err(RegistryError::StaleCheckpoint {
                        stream: checkpoint.stream.clone(),
                        offered: checkpoint.seq,
                        persisted: existing.seq,
                    });
                }
            }
            checkpoint_ops::upsert(conn, checkpoint, now)?;

            Ok(outcome)
        })
    }

    /// Replace counts for every key the iterator yields; keys not observed
    /// are left untouched. Used only by the full-scan rebuild.
    pub fn rebuild<I>(&self, counts: I) -> Result<usize, RegistryError>
    where
        I: IntoIterator<Item = (String, u64)>,
    {
        self.db.write_tx("rebuild", |conn| {
            let now = Utc::now();
            let mut written = 0usize;
            for (key, count) in counts {
                ref_ops::replace_count(conn, &key, count, now)?;
                written += 1;
            }
            Ok(written)
        })
    }

    /// Last persisted checkpoint for a stream.
    pub fn checkpoint(&self, stream: &str) -> Result<Option<Checkpoint>, RegistryError> {
        self.db.read(|conn| checkpoint_ops::get(conn, stream))
    }

    pub fn key_count(&self) -> Result<u64, RegistryError> {
        self.db.read(ref_ops::key_count)
    }

    pub fn zero_ref_count(&self) -> Result<u64, RegistryError> {
        self.db.read(ref_ops::zero_ref_count)
    }
}
