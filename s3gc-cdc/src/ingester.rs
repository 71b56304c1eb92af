//! The ingester: drains a CDC source, turns row changes into ordered
//! registry deltas, and flushes them with the stream cursor in one
//! registry transaction. Runs for the lifetime of the process; stream
//! faults back off exponentially and reconnect from the committed
//! checkpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{timeout, Instant};

use s3gc_core::constants::{CDC_BATCH_MAX_DELTAS, CDC_BATCH_MAX_WAIT_MS};
use s3gc_core::errors::CdcError;
use s3gc_core::models::{
    CdcCursor, ChangeKind, Checkpoint, RefDelta, RowChange, WatchedColumn, WatchedSet,
};
use s3gc_core::traits::{ICdcConnector, ICdcSource};
use s3gc_registry::RegistryEngine;

use crate::backoff::Backoff;

/// Pause between polls while the stream is idle inside a batch window.
const IDLE_POLL: Duration = Duration::from_millis(20);

/// Decode one row change into registry deltas, preserving within-row
/// order: for an update, the -1 on the old value precedes the +1 on the
/// new one, column by column in declaration order.
pub fn decode_deltas(change: &RowChange, watched: &WatchedSet) -> Vec<RefDelta> {
    let mut deltas = Vec::new();
    let columns = watched.columns_of(&change.table);

    let non_empty = |v: &Option<String>| -> Option<String> {
        v.as_deref().filter(|s| !s.is_empty()).map(String::from)
    };

    for column in columns {
        let source = WatchedColumn::new(change.table.clone(), column.clone());
        match &change.kind {
            ChangeKind::Insert { new } => {
                if let Some(key) = new.get(column).and_then(non_empty) {
                    deltas.push(RefDelta::increment(key, source));
                }
            }
            ChangeKind::Delete { old } => {
                if let Some(key) = old.get(column).and_then(non_empty) {
                    deltas.push(RefDelta::decrement(key, source));
                }
            }
            ChangeKind::Update { old, new } => {
                let old_v = old.get(column).and_then(non_empty);
                let new_v = new.get(column).and_then(non_empty);
                if old_v != new_v {
                    if let Some(key) = old_v {
                        deltas.push(RefDelta::decrement(key, source.clone()));
                    }
                    if let Some(key) = new_v {
                        deltas.push(RefDelta::increment(key, source));
                    }
                }
            }
        }
    }
    deltas
}

/// Owns one CDC stream end to end.
pub struct Ingester {
    connector: Box<dyn ICdcConnector>,
    registry: Arc<RegistryEngine>,
    watched: WatchedSet,
    stream: String,
    /// Sequence of the next checkpoint to persist; refreshed from the
    /// registry on every (re)connect.
    next_seq: u64,
    connected: Arc<AtomicBool>,
}

impl Ingester {
    /// `connected` is the liveness flag surfaced by `/health`.
    pub fn new(
        connector: Box<dyn ICdcConnector>,
        registry: Arc<RegistryEngine>,
        watched: WatchedSet,
        stream: String,
        connected: Arc<AtomicBool>,
    ) -> Self {
        Self {
            connector,
            registry,
            watched,
            stream,
            next_seq: 1,
            connected,
        }
    }

    /// Run until `shutdown` flips. Never panics the process: stream
    /// faults are logged and retried with backoff, reconnecting from the
    /// committed checkpoint.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = Backoff::new();
        while !*shutdown.borrow() {
            match self.session(&mut shutdown, &mut backoff).await {
                Ok(()) => {}
                Err(e) => {
                    self.connected.store(false, Ordering::SeqCst);
                    let delay = backoff.next();
                    tracing::warn!(error = %e, backoff_ms = delay.as_millis() as u64,
                        "cdc stream error, backing off");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }
        self.connected.store(false, Ordering::SeqCst);
        tracing::info!(stream = %self.stream, "cdc ingester stopped");
    }

    /// One connected session: position at the checkpoint, then batch
    /// until shutdown or a stream fault.
    async fn session(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
        backoff: &mut Backoff,
    ) -> Result<(), CdcError> {
        let checkpoint = self
            .registry
            .checkpoint(&self.stream)
            .map_err(|e| CdcError::Stream {
                message: format!("read checkpoint: {e}"),
            })?;
        self.next_seq = checkpoint.as_ref().map(|c| c.seq + 1).unwrap_or(1);

        let mut source = self.connector.connect(checkpoint.as_ref()).await?;
        self.connected.store(true, Ordering::SeqCst);
        backoff.reset();
        tracing::info!(stream = %self.stream, seq = self.next_seq, "cdc session started");

        // A round interrupted by shutdown still flushes whatever it
        // decoded, so the last checkpoint always covers the last delta.
        while !*shutdown.borrow() {
            self.batch_round(&mut source, shutdown).await?;
        }
        Ok(())
    }

    /// One batch window: accumulate until 5,000 deltas or 500 ms, then
    /// flush deltas + checkpoint atomically and acknowledge upstream.
    async fn batch_round(
        &mut self,
        source: &mut Box<dyn ICdcSource>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), CdcError> {
        let window_end = Instant::now() + Duration::from_millis(CDC_BATCH_MAX_WAIT_MS);
        let mut deltas: Vec<RefDelta> = Vec::new();
        let mut cursor: Option<CdcCursor> = None;

        while deltas.len() < CDC_BATCH_MAX_DELTAS {
            if *shutdown.borrow() {
                break;
            }
            let remaining = window_end.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            match timeout(remaining, source.next_event()).await {
                // Window expired mid-read; the cancelled read is re-issued
                // next round from the same position.
                Err(_) => break,
                Ok(Err(e)) => {
                    // Flush what this round already decoded before
                    // surfacing the error, so the reconnect resumes after
                    // it instead of replaying it.
                    self.flush(&mut deltas, cursor.take())?;
                    return Err(e);
                }
                Ok(Ok(Some(change))) => {
                    cursor = Some(change.cursor.clone());
                    deltas.extend(decode_deltas(&change, &self.watched));
                }
                Ok(Ok(None)) => {
                    tokio::select! {
                        _ = tokio::time::sleep(IDLE_POLL.min(remaining)) => {}
                        _ = shutdown.changed() => break,
                    }
                }
            }
        }

        let acked = cursor.clone();
        self.flush(&mut deltas, cursor)?;
        if let Some(cursor) = acked {
            source.ack(&cursor).await?;
        }
        Ok(())
    }

    /// Commit buffered deltas and the cursor of the last event in one
    /// registry transaction.
    fn flush(
        &mut self,
        deltas: &mut Vec<RefDelta>,
        cursor: Option<CdcCursor>,
    ) -> Result<(), CdcError> {
        let Some(cursor) = cursor else {
            debug_assert!(deltas.is_empty());
            return Ok(());
        };

        let checkpoint = Checkpoint {
            stream: self.stream.clone(),
            cursor,
            seq: self.next_seq,
        };
        let outcome = self
            .registry
            .apply_batch(deltas, &checkpoint)
            .map_err(|e| CdcError::Stream {
                message: format!("apply_batch: {e}"),
            })?;
        self.next_seq += 1;

        tracing::debug!(
            stream = %self.stream,
            applied = outcome.applied,
            underflows = outcome.underflows,
            seq = checkpoint.seq,
            "cdc batch committed"
        );
        deltas.clear();
        Ok(())
    }
}
