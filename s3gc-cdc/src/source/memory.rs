//! Channel-backed CDC source for tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use s3gc_core::errors::CdcError;
use s3gc_core::models::{CdcCursor, Checkpoint, RowChange};
use s3gc_core::traits::{ICdcConnector, ICdcSource};

/// Test handle: push events in, observe acknowledgements out.
#[derive(Clone)]
pub struct MemoryCdcHandle {
    tx: mpsc::UnboundedSender<RowChange>,
    acked: Arc<Mutex<Vec<CdcCursor>>>,
}

impl MemoryCdcHandle {
    pub fn push(&self, change: RowChange) {
        let _ = self.tx.send(change);
    }

    pub fn acked(&self) -> Vec<CdcCursor> {
        self.acked.lock().unwrap().clone()
    }
}

/// In-memory source: yields whatever the handle pushed, records acks.
pub struct MemorySource {
    rx: mpsc::UnboundedReceiver<RowChange>,
    acked: Arc<Mutex<Vec<CdcCursor>>>,
}

impl MemorySource {
    pub fn new() -> (Self, MemoryCdcHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let acked = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                rx,
                acked: acked.clone(),
            },
            MemoryCdcHandle { tx, acked },
        )
    }
}

/// Hands out the single in-memory source on first connect. A reconnect
/// attempt after a simulated fault fails, which tests use to observe
/// backoff behavior.
pub struct MemoryConnector {
    source: Mutex<Option<MemorySource>>,
}

impl MemoryConnector {
    pub fn new() -> (Self, MemoryCdcHandle) {
        let (source, handle) = MemorySource::new();
        (
            Self {
                source: Mutex::new(Some(source)),
            },
            handle,
        )
    }
}

#[async_trait]
impl ICdcConnector for MemoryConnector {
    async fn connect(
        &self,
        _checkpoint: Option<&Checkpoint>,
    ) -> Result<Box<dyn ICdcSource>, CdcError> {
        self.source
            .lock()
            .unwrap()
            .take()
            .map(|s| Box::new(s) as Box<dyn ICdcSource>)
            .ok_or_else(|| CdcError::Connect {
                message: "memory source already consumed".into(),
            })
    }
}

#[async_trait]
impl ICdcSource for MemorySource {
    async fn next_event(&mut self) -> Result<Option<RowChange>, CdcError> {
        match self.rx.try_recv() {
            Ok(change) => Ok(Some(change)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(CdcError::Stream {
                message: "memory source disconnected".into(),
            }),
        }
    }

    async fn ack(&mut self, cursor: &CdcCursor) -> Result<(), CdcError> {
        self.acked.lock().unwrap().push(cursor.clone());
        Ok(())
    }
}
