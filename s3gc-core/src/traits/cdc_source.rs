use async_trait::async_trait;

use crate::errors::CdcError;
use crate::models::{CdcCursor, Checkpoint, RowChange};

/// A stream of decoded row changes from one database.
///
/// Implementations connect positioned at a caller-supplied cursor (or the
/// current end of stream when none exists) and yield events in stream
/// order. The ingester owns batching, registry commits, and backoff; a
/// source only decodes.
#[async_trait]
pub trait ICdcSource: Send {
    /// Next decoded event, or `None` when the stream is momentarily idle.
    /// Idle is not an error; the ingester uses it to close a batch window.
    async fn next_event(&mut self) -> Result<Option<RowChange>, CdcError>;

    /// Acknowledge everything up to `cursor` as durably applied, letting
    /// the upstream release its log. No-op for sources without retention
    /// coupling (MySQL binlog, in-memory).
    async fn ack(&mut self, cursor: &CdcCursor) -> Result<(), CdcError>;
}

#[async_trait]
impl ICdcSource for Box<dyn ICdcSource> {
    async fn next_event(&mut self) -> Result<Option<RowChange>, CdcError> {
        (**self).next_event().await
    }

    async fn ack(&mut self, cursor: &CdcCursor) -> Result<(), CdcError> {
        (**self).ack(cursor).await
    }
}

/// Builds (and, after stream faults, rebuilds) a source positioned at the
/// last committed checkpoint. The ingester reconnects through this after
/// every backoff.
#[async_trait]
pub trait ICdcConnector: Send + Sync {
    async fn connect(
        &self,
        checkpoint: Option<&Checkpoint>,
    ) -> Result<Box<dyn ICdcSource>, CdcError>;
}
