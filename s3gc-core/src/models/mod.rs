//! Domain models shared across the workspace.

mod cdc;
mod metrics;
mod operation;
mod registry;
mod report;
mod vault_record;
mod watched;

pub use cdc::{CdcCursor, ChangeKind, Checkpoint, DeltaOp, RefDelta, RowChange};
pub use metrics::{GcMetrics, HealthReport, StatusSummary, VaultAggregates};
pub use operation::{
    CycleStatus, GcMode, GcOperation, OperationCounters, OperationId, OperationIdGenerator,
};
pub use registry::RegistryEntry;
pub use report::{CycleReport, ObjectFailure, RestoreReport};
pub use vault_record::{Codec, VaultRecord};
pub use watched::{WatchedColumn, WatchedSet};
