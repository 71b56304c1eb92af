//! # s3gc-core
//!
//! Foundation crate for the S3 reference garbage collector.
//! Defines all types, traits, errors, config, and constants.
//! Every other crate in the workspace depends on this.

pub mod config;
pub mod constants;
pub mod errors;
pub mod models;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use config::GcConfig;
pub use errors::{GcError, GcResult};
pub use models::{
    CdcCursor, Checkpoint, GcMode, OperationId, RefDelta, RowChange, VaultRecord, WatchedColumn,
    WatchedSet,
};
