//! # s3gc-cdc
//!
//! Streaming consumers of Postgres logical replication and MySQL
//! row-based binlog, decoded into ordered registry deltas with
//! transactionally checkpointed positions.

pub mod backoff;
pub mod connector;
pub mod ingester;
pub mod pgoutput;
pub mod source;

pub use connector::{MySqlConnector, PgConnector};
pub use ingester::Ingester;
pub use source::{MemoryCdcHandle, MemoryConnector, MemorySource, MySqlSource, PostgresSource};
