//! `ICdcSource` implementations.

mod memory;
mod mysql;
mod postgres;

pub use memory::{MemoryCdcHandle, MemoryConnector, MemorySource};
pub use mysql::MySqlSource;
pub use postgres::PostgresSource;
