//! # s3gc-store
//!
//! Adapters at the storage seams: `IObjectStore` implementations for AWS
//! S3 and for tests, and `IReferenceVerifier` implementations for
//! Postgres and MySQL.

pub mod memory;
pub mod s3;
pub mod verifier;

pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;
pub use verifier::{MemoryVerifier, MySqlVerifier, PgVerifier};
