//! Trait seams between the core pipeline and its adapters, so tests can
//! substitute in-memory implementations.

mod cdc_source;
mod object_store;
mod verifier;

pub use cdc_source::{ICdcConnector, ICdcSource};
pub use object_store::{IObjectStore, ListPage, ObjectInfo};
pub use verifier::IReferenceVerifier;
