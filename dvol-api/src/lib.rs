pub mod audit;
pub mod rest;
pub mod store;

pub use audit::{ApiAuditLogger, create_audit_logger};
pub use store::{Committed, ControlStore, DataStore, Event, StorageBackend, StoreError};
