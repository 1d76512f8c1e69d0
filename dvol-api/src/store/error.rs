//! Store error types.

use dvol_types::{ConfigError, ErrorKind};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Conflict with existing resource.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Version mismatch (optimistic concurrency control).
    #[error("version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u64, actual: u64 },

    /// Request contradicts the current configuration.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Request rejected before reaching the configuration.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// Configuration could not be persisted or loaded.
    #[error("storage: {0}")]
    Storage(String),

    /// Internal error.
    #[error("internal: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Conflict(_) => ErrorKind::AlreadyExists,
            StoreError::VersionMismatch { .. } => ErrorKind::ConcurrentModification,
            StoreError::Precondition(_) => ErrorKind::Conflict,
            StoreError::Invalid(_) => ErrorKind::BadRequest,
            StoreError::Storage(_) | StoreError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<ConfigError> for StoreError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::ConcurrentModification { expected, actual } => {
                StoreError::VersionMismatch { expected, actual }
            }
            ConfigError::DatasetNotFound(_) | ConfigError::ContainerNotFound(_) => {
                StoreError::NotFound(e.to_string())
            }
            ConfigError::DatasetExists(_) | ConfigError::ContainerExists(_) => {
                StoreError::Conflict(e.to_string())
            }
            ConfigError::DatasetElsewhere { .. } | ConfigError::DatasetInUse { .. } => {
                StoreError::Precondition(e.to_string())
            }
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
