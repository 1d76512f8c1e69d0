//! Configuration error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Errors raised when a command cannot be applied to the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("dataset {0} not found")]
    DatasetNotFound(Uuid),

    #[error("container '{0}' not found")]
    ContainerNotFound(String),

    #[error("dataset {0} already exists")]
    DatasetExists(Uuid),

    #[error("container '{0}' already exists")]
    ContainerExists(String),

    /// Containers run on the primary of every dataset they use.
    #[error("dataset {dataset_id} has primary '{primary}', container is placed on '{node}'")]
    DatasetElsewhere {
        dataset_id: Uuid,
        primary: String,
        node: String,
    },

    #[error("dataset {dataset_id} is used by container '{container}'")]
    DatasetInUse { dataset_id: Uuid, container: String },

    /// The caller's expected entry version is stale.
    #[error("concurrent modification: expected version {expected}, current version {actual}")]
    ConcurrentModification { expected: u64, actual: u64 },
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::DatasetNotFound(_) | ConfigError::ContainerNotFound(_) => {
                ErrorKind::NotFound
            }
            ConfigError::DatasetExists(_) | ConfigError::ContainerExists(_) => {
                ErrorKind::AlreadyExists
            }
            ConfigError::DatasetElsewhere { .. } | ConfigError::DatasetInUse { .. } => {
                ErrorKind::Conflict
            }
            ConfigError::ConcurrentModification { .. } => ErrorKind::ConcurrentModification,
        }
    }
}

/// Error kind carried in REST error bodies (`"code"`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    ConcurrentModification,
    /// The request contradicts the current configuration.
    Conflict,
    BadRequest,
    Internal,
}

impl ErrorKind {
    /// HTTP status code used for this kind.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::AlreadyExists | ErrorKind::ConcurrentModification | ErrorKind::Conflict => {
                409
            }
            ErrorKind::BadRequest => 400,
            ErrorKind::Internal => 500,
        }
    }
}
