//! Client error types.

use std::time::Duration;

use dvol_types::{ConfigError, ErrorKind};
use thiserror::Error;

/// Errors surfaced by [`ClusterClient`](crate::ClusterClient) implementations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The dataset or container is absent from the configuration.
    #[error("not found: {0}")]
    NotFound(String),

    /// The identifier is already taken.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The expected version was stale; retry against the latest version.
    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    /// The request contradicts the current configuration, such as a dataset
    /// still used by a container.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Observed state did not match the configuration in time.
    #[error("convergence timeout after {waited:?}")]
    ConvergenceTimeout { waited: Duration },

    /// The request could not complete.
    #[error("transport failure: {0}")]
    TransportFailure(#[from] reqwest::Error),

    /// The configured service URL cannot address the REST surface.
    #[error("invalid endpoint {base_url}: {reason}")]
    InvalidEndpoint { base_url: String, reason: String },

    /// The service answered with something this client does not understand.
    #[error("unexpected response ({status}): {message}")]
    UnexpectedResponse { status: u16, message: String },
}

impl ClientError {
    /// Map a REST error body back onto the typed kinds.
    pub fn from_api(status: u16, kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::NotFound => ClientError::NotFound(message),
            ErrorKind::AlreadyExists => ClientError::AlreadyExists(message),
            ErrorKind::ConcurrentModification => ClientError::ConcurrentModification(message),
            ErrorKind::Conflict => ClientError::Conflict(message),
            ErrorKind::BadRequest | ErrorKind::Internal => {
                ClientError::UnexpectedResponse { status, message }
            }
        }
    }
}

impl From<ConfigError> for ClientError {
    fn from(e: ConfigError) -> Self {
        let message = e.to_string();
        ClientError::from_api(e.kind().status_code(), e.kind(), message)
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
