use dvol_client::ClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("control service: {0}")]
    Client(#[from] ClientError),

    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    #[error("at least one sample is required")]
    NoSamples,
}

pub type Result<T> = std::result::Result<T, BenchError>;
