use thiserror::Error;

/// Errors talking to the control service.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("control service unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid control endpoint {base_url}: {reason}")]
    InvalidEndpoint { base_url: String, reason: String },

    #[error("control service answered {status}: {message}")]
    UnexpectedResponse { status: u16, message: String },
}

pub type Result<T> = std::result::Result<T, AgentError>;
