use crate::narrative::NarrativeError;
use fundflow_data::DataError;
use thiserror::Error;

/// All errors generated in `fundflow-server`.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("an analysis is already in progress, please retry once it completes")]
    Busy,

    #[error("market data: {0}")]
    Data(#[from] DataError),

    #[error("narrative: {0}")]
    Narrative(#[from] NarrativeError),

    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
}

impl ServerError {
    /// Status code reported to clients in error responses.
    pub fn code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) => 400,
            ServerError::Busy => 429,
            _ => 500,
        }
    }

    /// Determine if the client may succeed by retrying the same request later.
    pub fn is_transient(&self) -> bool {
        match self {
            ServerError::Busy => true,
            ServerError::Data(error) => error.is_transient(),
            _ => false,
        }
    }
}
