use crate::market::MarketKind;
use thiserror::Error;

/// All errors generated in `fundflow-data`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    #[error("invalid {market} base url: {reason}")]
    InvalidBaseUrl { market: MarketKind, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("HTTP error {status} from {url}")]
    Status { status: u16, url: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("invalid bar for {symbol}: {reason}")]
    InvalidBar { symbol: String, reason: String },
}

impl DataError {
    /// Determine if retrying the same request may succeed.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_transient(&self) -> bool {
        match self {
            DataError::Http(_) => true,
            DataError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for DataError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Decode(value.to_string())
        } else {
            Self::Http(value.to_string())
        }
    }
}
