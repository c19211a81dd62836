use polars::error::PolarsError;
use std::io::Error as IoError;

/// Why a single work item could not be fetched. None of these abort a batch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("rate limited by {url}")]
    RateLimited { url: String },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed payload: {0}")]
    Payload(String),

    #[error("Polars error: {0}")]
    Frame(#[from] PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] IoError),
}

impl FetchError {
    pub fn payload<S: Into<String>>(msg: S) -> Self {
        FetchError::Payload(msg.into())
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::RateLimited { .. })
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Payload(e.to_string())
    }
}
