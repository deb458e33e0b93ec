use common::{ParseError, StatusCodeError};
use thiserror::Error;

/// Upstream client errors
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The upstream answered with a non-2xx status
    #[error("upstream rejected request: {0}")]
    Status(#[from] StatusCodeError),

    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid upstream response: {0}")]
    Parse(#[from] ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpstreamError {
    /// HTTP status reported by the upstream, if it answered at all
    pub fn status_code(&self) -> Option<u16> {
        match self {
            UpstreamError::Status(e) => Some(e.status),
            _ => None,
        }
    }
}
