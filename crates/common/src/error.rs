//! Error payloads and failure types shared across the proxy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON error body defined by the LFS API
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            documentation_url: None,
            request_id: None,
        }
    }
}

/// Malformed LFS JSON or an enumerator tag with no known mapping.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed LFS message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown {kind} `{value}`")]
    UnknownTag { kind: &'static str, value: String },
}

/// A failure that carries the HTTP status it should surface as.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("HTTP {status}: {}", response.message)]
pub struct StatusCodeError {
    pub status: u16,
    pub response: ErrorResponse,
}

impl StatusCodeError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            response: ErrorResponse::new(message),
        }
    }

    pub fn with_response(status: u16, response: ErrorResponse) -> Self {
        Self { status, response }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(422, message)
    }
}
