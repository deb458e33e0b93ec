use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use common::{ErrorResponse, ParseError, StatusCodeError, LFS_CONTENT_TYPE};
use registry::RegistryError;
use storage::StorageError;
use thiserror::Error;
use tracing::{error, warn};
use upstream::UpstreamError;
use uuid::Uuid;

/// Any failure a handler can end with.
///
/// Each variant maps to one HTTP status; the body is always an LFS
/// `ErrorResponse` with no internal detail beyond its message.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Status(#[from] StatusCodeError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Forwarded Git traffic could not reach the upstream host
    #[error("bad gateway: {0}")]
    Gateway(String),
}

impl ApiError {
    fn body(&self) -> ErrorResponse {
        let mut response = match self {
            ApiError::Status(e) => e.response.clone(),
            ApiError::Upstream(UpstreamError::Status(e)) => e.response.clone(),
            ApiError::Parse(e) => ErrorResponse::new(e.to_string()),
            ApiError::Storage(StorageError::NotFound(_)) => ErrorResponse::new("object not found"),
            ApiError::Storage(StorageError::InvalidKey(reason)) => ErrorResponse::new(reason.clone()),
            ApiError::Storage(_) => ErrorResponse::new("object store failure"),
            ApiError::Upstream(_) => ErrorResponse::new("upstream request failed"),
            ApiError::Registry(_) => ErrorResponse::new("host registry unavailable"),
            ApiError::Gateway(_) => ErrorResponse::new("upstream host unreachable"),
        };
        if response.request_id.is_none() {
            response.request_id = Some(Uuid::new_v4().to_string());
        }
        response
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        let status = match self {
            ApiError::Parse(_) => 400,
            ApiError::Status(e) => e.status,
            ApiError::Storage(StorageError::NotFound(_)) => 404,
            ApiError::Storage(StorageError::InvalidKey(_)) => 400,
            ApiError::Storage(_) => 500,
            // An upstream that never answered has no status to carry
            ApiError::Upstream(e) => e.status_code().unwrap_or(404),
            ApiError::Registry(_) => 500,
            ApiError::Gateway(_) => 502,
        };
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = self.body();
        if status.is_server_error() {
            error!(status = status.as_u16(), request_id = ?body.request_id, error = %self, "Request failed");
        } else {
            warn!(status = status.as_u16(), request_id = ?body.request_id, error = %self, "Request rejected");
        }

        match common::serialize(&body) {
            Ok(json) => HttpResponse::build(status)
                .content_type(LFS_CONTENT_TYPE)
                .body(json),
            Err(_) => HttpResponse::build(status).finish(),
        }
    }
}
