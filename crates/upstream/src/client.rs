//! reqwest implementation of [`LfsUpstream`]

use crate::{LfsUpstream, UpstreamError};
use async_trait::async_trait;
use bytes::Bytes;
use common::{
    parse_slice, serialize, BatchObjectAction, BatchRequest, BatchTransfer, ByteStream,
    ErrorResponse, GitHost, ObjectId, StatusCodeError, LFS_CONTENT_TYPE,
};
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt, TryStreamExt};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client, RequestBuilder, Response};
use std::io;
use tracing::{debug, warn};

const OCTET_STREAM: &str = "application/octet-stream";

/// Chunks buffered while an upload body is being forwarded
const UPLOAD_BUFFER: usize = 8;

/// LFS client over a shared reqwest connection pool
#[derive(Clone, Default)]
pub struct LfsClient {
    http: Client,
}

impl LfsClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    fn authorize(request: RequestBuilder, host: &GitHost) -> RequestBuilder {
        if host.token.is_empty() {
            request
        } else {
            request.header(AUTHORIZATION, format!("token {}", host.token))
        }
    }

    fn apply_headers(mut request: RequestBuilder, action: &BatchObjectAction) -> RequestBuilder {
        for (key, value) in action.headers.iter() {
            request = request.header(key, value);
        }
        request
    }

    /// Pass 2xx responses through; turn anything else into a status failure
    async fn check_status(response: Response) -> Result<Response, UpstreamError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let reason = status.canonical_reason().unwrap_or("Unknown Status");
        let body = response.bytes().await.unwrap_or_default();
        let error = parse_slice::<ErrorResponse>(&body).unwrap_or_else(|_| ErrorResponse::new(reason));
        warn!(status = status.as_u16(), message = %error.message, "Upstream returned an error");
        Err(StatusCodeError::with_response(status.as_u16(), error).into())
    }
}

#[async_trait]
impl LfsUpstream for LfsClient {
    async fn request_batch(
        &self,
        host: &GitHost,
        repo: &str,
        request: &BatchRequest,
    ) -> Result<BatchTransfer, UpstreamError> {
        let url = host.url_for(&format!("{}/info/lfs/objects/batch", repo));
        debug!(url = %url, operation = %request.operation, objects = request.objects.len(), "Sending batch request");

        let builder = self
            .http
            .post(&url)
            .header(ACCEPT, LFS_CONTENT_TYPE)
            .header(CONTENT_TYPE, LFS_CONTENT_TYPE)
            .body(serialize(request)?);
        let response = Self::authorize(builder, host).send().await?;
        let response = Self::check_status(response).await?;

        let body = response.bytes().await?;
        Ok(parse_slice(&body)?)
    }

    async fn download_file(
        &self,
        _host: &GitHost,
        repo: &str,
        id: &ObjectId,
        action: &BatchObjectAction,
    ) -> Result<ByteStream, UpstreamError> {
        debug!(repo = %repo, oid = %id.hash(), "Downloading from upstream");

        let builder = self.http.get(&action.href);
        let response = Self::apply_headers(builder, action).send().await?;
        let response = Self::check_status(response).await?;

        Ok(response
            .bytes_stream()
            .map_err(io::Error::other)
            .boxed())
    }

    async fn upload_file(
        &self,
        action: &BatchObjectAction,
        id: &ObjectId,
        contents: ByteStream,
    ) -> Result<(), UpstreamError> {
        debug!(oid = %id.hash(), size = id.size(), "Uploading to upstream");

        // The request body must be Sync; forward through a channel
        let (mut tx, rx) = mpsc::channel::<io::Result<Bytes>>(UPLOAD_BUFFER);
        let forward = tokio::spawn(async move {
            let mut contents = contents;
            while let Some(chunk) = contents.next().await {
                let failed = chunk.is_err();
                if tx.send(chunk).await.is_err() || failed {
                    break;
                }
            }
        });

        let builder = self
            .http
            .put(&action.href)
            .header(CONTENT_TYPE, OCTET_STREAM)
            .header(CONTENT_LENGTH, id.size())
            .body(Body::wrap_stream(rx));
        let result = Self::apply_headers(builder, action).send().await;
        forward.abort();

        Self::check_status(result?).await?;
        Ok(())
    }

    async fn verify(
        &self,
        _host: &GitHost,
        repo: &str,
        id: &ObjectId,
        action: &BatchObjectAction,
    ) -> Result<(), UpstreamError> {
        debug!(repo = %repo, oid = %id.hash(), "Verifying with upstream");

        let builder = self
            .http
            .post(&action.href)
            .header(ACCEPT, LFS_CONTENT_TYPE)
            .header(CONTENT_TYPE, LFS_CONTENT_TYPE)
            .body(serialize(id)?);
        let response = Self::apply_headers(builder, action).send().await?;
        Self::check_status(response).await?;
        Ok(())
    }
}
