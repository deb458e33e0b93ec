//! Client for the LFS API of an upstream Git host.

pub mod client;
pub mod error;

use async_trait::async_trait;
use common::{BatchObjectAction, BatchRequest, BatchTransfer, ByteStream, GitHost, ObjectId};

pub use client::LfsClient;
pub use error::UpstreamError;

/// Operations the proxy performs against an upstream LFS server.
///
/// Any non-2xx response surfaces as [`UpstreamError::Status`]; nothing is retried.
#[async_trait]
pub trait LfsUpstream: Send + Sync {
    /// POST a batch request to `{host}/{repo}/info/lfs/objects/batch`
    async fn request_batch(
        &self,
        host: &GitHost,
        repo: &str,
        request: &BatchRequest,
    ) -> Result<BatchTransfer, UpstreamError>;

    /// GET the object behind a download action. The status is checked before
    /// the body is read; the body is returned unbuffered.
    async fn download_file(
        &self,
        host: &GitHost,
        repo: &str,
        id: &ObjectId,
        action: &BatchObjectAction,
    ) -> Result<ByteStream, UpstreamError>;

    /// PUT object bytes to an upload action
    async fn upload_file(
        &self,
        action: &BatchObjectAction,
        id: &ObjectId,
        contents: ByteStream,
    ) -> Result<(), UpstreamError>;

    /// POST the object id to a verify action
    async fn verify(
        &self,
        host: &GitHost,
        repo: &str,
        id: &ObjectId,
        action: &BatchObjectAction,
    ) -> Result<(), UpstreamError>;
}
