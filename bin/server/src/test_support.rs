//! Fixtures shared by the handler and middleware tests

use crate::state::AppState;
use actix_web::body::MessageBody;
use actix_web::dev::ServiceResponse;
use actix_web::{test, web};
use async_trait::async_trait;
use bytes::Bytes;
use common::{
    ActionMode, BatchEntity, BatchObject, BatchObjectAction, BatchObjectError, BatchRequest,
    BatchTransfer, ByteStream, ErrorResponse, GitHost, ObjectId, Operation, StatusCodeError,
};
use futures::{stream, StreamExt, TryStreamExt};
use registry::StaticHostRegistry;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storage::{FileLocation, FilesystemStore, ObjectStore, PendingActions};
use tempfile::TempDir;
use upstream::{LfsUpstream, UpstreamError};

pub const HOST_ID: i64 = 1;
pub const REPO: &str = "group/project.git";
pub const UPSTREAM_BASE: &str = "https://upstream.example.com";

fn status_error(status: u16, message: &str) -> UpstreamError {
    UpstreamError::Status(StatusCodeError::with_response(
        status,
        ErrorResponse::new(message),
    ))
}

/// In-memory upstream that records every call
#[derive(Default)]
pub struct StubUpstream {
    objects: HashMap<String, Vec<u8>>,
    broken: HashSet<String>,
    rejected: HashSet<String>,
    batch_status: Option<u16>,
    upload_status: Option<u16>,
    verify_status: Option<u16>,
    length_limited_uploads: bool,
    download_delay: Option<Duration>,
    batch_calls: Mutex<Vec<BatchRequest>>,
    downloads: AtomicUsize,
    uploads: Mutex<Vec<Vec<u8>>>,
    verifies: AtomicUsize,
}

impl StubUpstream {
    /// Serve `content` for downloads of `oid`
    pub fn with_object(mut self, oid: &str, content: &[u8]) -> Self {
        self.objects.insert(oid.to_string(), content.to_vec());
        self
    }

    /// Fail downloads of `oid` after the first chunk
    pub fn with_broken_download(mut self, oid: &str) -> Self {
        self.broken.insert(oid.to_string());
        self
    }

    /// Answer batch requests for `oid` with an error entity
    pub fn with_rejected(mut self, oid: &str) -> Self {
        self.rejected.insert(oid.to_string());
        self
    }

    /// Stop reading upload bodies after `size` bytes, as an HTTP client bound
    /// by `Content-Length` does
    pub fn with_length_limited_uploads(mut self) -> Self {
        self.length_limited_uploads = true;
        self
    }

    /// Wait before answering downloads
    pub fn with_download_delay(mut self, delay: Duration) -> Self {
        self.download_delay = Some(delay);
        self
    }

    pub fn with_batch_status(mut self, status: u16) -> Self {
        self.batch_status = Some(status);
        self
    }

    pub fn with_upload_status(mut self, status: u16) -> Self {
        self.upload_status = Some(status);
        self
    }

    pub fn with_verify_status(mut self, status: u16) -> Self {
        self.verify_status = Some(status);
        self
    }

    pub fn batch_calls(&self) -> Vec<BatchRequest> {
        self.batch_calls.lock().unwrap().clone()
    }

    pub fn download_calls(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> Vec<Vec<u8>> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn verify_calls(&self) -> usize {
        self.verifies.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.batch_calls().len() + self.download_calls() + self.uploads().len() + self.verify_calls()
    }
}

#[async_trait]
impl LfsUpstream for StubUpstream {
    async fn request_batch(
        &self,
        _host: &GitHost,
        _repo: &str,
        request: &BatchRequest,
    ) -> Result<BatchTransfer, UpstreamError> {
        self.batch_calls.lock().unwrap().push(request.clone());
        if let Some(status) = self.batch_status {
            return Err(status_error(status, "batch refused"));
        }

        let objects = request
            .objects
            .iter()
            .map(|id| {
                if self.rejected.contains(id.hash()) {
                    return BatchEntity::Error(BatchObjectError {
                        id: id.clone(),
                        code: 404,
                        message: "object does not exist".to_string(),
                    });
                }
                let object_href = format!("{}/objects/{}", UPSTREAM_BASE, id.hash());
                let object = match request.operation {
                    Operation::Download => BatchObject::new(id.clone())
                        .with_action(BatchObjectAction::new(ActionMode::Download, object_href)),
                    Operation::Upload => BatchObject::new(id.clone())
                        .with_action(BatchObjectAction::new(ActionMode::Upload, object_href))
                        .with_action(BatchObjectAction::new(
                            ActionMode::Verify,
                            format!("{}/verify/{}", UPSTREAM_BASE, id.hash()),
                        )),
                };
                BatchEntity::Success(object)
            })
            .collect();
        Ok(BatchTransfer::basic(objects))
    }

    async fn download_file(
        &self,
        _host: &GitHost,
        _repo: &str,
        id: &ObjectId,
        _action: &BatchObjectAction,
    ) -> Result<ByteStream, UpstreamError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.download_delay {
            tokio::time::sleep(delay).await;
        }
        let content = self
            .objects
            .get(id.hash())
            .cloned()
            .ok_or_else(|| status_error(404, "object does not exist"))?;

        let (head, tail) = content.split_at(content.len() / 2);
        let second = if self.broken.contains(id.hash()) {
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            ))
        } else {
            Ok(Bytes::copy_from_slice(tail))
        };
        Ok(stream::iter(vec![Ok(Bytes::copy_from_slice(head)), second]).boxed())
    }

    async fn upload_file(
        &self,
        _action: &BatchObjectAction,
        id: &ObjectId,
        mut contents: ByteStream,
    ) -> Result<(), UpstreamError> {
        let limit = usize::try_from(id.size()).unwrap_or(0);
        let mut body = Vec::new();
        while let Some(chunk) = contents.next().await {
            body.extend_from_slice(&chunk?);
            if self.length_limited_uploads && body.len() >= limit {
                break;
            }
        }
        self.uploads.lock().unwrap().push(body);
        match self.upload_status {
            Some(status) => Err(status_error(status, "upload refused")),
            None => Ok(()),
        }
    }

    async fn verify(
        &self,
        _host: &GitHost,
        _repo: &str,
        _id: &ObjectId,
        _action: &BatchObjectAction,
    ) -> Result<(), UpstreamError> {
        self.verifies.fetch_add(1, Ordering::SeqCst);
        match self.verify_status {
            Some(status) => Err(status_error(status, "verification failed")),
            None => Ok(()),
        }
    }
}

/// Temporary store, stub upstream and a one-host registry
pub struct Fixture {
    pub store: Arc<dyn ObjectStore>,
    pub upstream: Arc<StubUpstream>,
    state: web::Data<AppState>,
    _dir: TempDir,
}

impl Fixture {
    pub fn new(upstream: StubUpstream) -> Self {
        Self::with_host_href(upstream, UPSTREAM_BASE)
    }

    pub fn with_host_href(upstream: StubUpstream, href: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FilesystemStore::new(dir.path()));
        let upstream = Arc::new(upstream);
        let hosts = StaticHostRegistry::new(vec![GitHost {
            id: HOST_ID,
            href: href.to_string(),
            user_name: "proxy".to_string(),
            token: "upstream-token".to_string(),
        }])
        .unwrap();

        let state = web::Data::new(AppState::new(
            store.clone(),
            upstream.clone(),
            Arc::new(hosts),
            None,
        ));
        Self {
            store,
            upstream,
            state,
            _dir: dir,
        }
    }

    pub fn state(&self) -> web::Data<AppState> {
        self.state.clone()
    }

    /// Put `content` in the Permanent cache under `oid`
    pub async fn cache(&self, oid: &str, content: &'static [u8]) {
        self.put(oid, content, FileLocation::Permanent).await;
    }

    /// Put `content` in the Temporary location under `oid`
    pub async fn stage(&self, oid: &str, content: &'static [u8]) {
        self.put(oid, content, FileLocation::Temporary).await;
    }

    async fn put(&self, oid: &str, content: &'static [u8], location: FileLocation) {
        let id = ObjectId::new(oid, content.len() as i64);
        let contents = stream::once(async move { Ok(Bytes::from_static(content)) }).boxed();
        self.store
            .save(REPO, &id, location, contents, None)
            .await
            .unwrap();
    }

    /// Store a pending action as a batch response would
    pub async fn pend(&self, id: &ObjectId, action: BatchObjectAction) {
        PendingActions::save(self.store.as_ref(), REPO, id, &action)
            .await
            .unwrap();
    }

    pub async fn has_pending(&self, id: &ObjectId, mode: ActionMode) -> bool {
        PendingActions::load(self.store.as_ref(), REPO, id, mode)
            .await
            .unwrap()
            .is_some()
    }

    /// Content of an entry, if present
    pub async fn read(&self, id: &ObjectId, location: FileLocation) -> Option<Vec<u8>> {
        let contents = self.store.stream(REPO, id, location, None).await.ok()?;
        contents
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await
            .ok()
    }
}

/// Decode a JSON response body
pub async fn body_json<B, T>(resp: ServiceResponse<B>) -> T
where
    B: MessageBody,
    T: DeserializeOwned,
{
    let body = test::read_body(resp).await;
    serde_json::from_slice(&body).unwrap()
}
