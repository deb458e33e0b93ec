//! Server application state

use crate::handlers::error::ApiError;
use crate::locks::KeyedLocks;
use actix_web::HttpRequest;
use common::{GitHost, StatusCodeError};
use registry::HostRegistry;
use std::sync::Arc;
use storage::ObjectStore;
use upstream::LfsUpstream;

/// Collaborators shared by every worker
pub struct AppState {
    pub store: Arc<dyn ObjectStore>,
    pub upstream: Arc<dyn LfsUpstream>,
    pub hosts: Arc<dyn HostRegistry>,
    pub locks: KeyedLocks,
    /// Client for forwarded (non-LFS) Git traffic
    pub http: reqwest::Client,
    pub public_url: Option<String>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        upstream: Arc<dyn LfsUpstream>,
        hosts: Arc<dyn HostRegistry>,
        public_url: Option<String>,
    ) -> Self {
        Self {
            store,
            upstream,
            hosts,
            locks: KeyedLocks::new(),
            http: reqwest::Client::new(),
            public_url,
        }
    }

    /// Registered host for `host_id`, or a 404
    pub async fn resolve_host(&self, host_id: i64) -> Result<GitHost, ApiError> {
        self.hosts
            .lookup(host_id)
            .await?
            .ok_or_else(|| StatusCodeError::not_found(format!("unknown host id {}", host_id)).into())
    }

    /// Base URL clients reach this proxy at
    pub fn public_base(&self, req: &HttpRequest) -> String {
        match &self.public_url {
            Some(url) => url.clone(),
            None => {
                let info = req.connection_info();
                format!("{}://{}", info.scheme(), info.host())
            }
        }
    }
}
