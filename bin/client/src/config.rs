//! Connection settings shared by every command

use anyhow::{bail, Context, Result};
use common::{BatchEntity, BatchObject, BatchRequest, GitHost, ObjectId, Operation};
use upstream::{LfsClient, LfsUpstream};

/// Where the proxy lives and which repository the commands act on
pub struct ProxyTarget {
    pub host: GitHost,
    pub repo: String,
    pub client: LfsClient,
}

impl ProxyTarget {
    /// The proxy's `/api/{host_id}` prefix stands in for the upstream base URL
    pub fn new(server: &str, host_id: i64, repo: &str) -> Self {
        Self {
            host: GitHost {
                id: host_id,
                href: format!("{}/api/{}", server.trim_end_matches('/'), host_id),
                user_name: String::new(),
                token: String::new(),
            },
            repo: repo.trim_matches('/').to_string(),
            client: LfsClient::new(),
        }
    }

    /// Batch a single object and return its entity, failing on an error entity
    pub async fn batch_one(&self, operation: Operation, id: &ObjectId) -> Result<BatchObject> {
        let request = BatchRequest::new(operation, vec![id.clone()]);
        let transfer = self
            .client
            .request_batch(&self.host, &self.repo, &request)
            .await
            .with_context(|| format!("Batch {} request failed", operation))?;

        let entity = transfer
            .objects
            .into_iter()
            .find(|entity| entity.id() == id)
            .with_context(|| format!("Batch response did not mention {}", id))?;
        match entity {
            BatchEntity::Success(object) => Ok(object),
            BatchEntity::Error(error) => bail!(
                "Server rejected {}: {} (code {})",
                id,
                error.message,
                error.code
            ),
        }
    }
}

/// Parse an `OID:SIZE` pair
pub fn parse_object(value: &str) -> Result<ObjectId> {
    let (oid, size) = value
        .rsplit_once(':')
        .with_context(|| format!("Expected OID:SIZE, got '{}'", value))?;
    let size: i64 = size
        .parse()
        .with_context(|| format!("Invalid size in '{}'", value))?;
    if oid.is_empty() || size < 0 {
        bail!("Invalid object '{}'", value);
    }
    Ok(ObjectId::new(oid, size))
}
