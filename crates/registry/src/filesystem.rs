//! Hosts loaded once from a JSON file

use crate::{HostRegistry, RegistryError};
use async_trait::async_trait;
use common::GitHost;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Registry backed by a JSON array of hosts, read at startup
pub struct StaticHostRegistry {
    hosts: HashMap<i64, GitHost>,
}

impl StaticHostRegistry {
    /// Build a registry from in-memory hosts. Duplicate ids are a configuration error.
    pub fn new(hosts: impl IntoIterator<Item = GitHost>) -> Result<Self, RegistryError> {
        let mut map = HashMap::new();
        for host in hosts {
            let id = host.id;
            if map.insert(id, host).is_some() {
                return Err(RegistryError::Config(format!("duplicate host id {}", id)));
            }
        }
        Ok(Self { hosts: map })
    }

    /// Load hosts from a JSON file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let hosts: Vec<GitHost> = serde_json::from_str(&content)?;
        let registry = Self::new(hosts)?;
        info!(path = %path.display(), hosts = registry.len(), "Loaded host registry");
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

#[async_trait]
impl HostRegistry for StaticHostRegistry {
    async fn lookup(&self, host_id: i64) -> Result<Option<GitHost>, RegistryError> {
        Ok(self.hosts.get(&host_id).cloned())
    }
}
