//! Registry of upstream Git hosts the proxy may forward to.

pub mod backend;
pub mod database;
pub mod error;
pub mod filesystem;

use async_trait::async_trait;
use common::GitHost;

pub use backend::RegistryBackend;
pub use database::DatabaseHostRegistry;
pub use error::RegistryError;
pub use filesystem::StaticHostRegistry;

/// Host lookup by numeric id
#[async_trait]
pub trait HostRegistry: Send + Sync {
    /// Host registered under `host_id`, or `None` when unknown
    async fn lookup(&self, host_id: i64) -> Result<Option<GitHost>, RegistryError>;
}
