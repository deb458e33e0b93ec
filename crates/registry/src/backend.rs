use crate::{DatabaseHostRegistry, HostRegistry, RegistryError, StaticHostRegistry};
use std::sync::Arc;

/// Host registry backend type
pub enum RegistryBackend {
    /// JSON hosts file path
    Filesystem(String),
    /// Database URL
    Database(String),
}

impl RegistryBackend {
    /// Initialize host registry based on type
    pub async fn initialize(self) -> Result<Arc<dyn HostRegistry>, RegistryError> {
        match self {
            RegistryBackend::Filesystem(path) => {
                let registry = StaticHostRegistry::load(&path).await?;
                Ok(Arc::new(registry))
            }
            RegistryBackend::Database(database_url) => {
                let registry = DatabaseHostRegistry::new(&database_url).await?;
                Ok(Arc::new(registry))
            }
        }
    }
}
