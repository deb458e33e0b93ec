use thiserror::Error;

/// Host registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read hosts file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse hosts file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid registry configuration: {0}")]
    Config(String),
}
