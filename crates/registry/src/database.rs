//! PostgreSQL host registry

use crate::{HostRegistry, RegistryError};
use async_trait::async_trait;
use common::GitHost;
use sqlx::PgPool;
use tracing::info;

/// Registry backed by the `git_hosts` table
pub struct DatabaseHostRegistry {
    pool: PgPool,
}

impl DatabaseHostRegistry {
    /// Connect and make sure the table exists
    pub async fn new(database_url: &str) -> Result<Self, RegistryError> {
        let pool = PgPool::connect(database_url).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS git_hosts (
                id BIGINT PRIMARY KEY,
                href TEXT NOT NULL,
                user_name TEXT NOT NULL DEFAULT '',
                token TEXT NOT NULL DEFAULT ''
            )
            "#,
        )
        .execute(&pool)
        .await?;

        info!("PostgreSQL host registry initialized");
        Ok(Self { pool })
    }
}

#[async_trait]
impl HostRegistry for DatabaseHostRegistry {
    async fn lookup(&self, host_id: i64) -> Result<Option<GitHost>, RegistryError> {
        let row = sqlx::query_as::<_, (i64, String, String, String)>(
            "SELECT id, href, user_name, token FROM git_hosts WHERE id = $1",
        )
        .bind(host_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, href, user_name, token)| GitHost {
            id,
            href,
            user_name,
            token,
        }))
    }
}
