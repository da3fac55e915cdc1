//! PostgreSQL storage implementations
//!
//! PostgreSQL is suitable for multi-instance deployments sharing one registry.

mod applications;

use crate::errors::StorageError;
use crate::registry::types::{Application, OAuthClientConfig, Page};
use crate::storage::traits::{ApplicationStore, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use std::sync::Arc;

pub use applications::PostgresApplicationStore;

/// PostgreSQL registry storage
pub struct PostgresStorage {
    pool: PgPool,
    application_store: Arc<PostgresApplicationStore>,
}

impl PostgresStorage {
    /// Create a new PostgreSQL storage instance scoped to a deployment
    pub fn new(pool: PgPool, deployment_id: &str) -> Self {
        let application_store = Arc::new(PostgresApplicationStore::new(
            pool.clone(),
            deployment_id.to_string(),
        ));
        Self {
            pool,
            application_store,
        }
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations/postgres")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Migration failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl ApplicationStore for PostgresStorage {
    async fn create(&self, application: &Application) -> Result<()> {
        self.application_store.create(application).await
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Application>> {
        self.application_store.get_by_id(id).await
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Application>> {
        self.application_store.get_by_name(name).await
    }

    async fn get_oauth_client(&self, client_id: &str) -> Result<Option<OAuthClientConfig>> {
        self.application_store.get_oauth_client(client_id).await
    }

    async fn list(&self, page: Option<Page>) -> Result<Vec<Application>> {
        self.application_store.list(page).await
    }

    async fn count(&self) -> Result<usize> {
        self.application_store.count().await
    }

    async fn update(&self, existing: &Application, updated: &Application) -> Result<()> {
        self.application_store.update(existing, updated).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.application_store.delete(id).await
    }
}
