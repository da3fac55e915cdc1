//! SQLite storage implementations
//!
//! SQLite is suitable for single-instance deployments and development.

mod applications;

use crate::errors::StorageError;
use crate::registry::types::{Application, OAuthClientConfig, Page};
use crate::storage::traits::{ApplicationStore, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use std::sync::Arc;

pub use applications::SqliteApplicationStore;

/// SQLite registry storage
pub struct SqliteStorage {
    pool: SqlitePool,
    application_store: Arc<SqliteApplicationStore>,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance scoped to a deployment
    pub fn new(pool: SqlitePool, deployment_id: &str) -> Self {
        let application_store = Arc::new(SqliteApplicationStore::new(
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
        sqlx::migrate!("./migrations/sqlite")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Migration failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl ApplicationStore for SqliteStorage {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::{application, oauth_application};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_storage(deployment_id: &str) -> SqliteStorage {
        // A single connection keeps every query on the same in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let storage = SqliteStorage::new(pool, deployment_id);
        storage.migrate().await.unwrap();
        storage
    }

    #[tokio::test]
    async fn test_create_and_read_back() {
        let storage = setup_storage("default").await;
        let app = oauth_application("app-1", "First", "client-1");
        storage.create(&app).await.unwrap();

        assert_eq!(storage.get_by_id("app-1").await.unwrap(), Some(app.clone()));
        assert_eq!(storage.get_by_name("First").await.unwrap(), Some(app.clone()));
        let client = storage.get_oauth_client("client-1").await.unwrap().unwrap();
        assert_eq!(client.app_id, "app-1");
        assert_eq!(client.hashed_client_secret, app.oauth_client().unwrap().hashed_client_secret);
    }

    #[tokio::test]
    async fn test_unique_indexes() {
        let storage = setup_storage("default").await;
        storage
            .create(&oauth_application("app-1", "First", "client-1"))
            .await
            .unwrap();

        let result = storage
            .create(&oauth_application("app-2", "First", "client-2"))
            .await;
        assert!(matches!(result, Err(StorageError::DuplicateName(_))));

        let result = storage
            .create(&oauth_application("app-3", "Third", "client-1"))
            .await;
        assert!(matches!(result, Err(StorageError::DuplicateClientId(_))));
        assert!(storage.get_by_id("app-3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_replaces_oauth_client() {
        let storage = setup_storage("default").await;
        let existing = oauth_application("app-1", "First", "client-1");
        storage.create(&existing).await.unwrap();

        let mut updated = oauth_application("app-1", "First", "client-2");
        updated.created_at = existing.created_at;
        storage.update(&existing, &updated).await.unwrap();
        assert!(storage.get_oauth_client("client-1").await.unwrap().is_none());
        assert!(storage.get_oauth_client("client-2").await.unwrap().is_some());

        let mut plain = application("app-1", "First");
        plain.created_at = existing.created_at;
        storage.update(&updated, &plain).await.unwrap();
        assert!(storage.get_oauth_client("client-2").await.unwrap().is_none());
        assert_eq!(storage.get_by_id("app-1").await.unwrap(), Some(plain));
    }

    #[tokio::test]
    async fn test_delete_and_count() {
        let storage = setup_storage("default").await;
        storage
            .create(&oauth_application("app-1", "First", "client-1"))
            .await
            .unwrap();
        storage.create(&application("app-2", "Second")).await.unwrap();
        assert_eq!(storage.count().await.unwrap(), 2);

        storage.delete("app-1").await.unwrap();
        assert!(storage.get_oauth_client("client-1").await.unwrap().is_none());
        assert!(matches!(
            storage.delete("app-1").await,
            Err(StorageError::NotFound(_))
        ));
        assert_eq!(storage.list(None).await.unwrap().len(), 1);
    }
}
