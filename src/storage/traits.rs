//! Storage trait definitions for application records.
//!
//! Implemented by the mutable backends (memory, SQLite, PostgreSQL), the
//! declarative immutable store, and the caching decorator.

use crate::errors::StorageError;
use crate::registry::types::{Application, OAuthClientConfig, Page};
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, StorageError>;

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Store a new application together with its OAuth client, if any
    async fn create(&self, application: &Application) -> Result<()>;

    /// Retrieve an application by id
    async fn get_by_id(&self, id: &str) -> Result<Option<Application>>;

    /// Retrieve an application by its unique name
    async fn get_by_name(&self, name: &str) -> Result<Option<Application>>;

    /// Retrieve an OAuth client by client id
    async fn get_oauth_client(&self, client_id: &str) -> Result<Option<OAuthClientConfig>>;

    /// List applications ordered by creation time
    async fn list(&self, page: Option<Page>) -> Result<Vec<Application>>;

    /// Count all applications
    async fn count(&self) -> Result<usize>;

    /// Replace `existing` with `updated`. The OAuth client is created, updated
    /// or removed depending on which of the two records carries one.
    async fn update(&self, existing: &Application, updated: &Application) -> Result<()>;

    /// Delete an application. Returns `StorageError::NotFound` when absent.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Look up a name owner in the backing store, skipping any cache
    async fn find_name_owner(&self, name: &str) -> Result<Option<Application>> {
        self.get_by_name(name).await
    }

    /// Look up a client id owner in the backing store, skipping any cache
    async fn find_client_id_owner(&self, client_id: &str) -> Result<Option<OAuthClientConfig>> {
        self.get_oauth_client(client_id).await
    }

    /// Whether create, update and delete requests from callers are rejected
    fn is_read_only(&self) -> bool {
        false
    }
}
