//! Read-through caching decorator for application storage.
//!
//! Applications are cached by id and by name, OAuth clients by client id,
//! each index in its own cache. Uniqueness lookups always go to the inner
//! store. Cache failures never fail a storage call; they are logged and the
//! store is used directly.

use crate::registry::credentials::mask_client_id;
use crate::registry::types::{Application, OAuthClientConfig, Page};
use crate::storage::cache::{ApplicationCaches, TypedCache};
use crate::storage::traits::{ApplicationStore, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Application store wrapped with a cache
pub struct CachedApplicationStore {
    inner: Arc<dyn ApplicationStore>,
    by_id: TypedCache<Application>,
    by_name: TypedCache<Application>,
    by_client_id: TypedCache<OAuthClientConfig>,
}

impl CachedApplicationStore {
    pub fn new(inner: Arc<dyn ApplicationStore>, caches: ApplicationCaches) -> Self {
        Self {
            inner,
            by_id: TypedCache::new(caches.by_id, "application_by_id"),
            by_name: TypedCache::new(caches.by_name, "application_by_name"),
            by_client_id: TypedCache::new(caches.by_client_id, "oauth_app_by_client_id"),
        }
    }

    async fn populate(&self, application: &Application) {
        if let Err(e) = self.by_id.set(&application.id, application).await {
            tracing::warn!(
                error = ?e,
                app_id = %application.id,
                "failed to cache application by id"
            );
        }
        if let Err(e) = self.by_name.set(&application.name, application).await {
            tracing::warn!(
                error = ?e,
                app_id = %application.id,
                "failed to cache application by name"
            );
        }
        if let Some(client) = application.oauth_client() {
            self.populate_client(client).await;
        }
    }

    async fn populate_client(&self, client: &OAuthClientConfig) {
        if let Err(e) = self.by_client_id.set(&client.client_id, client).await {
            tracing::warn!(
                error = ?e,
                client_id = %mask_client_id(&client.client_id),
                "failed to cache oauth client"
            );
        }
    }

    async fn invalidate(&self, application: &Application) {
        if let Err(e) = self.by_id.delete(&application.id).await {
            tracing::warn!(
                error = ?e,
                app_id = %application.id,
                "failed to invalidate application by id"
            );
        }
        if let Err(e) = self.by_name.delete(&application.name).await {
            tracing::warn!(
                error = ?e,
                app_id = %application.id,
                "failed to invalidate application by name"
            );
        }
        if let Some(client_id) = application.client_id() {
            if let Err(e) = self.by_client_id.delete(client_id).await {
                tracing::warn!(
                    error = ?e,
                    client_id = %mask_client_id(client_id),
                    "failed to invalidate oauth client"
                );
            }
        }
    }
}

#[async_trait]
impl ApplicationStore for CachedApplicationStore {
    async fn create(&self, application: &Application) -> Result<()> {
        self.inner.create(application).await?;
        self.populate(application).await;
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Application>> {
        match self.by_id.get(id).await {
            Ok(Some(application)) => return Ok(Some(application)),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = ?e, app_id = %id, "application cache read failed"),
        }

        let application = self.inner.get_by_id(id).await?;
        if let Some(application) = &application {
            self.populate(application).await;
        }
        Ok(application)
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Application>> {
        match self.by_name.get(name).await {
            Ok(Some(application)) => return Ok(Some(application)),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = ?e, "application cache read failed"),
        }

        let application = self.inner.get_by_name(name).await?;
        if let Some(application) = &application {
            self.populate(application).await;
        }
        Ok(application)
    }

    async fn get_oauth_client(&self, client_id: &str) -> Result<Option<OAuthClientConfig>> {
        match self.by_client_id.get(client_id).await {
            Ok(Some(client)) => return Ok(Some(client)),
            Ok(None) => {}
            Err(e) => tracing::warn!(
                error = ?e,
                client_id = %mask_client_id(client_id),
                "oauth client cache read failed"
            ),
        }

        let client = self.inner.get_oauth_client(client_id).await?;
        if let Some(client) = &client {
            self.populate_client(client).await;
        }
        Ok(client)
    }

    async fn list(&self, page: Option<Page>) -> Result<Vec<Application>> {
        self.inner.list(page).await
    }

    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }

    async fn update(&self, existing: &Application, updated: &Application) -> Result<()> {
        self.inner.update(existing, updated).await?;
        self.invalidate(existing).await;
        self.populate(updated).await;
        Ok(())
    }

    async fn find_name_owner(&self, name: &str) -> Result<Option<Application>> {
        self.inner.find_name_owner(name).await
    }

    async fn find_client_id_owner(&self, client_id: &str) -> Result<Option<OAuthClientConfig>> {
        self.inner.find_client_id_owner(client_id).await
    }

    fn is_read_only(&self) -> bool {
        self.inner.is_read_only()
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let existing = self.get_by_id(id).await?;
        self.inner.delete(id).await?;
        match existing {
            Some(existing) => self.invalidate(&existing).await,
            None => {
                if let Err(e) = self.by_id.delete(id).await {
                    tracing::warn!(
                        error = ?e,
                        app_id = %id,
                        "failed to invalidate application by id"
                    );
                }
            }
        }
        Ok(())
    }
}
