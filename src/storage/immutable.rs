//! Read-only storage for resources declared in configuration files.
//!
//! Resources are held in a composite `(id, resource_type)` keyed store that is
//! filled once at startup. After `seal()` every write is rejected.

use crate::errors::StorageError;
use crate::registry::types::{Application, OAuthClientConfig, Page};
use crate::storage::traits::{ApplicationStore, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Application,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Application => "application",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub id: String,
    pub resource_type: ResourceType,
}

impl ResourceKey {
    pub fn application(id: &str) -> Self {
        Self {
            id: id.to_string(),
            resource_type: ResourceType::Application,
        }
    }
}

/// A declared resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Application(Box<Application>),
}

impl Resource {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Resource::Application(_) => ResourceType::Application,
        }
    }

    fn as_application(&self) -> Option<&Application> {
        match self {
            Resource::Application(application) => Some(application),
        }
    }
}

/// Composite key-value store of declared resources
#[derive(Default)]
pub struct ResourceStore {
    entries: RwLock<HashMap<ResourceKey, Resource>>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &ResourceKey) -> Option<Resource> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn set(&self, key: ResourceKey, resource: Resource) {
        self.entries.write().await.insert(key, resource);
    }

    pub async fn delete(&self, key: &ResourceKey) -> Option<Resource> {
        self.entries.write().await.remove(key)
    }

    pub async fn list(&self) -> Vec<(ResourceKey, Resource)> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(key, resource)| (key.clone(), resource.clone()))
            .collect()
    }

    pub async fn list_by_type(&self, resource_type: ResourceType) -> Vec<Resource> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|(key, _)| key.resource_type == resource_type)
            .map(|(_, resource)| resource.clone())
            .collect()
    }

    pub async fn count_by_type(&self, resource_type: ResourceType) -> usize {
        self.entries
            .read()
            .await
            .keys()
            .filter(|key| key.resource_type == resource_type)
            .count()
    }
}

/// Application store over declared resources.
///
/// `create` is accepted only while loading; `update` and `delete` always fail
/// with `StorageError::ImmutableResource`. The store reports itself read-only
/// so callers reject writes before touching anything else.
#[derive(Default)]
pub struct ImmutableApplicationStore {
    resources: ResourceStore,
    sealed: AtomicBool,
}

impl ImmutableApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// End the load pass. Later creates are rejected.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::SeqCst);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }

    async fn applications(&self) -> Vec<Application> {
        let mut applications: Vec<Application> = self
            .resources
            .list_by_type(ResourceType::Application)
            .await
            .iter()
            .filter_map(Resource::as_application)
            .cloned()
            .collect();
        applications.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        applications
    }

    /// Find the first application whose projected field equals `value`
    pub async fn find_by<P>(&self, projector: P, value: &str) -> Option<Application>
    where
        P: Fn(&Application) -> Option<&str>,
    {
        self.applications()
            .await
            .into_iter()
            .find(|application| projector(application) == Some(value))
    }
}

#[async_trait]
impl ApplicationStore for ImmutableApplicationStore {
    async fn create(&self, application: &Application) -> Result<()> {
        if self.is_sealed() {
            return Err(StorageError::ImmutableResource(application.id.clone()));
        }

        let key = ResourceKey::application(&application.id);
        if self.resources.get(&key).await.is_some() {
            return Err(StorageError::InvalidData(format!(
                "Application already declared: {}",
                application.id
            )));
        }
        if self
            .find_by(|app| Some(app.name.as_str()), &application.name)
            .await
            .is_some()
        {
            return Err(StorageError::DuplicateName(application.name.clone()));
        }
        if let Some(client_id) = application.client_id() {
            if self.find_by(Application::client_id, client_id).await.is_some() {
                return Err(StorageError::DuplicateClientId(client_id.to_string()));
            }
        }

        self.resources
            .set(key, Resource::Application(Box::new(application.clone())))
            .await;
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Application>> {
        Ok(self
            .resources
            .get(&ResourceKey::application(id))
            .await
            .as_ref()
            .and_then(Resource::as_application)
            .cloned())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Application>> {
        Ok(self.find_by(|app| Some(app.name.as_str()), name).await)
    }

    async fn get_oauth_client(&self, client_id: &str) -> Result<Option<OAuthClientConfig>> {
        Ok(self
            .find_by(Application::client_id, client_id)
            .await
            .and_then(|application| application.oauth_client().cloned()))
    }

    async fn list(&self, page: Option<Page>) -> Result<Vec<Application>> {
        let applications = self.applications().await;
        Ok(match page {
            Some(page) => applications
                .into_iter()
                .skip(page.offset)
                .take(page.limit)
                .collect(),
            None => applications,
        })
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.resources.count_by_type(ResourceType::Application).await)
    }

    async fn update(&self, existing: &Application, _updated: &Application) -> Result<()> {
        Err(StorageError::ImmutableResource(existing.id.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        Err(StorageError::ImmutableResource(id.to_string()))
    }

    fn is_read_only(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::{application, oauth_application};

    #[tokio::test]
    async fn test_resource_store_filters_by_type() {
        let store = ResourceStore::new();
        store
            .set(
                ResourceKey::application("app-1"),
                Resource::Application(Box::new(application("app-1", "First"))),
            )
            .await;

        assert_eq!(store.count_by_type(ResourceType::Application).await, 1);
        assert_eq!(store.list().await.len(), 1);
        assert!(store.delete(&ResourceKey::application("app-1")).await.is_some());
        assert!(store.list_by_type(ResourceType::Application).await.is_empty());
    }

    #[tokio::test]
    async fn test_writes_rejected_after_seal() {
        let store = ImmutableApplicationStore::new();
        let app = oauth_application("app-1", "First", "client-1");
        store.create(&app).await.unwrap();
        store.seal();

        assert!(matches!(
            store.create(&application("app-2", "Second")).await,
            Err(StorageError::ImmutableResource(_))
        ));
        assert!(matches!(
            store.update(&app, &app).await,
            Err(StorageError::ImmutableResource(_))
        ));
        assert!(matches!(
            store.delete("app-1").await,
            Err(StorageError::ImmutableResource(_))
        ));
        assert!(store.is_read_only());
    }

    #[tokio::test]
    async fn test_reads_match_mutable_store() {
        let store = ImmutableApplicationStore::new();
        let app = oauth_application("app-1", "First", "client-1");
        store.create(&app).await.unwrap();
        store.seal();

        assert_eq!(store.get_by_id("app-1").await.unwrap(), Some(app.clone()));
        assert_eq!(store.get_by_name("First").await.unwrap(), Some(app.clone()));
        assert!(store.get_oauth_client("client-1").await.unwrap().is_some());
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(
            store
                .find_by(|a| a.logo_url.as_deref(), "https://nowhere")
                .await,
            None
        );
    }

    #[tokio::test]
    async fn test_load_rejects_duplicates() {
        let store = ImmutableApplicationStore::new();
        store
            .create(&oauth_application("app-1", "First", "client-1"))
            .await
            .unwrap();
        assert!(matches!(
            store
                .create(&oauth_application("app-2", "First", "client-2"))
                .await,
            Err(StorageError::DuplicateName(_))
        ));
        assert!(matches!(
            store
                .create(&oauth_application("app-3", "Third", "client-1"))
                .await,
            Err(StorageError::DuplicateClientId(_))
        ));
    }
}
