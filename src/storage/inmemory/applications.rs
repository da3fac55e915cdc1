//! In-memory application storage

use crate::errors::StorageError;
use crate::registry::types::{Application, OAuthClientConfig, Page};
use crate::storage::traits::{ApplicationStore, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    applications: HashMap<String, Application>,
    name_index: HashMap<String, String>,      // name -> app id
    client_id_index: HashMap<String, String>, // client id -> app id
}

impl Tables {
    fn check_unique(&self, application: &Application) -> Result<()> {
        if let Some(owner) = self.name_index.get(&application.name) {
            if owner != &application.id {
                return Err(StorageError::DuplicateName(application.name.clone()));
            }
        }
        if let Some(client_id) = application.client_id() {
            if let Some(owner) = self.client_id_index.get(client_id) {
                if owner != &application.id {
                    return Err(StorageError::DuplicateClientId(client_id.to_string()));
                }
            }
        }
        Ok(())
    }

    fn index(&mut self, application: &Application) {
        self.name_index
            .insert(application.name.clone(), application.id.clone());
        if let Some(client_id) = application.client_id() {
            self.client_id_index
                .insert(client_id.to_string(), application.id.clone());
        }
        self.applications
            .insert(application.id.clone(), application.clone());
    }

    fn unindex(&mut self, application: &Application) {
        self.name_index.remove(&application.name);
        if let Some(client_id) = application.client_id() {
            self.client_id_index.remove(client_id);
        }
        self.applications.remove(&application.id);
    }
}

/// In-memory implementation of application storage with the same uniqueness
/// guarantees as the database backends
#[derive(Default)]
pub struct MemoryApplicationStore {
    tables: RwLock<Tables>,
}

impl MemoryApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApplicationStore for MemoryApplicationStore {
    async fn create(&self, application: &Application) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.applications.contains_key(&application.id) {
            return Err(StorageError::InvalidData(format!(
                "Application already exists: {}",
                application.id
            )));
        }
        tables.check_unique(application)?;
        tables.index(application);
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Application>> {
        Ok(self.tables.read().await.applications.get(id).cloned())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Application>> {
        let tables = self.tables.read().await;
        Ok(tables
            .name_index
            .get(name)
            .and_then(|id| tables.applications.get(id))
            .cloned())
    }

    async fn get_oauth_client(&self, client_id: &str) -> Result<Option<OAuthClientConfig>> {
        let tables = self.tables.read().await;
        Ok(tables
            .client_id_index
            .get(client_id)
            .and_then(|id| tables.applications.get(id))
            .and_then(|application| application.oauth_client())
            .cloned())
    }

    async fn list(&self, page: Option<Page>) -> Result<Vec<Application>> {
        let tables = self.tables.read().await;
        let mut applications: Vec<Application> = tables.applications.values().cloned().collect();
        applications.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
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
        Ok(self.tables.read().await.applications.len())
    }

    async fn update(&self, existing: &Application, updated: &Application) -> Result<()> {
        let mut tables = self.tables.write().await;
        let current = tables
            .applications
            .get(&existing.id)
            .cloned()
            .ok_or_else(|| {
                StorageError::NotFound(format!("Application not found: {}", existing.id))
            })?;
        tables.check_unique(updated)?;
        tables.unindex(&current);
        tables.index(updated);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let current = tables
            .applications
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("Application not found: {}", id)))?;
        tables.unindex(&current);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::{application, oauth_application};

    #[tokio::test]
    async fn test_create_and_lookup() {
        let store = MemoryApplicationStore::new();
        let app = oauth_application("app-1", "First", "client-1");
        store.create(&app).await.unwrap();

        assert_eq!(store.get_by_id("app-1").await.unwrap(), Some(app.clone()));
        assert_eq!(store.get_by_name("First").await.unwrap(), Some(app.clone()));
        assert_eq!(
            store
                .get_oauth_client("client-1")
                .await
                .unwrap()
                .map(|c| c.app_id),
            Some("app-1".to_string())
        );
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unique_name_and_client_id() {
        let store = MemoryApplicationStore::new();
        store
            .create(&oauth_application("app-1", "First", "client-1"))
            .await
            .unwrap();

        let result = store
            .create(&oauth_application("app-2", "First", "client-2"))
            .await;
        assert!(matches!(result, Err(StorageError::DuplicateName(_))));

        let result = store
            .create(&oauth_application("app-3", "Third", "client-1"))
            .await;
        assert!(matches!(result, Err(StorageError::DuplicateClientId(_))));
    }

    #[tokio::test]
    async fn test_update_moves_indices() {
        let store = MemoryApplicationStore::new();
        let existing = oauth_application("app-1", "First", "client-1");
        store.create(&existing).await.unwrap();

        let mut updated = oauth_application("app-1", "Renamed", "client-9");
        updated.created_at = existing.created_at;
        store.update(&existing, &updated).await.unwrap();

        assert!(store.get_by_name("First").await.unwrap().is_none());
        assert!(store.get_oauth_client("client-1").await.unwrap().is_none());
        assert!(store.get_oauth_client("client-9").await.unwrap().is_some());

        let without_oauth = application("app-1", "Renamed");
        store.update(&updated, &without_oauth).await.unwrap();
        assert!(store.get_oauth_client("client-9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = MemoryApplicationStore::new();
        assert!(matches!(
            store.delete("missing").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_pages() {
        let store = MemoryApplicationStore::new();
        for i in 0..5 {
            store
                .create(&application(&format!("app-{}", i), &format!("App {}", i)))
                .await
                .unwrap();
        }
        let page = store
            .list(Some(Page {
                offset: 1,
                limit: 2,
            }))
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(store.list(None).await.unwrap().len(), 5);
    }
}
