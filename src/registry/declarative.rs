//! Loader for applications declared in configuration files.
//!
//! Each `*.yaml`, `*.yml` or `*.json` file under `<root>/applications` holds a
//! single application request, optionally with a fixed `id`.

use crate::registry::service::ApplicationService;
use crate::registry::types::ApplicationRequest;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Directory under the resource root that holds application files
pub const APPLICATIONS_DIR: &str = "applications";

/// A declared application
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationDocument {
    pub id: Option<String>,
    #[serde(flatten)]
    pub request: ApplicationRequest,
}

impl ApplicationDocument {
    /// Parse a document, picking the format from the file extension
    pub fn parse(path: &Path, contents: &str) -> Result<Self> {
        let document = match extension(path) {
            Some("json") => serde_json::from_str(contents)?,
            _ => serde_yaml::from_str(contents)?,
        };
        Ok(document)
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

async fn application_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read {}", dir.display()))?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if matches!(extension(&path), Some("yaml" | "yml" | "json")) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Load every declared application through `service`, returning how many were
/// stored. A missing directory loads nothing.
pub async fn load_applications(root: &Path, service: &ApplicationService) -> Result<usize> {
    let dir = root.join(APPLICATIONS_DIR);
    if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
        tracing::info!(path = %dir.display(), "no declared applications");
        return Ok(0);
    }

    let mut loaded = 0;
    for path in application_files(&dir).await? {
        let contents = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let document = ApplicationDocument::parse(&path, &contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        let mut prepared = service
            .validate_application(&document.request)
            .await
            .with_context(|| format!("Invalid application in {}", path.display()))?;
        if let Some(id) = document.id.as_deref().filter(|id| !id.is_empty()) {
            prepared = prepared.with_id(id);
        }

        let view = service
            .persist(prepared)
            .await
            .with_context(|| format!("Failed to load {}", path.display()))?;
        tracing::debug!(
            app_id = %view.application.id,
            path = %path.display(),
            "loaded application"
        );
        loaded += 1;
    }

    tracing::info!(count = loaded, "loaded declared applications");
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificates::MemoryCertificateService;
    use crate::errors::{ApplicationError, StorageError};
    use crate::registry::flows::StaticFlowRegistry;
    use crate::registry::service::RegistrySettings;
    use crate::storage::{ApplicationStore, ImmutableApplicationStore};
    use std::sync::Arc;

    fn service(store: Arc<ImmutableApplicationStore>) -> ApplicationService {
        ApplicationService::new(
            store,
            Arc::new(MemoryCertificateService::new()),
            Arc::new(StaticFlowRegistry::new([
                "auth_flow_config_basic",
                "registration_flow_config_basic",
            ])),
            RegistrySettings::default(),
        )
    }

    #[tokio::test]
    async fn test_load_yaml_and_json_then_seal() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join(APPLICATIONS_DIR);
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(
            dir.join("portal.yaml"),
            r#"
id: portal
name: Portal
inbound_auth_config:
  type: oauth2
  config:
    client_id: portal-client
    redirect_uris:
      - https://portal.example.com/callback
"#,
        )
        .unwrap();
        std::fs::write(dir.join("batch.json"), r#"{"name": "Batch"}"#).unwrap();
        std::fs::write(dir.join("README.md"), "ignored").unwrap();

        let store = Arc::new(ImmutableApplicationStore::new());
        let service = service(store.clone());
        assert_eq!(load_applications(root.path(), &service).await.unwrap(), 2);
        store.seal();

        let portal = service.get_application("portal").await.unwrap();
        assert_eq!(portal.application.client_id(), Some("portal-client"));
        assert!(service.get_application_by_name("Batch").await.is_ok());

        let result = service.delete_application("portal").await;
        assert!(matches!(result, Err(ApplicationError::ImmutableResource)));
        assert!(matches!(
            store.create(&portal.application).await,
            Err(StorageError::ImmutableResource(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_document_fails_load() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join(APPLICATIONS_DIR);
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("broken.yaml"), "name: \"\"\n").unwrap();

        let store = Arc::new(ImmutableApplicationStore::new());
        let error = load_applications(root.path(), &service(store))
            .await
            .unwrap_err();
        assert!(error.to_string().contains("broken.yaml"));
    }

    #[tokio::test]
    async fn test_missing_directory_loads_nothing() {
        let root = tempfile::tempdir().unwrap();
        let store = Arc::new(ImmutableApplicationStore::new());
        assert_eq!(
            load_applications(root.path(), &service(store)).await.unwrap(),
            0
        );
    }
}
