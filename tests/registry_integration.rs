//! Application registry integration tests
//!
//! These tests drive the public lifecycle API end to end against the
//! in-memory store, cache and certificate service.

use appreg::certificates::{
    Certificate, CertificateReference, CertificateService, MemoryCertificateService,
    NewCertificate,
};
use appreg::errors::{ApplicationError, CertificateError, ErrorType, StorageError};
use appreg::registry::*;
use appreg::storage::cache::{ApplicationCaches, CacheBackend};
use appreg::storage::{ApplicationStore, CachedApplicationStore, MemoryApplicationStore};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Store whose writes can be switched to fail
#[derive(Default)]
struct FailingStore {
    inner: MemoryApplicationStore,
    fail_writes: AtomicBool,
}

impl FailingStore {
    fn check(&self) -> appreg::storage::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::DatabaseError("disk full".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ApplicationStore for FailingStore {
    async fn create(&self, application: &Application) -> appreg::storage::Result<()> {
        self.check()?;
        self.inner.create(application).await
    }

    async fn get_by_id(&self, id: &str) -> appreg::storage::Result<Option<Application>> {
        self.inner.get_by_id(id).await
    }

    async fn get_by_name(&self, name: &str) -> appreg::storage::Result<Option<Application>> {
        self.inner.get_by_name(name).await
    }

    async fn get_oauth_client(
        &self,
        client_id: &str,
    ) -> appreg::storage::Result<Option<OAuthClientConfig>> {
        self.inner.get_oauth_client(client_id).await
    }

    async fn list(&self, page: Option<Page>) -> appreg::storage::Result<Vec<Application>> {
        self.inner.list(page).await
    }

    async fn count(&self) -> appreg::storage::Result<usize> {
        self.inner.count().await
    }

    async fn update(
        &self,
        existing: &Application,
        updated: &Application,
    ) -> appreg::storage::Result<()> {
        self.check()?;
        self.inner.update(existing, updated).await
    }

    async fn delete(&self, id: &str) -> appreg::storage::Result<()> {
        self.check()?;
        self.inner.delete(id).await
    }
}

/// Certificate service whose deletes can be switched to fail
#[derive(Default)]
struct FlakyCertificates {
    inner: MemoryCertificateService,
    fail_deletes: AtomicBool,
}

#[async_trait]
impl CertificateService for FlakyCertificates {
    async fn create_certificate(
        &self,
        certificate: &NewCertificate,
    ) -> appreg::certificates::Result<String> {
        self.inner.create_certificate(certificate).await
    }

    async fn update_certificate_by_id(
        &self,
        id: &str,
        certificate: &NewCertificate,
    ) -> appreg::certificates::Result<()> {
        self.inner.update_certificate_by_id(id, certificate).await
    }

    async fn get_certificate_by_reference(
        &self,
        reference: &CertificateReference,
    ) -> appreg::certificates::Result<Option<Certificate>> {
        self.inner.get_certificate_by_reference(reference).await
    }

    async fn delete_certificate_by_reference(
        &self,
        reference: &CertificateReference,
    ) -> appreg::certificates::Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(CertificateError::ServiceFailure("unreachable".to_string()));
        }
        self.inner.delete_certificate_by_reference(reference).await
    }
}

fn flows() -> Arc<StaticFlowRegistry> {
    Arc::new(StaticFlowRegistry::new([
        "auth_flow_config_basic",
        "registration_flow_config_basic",
        "auth_flow_config_sms",
        "registration_flow_config_sms",
    ]))
}

fn registry(
    store: Arc<dyn ApplicationStore>,
    certificates: Arc<dyn CertificateService>,
) -> ApplicationService {
    ApplicationService::new(store, certificates, flows(), RegistrySettings::default())
}

fn memory_caches(max_entries: usize) -> ApplicationCaches {
    ApplicationCaches::new(&CacheBackend::Memory {
        ttl: Duration::from_secs(300),
        max_entries,
    })
    .unwrap()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn oauth_request(name: &str, config: OAuthClientRequest) -> ApplicationRequest {
    ApplicationRequest {
        name: name.to_string(),
        description: format!("{} application", name),
        inbound_auth_config: Some(InboundAuthRequest {
            kind: OAUTH_INBOUND_AUTH_TYPE.to_string(),
            config: Some(config),
        }),
        ..Default::default()
    }
}

fn jwks_certificate() -> CertificateInput {
    CertificateInput {
        kind: "JWKS".to_string(),
        value: r#"{"keys":[{"kty":"EC","crv":"P-256","x":"f83O","y":"x_FE"}]}"#.to_string(),
    }
}

#[tokio::test]
async fn test_client_credentials_with_code_rejected_without_side_effects() {
    let store = Arc::new(MemoryApplicationStore::new());
    let certificates = Arc::new(MemoryCertificateService::new());
    let service = registry(store.clone(), certificates.clone());

    let mut request = oauth_request(
        "app-1",
        OAuthClientRequest {
            grant_types: strings(&["client_credentials"]),
            response_types: strings(&["code"]),
            ..Default::default()
        },
    );
    request.certificate = Some(jwks_certificate());

    let result = service.create_application(&request).await;
    let error = result.unwrap_err();
    assert!(matches!(
        error,
        ApplicationError::ClientCredentialsWithResponseTypes
    ));
    assert_eq!(error.error_type(), ErrorType::Client);
    assert!(error.to_string().starts_with("error-appreg-application-13"));

    assert_eq!(store.count().await.unwrap(), 0);
    assert!(certificates.is_empty().await);
}

#[tokio::test]
async fn test_jwks_certificate_lifecycle() {
    let store = Arc::new(MemoryApplicationStore::new());
    let certificates = Arc::new(MemoryCertificateService::new());
    let service = registry(store, certificates.clone());

    let config = OAuthClientRequest {
        redirect_uris: strings(&["https://app2.example.com/callback"]),
        grant_types: strings(&["authorization_code", "refresh_token"]),
        certificate: Some(jwks_certificate()),
        ..Default::default()
    };
    let created = service
        .create_application(&oauth_request("app-2", config.clone()))
        .await
        .unwrap();
    assert_eq!(
        created.oauth_certificate.as_ref().map(|c| c.kind),
        Some(CertificateKind::Jwks)
    );
    let client_id = created.application.client_id().unwrap().to_string();

    let fetched = service
        .get_application(&created.application.id)
        .await
        .unwrap();
    assert_eq!(
        fetched.oauth_certificate.as_ref().map(|c| c.value.as_str()),
        Some(jwks_certificate().value.as_str())
    );

    let without_certificate = OAuthClientRequest {
        certificate: None,
        ..config
    };
    let updated = service
        .update_application(
            &created.application.id,
            &oauth_request("app-2", without_certificate),
        )
        .await
        .unwrap();
    assert_eq!(
        updated.oauth_certificate.map(|c| c.kind),
        Some(CertificateKind::None)
    );
    assert_eq!(updated.application.client_id(), Some(client_id.as_str()));
    assert!(
        certificates
            .get_certificate_by_reference(&CertificateReference::oauth_app(&client_id))
            .await
            .unwrap()
            .is_none()
    );

    let fetched = service
        .get_application(&created.application.id)
        .await
        .unwrap();
    assert_eq!(fetched.oauth_certificate.unwrap().kind, CertificateKind::None);
}

#[tokio::test]
async fn test_public_client_with_secret_rejected() {
    let store = Arc::new(MemoryApplicationStore::new());
    let service = registry(store.clone(), Arc::new(MemoryCertificateService::new()));

    let request = oauth_request(
        "app-3",
        OAuthClientRequest {
            redirect_uris: strings(&["https://app3.example.com/callback"]),
            token_endpoint_auth_method: Some("none".to_string()),
            public_client: true,
            client_secret: Some("should-not-be-here".to_string()),
            ..Default::default()
        },
    );

    let result = service.create_application(&request).await;
    assert!(matches!(result, Err(ApplicationError::PublicClientHasSecret)));
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let service = registry(
        Arc::new(MemoryApplicationStore::new()),
        Arc::new(MemoryCertificateService::new()),
    );
    let created = service
        .create_application(&ApplicationRequest {
            name: "Docs".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    service
        .delete_application(&created.application.id)
        .await
        .unwrap();
    service
        .delete_application(&created.application.id)
        .await
        .unwrap();
    service.delete_application("never-existed").await.unwrap();

    assert!(matches!(
        service.get_application(&created.application.id).await,
        Err(ApplicationError::NotFound)
    ));
}

#[tokio::test]
async fn test_defaults_are_deterministic() {
    let service = registry(
        Arc::new(MemoryApplicationStore::new()),
        Arc::new(MemoryCertificateService::new()),
    );
    let config = OAuthClientRequest {
        redirect_uris: strings(&["https://app.example.com/callback"]),
        token: Some(OAuthTokenRequest {
            access_token: Some(AccessTokenRequest {
                validity_period: Some(600),
                user_attributes: None,
            }),
            ..Default::default()
        }),
        ..Default::default()
    };

    let mut request = oauth_request("first", config.clone());
    request.auth_flow_graph_id = Some("auth_flow_config_sms".to_string());
    request.token = Some(TokenConfigRequest {
        issuer: Some("https://issuer.example.com".to_string()),
        validity_period: Some(1800),
        user_attributes: Some(strings(&["email"])),
    });
    let first = service.validate_application(&request).await.unwrap();
    request.name = "second".to_string();
    let second = service.validate_application(&request).await.unwrap();

    for prepared in [&first, &second] {
        let app = &prepared.application;
        assert_eq!(app.registration_flow_graph_id, "registration_flow_config_sms");
        let client = app.oauth_client().unwrap();
        assert_eq!(client.grant_types, vec![GrantType::AuthorizationCode]);
        assert_eq!(client.response_types, vec![ResponseType::Code]);
        assert_eq!(
            client.token_endpoint_auth_method,
            TokenEndpointAuthMethod::ClientSecretBasic
        );
        assert_eq!(client.token.issuer, "https://issuer.example.com");
        assert_eq!(client.token.access_token.validity_period, 600);
        assert_eq!(client.token.access_token.user_attributes, strings(&["email"]));
        assert_eq!(client.token.id_token.validity_period, 1800);
    }
    assert_eq!(
        first.application.oauth_client().unwrap().token,
        second.application.oauth_client().unwrap().token
    );

    request.auth_flow_graph_id = Some("auth_flow_config_unknown".to_string());
    assert!(matches!(
        service.validate_application(&request).await,
        Err(ApplicationError::InvalidAuthFlowGraphId(_))
    ));
}

#[tokio::test]
async fn test_uniqueness_across_name_and_client_id() {
    let service = registry(
        Arc::new(MemoryApplicationStore::new()),
        Arc::new(MemoryCertificateService::new()),
    );
    let config = OAuthClientRequest {
        client_id: Some("shared-client".to_string()),
        redirect_uris: strings(&["https://app.example.com/callback"]),
        ..Default::default()
    };
    service
        .create_application(&oauth_request("Portal", config.clone()))
        .await
        .unwrap();

    assert!(matches!(
        service
            .create_application(&ApplicationRequest {
                name: "Portal".to_string(),
                ..Default::default()
            })
            .await,
        Err(ApplicationError::AlreadyExistsWithName)
    ));
    assert!(matches!(
        service
            .create_application(&oauth_request("Other", config))
            .await,
        Err(ApplicationError::AlreadyExistsWithClientId)
    ));
    assert_eq!(service.count_applications().await.unwrap(), 1);
}

#[tokio::test]
async fn test_cache_coherent_after_client_id_change() {
    let inner = Arc::new(MemoryApplicationStore::new());
    let store = Arc::new(CachedApplicationStore::new(inner.clone(), memory_caches(100)));
    let service = registry(store, Arc::new(MemoryCertificateService::new()));

    let mut config = OAuthClientRequest {
        client_id: Some("before".to_string()),
        redirect_uris: strings(&["https://app.example.com/callback"]),
        ..Default::default()
    };
    let created = service
        .create_application(&oauth_request("Cached", config.clone()))
        .await
        .unwrap();

    // Warm every index
    service.get_oauth_client("before").await.unwrap();
    service.get_application_by_name("Cached").await.unwrap();

    config.client_id = Some("after".to_string());
    service
        .update_application(&created.application.id, &oauth_request("Renamed", config))
        .await
        .unwrap();

    assert!(matches!(
        service.get_oauth_client("before").await,
        Err(ApplicationError::NotFound)
    ));
    assert!(matches!(
        service.get_application_by_name("Cached").await,
        Err(ApplicationError::NotFound)
    ));
    assert_eq!(
        service.get_oauth_client("after").await.unwrap().app_id,
        created.application.id
    );
    assert_eq!(
        service
            .get_application(&created.application.id)
            .await
            .unwrap()
            .application
            .name,
        "Renamed"
    );

    // Post-update reads come from the cache once the record is gone underneath
    inner.delete(&created.application.id).await.unwrap();
    let by_id = service
        .get_application(&created.application.id)
        .await
        .unwrap();
    assert_eq!(by_id.application.name, "Renamed");
    assert_eq!(by_id.application.client_id(), Some("after"));
    assert_eq!(
        service
            .get_application_by_name("Renamed")
            .await
            .unwrap()
            .application
            .id,
        created.application.id
    );
}

#[tokio::test]
async fn test_stale_cache_entry_does_not_block_create() {
    let inner = Arc::new(MemoryApplicationStore::new());
    let certificates = Arc::new(MemoryCertificateService::new());
    let worker_a = registry(
        Arc::new(CachedApplicationStore::new(inner.clone(), memory_caches(100))),
        certificates.clone(),
    );
    let worker_b = registry(
        Arc::new(CachedApplicationStore::new(inner.clone(), memory_caches(100))),
        certificates,
    );

    let config = OAuthClientRequest {
        client_id: Some("dup-client".to_string()),
        redirect_uris: strings(&["https://dup.example.com/callback"]),
        ..Default::default()
    };
    let created = worker_a
        .create_application(&oauth_request("dup", config.clone()))
        .await
        .unwrap();
    worker_a.get_application_by_name("dup").await.unwrap();
    worker_a.get_oauth_client("dup-client").await.unwrap();

    worker_b
        .delete_application(&created.application.id)
        .await
        .unwrap();
    assert!(inner.get_by_name("dup").await.unwrap().is_none());

    let recreated = worker_a
        .create_application(&oauth_request("dup", config))
        .await
        .unwrap();
    assert_ne!(recreated.application.id, created.application.id);
    assert_eq!(
        worker_a.get_application_by_name("dup").await.unwrap().application.id,
        recreated.application.id
    );
    assert_eq!(inner.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_cache_indexes_have_separate_capacity() {
    let inner = Arc::new(MemoryApplicationStore::new());
    let store = Arc::new(CachedApplicationStore::new(inner.clone(), memory_caches(3)));
    let service = registry(store, Arc::new(MemoryCertificateService::new()));

    let config = OAuthClientRequest {
        redirect_uris: strings(&["https://app.example.com/callback"]),
        ..Default::default()
    };
    let first = service
        .create_application(&oauth_request("first", config.clone()))
        .await
        .unwrap();
    service
        .create_application(&oauth_request("second", config))
        .await
        .unwrap();

    inner.delete(&first.application.id).await.unwrap();
    let cached = service.get_application(&first.application.id).await.unwrap();
    assert_eq!(cached.application.name, "first");
    assert_eq!(
        service.get_application_by_name("first").await.unwrap().application.id,
        first.application.id
    );
}

#[tokio::test]
async fn test_store_failure_rolls_back_certificates() {
    let store = Arc::new(FailingStore::default());
    let certificates = Arc::new(MemoryCertificateService::new());
    let service = registry(store.clone(), certificates.clone());

    let mut request = oauth_request(
        "Rollback",
        OAuthClientRequest {
            redirect_uris: strings(&["https://app.example.com/callback"]),
            certificate: Some(jwks_certificate()),
            ..Default::default()
        },
    );
    request.certificate = Some(jwks_certificate());

    store.fail_writes.store(true, Ordering::SeqCst);
    let error = service.create_application(&request).await.unwrap_err();
    assert!(matches!(error, ApplicationError::Internal(_)));
    assert_eq!(error.error_type(), ErrorType::Server);
    assert!(certificates.is_empty().await);

    store.fail_writes.store(false, Ordering::SeqCst);
    request.certificate = None;
    let created = service.create_application(&request).await.unwrap();
    let app_id = created.application.id.clone();
    let client_id = created.application.client_id().unwrap().to_string();
    assert_eq!(certificates.len().await, 1);

    // A failed update restores the certificate it removed
    let mut update = request.clone();
    update.inbound_auth_config = None;
    store.fail_writes.store(true, Ordering::SeqCst);
    let error = service.update_application(&app_id, &update).await.unwrap_err();
    assert!(matches!(error, ApplicationError::Internal(_)));
    let restored = certificates
        .get_certificate_by_reference(&CertificateReference::oauth_app(&client_id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(restored.value, jwks_certificate().value);
}

#[tokio::test]
async fn test_undo_failure_takes_priority() {
    let store = Arc::new(FailingStore::default());
    let certificates = Arc::new(FlakyCertificates::default());
    let service = registry(store.clone(), certificates.clone());

    let mut request = oauth_request(
        "Stranded",
        OAuthClientRequest {
            redirect_uris: strings(&["https://app.example.com/callback"]),
            ..Default::default()
        },
    );
    request.certificate = Some(jwks_certificate());

    store.fail_writes.store(true, Ordering::SeqCst);
    certificates.fail_deletes.store(true, Ordering::SeqCst);

    let error = service.create_application(&request).await.unwrap_err();
    match error {
        ApplicationError::CertificateServerError(description) => {
            assert!(description.contains("Failed to delete application"));
        }
        other => panic!("expected certificate server error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_concurrent_creates_with_same_name() {
    let certificates = Arc::new(MemoryCertificateService::new());
    let service = registry(Arc::new(MemoryApplicationStore::new()), certificates.clone());

    let mut request = ApplicationRequest {
        name: "Contended".to_string(),
        ..Default::default()
    };
    request.certificate = Some(jwks_certificate());

    let results =
        futures::future::join_all((0..8).map(|_| service.create_application(&request))).await;

    let created = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(created, 1);
    assert!(results.iter().filter_map(|result| result.as_ref().err()).all(|error| {
        matches!(error, ApplicationError::AlreadyExistsWithName)
    }));
    assert_eq!(service.count_applications().await.unwrap(), 1);
    assert_eq!(certificates.len().await, 1);
}
