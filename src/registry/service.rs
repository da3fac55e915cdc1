//! Application lifecycle orchestration.
//!
//! `ApplicationService` validates requests, assigns credentials, keeps the
//! certificate service in step with the store and undoes completed steps when
//! a later one fails.

use crate::certificates::{CertificateReference, CertificateService, NewCertificate};
use crate::errors::{ApplicationError, CertificateError, ErrorType, StorageError};
use crate::registry::compensation::Compensation;
use crate::registry::credentials::{
    CredentialGenerator, RandomCredentialGenerator, SecretHasher, Sha256SecretHasher,
    mask_client_id,
};
use crate::registry::flows::{FlowRegistry, FlowSettings, resolve_flow_graph_ids};
use crate::registry::token_config::{TokenDefaults, resolve_oauth_token, resolve_root_token};
use crate::registry::types::*;
use crate::registry::validation::{
    CertificateSpec, ValidatedApplication, validate_application_request,
};
use crate::storage::ApplicationStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

type Result<T> = std::result::Result<T, ApplicationError>;

/// Deployment-wide settings used when resolving requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySettings {
    pub flows: FlowSettings,
    pub token_defaults: TokenDefaults,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            flows: FlowSettings::default(),
            token_defaults: TokenDefaults {
                issuer: "appreg".to_string(),
                validity_period: 3600,
            },
        }
    }
}

/// A request that passed validation, with flow ids, credentials and token
/// settings resolved, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedApplication {
    pub application: Application,
    /// Clear-text secret to hand back to the caller, when one was issued or supplied
    pub client_secret: Option<String>,
    pub certificate: Option<CertificateSpec>,
    pub oauth_certificate: Option<CertificateSpec>,
}

impl PreparedApplication {
    /// Replace the generated id with a fixed one
    pub fn with_id(mut self, id: &str) -> Self {
        self.application.id = id.to_string();
        if let Some(InboundAuthConfig::OAuth(client)) = &mut self.application.inbound_auth_config {
            client.app_id = id.to_string();
        }
        self
    }

    fn into_view(self) -> ApplicationView {
        let oauth_certificate = self.application.oauth_client().map(|_| {
            self.oauth_certificate
                .as_ref()
                .map(CertificateSpec::to_view)
                .unwrap_or_else(ApplicationCertificate::none)
        });
        ApplicationView {
            certificate: self
                .certificate
                .as_ref()
                .map(CertificateSpec::to_view)
                .unwrap_or_else(ApplicationCertificate::none),
            oauth_certificate,
            client_secret: self.client_secret,
            application: self.application,
        }
    }
}

fn certificate_error(
    operation: &str,
    reference: &CertificateReference,
    error: CertificateError,
) -> ApplicationError {
    let description = format!("Failed to {} {} certificate: {}", operation, reference, error);
    match error.error_type() {
        ErrorType::Client => ApplicationError::CertificateClientError(description),
        ErrorType::Server => ApplicationError::CertificateServerError(description),
    }
}

fn new_certificate(reference: &CertificateReference, spec: &CertificateSpec) -> NewCertificate {
    NewCertificate {
        reference: reference.clone(),
        kind: spec.kind,
        value: spec.value.clone(),
    }
}

/// Orchestrates the application lifecycle across storage, certificates and
/// the flow registry.
pub struct ApplicationService {
    store: Arc<dyn ApplicationStore>,
    certificates: Arc<dyn CertificateService>,
    flows: Arc<dyn FlowRegistry>,
    credentials: Arc<dyn CredentialGenerator>,
    hasher: Arc<dyn SecretHasher>,
    settings: RegistrySettings,
}

impl ApplicationService {
    pub fn new(
        store: Arc<dyn ApplicationStore>,
        certificates: Arc<dyn CertificateService>,
        flows: Arc<dyn FlowRegistry>,
        settings: RegistrySettings,
    ) -> Self {
        Self {
            store,
            certificates,
            flows,
            credentials: Arc::new(RandomCredentialGenerator),
            hasher: Arc::new(Sha256SecretHasher),
            settings,
        }
    }

    pub fn with_credential_generator(mut self, credentials: Arc<dyn CredentialGenerator>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_secret_hasher(mut self, hasher: Arc<dyn SecretHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    /// Validate a request and resolve everything a create would, without
    /// touching storage or certificates.
    pub async fn validate_application(
        &self,
        request: &ApplicationRequest,
    ) -> Result<PreparedApplication> {
        let validated = validate_application_request(request)?;
        let id = Uuid::new_v4().to_string();
        self.prepare(validated, id, None).await
    }

    async fn prepare(
        &self,
        validated: ValidatedApplication,
        id: String,
        existing: Option<&Application>,
    ) -> Result<PreparedApplication> {
        let (auth_flow_graph_id, registration_flow_graph_id) = resolve_flow_graph_ids(
            self.flows.as_ref(),
            &self.settings.flows,
            validated.auth_flow_graph_id.as_deref(),
            validated.registration_flow_graph_id.as_deref(),
        )
        .await?;

        let token = resolve_root_token(validated.token.as_ref(), &self.settings.token_defaults);
        let existing_client = existing.and_then(Application::oauth_client);

        let mut client_secret = None;
        let mut oauth_certificate = None;
        let inbound_auth_config = match validated.oauth {
            Some(oauth) => {
                let client_id = match oauth
                    .client_id
                    .or_else(|| existing_client.map(|client| client.client_id.clone()))
                {
                    Some(client_id) => client_id,
                    None => self.credentials.generate_client_id()?,
                };

                let hashed_client_secret = if oauth.public_client {
                    None
                } else if let Some(secret) = oauth.client_secret {
                    let hashed = self.hasher.thumbprint(&secret);
                    client_secret = Some(secret);
                    Some(hashed)
                } else if let Some(hashed) =
                    existing_client.and_then(|client| client.hashed_client_secret.clone())
                {
                    Some(hashed)
                } else {
                    let secret = self.credentials.generate_client_secret()?;
                    let hashed = self.hasher.thumbprint(&secret);
                    client_secret = Some(secret);
                    Some(hashed)
                };

                oauth_certificate = oauth.certificate;
                Some(InboundAuthConfig::OAuth(OAuthClientConfig {
                    app_id: id.clone(),
                    client_id,
                    hashed_client_secret,
                    redirect_uris: oauth.redirect_uris,
                    grant_types: oauth.grant_types,
                    response_types: oauth.response_types,
                    token_endpoint_auth_method: oauth.token_endpoint_auth_method,
                    pkce_required: oauth.pkce_required,
                    public_client: oauth.public_client,
                    token: resolve_oauth_token(oauth.token.as_ref(), &token),
                    scopes: oauth.scopes,
                }))
            }
            None => None,
        };

        let now = Utc::now();
        let created_at: DateTime<Utc> = existing.map(|app| app.created_at).unwrap_or(now);

        Ok(PreparedApplication {
            application: Application {
                id,
                name: validated.name,
                description: validated.description,
                auth_flow_graph_id,
                registration_flow_graph_id,
                is_registration_flow_enabled: validated.is_registration_flow_enabled,
                branding_id: validated.branding_id,
                url: validated.url,
                logo_url: validated.logo_url,
                tos_uri: validated.tos_uri,
                policy_uri: validated.policy_uri,
                contacts: validated.contacts,
                token,
                inbound_auth_config,
                created_at,
                updated_at: now,
            },
            client_secret,
            certificate: validated.certificate,
            oauth_certificate,
        })
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.store.is_read_only() {
            return Err(ApplicationError::ImmutableResource);
        }
        Ok(())
    }

    /// Create an application. The clear-text client secret is returned only here.
    pub async fn create_application(
        &self,
        request: &ApplicationRequest,
    ) -> Result<ApplicationView> {
        self.ensure_writable()?;
        let prepared = self.validate_application(request).await?;

        if self
            .store
            .find_name_owner(&prepared.application.name)
            .await?
            .is_some()
        {
            return Err(ApplicationError::AlreadyExistsWithName);
        }
        if let Some(client_id) = prepared.application.client_id() {
            if self.store.find_client_id_owner(client_id).await?.is_some() {
                return Err(ApplicationError::AlreadyExistsWithClientId);
            }
        }

        self.persist(prepared).await
    }

    /// Write certificates and the record of a prepared application, undoing
    /// the certificate writes if a later step fails.
    pub async fn persist(&self, prepared: PreparedApplication) -> Result<ApplicationView> {
        let application = &prepared.application;
        let mut compensation = Compensation::new();

        if let Some(spec) = &prepared.certificate {
            let reference = CertificateReference::application(&application.id);
            self.certificates
                .create_certificate(&new_certificate(&reference, spec))
                .await
                .map_err(|e| certificate_error("create", &reference, e))?;
            self.push_delete(&mut compensation, reference);
        }

        if let (Some(spec), Some(client_id)) =
            (&prepared.oauth_certificate, application.client_id())
        {
            let reference = CertificateReference::oauth_app(client_id);
            if let Err(e) = self
                .certificates
                .create_certificate(&new_certificate(&reference, spec))
                .await
            {
                let error = certificate_error("create", &reference, e);
                return Err(compensation.abort(error).await);
            }
            self.push_delete(&mut compensation, reference);
        }

        if let Err(e) = self.store.create(application).await {
            tracing::error!(error = ?e, app_id = %application.id, "failed to store application");
            return Err(compensation.abort(e.into()).await);
        }

        tracing::info!(
            app_id = %application.id,
            client_id = ?application.client_id().map(mask_client_id),
            "application created"
        );
        Ok(prepared.into_view())
    }

    /// Replace an application. Omitted credentials are kept.
    pub async fn update_application(
        &self,
        id: &str,
        request: &ApplicationRequest,
    ) -> Result<ApplicationView> {
        if id.is_empty() {
            return Err(ApplicationError::InvalidApplicationId);
        }
        self.ensure_writable()?;
        let existing = self
            .store
            .get_by_id(id)
            .await?
            .ok_or(ApplicationError::NotFound)?;

        let validated = validate_application_request(request)?;

        if validated.name != existing.name {
            if let Some(other) = self.store.find_name_owner(&validated.name).await? {
                if other.id != existing.id {
                    return Err(ApplicationError::AlreadyExistsWithName);
                }
            }
        }

        let prepared = self
            .prepare(validated, existing.id.clone(), Some(&existing))
            .await?;
        let application = &prepared.application;

        if let Some(client_id) = application.client_id() {
            if Some(client_id) != existing.client_id() {
                if let Some(other) = self.store.find_client_id_owner(client_id).await? {
                    if other.app_id != existing.id {
                        return Err(ApplicationError::AlreadyExistsWithClientId);
                    }
                }
            }
        }

        let mut compensation = Compensation::new();

        let app_reference = CertificateReference::application(&existing.id);
        if let Err(e) = self
            .sync_certificate(
                &mut compensation,
                Some(app_reference.clone()),
                Some(app_reference),
                prepared.certificate.as_ref(),
            )
            .await
        {
            return Err(compensation.abort(e).await);
        }

        if let Err(e) = self
            .sync_certificate(
                &mut compensation,
                existing.client_id().map(CertificateReference::oauth_app),
                application.client_id().map(CertificateReference::oauth_app),
                prepared.oauth_certificate.as_ref(),
            )
            .await
        {
            return Err(compensation.abort(e).await);
        }

        if let Err(e) = self.store.update(&existing, application).await {
            tracing::error!(error = ?e, app_id = %existing.id, "failed to update application");
            return Err(compensation.abort(e.into()).await);
        }

        tracing::info!(
            app_id = %existing.id,
            client_id = ?application.client_id().map(mask_client_id),
            "application updated"
        );
        Ok(prepared.into_view())
    }

    /// Bring the certificate of `new_reference` in line with `desired`.
    ///
    /// When the reference is unchanged this is a three-way diff. When it moved
    /// (client id changed or OAuth config added/removed) the old certificate is
    /// deleted and the desired one created at the new reference.
    async fn sync_certificate(
        &self,
        compensation: &mut Compensation,
        old_reference: Option<CertificateReference>,
        new_reference: Option<CertificateReference>,
        desired: Option<&CertificateSpec>,
    ) -> Result<()> {
        let current = match &old_reference {
            Some(reference) => self
                .certificates
                .get_certificate_by_reference(reference)
                .await
                .map_err(|e| certificate_error("retrieve", reference, e))?,
            None => None,
        };

        if old_reference.is_some() && old_reference == new_reference {
            let Some(reference) = new_reference else {
                return Ok(());
            };
            match (current, desired) {
                (None, None) => {}
                (None, Some(spec)) => {
                    self.certificates
                        .create_certificate(&new_certificate(&reference, spec))
                        .await
                        .map_err(|e| certificate_error("create", &reference, e))?;
                    self.push_delete(compensation, reference);
                }
                (Some(current), Some(spec)) => {
                    if current.kind != spec.kind || current.value != spec.value {
                        self.certificates
                            .update_certificate_by_id(
                                &current.id,
                                &new_certificate(&reference, spec),
                            )
                            .await
                            .map_err(|e| certificate_error("update", &reference, e))?;
                        self.push_restore(compensation, current.id.clone(), current.to_new());
                    }
                }
                (Some(current), None) => {
                    self.certificates
                        .delete_certificate_by_reference(&reference)
                        .await
                        .map_err(|e| certificate_error("delete", &reference, e))?;
                    self.push_recreate(compensation, current.to_new());
                }
            }
            return Ok(());
        }

        if let (Some(reference), Some(current)) = (old_reference, current) {
            self.certificates
                .delete_certificate_by_reference(&reference)
                .await
                .map_err(|e| certificate_error("delete", &reference, e))?;
            self.push_recreate(compensation, current.to_new());
        }

        if let (Some(reference), Some(spec)) = (new_reference, desired) {
            self.certificates
                .create_certificate(&new_certificate(&reference, spec))
                .await
                .map_err(|e| certificate_error("create", &reference, e))?;
            self.push_delete(compensation, reference);
        }

        Ok(())
    }

    fn push_delete(&self, compensation: &mut Compensation, reference: CertificateReference) {
        let certificates = self.certificates.clone();
        compensation.push("delete certificate", async move {
            certificates
                .delete_certificate_by_reference(&reference)
                .await
                .map_err(|e| certificate_error("delete", &reference, e))
        });
    }

    fn push_recreate(&self, compensation: &mut Compensation, certificate: NewCertificate) {
        let certificates = self.certificates.clone();
        compensation.push("recreate certificate", async move {
            certificates
                .create_certificate(&certificate)
                .await
                .map(|_| ())
                .map_err(|e| certificate_error("create", &certificate.reference, e))
        });
    }

    fn push_restore(
        &self,
        compensation: &mut Compensation,
        id: String,
        certificate: NewCertificate,
    ) {
        let certificates = self.certificates.clone();
        compensation.push("restore certificate", async move {
            certificates
                .update_certificate_by_id(&id, &certificate)
                .await
                .map_err(|e| certificate_error("update", &certificate.reference, e))
        });
    }

    /// Delete an application and its certificates. Deleting an unknown id succeeds.
    pub async fn delete_application(&self, id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(ApplicationError::InvalidApplicationId);
        }
        self.ensure_writable()?;

        let Some(existing) = self.store.get_by_id(id).await? else {
            tracing::debug!(app_id = %id, "application to delete not found");
            return Ok(());
        };

        match self.store.delete(id).await {
            Ok(()) => {}
            Err(StorageError::NotFound(_)) => {
                tracing::debug!(app_id = %id, "application already deleted");
            }
            Err(e) => return Err(e.into()),
        }

        let reference = CertificateReference::application(id);
        self.certificates
            .delete_certificate_by_reference(&reference)
            .await
            .map_err(|e| certificate_error("delete", &reference, e))?;

        if let Some(client_id) = existing.client_id() {
            let reference = CertificateReference::oauth_app(client_id);
            self.certificates
                .delete_certificate_by_reference(&reference)
                .await
                .map_err(|e| certificate_error("delete", &reference, e))?;
        }

        tracing::info!(
            app_id = %id,
            client_id = ?existing.client_id().map(mask_client_id),
            "application deleted"
        );
        Ok(())
    }

    pub async fn get_application(&self, id: &str) -> Result<ApplicationView> {
        if id.is_empty() {
            return Err(ApplicationError::InvalidApplicationId);
        }
        let application = self
            .store
            .get_by_id(id)
            .await?
            .ok_or(ApplicationError::NotFound)?;
        self.enrich(application).await
    }

    pub async fn get_application_by_name(&self, name: &str) -> Result<ApplicationView> {
        if name.is_empty() {
            return Err(ApplicationError::InvalidApplicationName);
        }
        let application = self
            .store
            .get_by_name(name)
            .await?
            .ok_or(ApplicationError::NotFound)?;
        self.enrich(application).await
    }

    pub async fn get_oauth_client(&self, client_id: &str) -> Result<OAuthClientConfig> {
        if client_id.is_empty() {
            return Err(ApplicationError::InvalidClientId);
        }
        self.store
            .get_oauth_client(client_id)
            .await?
            .ok_or(ApplicationError::NotFound)
    }

    /// Check a client secret against the stored thumbprint of `client_id`
    pub async fn verify_client_secret(&self, client_id: &str, client_secret: &str) -> Result<bool> {
        let client = self.get_oauth_client(client_id).await?;
        Ok(client.validate_credentials(client_id, client_secret, self.hasher.as_ref()))
    }

    pub async fn list_applications(&self, page: Option<Page>) -> Result<ApplicationList> {
        let total_results = self.store.count().await?;
        let applications: Vec<BasicApplication> = self
            .store
            .list(page)
            .await?
            .iter()
            .map(BasicApplication::from)
            .collect();
        Ok(ApplicationList {
            total_results,
            count: applications.len(),
            applications,
        })
    }

    pub async fn count_applications(&self) -> Result<usize> {
        Ok(self.store.count().await?)
    }

    async fn enrich(&self, application: Application) -> Result<ApplicationView> {
        let certificate = self
            .certificate_view(&CertificateReference::application(&application.id))
            .await?;
        let oauth_certificate = match application.client_id() {
            Some(client_id) => Some(
                self.certificate_view(&CertificateReference::oauth_app(client_id))
                    .await?,
            ),
            None => None,
        };
        Ok(ApplicationView {
            application,
            certificate,
            oauth_certificate,
            client_secret: None,
        })
    }

    async fn certificate_view(
        &self,
        reference: &CertificateReference,
    ) -> Result<ApplicationCertificate> {
        Ok(self
            .certificates
            .get_certificate_by_reference(reference)
            .await
            .map_err(|e| certificate_error("retrieve", reference, e))?
            .map(|certificate| ApplicationCertificate {
                kind: certificate.kind,
                value: certificate.value,
            })
            .unwrap_or_else(ApplicationCertificate::none))
    }
}
