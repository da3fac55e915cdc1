//! Certificate service seam.
//!
//! Certificates are owned by an external subsystem and addressed by the
//! `(reference_type, reference_id)` of the owning entity. At most one
//! certificate exists per reference.

mod memory;

pub use memory::MemoryCertificateService;

use crate::errors::CertificateError;
use crate::registry::types::CertificateKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type Result<T> = std::result::Result<T, CertificateError>;

/// Kind of entity that owns a certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceType {
    Application,
    OauthApp,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::Application => "application",
            ReferenceType::OauthApp => "oauth_app",
        }
    }
}

/// Owner of a certificate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CertificateReference {
    pub reference_type: ReferenceType,
    pub reference_id: String,
}

impl CertificateReference {
    pub fn application(app_id: &str) -> Self {
        Self {
            reference_type: ReferenceType::Application,
            reference_id: app_id.to_string(),
        }
    }

    pub fn oauth_app(client_id: &str) -> Self {
        Self {
            reference_type: ReferenceType::OauthApp,
            reference_id: client_id.to_string(),
        }
    }
}

impl fmt::Display for CertificateReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.reference_type.as_str(), self.reference_id)
    }
}

/// Certificate contents to create or replace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCertificate {
    pub reference: CertificateReference,
    pub kind: CertificateKind,
    pub value: String,
}

/// Stored certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: String,
    pub reference: CertificateReference,
    pub kind: CertificateKind,
    pub value: String,
}

impl Certificate {
    pub fn to_new(&self) -> NewCertificate {
        NewCertificate {
            reference: self.reference.clone(),
            kind: self.kind,
            value: self.value.clone(),
        }
    }
}

#[async_trait]
pub trait CertificateService: Send + Sync {
    /// Create a certificate and return its id
    async fn create_certificate(&self, certificate: &NewCertificate) -> Result<String>;

    /// Replace the contents of an existing certificate
    async fn update_certificate_by_id(&self, id: &str, certificate: &NewCertificate)
    -> Result<()>;

    /// Look up the certificate of a reference. A missing certificate is `Ok(None)`.
    async fn get_certificate_by_reference(
        &self,
        reference: &CertificateReference,
    ) -> Result<Option<Certificate>>;

    /// Delete the certificate of a reference. Deleting nothing succeeds.
    async fn delete_certificate_by_reference(&self, reference: &CertificateReference)
    -> Result<()>;
}
