//! In-memory certificate service

use super::{Certificate, CertificateReference, CertificateService, NewCertificate, Result};
use crate::errors::CertificateError;
use crate::registry::types::CertificateKind;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

/// Certificate service that keeps certificates in process memory
#[derive(Default)]
pub struct MemoryCertificateService {
    certificates: RwLock<HashMap<CertificateReference, Certificate>>,
}

impl MemoryCertificateService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored certificates
    pub async fn len(&self) -> usize {
        self.certificates.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.certificates.read().await.is_empty()
    }

    fn check(certificate: &NewCertificate) -> Result<()> {
        if certificate.kind == CertificateKind::None {
            return Err(CertificateError::InvalidCertificate(
                "certificate type must not be NONE".to_string(),
            ));
        }
        if certificate.value.is_empty() {
            return Err(CertificateError::InvalidCertificate(
                "certificate value must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CertificateService for MemoryCertificateService {
    async fn create_certificate(&self, certificate: &NewCertificate) -> Result<String> {
        Self::check(certificate)?;
        let mut certificates = self.certificates.write().await;
        if certificates.contains_key(&certificate.reference) {
            return Err(CertificateError::AlreadyExists(
                certificate.reference.to_string(),
            ));
        }

        let id = Ulid::new().to_string();
        certificates.insert(
            certificate.reference.clone(),
            Certificate {
                id: id.clone(),
                reference: certificate.reference.clone(),
                kind: certificate.kind,
                value: certificate.value.clone(),
            },
        );
        Ok(id)
    }

    async fn update_certificate_by_id(
        &self,
        id: &str,
        certificate: &NewCertificate,
    ) -> Result<()> {
        Self::check(certificate)?;
        let mut certificates = self.certificates.write().await;
        let reference = certificates
            .iter()
            .find(|(_, stored)| stored.id == id)
            .map(|(reference, _)| reference.clone())
            .ok_or_else(|| CertificateError::NotFound(id.to_string()))?;

        if reference != certificate.reference && certificates.contains_key(&certificate.reference)
        {
            return Err(CertificateError::AlreadyExists(
                certificate.reference.to_string(),
            ));
        }

        certificates.remove(&reference);
        certificates.insert(
            certificate.reference.clone(),
            Certificate {
                id: id.to_string(),
                reference: certificate.reference.clone(),
                kind: certificate.kind,
                value: certificate.value.clone(),
            },
        );
        Ok(())
    }

    async fn get_certificate_by_reference(
        &self,
        reference: &CertificateReference,
    ) -> Result<Option<Certificate>> {
        Ok(self.certificates.read().await.get(reference).cloned())
    }

    async fn delete_certificate_by_reference(
        &self,
        reference: &CertificateReference,
    ) -> Result<()> {
        self.certificates.write().await.remove(reference);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwks(reference: CertificateReference, value: &str) -> NewCertificate {
        NewCertificate {
            reference,
            kind: CertificateKind::Jwks,
            value: value.to_string(),
        }
    }

    #[tokio::test]
    async fn test_one_certificate_per_reference() {
        let service = MemoryCertificateService::new();
        let reference = CertificateReference::application("app-1");

        let id = service
            .create_certificate(&jwks(reference.clone(), "{\"keys\":[]}"))
            .await
            .unwrap();
        assert!(!id.is_empty());

        let duplicate = service
            .create_certificate(&jwks(reference.clone(), "{\"keys\":[1]}"))
            .await;
        assert!(matches!(duplicate, Err(CertificateError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let service = MemoryCertificateService::new();
        let reference = CertificateReference::oauth_app("client-1");
        let id = service
            .create_certificate(&jwks(reference.clone(), "v1"))
            .await
            .unwrap();

        service
            .update_certificate_by_id(&id, &jwks(reference.clone(), "v2"))
            .await
            .unwrap();
        let stored = service
            .get_certificate_by_reference(&reference)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, id);
        assert_eq!(stored.value, "v2");

        service
            .delete_certificate_by_reference(&reference)
            .await
            .unwrap();
        service
            .delete_certificate_by_reference(&reference)
            .await
            .unwrap();
        assert!(service.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let service = MemoryCertificateService::new();
        let result = service
            .update_certificate_by_id("missing", &jwks(CertificateReference::application("a"), "v"))
            .await;
        assert!(matches!(result, Err(CertificateError::NotFound(_))));
    }
}
