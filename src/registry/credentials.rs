//! Client credential generation and secret hashing.

use crate::errors::ApplicationError;
use crate::registry::types::secret_thumbprint;
use base64::prelude::*;
use rand::RngCore;
use rand::rngs::OsRng;
use uuid::Uuid;

/// Source of OAuth client identifiers and secrets.
///
/// A generation failure surfaces as a server error on the calling operation.
pub trait CredentialGenerator: Send + Sync {
    fn generate_client_id(&self) -> Result<String, ApplicationError>;
    fn generate_client_secret(&self) -> Result<String, ApplicationError>;
}

/// One-way, deterministic secret hashing
pub trait SecretHasher: Send + Sync {
    fn thumbprint(&self, secret: &str) -> String;
}

/// UUID client ids and 256-bit URL-safe secrets
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCredentialGenerator;

impl CredentialGenerator for RandomCredentialGenerator {
    fn generate_client_id(&self) -> Result<String, ApplicationError> {
        Ok(generate_client_id())
    }

    fn generate_client_secret(&self) -> Result<String, ApplicationError> {
        generate_token().map_err(|e| {
            ApplicationError::Internal(format!("Failed to generate client secret: {}", e))
        })
    }
}

/// SHA-256 thumbprints encoded as unpadded URL-safe base64
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256SecretHasher;

impl SecretHasher for Sha256SecretHasher {
    fn thumbprint(&self, secret: &str) -> String {
        secret_thumbprint(secret)
    }
}

/// Generate a secure random token from the operating system RNG
pub fn generate_token() -> Result<String, rand::Error> {
    let mut bytes = [0u8; 32];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(BASE64_URL_SAFE_NO_PAD.encode(bytes))
}

/// Generate a client ID
pub fn generate_client_id() -> String {
    Uuid::new_v4().to_string()
}

/// Mask a client id for logging, keeping the first four characters
pub fn mask_client_id(client_id: &str) -> String {
    let visible: String = client_id.chars().take(4).collect();
    format!("{}****", visible)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_secrets_are_url_safe_and_distinct() {
        let generator = RandomCredentialGenerator;
        let first = generator.generate_client_secret().unwrap();
        let second = generator.generate_client_secret().unwrap();

        assert_eq!(first.len(), 43);
        assert_ne!(first, second);
        assert!(
            first
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_thumbprint_is_deterministic() {
        let hasher = Sha256SecretHasher;
        assert_eq!(hasher.thumbprint("secret"), hasher.thumbprint("secret"));
        assert_ne!(hasher.thumbprint("secret"), hasher.thumbprint("Secret"));
        assert_ne!(hasher.thumbprint("secret"), "secret");
    }

    #[test]
    fn test_mask_client_id() {
        assert_eq!(mask_client_id("abcdef-1234"), "abcd****");
        assert_eq!(mask_client_id("ab"), "ab****");
    }
}
