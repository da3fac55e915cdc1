//! Application registry types.
//!
//! Request types carry raw strings so that unknown grant types, response types,
//! and auth methods surface as validation errors instead of decode failures.
//! Persisted types carry the parsed enums.

use crate::registry::credentials::SecretHasher;
use base64::prelude::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Wire tag for the OAuth2 inbound auth configuration
pub const OAUTH_INBOUND_AUTH_TYPE: &str = "oauth2";

/// OAuth 2.0 grant types accepted by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrantType {
    #[serde(rename = "authorization_code")]
    AuthorizationCode,
    #[serde(rename = "client_credentials")]
    ClientCredentials,
    #[serde(rename = "refresh_token")]
    RefreshToken,
    #[serde(rename = "urn:ietf:params:oauth:grant-type:token-exchange")]
    TokenExchange,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::ClientCredentials => "client_credentials",
            GrantType::RefreshToken => "refresh_token",
            GrantType::TokenExchange => "urn:ietf:params:oauth:grant-type:token-exchange",
        }
    }
}

impl FromStr for GrantType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorization_code" => Ok(GrantType::AuthorizationCode),
            "client_credentials" => Ok(GrantType::ClientCredentials),
            "refresh_token" => Ok(GrantType::RefreshToken),
            "urn:ietf:params:oauth:grant-type:token-exchange" => Ok(GrantType::TokenExchange),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OAuth 2.0 response types accepted by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Code,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Code => "code",
        }
    }
}

impl FromStr for ResponseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(ResponseType::Code),
            other => Err(other.to_string()),
        }
    }
}

/// Token endpoint client authentication methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    ClientSecretBasic,
    ClientSecretPost,
    None,
}

impl TokenEndpointAuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenEndpointAuthMethod::ClientSecretBasic => "client_secret_basic",
            TokenEndpointAuthMethod::ClientSecretPost => "client_secret_post",
            TokenEndpointAuthMethod::None => "none",
        }
    }
}

impl FromStr for TokenEndpointAuthMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client_secret_basic" => Ok(TokenEndpointAuthMethod::ClientSecretBasic),
            "client_secret_post" => Ok(TokenEndpointAuthMethod::ClientSecretPost),
            "none" => Ok(TokenEndpointAuthMethod::None),
            other => Err(other.to_string()),
        }
    }
}

/// Kind of certificate attached to an application or OAuth client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CertificateKind {
    #[serde(rename = "NONE")]
    None,
    #[serde(rename = "JWKS")]
    Jwks,
    #[serde(rename = "JWKS_URI")]
    JwksUri,
}

impl CertificateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateKind::None => "NONE",
            CertificateKind::Jwks => "JWKS",
            CertificateKind::JwksUri => "JWKS_URI",
        }
    }
}

/// Certificate as submitted by a caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateInput {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub value: String,
}

/// Certificate as returned to a caller. `kind` is `None` when nothing is attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationCertificate {
    #[serde(rename = "type")]
    pub kind: CertificateKind,
    #[serde(default)]
    pub value: String,
}

impl ApplicationCertificate {
    pub fn none() -> Self {
        Self {
            kind: CertificateKind::None,
            value: String::new(),
        }
    }
}

/// Root token settings, as submitted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfigRequest {
    pub issuer: Option<String>,
    pub validity_period: Option<i64>,
    pub user_attributes: Option<Vec<String>>,
}

/// Access token overrides, as submitted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenRequest {
    pub validity_period: Option<i64>,
    pub user_attributes: Option<Vec<String>>,
}

/// ID token overrides, as submitted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenRequest {
    pub validity_period: Option<i64>,
    pub user_attributes: Option<Vec<String>>,
    pub scope_claims: Option<BTreeMap<String, Vec<String>>>,
}

/// OAuth token overrides, as submitted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokenRequest {
    pub issuer: Option<String>,
    pub access_token: Option<AccessTokenRequest>,
    pub id_token: Option<IdTokenRequest>,
}

/// Resolved root token configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub issuer: String,
    pub validity_period: i64,
    #[serde(default)]
    pub user_attributes: Vec<String>,
}

/// Resolved access token configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenConfig {
    pub validity_period: i64,
    #[serde(default)]
    pub user_attributes: Vec<String>,
}

/// Resolved ID token configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenConfig {
    pub validity_period: i64,
    #[serde(default)]
    pub user_attributes: Vec<String>,
    #[serde(default)]
    pub scope_claims: BTreeMap<String, Vec<String>>,
}

/// Resolved OAuth token configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokenConfig {
    pub issuer: String,
    pub access_token: AccessTokenConfig,
    pub id_token: IdTokenConfig,
}

/// OAuth client settings, as submitted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthClientRequest {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub grant_types: Vec<String>,
    #[serde(default)]
    pub response_types: Vec<String>,
    pub token_endpoint_auth_method: Option<String>,
    #[serde(default)]
    pub pkce_required: bool,
    #[serde(default)]
    pub public_client: bool,
    pub token: Option<OAuthTokenRequest>,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub certificate: Option<CertificateInput>,
    /// Deprecated flat form of a JWKS certificate
    pub jwks: Option<String>,
    /// Deprecated flat form of a JWKS_URI certificate
    pub jwks_uri: Option<String>,
}

/// Inbound auth configuration, as submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundAuthRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub config: Option<OAuthClientRequest>,
}

/// Create or update request for an application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub auth_flow_graph_id: Option<String>,
    pub registration_flow_graph_id: Option<String>,
    #[serde(default)]
    pub is_registration_flow_enabled: bool,
    pub branding_id: Option<String>,
    pub url: Option<String>,
    pub logo_url: Option<String>,
    pub tos_uri: Option<String>,
    pub policy_uri: Option<String>,
    #[serde(default)]
    pub contacts: Vec<String>,
    pub token: Option<TokenConfigRequest>,
    pub certificate: Option<CertificateInput>,
    pub inbound_auth_config: Option<InboundAuthRequest>,
}

/// Stored OAuth client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthClientConfig {
    pub app_id: String,
    pub client_id: String,
    /// Thumbprint of the client secret; `None` for public clients
    pub hashed_client_secret: Option<String>,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<GrantType>,
    pub response_types: Vec<ResponseType>,
    pub token_endpoint_auth_method: TokenEndpointAuthMethod,
    pub pkce_required: bool,
    pub public_client: bool,
    pub token: OAuthTokenConfig,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl OAuthClientConfig {
    pub fn is_allowed_grant_type(&self, grant_type: GrantType) -> bool {
        self.grant_types.contains(&grant_type)
    }

    pub fn is_allowed_response_type(&self, response_type: &str) -> bool {
        response_type
            .parse::<ResponseType>()
            .map(|parsed| self.response_types.contains(&parsed))
            .unwrap_or(false)
    }

    pub fn requires_pkce(&self) -> bool {
        self.pkce_required || self.public_client
    }

    /// Check a presented client id and secret against the stored thumbprint.
    /// `hasher` must be the one that produced the thumbprint.
    pub fn validate_credentials(
        &self,
        client_id: &str,
        client_secret: &str,
        hasher: &dyn SecretHasher,
    ) -> bool {
        if client_id != self.client_id {
            return false;
        }
        let Some(stored) = &self.hashed_client_secret else {
            return false;
        };
        constant_time_eq(hasher.thumbprint(client_secret).as_bytes(), stored.as_bytes())
    }

    /// Validate a redirect URI presented in an authorization request.
    pub fn validate_redirect_uri(&self, redirect_uri: Option<&str>) -> Result<(), String> {
        let Some(redirect_uri) = redirect_uri.filter(|uri| !uri.is_empty()) else {
            if self.redirect_uris.len() != 1 {
                return Err("redirect URI is required in the authorization request".to_string());
            }
            return match Url::parse(&self.redirect_uris[0]) {
                Ok(parsed) if parsed.host_str().is_some_and(|h| !h.is_empty()) => Ok(()),
                _ => Err("registered redirect URI is not fully qualified".to_string()),
            };
        };

        if !self.redirect_uris.iter().any(|uri| uri == redirect_uri) {
            return Err("redirect URI does not match any registered redirect URI".to_string());
        }

        let parsed =
            Url::parse(redirect_uri).map_err(|e| format!("invalid redirect URI: {}", e))?;
        if parsed.fragment().is_some() {
            return Err("redirect URI must not contain a fragment component".to_string());
        }
        Ok(())
    }
}

/// Inbound auth configuration attached to an application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config")]
pub enum InboundAuthConfig {
    #[serde(rename = "oauth2")]
    OAuth(OAuthClientConfig),
}

impl InboundAuthConfig {
    pub fn oauth(&self) -> &OAuthClientConfig {
        match self {
            InboundAuthConfig::OAuth(config) => config,
        }
    }
}

/// Stored application record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub auth_flow_graph_id: String,
    pub registration_flow_graph_id: String,
    pub is_registration_flow_enabled: bool,
    pub branding_id: Option<String>,
    pub url: Option<String>,
    pub logo_url: Option<String>,
    pub tos_uri: Option<String>,
    pub policy_uri: Option<String>,
    #[serde(default)]
    pub contacts: Vec<String>,
    pub token: TokenConfig,
    pub inbound_auth_config: Option<InboundAuthConfig>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn oauth_client(&self) -> Option<&OAuthClientConfig> {
        self.inbound_auth_config.as_ref().map(InboundAuthConfig::oauth)
    }

    pub fn client_id(&self) -> Option<&str> {
        self.oauth_client().map(|config| config.client_id.as_str())
    }
}

/// Application returned by the lifecycle operations, with its certificates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationView {
    #[serde(flatten)]
    pub application: Application,
    pub certificate: ApplicationCertificate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_certificate: Option<ApplicationCertificate>,
    /// Clear-text client secret, present only when it was just issued or supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

/// Summary entry returned by list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicApplication {
    pub id: String,
    pub name: String,
    pub description: String,
    pub client_id: Option<String>,
    pub auth_flow_graph_id: String,
    pub registration_flow_graph_id: String,
    pub is_registration_flow_enabled: bool,
    pub logo_url: Option<String>,
}

impl From<&Application> for BasicApplication {
    fn from(app: &Application) -> Self {
        Self {
            id: app.id.clone(),
            name: app.name.clone(),
            description: app.description.clone(),
            client_id: app.client_id().map(str::to_string),
            auth_flow_graph_id: app.auth_flow_graph_id.clone(),
            registration_flow_graph_id: app.registration_flow_graph_id.clone(),
            is_registration_flow_enabled: app.is_registration_flow_enabled,
            logo_url: app.logo_url.clone(),
        }
    }
}

/// Result of a list operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationList {
    pub total_results: usize,
    pub count: usize,
    pub applications: Vec<BasicApplication>,
}

/// Offset pagination for list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

/// Deterministic one-way thumbprint of a client secret.
pub fn secret_thumbprint(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    BASE64_URL_SAFE_NO_PAD.encode(hasher.finalize())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
