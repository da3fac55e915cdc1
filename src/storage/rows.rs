//! Row shapes shared by the SQL backends.
//!
//! Scalar application columns live in `applications`; URLs, contacts and the
//! root token settings are packed into `app_json`. The OAuth client lives in
//! `oauth_clients` with its settings packed into `oauth_config_json`.

use crate::errors::StorageError;
use crate::registry::types::{
    Application, GrantType, InboundAuthConfig, OAuthClientConfig, OAuthTokenConfig, ResponseType,
    TokenConfig, TokenEndpointAuthMethod,
};
use crate::storage::traits::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AppJson {
    pub url: Option<String>,
    pub logo_url: Option<String>,
    pub tos_uri: Option<String>,
    pub policy_uri: Option<String>,
    #[serde(default)]
    pub contacts: Vec<String>,
    pub token: TokenConfig,
}

impl AppJson {
    pub fn from_application(application: &Application) -> Self {
        Self {
            url: application.url.clone(),
            logo_url: application.logo_url.clone(),
            tos_uri: application.tos_uri.clone(),
            policy_uri: application.policy_uri.clone(),
            contacts: application.contacts.clone(),
            token: application.token.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct OAuthConfigJson {
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

impl OAuthConfigJson {
    pub fn from_client(client: &OAuthClientConfig) -> Self {
        Self {
            redirect_uris: client.redirect_uris.clone(),
            grant_types: client.grant_types.clone(),
            response_types: client.response_types.clone(),
            token_endpoint_auth_method: client.token_endpoint_auth_method,
            pkce_required: client.pkce_required,
            public_client: client.public_client,
            token: client.token.clone(),
            scopes: client.scopes.clone(),
        }
    }

    pub fn into_client(
        self,
        app_id: String,
        client_id: String,
        hashed_client_secret: Option<String>,
    ) -> OAuthClientConfig {
        OAuthClientConfig {
            app_id,
            client_id,
            hashed_client_secret,
            redirect_uris: self.redirect_uris,
            grant_types: self.grant_types,
            response_types: self.response_types,
            token_endpoint_auth_method: self.token_endpoint_auth_method,
            pkce_required: self.pkce_required,
            public_client: self.public_client,
            token: self.token,
            scopes: self.scopes,
        }
    }
}

/// OAuth columns of a joined application row
pub(crate) struct OAuthColumns {
    pub client_id: String,
    pub consumer_secret: Option<String>,
    pub config: OAuthConfigJson,
}

/// Decoded columns of an application row joined with its OAuth client
pub(crate) struct ApplicationRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub auth_flow_graph_id: String,
    pub registration_flow_graph_id: String,
    pub is_registration_flow_enabled: bool,
    pub branding_id: Option<String>,
    pub app_json: AppJson,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub oauth: Option<OAuthColumns>,
}

impl ApplicationRow {
    pub fn into_application(self) -> Application {
        let inbound_auth_config = self.oauth.map(|oauth| {
            InboundAuthConfig::OAuth(oauth.config.into_client(
                self.id.clone(),
                oauth.client_id,
                oauth.consumer_secret,
            ))
        });

        Application {
            id: self.id,
            name: self.name,
            description: self.description,
            auth_flow_graph_id: self.auth_flow_graph_id,
            registration_flow_graph_id: self.registration_flow_graph_id,
            is_registration_flow_enabled: self.is_registration_flow_enabled,
            branding_id: self.branding_id,
            url: self.app_json.url,
            logo_url: self.app_json.logo_url,
            tos_uri: self.app_json.tos_uri,
            policy_uri: self.app_json.policy_uri,
            contacts: self.app_json.contacts,
            token: self.app_json.token,
            inbound_auth_config,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Map a failed write, turning unique index violations into the matching
/// duplicate error.
pub(crate) fn map_write_error(error: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db_error) = &error {
        if db_error.is_unique_violation() {
            let detail = db_error
                .constraint()
                .map(str::to_string)
                .unwrap_or_else(|| db_error.message().to_string());
            if detail.contains("app_name") {
                return StorageError::DuplicateName(detail);
            }
            if detail.contains("oauth_clients") {
                return StorageError::DuplicateClientId(detail);
            }
        }
    }
    StorageError::DatabaseError(error.to_string())
}

#[cfg(feature = "sqlite")]
pub(crate) fn to_json_string<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| StorageError::SerializationFailed(e.to_string()))
}

#[cfg(feature = "sqlite")]
pub(crate) fn from_json_str<T: for<'de> Deserialize<'de>>(json: &str) -> Result<T> {
    serde_json::from_str(json).map_err(|e| StorageError::SerializationFailed(e.to_string()))
}

#[cfg(feature = "postgres")]
pub(crate) fn to_json_value<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| StorageError::SerializationFailed(e.to_string()))
}

#[cfg(feature = "postgres")]
pub(crate) fn from_json_value<T: for<'de> Deserialize<'de>>(value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| StorageError::SerializationFailed(e.to_string()))
}
