//! Fixtures shared by the storage tests

use crate::registry::types::{
    AccessTokenConfig, Application, GrantType, IdTokenConfig, InboundAuthConfig,
    OAuthClientConfig, OAuthTokenConfig, ResponseType, TokenConfig, TokenEndpointAuthMethod,
    secret_thumbprint,
};
use chrono::Utc;
use std::collections::BTreeMap;

pub(crate) fn application(id: &str, name: &str) -> Application {
    let now = Utc::now();
    Application {
        id: id.to_string(),
        name: name.to_string(),
        description: String::new(),
        auth_flow_graph_id: "auth_flow_config_basic".to_string(),
        registration_flow_graph_id: "registration_flow_config_basic".to_string(),
        is_registration_flow_enabled: false,
        branding_id: None,
        url: Some("https://app.example.com".to_string()),
        logo_url: None,
        tos_uri: None,
        policy_uri: None,
        contacts: vec!["admin@example.com".to_string()],
        token: TokenConfig {
            issuer: "appreg".to_string(),
            validity_period: 3600,
            user_attributes: vec![],
        },
        inbound_auth_config: None,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn oauth_application(id: &str, name: &str, client_id: &str) -> Application {
    let mut app = application(id, name);
    app.inbound_auth_config = Some(InboundAuthConfig::OAuth(OAuthClientConfig {
        app_id: id.to_string(),
        client_id: client_id.to_string(),
        hashed_client_secret: Some(secret_thumbprint("secret")),
        redirect_uris: vec!["https://app.example.com/callback".to_string()],
        grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
        response_types: vec![ResponseType::Code],
        token_endpoint_auth_method: TokenEndpointAuthMethod::ClientSecretBasic,
        pkce_required: false,
        public_client: false,
        token: OAuthTokenConfig {
            issuer: "appreg".to_string(),
            access_token: AccessTokenConfig {
                validity_period: 3600,
                user_attributes: vec!["email".to_string()],
            },
            id_token: IdTokenConfig {
                validity_period: 3600,
                user_attributes: vec![],
                scope_claims: BTreeMap::new(),
            },
        },
        scopes: vec!["openid".to_string()],
    }));
    app
}
