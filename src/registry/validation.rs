//! Ordered validation rules for application requests.
//!
//! Rules run in a fixed order and stop at the first failure. Nothing here
//! touches storage, so a rejected request never leaves partial state.

use crate::errors::ApplicationError;
use crate::registry::types::*;
use url::Url;

/// A certificate that passed validation. `kind` is never `CertificateKind::None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSpec {
    pub kind: CertificateKind,
    pub value: String,
}

impl CertificateSpec {
    pub fn to_view(&self) -> ApplicationCertificate {
        ApplicationCertificate {
            kind: self.kind,
            value: self.value.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ValidatedOAuthClient {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<GrantType>,
    pub response_types: Vec<ResponseType>,
    pub token_endpoint_auth_method: TokenEndpointAuthMethod,
    pub pkce_required: bool,
    pub public_client: bool,
    pub scopes: Vec<String>,
    pub token: Option<OAuthTokenRequest>,
    pub certificate: Option<CertificateSpec>,
}

#[derive(Debug, Clone)]
pub(crate) struct ValidatedApplication {
    pub name: String,
    pub description: String,
    pub auth_flow_graph_id: Option<String>,
    pub registration_flow_graph_id: Option<String>,
    pub is_registration_flow_enabled: bool,
    pub branding_id: Option<String>,
    pub url: Option<String>,
    pub logo_url: Option<String>,
    pub tos_uri: Option<String>,
    pub policy_uri: Option<String>,
    pub contacts: Vec<String>,
    pub token: Option<TokenConfigRequest>,
    pub certificate: Option<CertificateSpec>,
    pub oauth: Option<ValidatedOAuthClient>,
}

pub(crate) fn validate_application_request(
    request: &ApplicationRequest,
) -> Result<ValidatedApplication, ApplicationError> {
    if request.name.trim().is_empty() {
        return Err(ApplicationError::InvalidApplicationName);
    }

    let oauth = request
        .inbound_auth_config
        .as_ref()
        .map(validate_inbound_auth_config)
        .transpose()?;

    let certificate = validate_certificate(request.certificate.as_ref())?;

    let url = non_empty(&request.url);
    if let Some(url) = &url {
        if !is_valid_uri(url) {
            return Err(ApplicationError::InvalidApplicationUrl(url.clone()));
        }
    }
    let logo_url = non_empty(&request.logo_url);
    if let Some(logo_url) = &logo_url {
        if !is_valid_uri(logo_url) {
            return Err(ApplicationError::InvalidLogoUrl(logo_url.clone()));
        }
    }

    Ok(ValidatedApplication {
        name: request.name.clone(),
        description: request.description.clone(),
        auth_flow_graph_id: non_empty(&request.auth_flow_graph_id),
        registration_flow_graph_id: non_empty(&request.registration_flow_graph_id),
        is_registration_flow_enabled: request.is_registration_flow_enabled,
        branding_id: non_empty(&request.branding_id),
        url,
        logo_url,
        tos_uri: non_empty(&request.tos_uri),
        policy_uri: non_empty(&request.policy_uri),
        contacts: request.contacts.clone(),
        token: request.token.clone(),
        certificate,
        oauth,
    })
}

fn validate_inbound_auth_config(
    inbound: &InboundAuthRequest,
) -> Result<ValidatedOAuthClient, ApplicationError> {
    if inbound.kind != OAUTH_INBOUND_AUTH_TYPE {
        return Err(ApplicationError::InvalidInboundAuthConfig(format!(
            "unsupported type '{}'",
            inbound.kind
        )));
    }
    let config = inbound.config.as_ref().ok_or_else(|| {
        ApplicationError::InvalidInboundAuthConfig("missing oauth2 configuration".to_string())
    })?;

    // Defaults
    let raw_grant_types = if config.grant_types.is_empty() {
        vec![GrantType::AuthorizationCode.as_str().to_string()]
    } else {
        config.grant_types.clone()
    };
    let wants_authorization_code = raw_grant_types
        .iter()
        .any(|grant_type| grant_type == GrantType::AuthorizationCode.as_str());
    let raw_response_types = if config.response_types.is_empty() && wants_authorization_code {
        vec![ResponseType::Code.as_str().to_string()]
    } else {
        config.response_types.clone()
    };
    let raw_auth_method = config
        .token_endpoint_auth_method
        .clone()
        .filter(|method| !method.is_empty())
        .unwrap_or_else(|| {
            TokenEndpointAuthMethod::ClientSecretBasic
                .as_str()
                .to_string()
        });

    // Redirect URIs
    for uri in &config.redirect_uris {
        validate_redirect_uri(uri)?;
    }
    if wants_authorization_code && config.redirect_uris.is_empty() {
        return Err(ApplicationError::AuthorizationCodeMissingRedirectUri);
    }

    // Grant and response types
    let grant_types = parse_all::<GrantType>(&raw_grant_types)
        .map_err(ApplicationError::InvalidGrantType)?;
    let response_types = parse_all::<ResponseType>(&raw_response_types)
        .map_err(ApplicationError::InvalidResponseType)?;

    let has_authorization_code = grant_types.contains(&GrantType::AuthorizationCode);
    let has_client_credentials = grant_types.contains(&GrantType::ClientCredentials);
    if has_client_credentials && !has_authorization_code && !response_types.is_empty() {
        return Err(ApplicationError::ClientCredentialsWithResponseTypes);
    }
    if has_authorization_code && !response_types.contains(&ResponseType::Code) {
        return Err(ApplicationError::AuthorizationCodeMissingCodeResponseType);
    }

    // Token endpoint auth method
    let token_endpoint_auth_method = raw_auth_method
        .parse::<TokenEndpointAuthMethod>()
        .map_err(ApplicationError::InvalidTokenEndpointAuthMethod)?;
    if has_client_credentials && token_endpoint_auth_method == TokenEndpointAuthMethod::None {
        return Err(ApplicationError::ClientCredentialsWithNoneAuth);
    }

    let certificate = resolve_oauth_certificate(config)?;

    let client_secret = non_empty(&config.client_secret);
    if config.public_client {
        if token_endpoint_auth_method != TokenEndpointAuthMethod::None {
            return Err(ApplicationError::PublicClientInvalidAuthMethod);
        }
        if has_client_credentials {
            return Err(ApplicationError::PublicClientInvalidGrantType);
        }
        if client_secret.is_some() {
            return Err(ApplicationError::PublicClientHasSecret);
        }
    }

    Ok(ValidatedOAuthClient {
        client_id: non_empty(&config.client_id),
        client_secret,
        redirect_uris: config.redirect_uris.clone(),
        grant_types,
        response_types,
        token_endpoint_auth_method,
        pkce_required: config.pkce_required,
        public_client: config.public_client,
        scopes: config.scopes.clone(),
        token: config.token.clone(),
        certificate,
    })
}

/// Normalize the OAuth client certificate. The nested `certificate` field is
/// authoritative; the flat `jwks`/`jwks_uri` fields are folded into it.
fn resolve_oauth_certificate(
    config: &OAuthClientRequest,
) -> Result<Option<CertificateSpec>, ApplicationError> {
    let jwks = non_empty(&config.jwks);
    let jwks_uri = non_empty(&config.jwks_uri);
    if jwks.is_some() && jwks_uri.is_some() {
        return Err(ApplicationError::JwksConfigurationConflict);
    }

    let flat = match (jwks, jwks_uri) {
        (Some(value), None) => Some(CertificateInput {
            kind: CertificateKind::Jwks.as_str().to_string(),
            value,
        }),
        (None, Some(value)) => Some(CertificateInput {
            kind: CertificateKind::JwksUri.as_str().to_string(),
            value,
        }),
        _ => None,
    };
    let nested = config
        .certificate
        .as_ref()
        .filter(|certificate| !is_none_kind(&certificate.kind));

    match (flat, nested) {
        (Some(_), Some(_)) => Err(ApplicationError::JwksConfigurationConflict),
        (Some(flat), None) => validate_certificate(Some(&flat)),
        (None, nested) => validate_certificate(nested),
    }
}

/// Validate a submitted certificate. Absent or `NONE` means no certificate.
pub(crate) fn validate_certificate(
    input: Option<&CertificateInput>,
) -> Result<Option<CertificateSpec>, ApplicationError> {
    let Some(input) = input else {
        return Ok(None);
    };
    if is_none_kind(&input.kind) {
        return Ok(None);
    }

    let kind = match input.kind.trim().to_ascii_uppercase().as_str() {
        "JWKS" => CertificateKind::Jwks,
        "JWKS_URI" => CertificateKind::JwksUri,
        _ => return Err(ApplicationError::InvalidCertificateType(input.kind.clone())),
    };
    let value = input.value.trim();
    if value.is_empty() {
        return Err(ApplicationError::InvalidCertificateValue);
    }
    if kind == CertificateKind::JwksUri {
        if !value.starts_with("https://") {
            return Err(ApplicationError::JwksUriNotHttps);
        }
        if !is_valid_uri(value) {
            return Err(ApplicationError::InvalidJwksUri(value.to_string()));
        }
    }

    Ok(Some(CertificateSpec {
        kind,
        value: value.to_string(),
    }))
}

fn validate_redirect_uri(uri: &str) -> Result<(), ApplicationError> {
    let parsed = Url::parse(uri)
        .map_err(|e| ApplicationError::InvalidRedirectUri(format!("{}: {}", uri, e)))?;
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(ApplicationError::InvalidRedirectUri(format!(
            "{}: missing host",
            uri
        )));
    }
    if parsed.fragment().is_some() {
        return Err(ApplicationError::RedirectUriWithFragment(uri.to_string()));
    }
    Ok(())
}

fn parse_all<T>(values: &[String]) -> Result<Vec<T>, String>
where
    T: std::str::FromStr<Err = String> + PartialEq,
{
    let mut parsed: Vec<T> = Vec::with_capacity(values.len());
    for value in values {
        let item = value.parse::<T>()?;
        if !parsed.contains(&item) {
            parsed.push(item);
        }
    }
    Ok(parsed)
}

fn is_none_kind(kind: &str) -> bool {
    let kind = kind.trim();
    kind.is_empty() || kind.eq_ignore_ascii_case("none")
}

fn is_valid_uri(value: &str) -> bool {
    Url::parse(value)
        .map(|parsed| parsed.host_str().is_some_and(|host| !host.is_empty()))
        .unwrap_or(false)
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
