//! Token configuration cascade: OAuth override, then application root, then
//! deployment default. Each field resolves independently.

use crate::registry::types::*;
use std::collections::BTreeMap;

/// Deployment-wide token defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDefaults {
    pub issuer: String,
    pub validity_period: i64,
}

pub(crate) fn resolve_root_token(
    request: Option<&TokenConfigRequest>,
    defaults: &TokenDefaults,
) -> TokenConfig {
    let request = request.cloned().unwrap_or_default();
    TokenConfig {
        issuer: request
            .issuer
            .filter(|issuer| !issuer.is_empty())
            .unwrap_or_else(|| defaults.issuer.clone()),
        validity_period: request
            .validity_period
            .filter(|period| *period > 0)
            .unwrap_or(defaults.validity_period),
        user_attributes: request.user_attributes.unwrap_or_default(),
    }
}

pub(crate) fn resolve_oauth_token(
    request: Option<&OAuthTokenRequest>,
    root: &TokenConfig,
) -> OAuthTokenConfig {
    let request = request.cloned().unwrap_or_default();
    let access = request.access_token.unwrap_or_default();
    let id = request.id_token.unwrap_or_default();

    OAuthTokenConfig {
        issuer: request
            .issuer
            .filter(|issuer| !issuer.is_empty())
            .unwrap_or_else(|| root.issuer.clone()),
        access_token: AccessTokenConfig {
            validity_period: positive_or(access.validity_period, root.validity_period),
            user_attributes: access
                .user_attributes
                .unwrap_or_else(|| root.user_attributes.clone()),
        },
        id_token: IdTokenConfig {
            validity_period: positive_or(id.validity_period, root.validity_period),
            user_attributes: id
                .user_attributes
                .unwrap_or_else(|| root.user_attributes.clone()),
            scope_claims: id.scope_claims.unwrap_or_else(BTreeMap::new),
        },
    }
}

fn positive_or(value: Option<i64>, fallback: i64) -> i64 {
    value.filter(|v| *v > 0).unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> TokenDefaults {
        TokenDefaults {
            issuer: "https://issuer.example".to_string(),
            validity_period: 3600,
        }
    }

    #[test]
    fn test_root_falls_back_to_deployment() {
        let root = resolve_root_token(None, &defaults());
        assert_eq!(root.issuer, "https://issuer.example");
        assert_eq!(root.validity_period, 3600);
        assert!(root.user_attributes.is_empty());

        let root = resolve_root_token(
            Some(&TokenConfigRequest {
                issuer: Some(String::new()),
                validity_period: Some(0),
                user_attributes: Some(vec!["email".to_string()]),
            }),
            &defaults(),
        );
        assert_eq!(root.issuer, "https://issuer.example");
        assert_eq!(root.validity_period, 3600);
        assert_eq!(root.user_attributes, vec!["email".to_string()]);
    }

    #[test]
    fn test_oauth_fields_cascade_independently() {
        let root = TokenConfig {
            issuer: "root-issuer".to_string(),
            validity_period: 600,
            user_attributes: vec!["email".to_string()],
        };
        let oauth = resolve_oauth_token(
            Some(&OAuthTokenRequest {
                issuer: None,
                access_token: Some(AccessTokenRequest {
                    validity_period: Some(120),
                    user_attributes: None,
                }),
                id_token: Some(IdTokenRequest {
                    validity_period: None,
                    user_attributes: Some(vec![]),
                    scope_claims: None,
                }),
            }),
            &root,
        );

        assert_eq!(oauth.issuer, "root-issuer");
        assert_eq!(oauth.access_token.validity_period, 120);
        assert_eq!(oauth.access_token.user_attributes, vec!["email".to_string()]);
        assert_eq!(oauth.id_token.validity_period, 600);
        assert!(oauth.id_token.user_attributes.is_empty());
        assert!(oauth.id_token.scope_claims.is_empty());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let request = OAuthTokenRequest {
            issuer: Some("oauth-issuer".to_string()),
            ..Default::default()
        };
        let root = resolve_root_token(None, &defaults());
        assert_eq!(
            resolve_oauth_token(Some(&request), &root),
            resolve_oauth_token(Some(&request), &root)
        );
    }
}
