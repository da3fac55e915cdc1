//! Environment-based configuration for the registry and its backends.

use anyhow::Result;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::registry::{FlowSettings, RegistrySettings, TokenDefaults};

/// Time-to-live of cache entries
#[derive(Clone, Debug)]
pub struct CacheTtl(Duration);

/// Capacity of each in-memory cache index
#[derive(Clone, Debug)]
pub struct CacheMaxEntries(usize);

/// Whether applications come from declarative files
#[derive(Clone, Debug)]
pub struct ImmutableResourcesEnabled(bool);

/// Flow graph ids known to the static flow registry
#[derive(Clone, Debug, Default)]
pub struct FlowGraphIds(Vec<String>);

/// Deployment default token validity period
#[derive(Clone, Debug)]
pub struct TokenValidityPeriod(Duration);

/// Main application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub version: String,
    pub deployment_id: String,
    pub storage_backend: String,
    pub database_url: Option<String>,
    pub cache_backend: String,
    pub redis_url: Option<String>,
    pub cache_ttl: CacheTtl,
    pub cache_max_entries: CacheMaxEntries,
    pub immutable_resources_enabled: ImmutableResourcesEnabled,
    pub immutable_resources_path: String,
    pub default_auth_flow_graph_id: String,
    pub auth_flow_graph_prefix: String,
    pub registration_flow_graph_prefix: String,
    pub flow_graph_ids: FlowGraphIds,
    pub token_issuer: String,
    pub token_validity_period: TokenValidityPeriod,
}

impl Config {
    /// Create a new configuration from environment variables
    pub fn new() -> Result<Self> {
        let deployment_id = default_env("DEPLOYMENT_ID", "default");
        let storage_backend = default_env("STORAGE_BACKEND", "memory");
        let database_url = optional_env("DATABASE_URL");
        let cache_backend = default_env("CACHE_BACKEND", "memory");
        let redis_url = optional_env("REDIS_URL");
        let cache_ttl: CacheTtl = default_env("CACHE_TTL", "15m").try_into()?;
        let cache_max_entries: CacheMaxEntries =
            default_env("CACHE_MAX_ENTRIES", "1000").try_into()?;
        let immutable_resources_enabled: ImmutableResourcesEnabled =
            default_env("IMMUTABLE_RESOURCES_ENABLED", "false").try_into()?;
        let immutable_resources_path = default_env("IMMUTABLE_RESOURCES_PATH", "./resources");
        let default_auth_flow_graph_id =
            default_env("DEFAULT_AUTH_FLOW_GRAPH_ID", "auth_flow_config_basic");
        let auth_flow_graph_prefix = default_env("AUTH_FLOW_GRAPH_PREFIX", "auth_flow_config_");
        let registration_flow_graph_prefix =
            default_env("REGISTRATION_FLOW_GRAPH_PREFIX", "registration_flow_config_");
        let flow_graph_ids: FlowGraphIds = optional_env("FLOW_GRAPH_IDS").try_into()?;
        let token_issuer = default_env("TOKEN_ISSUER", "appreg");
        let token_validity_period: TokenValidityPeriod =
            default_env("TOKEN_VALIDITY_PERIOD", "1h").try_into()?;

        let mut config = Self {
            version: version()?,
            deployment_id,
            storage_backend,
            database_url,
            cache_backend,
            redis_url,
            cache_ttl,
            cache_max_entries,
            immutable_resources_enabled,
            immutable_resources_path,
            default_auth_flow_graph_id,
            auth_flow_graph_prefix,
            registration_flow_graph_prefix,
            flow_graph_ids,
            token_issuer,
            token_validity_period,
        };

        if config.flow_graph_ids.0.is_empty() {
            config.flow_graph_ids = FlowGraphIds::defaults(&config.flow_settings());
        }

        Ok(config)
    }

    pub fn flow_settings(&self) -> FlowSettings {
        FlowSettings {
            default_auth_flow_graph_id: self.default_auth_flow_graph_id.clone(),
            auth_flow_graph_prefix: self.auth_flow_graph_prefix.clone(),
            registration_flow_graph_prefix: self.registration_flow_graph_prefix.clone(),
        }
    }

    pub fn registry_settings(&self) -> RegistrySettings {
        RegistrySettings {
            flows: self.flow_settings(),
            token_defaults: TokenDefaults {
                issuer: self.token_issuer.clone(),
                validity_period: self.token_validity_period.as_seconds(),
            },
        }
    }
}

/// Get application version from build environment
pub fn version() -> Result<String> {
    option_env!("GIT_HASH")
        .or(option_env!("CARGO_PKG_VERSION"))
        .map(|val| val.to_string())
        .ok_or(ConfigError::VersionNotSet.into())
}

pub(crate) fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn default_env(name: &str, default_value: &str) -> String {
    optional_env(name).unwrap_or_else(|| default_value.to_string())
}

fn parse_duration(value: String) -> Result<Duration, ConfigError> {
    duration_str::parse(&value)
        .map_err(|e| ConfigError::DurationParsingFailed(value, e.to_string()))
}

impl TryFrom<String> for CacheTtl {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(Self(parse_duration(value)?))
    }
}

impl AsRef<Duration> for CacheTtl {
    fn as_ref(&self) -> &Duration {
        &self.0
    }
}

impl TryFrom<String> for CacheMaxEntries {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value
            .trim()
            .parse::<usize>()
            .map(Self)
            .map_err(|err| ConfigError::NumberParsingFailed(value, err).into())
    }
}

impl AsRef<usize> for CacheMaxEntries {
    fn as_ref(&self) -> &usize {
        &self.0
    }
}

impl TryFrom<String> for ImmutableResourcesEnabled {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Self(true)),
            "false" | "0" | "no" | "off" => Ok(Self(false)),
            _ => Err(ConfigError::BoolParsingFailed(value).into()),
        }
    }
}

impl AsRef<bool> for ImmutableResourcesEnabled {
    fn as_ref(&self) -> &bool {
        &self.0
    }
}

impl FlowGraphIds {
    /// The default auth flow and the registration flow derived from it
    pub fn defaults(settings: &FlowSettings) -> Self {
        let mut ids = vec![settings.default_auth_flow_graph_id.clone()];
        if let Some(registration) =
            settings.derive_registration_flow_graph_id(&settings.default_auth_flow_graph_id)
        {
            ids.push(registration);
        }
        Self(ids)
    }
}

impl TryFrom<Option<String>> for FlowGraphIds {
    type Error = anyhow::Error;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        let value = value.unwrap_or_default();
        Ok(Self(
            value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        ))
    }
}

impl AsRef<Vec<String>> for FlowGraphIds {
    fn as_ref(&self) -> &Vec<String> {
        &self.0
    }
}

impl TokenValidityPeriod {
    pub fn as_seconds(&self) -> i64 {
        i64::try_from(self.0.as_secs()).unwrap_or(i64::MAX)
    }
}

impl TryFrom<String> for TokenValidityPeriod {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(Self(parse_duration(value)?))
    }
}

impl AsRef<Duration> for TokenValidityPeriod {
    fn as_ref(&self) -> &Duration {
        &self.0
    }
}
