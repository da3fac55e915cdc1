//! Flow graph registry seam and flow id resolution.

use crate::errors::ApplicationError;
use async_trait::async_trait;
use std::collections::HashSet;

/// Answers whether a flow graph id exists
#[async_trait]
pub trait FlowRegistry: Send + Sync {
    async fn is_valid_graph_id(&self, graph_id: &str) -> bool;
}

/// Flow registry backed by a fixed set of graph ids
#[derive(Debug, Default, Clone)]
pub struct StaticFlowRegistry {
    graph_ids: HashSet<String>,
}

impl StaticFlowRegistry {
    pub fn new<I, S>(graph_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            graph_ids: graph_ids.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl FlowRegistry for StaticFlowRegistry {
    async fn is_valid_graph_id(&self, graph_id: &str) -> bool {
        self.graph_ids.contains(graph_id)
    }
}

/// Flow id defaults and prefixes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSettings {
    pub default_auth_flow_graph_id: String,
    pub auth_flow_graph_prefix: String,
    pub registration_flow_graph_prefix: String,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            default_auth_flow_graph_id: "auth_flow_config_basic".to_string(),
            auth_flow_graph_prefix: "auth_flow_config_".to_string(),
            registration_flow_graph_prefix: "registration_flow_config_".to_string(),
        }
    }
}

impl FlowSettings {
    /// Registration flow id derived from an auth flow id by prefix substitution
    pub fn derive_registration_flow_graph_id(&self, auth_flow_graph_id: &str) -> Option<String> {
        auth_flow_graph_id
            .strip_prefix(&self.auth_flow_graph_prefix)
            .map(|suffix| format!("{}{}", self.registration_flow_graph_prefix, suffix))
    }
}

/// Resolve the auth and registration flow graph ids of an application.
pub(crate) async fn resolve_flow_graph_ids(
    registry: &dyn FlowRegistry,
    settings: &FlowSettings,
    auth_flow_graph_id: Option<&str>,
    registration_flow_graph_id: Option<&str>,
) -> Result<(String, String), ApplicationError> {
    let auth_flow_graph_id = match auth_flow_graph_id {
        Some(graph_id) => {
            if !registry.is_valid_graph_id(graph_id).await {
                return Err(ApplicationError::InvalidAuthFlowGraphId(
                    graph_id.to_string(),
                ));
            }
            graph_id.to_string()
        }
        None => settings.default_auth_flow_graph_id.clone(),
    };

    let registration_flow_graph_id = match registration_flow_graph_id {
        Some(graph_id) => {
            if !registry.is_valid_graph_id(graph_id).await {
                return Err(ApplicationError::InvalidRegistrationFlowGraphId(
                    graph_id.to_string(),
                ));
            }
            graph_id.to_string()
        }
        None => settings
            .derive_registration_flow_graph_id(&auth_flow_graph_id)
            .ok_or_else(|| {
                ApplicationError::InvalidRegistrationFlowGraphId(auth_flow_graph_id.clone())
            })?,
    };

    Ok((auth_flow_graph_id, registration_flow_graph_id))
}
