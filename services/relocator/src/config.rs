//! Run parameters.
//!
//! A run is configured from a flat string map, as handed over by the caller
//! that schedules it. Every key is validated once, before any network call.

use std::collections::HashMap;

use relo_placement::{ClusterSelector, DigAnchor};
use serde::{Deserialize, Serialize};

use crate::error::{RelocationError, Result};
use crate::steps::StepPolicyOverride;

pub const ORCHESTRATOR_ENDPOINT: &str = "emcoOrchEndpoint";
pub const PROJECT: &str = "project";
pub const COMPOSITE_APP: &str = "compositeApp";
pub const COMPOSITE_APP_VERSION: &str = "compositeAppVersion";
pub const DEPLOYMENT_INTENT_GROUP: &str = "deploymentIntentGroup";
pub const TARGET_CLUSTER_PROVIDER: &str = "targetClusterProvider";
pub const TARGET_CLUSTER_NAME: &str = "targetClusterName";
pub const TARGET_CLUSTER_LABEL: &str = "targetClusterLabel";
pub const TARGET_APP_NAME: &str = "targetAppName";
pub const CLUSTER_MANAGER_ENDPOINT: &str = "emcoClmEndpoint";
pub const STATUS_ENDPOINT: &str = "emcoOrchStatusEndpoint";

const REQUIRED: [&str; 9] = [
    ORCHESTRATOR_ENDPOINT,
    PROJECT,
    COMPOSITE_APP,
    COMPOSITE_APP_VERSION,
    DEPLOYMENT_INTENT_GROUP,
    TARGET_CLUSTER_PROVIDER,
    TARGET_APP_NAME,
    CLUSTER_MANAGER_ENDPOINT,
    STATUS_ENDPOINT,
];

/// Validated parameters of one relocation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelocationConfig {
    /// Orchestrator REST base, with scheme and without trailing slash.
    pub orchestrator_url: String,

    /// The deployment unit holding the application.
    pub anchor: DigAnchor,

    /// Where the application moves to.
    pub target: ClusterSelector,

    pub target_app: String,

    /// Cluster manager REST base.
    pub cluster_manager_url: String,

    /// gRPC status service endpoint.
    pub status_endpoint: String,
}

impl RelocationConfig {
    /// Build from the caller's parameter map.
    ///
    /// Every missing or empty key is reported in one error. The target
    /// needs a cluster name or a cluster label; the name wins when both
    /// are given.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let value = |key: &str| {
            params
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let mut missing: Vec<&str> = REQUIRED
            .into_iter()
            .filter(|&key| value(key).is_none())
            .collect();

        let cluster = value(TARGET_CLUSTER_NAME);
        let label = value(TARGET_CLUSTER_LABEL);
        if cluster.is_none() && label.is_none() {
            missing.push(TARGET_CLUSTER_NAME);
        }

        if !missing.is_empty() {
            return Err(RelocationError::Config(format!(
                "missing parameters: {}",
                missing.join(", ")
            )));
        }

        // Presence was checked above.
        let get = |key: &str| value(key).unwrap_or_default().to_string();

        let anchor = DigAnchor::new(
            get(PROJECT),
            get(COMPOSITE_APP),
            get(COMPOSITE_APP_VERSION),
            get(DEPLOYMENT_INTENT_GROUP),
        )?;

        let provider = get(TARGET_CLUSTER_PROVIDER);
        let target = match (cluster, label) {
            (Some(cluster), _) => ClusterSelector::by_name(provider, cluster),
            (None, Some(label)) => ClusterSelector::by_label(provider, label),
            (None, None) => {
                return Err(RelocationError::Config(format!(
                    "missing parameters: {TARGET_CLUSTER_NAME}"
                )))
            }
        };

        Ok(Self {
            orchestrator_url: normalize_endpoint(&get(ORCHESTRATOR_ENDPOINT)),
            anchor,
            target,
            target_app: get(TARGET_APP_NAME),
            cluster_manager_url: normalize_endpoint(&get(CLUSTER_MANAGER_ENDPOINT)),
            status_endpoint: normalize_endpoint(&get(STATUS_ENDPOINT)),
        })
    }

    /// REST base of the deployment unit.
    pub fn dig_url(&self) -> String {
        format!("{}{}", self.orchestrator_url, self.anchor.rest_path())
    }

    pub fn generic_placement_intents_url(&self) -> String {
        format!("{}/generic-placement-intents", self.dig_url())
    }
}

/// Input file of the `relocator` binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunDocument {
    /// Flat parameter map, see [`RelocationConfig::from_params`].
    pub params: HashMap<String, String>,

    /// Stage policy table, see [`crate::StepPolicies::resolve`].
    #[serde(default)]
    pub stages: HashMap<String, StepPolicyOverride>,
}

impl RunDocument {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| RelocationError::Config(format!("invalid run document: {e}")))
    }
}

/// Prefix `http://` when the endpoint has no scheme; drop trailing slashes.
pub fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    }
}
