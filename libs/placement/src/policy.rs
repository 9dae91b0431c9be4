//! Placement policy and app intent wire model.
//!
//! Field names follow the orchestrator's JSON (`clusterProvider`, `cluster`,
//! `clusterLabel`, `allOf`, `anyOf`). How `allOf` and `anyOf` combine is
//! owned by the orchestrator; this crate only appends and filters entries.

use serde::{Deserialize, Serialize};

use crate::phase::Phase;

/// One candidate cluster placement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterSelector {
    #[serde(rename = "clusterProvider", default)]
    pub provider: String,

    #[serde(rename = "cluster", default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,

    #[serde(rename = "clusterLabel", default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Fields this crate does not interpret (nested `anyOf`, annotations),
    /// carried through unchanged.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ClusterSelector {
    /// Selector for a concrete cluster.
    pub fn by_name(provider: impl Into<String>, cluster: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            cluster: Some(cluster.into()),
            ..Self::default()
        }
    }

    /// Selector for every cluster carrying a label.
    pub fn by_label(provider: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            label: Some(label.into()),
            ..Self::default()
        }
    }

    /// Cluster name, if set and non-empty.
    pub fn cluster_name(&self) -> Option<&str> {
        self.cluster.as_deref().filter(|c| !c.is_empty())
    }

    /// Cluster label, if set and non-empty.
    pub fn cluster_label(&self) -> Option<&str> {
        self.label.as_deref().filter(|l| !l.is_empty())
    }

    /// Same provider and the same non-empty cluster name.
    pub fn names_same_cluster(&self, other: &ClusterSelector) -> bool {
        self.provider == other.provider
            && matches!(
                (self.cluster_name(), other.cluster_name()),
                (Some(a), Some(b)) if a == b
            )
    }
}

/// Placement policy of one application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlacementPolicy {
    #[serde(rename = "allOf", default, skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<ClusterSelector>,

    #[serde(rename = "anyOf", default, skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<ClusterSelector>,
}

impl PlacementPolicy {
    /// Policy holding only `target` in each array.
    pub fn seeded(target: &ClusterSelector) -> Self {
        Self {
            all_of: vec![target.clone()],
            any_of: vec![target.clone()],
        }
    }
}

/// Orchestrator resource metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "userData1", default, skip_serializing_if = "Option::is_none")]
    pub user_data1: Option<String>,

    #[serde(rename = "userData2", default, skip_serializing_if = "Option::is_none")]
    pub user_data2: Option<String>,
}

impl Metadata {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A generic placement intent; only its name is used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenericPlacementIntent {
    #[serde(default)]
    pub metadata: Metadata,
}

/// Placement policy of one application within a generic placement intent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppIntent {
    #[serde(default)]
    pub metadata: Metadata,

    #[serde(default)]
    pub spec: AppIntentSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppIntentSpec {
    #[serde(default)]
    pub app: String,

    #[serde(default)]
    pub intent: PlacementPolicy,
}

/// Relocation bookkeeping for one application found under a generic
/// placement intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppPlacementRecord {
    pub application_name: String,
    pub app_intent_name: String,
    pub phase: Phase,

    /// Policy as fetched, before any relocation pass.
    pub primary_policy: PlacementPolicy,

    /// Output of the latest merge pass, waiting to be committed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planned_policy: Option<PlacementPolicy>,
}

impl AppPlacementRecord {
    /// Start tracking an app intent in the apply phase.
    pub fn from_app_intent(intent: AppIntent) -> Self {
        Self {
            application_name: intent.spec.app,
            app_intent_name: intent.metadata.name,
            phase: Phase::Apply,
            primary_policy: intent.spec.intent,
            planned_policy: None,
        }
    }

    /// The app intent body to write for `policy`.
    pub fn app_intent(&self, policy: &PlacementPolicy) -> AppIntent {
        AppIntent {
            metadata: Metadata::named(&self.app_intent_name),
            spec: AppIntentSpec {
                app: self.application_name.clone(),
                intent: policy.clone(),
            },
        }
    }
}
