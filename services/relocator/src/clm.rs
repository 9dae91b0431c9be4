//! Cluster manager client.

use async_trait::async_trait;
use relo_placement::MembershipResolver;
use tracing::{debug, warn};

use crate::error::Result;
use crate::http;

/// Reads cluster label membership from the cluster manager.
#[derive(Debug, Clone)]
pub struct ClusterManagerClient {
    client: reqwest::Client,
    base_url: String,
}

impl ClusterManagerClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: http::build_client()?,
            base_url: base_url.into(),
        })
    }

    /// Names of the clusters of `provider` carrying `label`.
    pub async fn clusters_with_label(&self, provider: &str, label: &str) -> Result<Vec<String>> {
        let url = format!("{}/v2/cluster-providers/{}/clusters", self.base_url, provider);
        let url = reqwest::Url::parse_with_params(&url, &[("label", label)])
            .map(String::from)
            .unwrap_or_else(|_| format!("{url}?label={label}"));

        let clusters: Vec<String> = http::get_json(&self.client, &url).await?;
        debug!(provider = %provider, label = %label, count = clusters.len(), "Resolved cluster label");
        Ok(clusters)
    }
}

#[async_trait]
impl MembershipResolver for ClusterManagerClient {
    async fn members(&self, provider: &str, label: &str) -> Vec<String> {
        match self.clusters_with_label(provider, label).await {
            Ok(clusters) => clusters,
            Err(e) => {
                warn!(
                    provider = %provider,
                    label = %label,
                    error = %e,
                    "Cluster label lookup failed, treating label as empty"
                );
                Vec::new()
            }
        }
    }
}
