//! Relocation run state and the stage operations acting on it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use relo_placement::{reconcile, MembershipResolver, Phase};
use relo_proto::GrpcStatusSource;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::client::{ActionOutcome, DeploymentUnitClient, DigAction};
use crate::clm::ClusterManagerClient;
use crate::config::RelocationConfig;
use crate::error::{RelocationError, Result};
use crate::gate::{GateOutcome, ReadinessGate};
use crate::intents::{self, Placements};

/// Everything one relocation accumulates between stages.
///
/// Serializable so a scheduler can snapshot it between steps; the rollout
/// lock is not part of the snapshot and is fresh after a restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelocationRun {
    pub config: RelocationConfig,
    pub started_at: DateTime<Utc>,

    /// Generic placement intents URL, known once fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intents_url: Option<String>,

    #[serde(default)]
    pub placements: Placements,

    #[serde(skip)]
    rollout_lock: Arc<Mutex<()>>,
}

impl RelocationRun {
    pub fn new(config: RelocationConfig) -> Self {
        Self {
            config,
            started_at: Utc::now(),
            intents_url: None,
            placements: Placements::new(),
            rollout_lock: Arc::default(),
        }
    }

    /// Serializes access to the deployment unit's lifecycle actions.
    pub fn rollout_lock(&self) -> &Mutex<()> {
        &self.rollout_lock
    }

    pub fn snapshot(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(RelocationError::Snapshot)
    }

    /// Decode a snapshot taken with [`RelocationRun::snapshot`].
    ///
    /// A record phase other than 0 or 1 is reported as
    /// [`RelocationError::Phase`].
    pub fn restore(bytes: &[u8]) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(RelocationError::Snapshot)?;
        check_phases(&value)?;
        serde_json::from_value(value).map_err(RelocationError::Snapshot)
    }
}

fn check_phases(snapshot: &serde_json::Value) -> Result<()> {
    let Some(placements) = snapshot.get("placements").and_then(|p| p.as_object()) else {
        return Ok(());
    };

    let phases = placements
        .values()
        .filter_map(|records| records.as_array())
        .flatten()
        .filter_map(|record| record.get("phase").and_then(|p| p.as_i64()));

    for phase in phases {
        Phase::try_from(phase)?;
    }
    Ok(())
}

/// Stage operations of a relocation.
///
/// Each operation can be invoked on its own; the [`Sequencer`] only decides
/// the order.
///
/// [`Sequencer`]: crate::Sequencer
#[derive(Clone)]
pub struct Relocator {
    client: DeploymentUnitClient,
    resolver: Arc<dyn MembershipResolver>,
    gate: ReadinessGate,
}

impl Relocator {
    pub fn new(
        client: DeploymentUnitClient,
        resolver: Arc<dyn MembershipResolver>,
        gate: ReadinessGate,
    ) -> Self {
        Self {
            client,
            resolver,
            gate,
        }
    }

    /// Wire the orchestrator, cluster manager and status service named by
    /// `config`.
    pub fn from_config(config: &RelocationConfig) -> Result<Self> {
        let client = DeploymentUnitClient::new(config)?;
        let resolver = Arc::new(ClusterManagerClient::new(&config.cluster_manager_url)?);
        let gate = ReadinessGate::new(Arc::new(GrpcStatusSource::new(&config.status_endpoint)));
        Ok(Self::new(client, resolver, gate))
    }

    pub fn with_gate(mut self, gate: ReadinessGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_gate_retry_delay(mut self, delay: Duration) -> Self {
        self.gate = self.gate.with_retry_delay(delay);
        self
    }

    pub fn client(&self) -> &DeploymentUnitClient {
        &self.client
    }

    /// Read the application's placement. Read-only on the orchestrator.
    pub async fn fetch(&self, run: &mut RelocationRun) -> Result<()> {
        let (url, placements) =
            intents::fetch_placement(&self.client, &run.config.target_app).await?;
        run.intents_url = Some(url);
        run.placements = placements;
        Ok(())
    }

    /// Run one merge pass over every record.
    ///
    /// The run is only updated once every record has been merged.
    pub async fn merge(&self, run: &mut RelocationRun) -> Result<()> {
        if run.placements.is_empty() {
            return Err(RelocationError::NotFound {
                app: run.config.target_app.clone(),
            });
        }

        let mut placements = run.placements.clone();
        for (intent, records) in placements.iter_mut() {
            for record in records.iter_mut() {
                let (policy, next) = reconcile(
                    record.phase,
                    &record.primary_policy,
                    &run.config.target,
                    self.resolver.as_ref(),
                )
                .await;

                info!(
                    intent = %intent,
                    app_intent = %record.app_intent_name,
                    phase = %record.phase,
                    all_of = policy.all_of.len(),
                    any_of = policy.any_of.len(),
                    "Merged placement policy"
                );

                record.planned_policy = Some(policy);
                record.phase = next;
            }
        }

        run.placements = placements;
        Ok(())
    }

    /// Write the planned policies and trigger a rollout.
    pub async fn commit(&self, run: &RelocationRun) -> Result<()> {
        let url = run
            .intents_url
            .as_deref()
            .ok_or_else(|| RelocationError::NotFound {
                app: run.config.target_app.clone(),
            })?;

        let _guard = run.rollout_lock().lock().await;
        intents::commit(&self.client, url, &run.placements).await
    }

    /// Block until the application is ready on its target placement.
    pub async fn wait_ready(&self, run: &RelocationRun, cancel: &CancellationToken) -> Result<()> {
        let clusters = self.gate_clusters(&run.config).await;
        let registration =
            ReadinessGate::registration(&run.config.anchor, &run.config.target_app, clusters);

        match self.gate.wait_ready(&registration, cancel).await {
            GateOutcome::Ready => Ok(()),
            GateOutcome::Cancelled => Err(RelocationError::Cancelled),
        }
    }

    /// Submit a lifecycle action once, under the run's rollout lock.
    pub async fn ensure_action(
        &self,
        run: &RelocationRun,
        action: DigAction,
    ) -> Result<ActionOutcome> {
        self.client.ensure_action(run.rollout_lock(), action).await
    }

    /// `provider+cluster` names the gate subscribes to.
    async fn gate_clusters(&self, config: &RelocationConfig) -> Vec<String> {
        let target = &config.target;
        if let Some(cluster) = target.cluster_name() {
            return vec![format!("{}+{}", target.provider, cluster)];
        }

        if let Some(label) = target.cluster_label() {
            let members = self.resolver.members(&target.provider, label).await;
            if !members.is_empty() {
                return members
                    .into_iter()
                    .map(|cluster| format!("{}+{}", target.provider, cluster))
                    .collect();
            }
        }

        vec![format!("{}+", target.provider)]
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use relo_placement::{AppPlacementRecord, ClusterSelector, PlacementPolicy};

    use super::*;

    fn config() -> RelocationConfig {
        let params: HashMap<String, String> = [
            ("emcoOrchEndpoint", "orch:9015"),
            ("project", "proj"),
            ("compositeApp", "ca"),
            ("compositeAppVersion", "v1"),
            ("deploymentIntentGroup", "dig"),
            ("targetClusterProvider", "p1"),
            ("targetClusterName", "c2"),
            ("targetAppName", "web"),
            ("emcoClmEndpoint", "clm:9061"),
            ("emcoOrchStatusEndpoint", "orch:9016"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        RelocationConfig::from_params(&params).unwrap()
    }

    fn record() -> AppPlacementRecord {
        AppPlacementRecord {
            application_name: "web".to_string(),
            app_intent_name: "web-placement".to_string(),
            phase: Phase::Delete,
            primary_policy: PlacementPolicy {
                all_of: vec![ClusterSelector::by_name("p1", "c1")],
                any_of: vec![],
            },
            planned_policy: None,
        }
    }

    #[test]
    fn test_snapshot_restores_run() {
        let mut run = RelocationRun::new(config());
        run.intents_url = Some("http://orch:9015/gpi".to_string());
        run.placements.insert("gpi".to_string(), vec![record()]);

        let restored = RelocationRun::restore(&run.snapshot().unwrap()).unwrap();
        assert_eq!(restored.config, run.config);
        assert_eq!(restored.started_at, run.started_at);
        assert_eq!(restored.intents_url, run.intents_url);
        assert_eq!(restored.placements, run.placements);
    }

    #[test]
    fn test_restore_rejects_bad_phase() {
        let mut run = RelocationRun::new(config());
        run.placements.insert("gpi".to_string(), vec![record()]);

        let mut value = serde_json::to_value(&run).unwrap();
        value["placements"]["gpi"][0]["phase"] = serde_json::json!(3);

        let err = RelocationRun::restore(&serde_json::to_vec(&value).unwrap()).unwrap_err();
        assert!(matches!(err, RelocationError::Phase(phase) if phase.0 == 3));
    }

    #[test]
    fn test_restore_rejects_garbage() {
        let err = RelocationRun::restore(b"not json").unwrap_err();
        assert!(matches!(err, RelocationError::Snapshot(_)));
    }
}
