//! Orchestrator API client for one deployment unit.
//!
//! Provides methods for:
//! - Reading generic placement intents and their app intents
//! - Writing app intents
//! - Lifecycle actions (approve, instantiate, update, terminate) and status

use chrono::{DateTime, Utc};
use relo_placement::{AppIntent, GenericPlacementIntent};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::config::RelocationConfig;
use crate::error::{RelocationError, Result};
use crate::http;

/// A lifecycle action accepted by `POST {dig}/{action}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigAction {
    Approve,
    Instantiate,
    Update,
    Terminate,
}

impl DigAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DigAction::Approve => "approve",
            DigAction::Instantiate => "instantiate",
            DigAction::Update => "update",
            DigAction::Terminate => "terminate",
        }
    }

    /// Whether a deployment unit whose latest recorded state is `state`
    /// needs no further POST of this action.
    ///
    /// An update is never considered reached; every call rolls out again.
    pub fn reached_by(&self, state: &str) -> bool {
        match self {
            DigAction::Approve => matches!(state, "Approved" | "Instantiated"),
            DigAction::Instantiate => state == "Instantiated",
            DigAction::Terminate => state == "Terminated",
            DigAction::Update => false,
        }
    }
}

/// One entry of the deployment unit's action history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigActionRecord {
    pub state: String,

    #[serde(default)]
    pub instance: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub revision: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DigStates {
    #[serde(default)]
    pub actions: Vec<DigActionRecord>,
}

/// Subset of `GET {dig}/status` this client reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigStatus {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub states: DigStates,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_status: Option<String>,
}

impl DigStatus {
    /// State of the most recent action, if any was recorded.
    pub fn latest_state(&self) -> Option<&str> {
        self.states.actions.last().map(|a| a.state.as_str())
    }
}

/// Result of [`DeploymentUnitClient::ensure_action`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The action was posted and accepted.
    Submitted,

    /// The deployment unit was already in the given state.
    AlreadyReached(String),
}

/// Orchestrator REST client scoped to one deployment unit.
#[derive(Debug, Clone)]
pub struct DeploymentUnitClient {
    client: reqwest::Client,
    dig_url: String,
}

impl DeploymentUnitClient {
    pub fn new(config: &RelocationConfig) -> Result<Self> {
        Ok(Self {
            client: http::build_client()?,
            dig_url: config.dig_url(),
        })
    }

    pub fn dig_url(&self) -> &str {
        &self.dig_url
    }

    pub fn generic_placement_intents_url(&self) -> String {
        format!("{}/generic-placement-intents", self.dig_url)
    }

    /// List the deployment unit's generic placement intents.
    pub async fn generic_placement_intents(&self) -> Result<Vec<GenericPlacementIntent>> {
        let intents: Vec<GenericPlacementIntent> =
            http::get_json(&self.client, &self.generic_placement_intents_url()).await?;
        debug!(count = intents.len(), "Fetched generic placement intents");
        Ok(intents)
    }

    /// List the app intents of one generic placement intent.
    pub async fn app_intents(&self, intent: &str) -> Result<Vec<AppIntent>> {
        let url = format!("{}/{}/app-intents", self.generic_placement_intents_url(), intent);
        let app_intents: Vec<AppIntent> = http::get_json(&self.client, &url).await?;
        debug!(intent = %intent, count = app_intents.len(), "Fetched app intents");
        Ok(app_intents)
    }

    /// Replace an app intent; the orchestrator must answer 200.
    pub async fn put_app_intent(&self, url: &str, body: &AppIntent) -> Result<()> {
        debug!(url = %url, app = %body.spec.app, "Writing app intent");

        let response = http::send(self.client.put(url).json(body), "PUT", url).await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let text = response.text().await.unwrap_or_default();
            error!(url = %url, status = %status, body = %text, "App intent update rejected");
            return Err(RelocationError::Commit {
                url: url.to_string(),
                status,
            });
        }

        Ok(())
    }

    /// POST a lifecycle action; the orchestrator must answer 202.
    pub async fn trigger(&self, action: DigAction) -> Result<()> {
        let url = format!("{}/{}", self.dig_url, action.as_str());
        info!(url = %url, action = action.as_str(), "Triggering deployment unit action");

        let response = http::send(self.client.post(&url), "POST", &url).await?;

        let status = response.status();
        if status != reqwest::StatusCode::ACCEPTED {
            let text = response.text().await.unwrap_or_default();
            error!(url = %url, status = %status, body = %text, "Deployment unit action rejected");
            return Err(match action {
                DigAction::Update => RelocationError::RolloutTrigger { url, status },
                other => RelocationError::LifecycleAction {
                    action: other.as_str(),
                    url,
                    status,
                },
            });
        }

        Ok(())
    }

    pub async fn status(&self) -> Result<DigStatus> {
        let url = format!("{}/status", self.dig_url);
        http::get_json(&self.client, &url).await
    }

    /// POST `action` unless the deployment unit already reached it.
    ///
    /// The status read and the POST happen under `lock`, so concurrent
    /// callers sharing a run's lock submit the action at most once.
    pub async fn ensure_action(&self, lock: &Mutex<()>, action: DigAction) -> Result<ActionOutcome> {
        let _guard = lock.lock().await;

        let status = self.status().await?;
        if let Some(state) = status.latest_state() {
            if action.reached_by(state) {
                info!(
                    action = action.as_str(),
                    state = %state,
                    "Deployment unit already in requested state"
                );
                return Ok(ActionOutcome::AlreadyReached(state.to_string()));
            }
        }

        self.trigger(action).await?;
        Ok(ActionOutcome::Submitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reached_states() {
        assert!(DigAction::Approve.reached_by("Approved"));
        assert!(DigAction::Approve.reached_by("Instantiated"));
        assert!(!DigAction::Approve.reached_by("Created"));
        assert!(DigAction::Instantiate.reached_by("Instantiated"));
        assert!(!DigAction::Instantiate.reached_by("Approved"));
        assert!(DigAction::Terminate.reached_by("Terminated"));
        assert!(!DigAction::Update.reached_by("Instantiated"));
    }

    #[test]
    fn test_status_latest_state() {
        let status: DigStatus = serde_json::from_value(serde_json::json!({
            "project": "proj",
            "name": "dig",
            "states": {"actions": [
                {"state": "Created", "instance": "", "time": "2024-01-01T00:00:00Z", "revision": 0},
                {"state": "Approved", "instance": "", "time": "2024-01-01T00:01:00Z", "revision": 0}
            ]},
            "deployedStatus": "Pending"
        }))
        .unwrap();

        assert_eq!(status.latest_state(), Some("Approved"));
        assert_eq!(DigStatus::default().latest_state(), None);
    }
}
