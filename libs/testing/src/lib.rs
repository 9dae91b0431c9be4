//! Test fixtures shared by the relocator crates.
//!
//! - [`ScriptedStatusSource`]: a status service that replays scripted
//!   connections
//! - [`StaticResolver`]: fixed cluster label membership
//! - [`params`] / [`app_intent`]: request fixtures

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use relo_placement::{
    AppIntent, AppIntentSpec, ClusterSelector, MembershipResolver, Metadata, PlacementPolicy,
};
use relo_proto::statusnotify::{StatusNotification, StatusRegistration, StatusValue};
use relo_proto::{NotificationStream, StatusSource, StatusStreamError};

/// What one registration attempt gets.
#[derive(Debug, Clone)]
pub enum Connection {
    /// The registration is rejected with `UNAVAILABLE`.
    Refuse,

    /// Stream these items, then end the stream.
    Stream(Vec<Result<StatusValue, tonic::Code>>),

    /// Stream these items, then stay open without sending anything.
    Hold(Vec<Result<StatusValue, tonic::Code>>),
}

/// [`StatusSource`] replaying one [`Connection`] per registration.
///
/// Once the script runs out, registrations succeed with a stream that
/// never yields.
#[derive(Debug, Default)]
pub struct ScriptedStatusSource {
    script: Mutex<VecDeque<Connection>>,
    registrations: AtomicUsize,
    last: Mutex<Option<StatusRegistration>>,
}

impl ScriptedStatusSource {
    pub fn new(script: impl IntoIterator<Item = Connection>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Registration attempts so far.
    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    pub fn last_registration(&self) -> Option<StatusRegistration> {
        self.last
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

fn notifications(
    items: Vec<Result<StatusValue, tonic::Code>>,
) -> impl futures_util::Stream<Item = Result<StatusNotification, tonic::Status>> + Send {
    stream::iter(items.into_iter().map(|item| match item {
        Ok(value) => Ok(StatusNotification::with_value(value)),
        Err(code) => Err(tonic::Status::new(code, "scripted stream failure")),
    }))
}

#[async_trait]
impl StatusSource for ScriptedStatusSource {
    async fn register(
        &self,
        registration: StatusRegistration,
    ) -> Result<NotificationStream, StatusStreamError> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        *self
            .last
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(registration);

        let next = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();

        match next {
            Some(Connection::Refuse) => Err(StatusStreamError::Register(
                tonic::Status::unavailable("scripted refusal"),
            )),
            Some(Connection::Stream(items)) => Ok(Box::pin(notifications(items))),
            Some(Connection::Hold(items)) => {
                Ok(Box::pin(notifications(items).chain(stream::pending())))
            }
            None => Ok(Box::pin(stream::pending::<
                Result<StatusNotification, tonic::Status>,
            >())),
        }
    }
}

/// [`MembershipResolver`] answering from a fixed table.
#[derive(Debug, Default)]
pub struct StaticResolver {
    labels: HashMap<(String, String), Vec<String>>,
    calls: AtomicUsize,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// `label` of `provider` selects `clusters`.
    pub fn with(mut self, provider: &str, label: &str, clusters: &[&str]) -> Self {
        self.labels.insert(
            (provider.to_string(), label.to_string()),
            clusters.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    /// Lookups answered so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MembershipResolver for StaticResolver {
    async fn members(&self, provider: &str, label: &str) -> Vec<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.labels
            .get(&(provider.to_string(), label.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

/// Run parameters for deployment unit `proj/ca/v1/dig` moving `web` to
/// cluster `c2` of provider `p1`.
pub fn params(orchestrator_url: &str, cluster_manager_url: &str) -> HashMap<String, String> {
    [
        ("emcoOrchEndpoint", orchestrator_url),
        ("project", "proj"),
        ("compositeApp", "ca"),
        ("compositeAppVersion", "v1"),
        ("deploymentIntentGroup", "dig"),
        ("targetClusterProvider", "p1"),
        ("targetClusterName", "c2"),
        ("targetAppName", "web"),
        ("emcoClmEndpoint", cluster_manager_url),
        ("emcoOrchStatusEndpoint", "http://127.0.0.1:1"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// REST path of the fixture deployment unit.
pub const DIG_PATH: &str = "/v2/projects/proj/composite-apps/ca/v1/deployment-intent-groups/dig";

/// App intent `name` placing `app` on `all_of`.
pub fn app_intent(name: &str, app: &str, all_of: Vec<ClusterSelector>) -> AppIntent {
    AppIntent {
        metadata: Metadata::named(name),
        spec: AppIntentSpec {
            app: app.to_string(),
            intent: PlacementPolicy {
                all_of,
                any_of: vec![],
            },
        },
    }
}
