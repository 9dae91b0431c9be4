//! Readiness gate.
//!
//! Blocks until the orchestrator's status service reports the application
//! ready on its new placement. Connection or stream failures never end the
//! wait; the gate drops the stream, sleeps for the retry delay and registers
//! again. Only a `READY` notification or cancellation returns.
//!
//! ```text
//! Registering ──ok──▶ Streaming ──READY──▶ Ready
//!      ▲    └─err─┐      │  └─other value─┐
//!      │          ▼      │ err/eof        │
//!      └─delay── Error ◀─┘     Streaming ◀┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use relo_placement::DigAnchor;
use relo_proto::statusnotify::{
    status_registration::Key, DigKey, OutputType, StatusRegistration, StatusValue,
};
use relo_proto::{NotificationStream, StatusSource, StatusStreamError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Delay before registering again after a failure.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Resource kinds whose readiness is watched.
pub const WORKLOAD_RESOURCES: [&str; 6] = [
    "apps.v1.Deployment",
    "apps.v1.StatefulSet",
    "apps.v1.DaemonSet",
    "apps.v1.ReplicaSet",
    "batch.v1.Job",
    "v1.Pod",
];

const READY: &str = "READY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Registering,
    Streaming,
    Error,
    Ready,
    Cancelled,
}

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Ready,
    Cancelled,
}

/// Waits for readiness through a [`StatusSource`].
#[derive(Clone)]
pub struct ReadinessGate {
    source: Arc<dyn StatusSource>,
    retry_delay: Duration,
}

impl ReadinessGate {
    pub fn new(source: Arc<dyn StatusSource>) -> Self {
        Self {
            source,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Summary readiness registration for `app` on `clusters`.
    ///
    /// Clusters are given as `provider+cluster`.
    pub fn registration(
        anchor: &DigAnchor,
        app: &str,
        clusters: Vec<String>,
    ) -> StatusRegistration {
        StatusRegistration {
            client_id: Uuid::new_v4().to_string(),
            output: OutputType::Summary.into(),
            status_type: StatusValue::Ready.into(),
            apps: vec![app.to_string()],
            clusters,
            resources: WORKLOAD_RESOURCES.iter().map(|r| r.to_string()).collect(),
            key: Some(Key::DigKey(DigKey {
                project: anchor.project().to_string(),
                composite_app: anchor.composite_app().to_string(),
                composite_app_version: anchor.composite_app_version().to_string(),
                deployment_intent_group: anchor.deployment_intent_group().to_string(),
            })),
        }
    }

    /// Wait until the status service reports `READY`.
    ///
    /// Each registration attempt reuses `registration` unchanged. Returns
    /// [`GateOutcome::Cancelled`] as soon as `cancel` fires, whatever the
    /// gate is waiting on at that moment.
    pub async fn wait_ready(
        &self,
        registration: &StatusRegistration,
        cancel: &CancellationToken,
    ) -> GateOutcome {
        let mut state = GateState::Registering;
        let mut stream: Option<NotificationStream> = None;

        loop {
            debug!(state = ?state, client_id = %registration.client_id, "Readiness gate");

            state = match state {
                GateState::Registering => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => GateState::Cancelled,
                        result = self.source.register(registration.clone()) => match result {
                            Ok(opened) => {
                                stream = Some(opened);
                                GateState::Streaming
                            }
                            Err(e) => {
                                warn!(error = %e, "Status registration failed");
                                GateState::Error
                            }
                        },
                    }
                }

                GateState::Streaming => match stream.as_mut() {
                    None => GateState::Registering,
                    Some(active) => {
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => GateState::Cancelled,
                            next = active.next() => match next {
                                Some(Ok(notification)) => {
                                    let status = notification.status_name();
                                    if status == READY {
                                        GateState::Ready
                                    } else {
                                        debug!(status = %status, "Application not ready yet");
                                        GateState::Streaming
                                    }
                                }
                                Some(Err(status)) => {
                                    warn!(error = %StatusStreamError::Read(status), "Status stream failed");
                                    GateState::Error
                                }
                                None => {
                                    warn!(error = %StatusStreamError::Closed, "Status stream failed");
                                    GateState::Error
                                }
                            },
                        }
                    }
                },

                GateState::Error => {
                    stream = None;
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => GateState::Cancelled,
                        _ = tokio::time::sleep(self.retry_delay) => GateState::Registering,
                    }
                }

                GateState::Ready => {
                    drop(stream.take());
                    info!(client_id = %registration.client_id, "Application ready");
                    return GateOutcome::Ready;
                }

                GateState::Cancelled => {
                    info!(client_id = %registration.client_id, "Readiness wait cancelled");
                    return GateOutcome::Cancelled;
                }
            };
        }
    }
}
