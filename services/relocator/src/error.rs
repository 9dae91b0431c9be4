//! Error types for a relocation run.

use std::time::Duration;

use relo_placement::{AnchorError, PhaseError};
use thiserror::Error;

use crate::steps::Stage;

/// Errors raised by relocation stages.
#[derive(Debug, Error)]
pub enum RelocationError {
    /// Missing or invalid run parameters or stage policies.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The request never produced a response.
    #[error("{method} {url} failed: {source}")]
    Transport {
        method: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A read returned an unexpected status.
    #[error("{method} {url} returned {status}")]
    HttpStatus {
        method: &'static str,
        url: String,
        status: reqwest::StatusCode,
    },

    /// The response body is not the expected JSON.
    #[error("malformed response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// No app intent for the application in some placement intent.
    #[error("application '{app}' has no placement in the deployment unit")]
    NotFound { app: String },

    #[error(transparent)]
    Phase(#[from] PhaseError),

    #[error(transparent)]
    Anchor(#[from] AnchorError),

    /// Writing an app intent was rejected.
    #[error("commit of {url} rejected with {status}")]
    Commit {
        url: String,
        status: reqwest::StatusCode,
    },

    /// The rollout of the deployment unit was not accepted.
    #[error("rollout trigger {url} rejected with {status}")]
    RolloutTrigger {
        url: String,
        status: reqwest::StatusCode,
    },

    /// A lifecycle action other than update was not accepted.
    #[error("{action} of {url} rejected with {status}")]
    LifecycleAction {
        action: &'static str,
        url: String,
        status: reqwest::StatusCode,
    },

    /// Commit was asked for a record no merge pass has planned yet.
    #[error("app intent '{app_intent}' has no planned policy to commit")]
    NotPlanned { app_intent: String },

    #[error("run snapshot: {0}")]
    Snapshot(#[source] serde_json::Error),

    /// A stage ran past its start-to-close limit.
    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: Stage, after: Duration },

    #[error("relocation cancelled")]
    Cancelled,
}

impl RelocationError {
    /// Whether another attempt of the same stage may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RelocationError::Transport { .. }
                | RelocationError::HttpStatus { .. }
                | RelocationError::Timeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RelocationError>;

/// A stage ended the run.
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct StageFailure {
    pub stage: Stage,
    #[source]
    pub source: RelocationError,
}
