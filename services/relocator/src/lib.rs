//! Application relocator
//!
//! Moves one application of a multi-cluster deployment unit from its current
//! cluster placement to a target cluster without downtime. The new placement
//! is written next to the old one, rolled out, and observed ready before the
//! old placement is withdrawn.
//!
//! ## Stages
//!
//! ```text
//! fetch ─▶ merge-apply ─▶ commit-apply ─▶ gate ─▶ merge-delete ─▶ commit-delete
//! ```
//!
//! Each stage is an operation on [`Relocator`] and can be run on its own;
//! [`Sequencer`] runs them in order with per-stage timeouts and retries.
//!
//! ## Modules
//!
//! - `client`: orchestrator REST client for one deployment unit
//! - `clm`: cluster manager client, resolves cluster labels
//! - `gate`: readiness gate over the status notification stream
//! - `intents`: placement fetch and commit
//! - `steps`: stages and per-stage execution policies

pub mod client;
pub mod clm;
pub mod config;
pub mod error;
pub mod gate;
pub mod intents;
pub mod run;
pub mod sequencer;
pub mod steps;

mod http;

pub use client::{ActionOutcome, DeploymentUnitClient, DigAction, DigStatus};
pub use clm::ClusterManagerClient;
pub use config::{RelocationConfig, RunDocument};
pub use error::{RelocationError, StageFailure};
pub use gate::{GateOutcome, ReadinessGate};
pub use run::{RelocationRun, Relocator};
pub use sequencer::{RunState, Sequencer};
pub use steps::{Stage, StepPolicies, StepPolicy, StepPolicyOverride};
