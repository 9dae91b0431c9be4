//! In-process driver of the relocation sequence.
//!
//! Runs fetch, merge (apply), commit, gate, merge (delete) and commit in
//! order. Each stage attempt is bounded by its start-to-close limit; retryable
//! failures are attempted again up to the stage's attempt budget. The current
//! position is published on a watch channel for observers.

use std::fmt;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{RelocationError, Result, StageFailure};
use crate::run::{RelocationRun, Relocator};
use crate::steps::{Stage, StepPolicies, STEPS};

/// Where a run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Started,
    Running(Stage),
    Completed,
    Failed(Stage),
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Started => f.write_str("started"),
            RunState::Running(stage) => f.write_str(stage.as_str()),
            RunState::Completed => f.write_str("completed"),
            RunState::Failed(_) => f.write_str("failed"),
        }
    }
}

/// Drives one run through every stage.
pub struct Sequencer {
    relocator: Relocator,
    policies: StepPolicies,
    state: watch::Sender<RunState>,
}

impl Sequencer {
    pub fn new(relocator: Relocator, policies: StepPolicies) -> Self {
        let (state, _) = watch::channel(RunState::Started);
        Self {
            relocator,
            policies,
            state,
        }
    }

    /// Observe the run's position.
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    pub fn relocator(&self) -> &Relocator {
        &self.relocator
    }

    /// Run every stage in order until completion or the first failure.
    pub async fn run(
        &self,
        run: &mut RelocationRun,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), StageFailure> {
        info!(
            app = %run.config.target_app,
            anchor = %run.config.anchor,
            provider = %run.config.target.provider,
            "Starting relocation"
        );

        for stage in STEPS {
            self.state.send_replace(RunState::Running(stage));

            if let Err(source) = self.run_stage(stage, run, cancel).await {
                error!(stage = %stage, error = %source, "Relocation failed");
                self.state.send_replace(RunState::Failed(stage));
                return Err(StageFailure { stage, source });
            }
        }

        self.state.send_replace(RunState::Completed);
        info!(app = %run.config.target_app, "Relocation completed");
        Ok(())
    }

    async fn run_stage(
        &self,
        stage: Stage,
        run: &mut RelocationRun,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let policy = self.policies.get(stage);
        let mut attempt = 1;

        loop {
            let child = cancel.child_token();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(RelocationError::Cancelled),
                outcome = tokio::time::timeout(policy.start_to_close, self.execute(stage, run, &child)) => {
                    match outcome {
                        Ok(result) => result,
                        Err(_) => {
                            child.cancel();
                            Err(RelocationError::Timeout {
                                stage,
                                after: policy.start_to_close,
                            })
                        }
                    }
                }
            };

            match result {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                    warn!(
                        stage = %stage,
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %e,
                        "Stage attempt failed, retrying"
                    );
                    attempt += 1;

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(RelocationError::Cancelled),
                        _ = tokio::time::sleep(policy.retry_interval) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn execute(
        &self,
        stage: Stage,
        run: &mut RelocationRun,
        cancel: &CancellationToken,
    ) -> Result<()> {
        match stage {
            Stage::Fetch => self.relocator.fetch(run).await,
            Stage::MergeApply | Stage::MergeDelete => self.relocator.merge(run).await,
            Stage::CommitApply | Stage::CommitDelete => self.relocator.commit(run).await,
            Stage::Gate => self.relocator.wait_ready(run, cancel).await,
            Stage::Completed => Ok(()),
        }
    }
}
