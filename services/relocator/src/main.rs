//! relocator - moves one application to a target cluster
//!
//! Reads a run document (`{"params": {...}, "stages": {...}}`) and drives the
//! relocation to completion. Ctrl-C cancels the run.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use relo_relocator::{
    RelocationConfig, RelocationRun, Relocator, RunDocument, Sequencer, StepPolicies,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "relocator", version, about = "Relocate an application between clusters")]
struct Args {
    /// Run document with parameters and stage policies.
    #[arg(long, short = 'p', env = "RELOCATOR_PARAMS")]
    params: PathBuf,

    /// Seconds between status registration attempts.
    #[arg(long, env = "RELOCATOR_GATE_RETRY_SECS", default_value_t = 5)]
    gate_retry_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let args = Args::parse();

    let raw = tokio::fs::read(&args.params)
        .await
        .with_context(|| format!("Failed to read {}", args.params.display()))?;
    let document = RunDocument::from_slice(&raw)?;

    let config = RelocationConfig::from_params(&document.params)?;
    let policies = StepPolicies::resolve(&document.stages)?;
    info!(
        app = %config.target_app,
        anchor = %config.anchor,
        orchestrator = %config.orchestrator_url,
        status_endpoint = %config.status_endpoint,
        "Configuration loaded"
    );

    let relocator = Relocator::from_config(&config)?
        .with_gate_retry_delay(Duration::from_secs(args.gate_retry_secs));
    let sequencer = Sequencer::new(relocator, policies);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received shutdown signal");
                cancel.cancel();
            }
        }
    });

    let mut run = RelocationRun::new(config);
    match sequencer.run(&mut run, &cancel).await {
        Ok(()) => {
            info!(state = %sequencer.state(), "Relocation finished");
            Ok(())
        }
        Err(failure) => {
            error!(
                state = %sequencer.state(),
                stage = %failure.stage,
                error = %failure.source,
                "Relocation failed"
            );
            Err(failure.into())
        }
    }
}
