//! Reading and writing the application's placement intents.

use std::collections::BTreeMap;

use relo_placement::AppPlacementRecord;
use tracing::{debug, info};

use crate::client::{DeploymentUnitClient, DigAction};
use crate::error::{RelocationError, Result};

/// App placement records per generic placement intent name.
pub type Placements = BTreeMap<String, Vec<AppPlacementRecord>>;

/// Collect every app intent of `app` across the deployment unit.
///
/// The application must appear in every generic placement intent (names
/// compared case-insensitively). Returns the generic placement intents URL
/// alongside the records, each starting in the apply phase.
pub async fn fetch_placement(
    client: &DeploymentUnitClient,
    app: &str,
) -> Result<(String, Placements)> {
    let url = client.generic_placement_intents_url();
    let intents = client.generic_placement_intents().await?;

    if intents.is_empty() {
        return Err(RelocationError::NotFound {
            app: app.to_string(),
        });
    }

    let wanted = app.to_lowercase();
    let mut placements = Placements::new();
    for intent in intents {
        let name = intent.metadata.name;
        let records: Vec<AppPlacementRecord> = client
            .app_intents(&name)
            .await?
            .into_iter()
            .filter(|ai| ai.spec.app.to_lowercase() == wanted)
            .map(AppPlacementRecord::from_app_intent)
            .collect();

        if records.is_empty() {
            debug!(intent = %name, app = %app, "No app intent for application");
            return Err(RelocationError::NotFound {
                app: app.to_string(),
            });
        }

        placements.insert(name, records);
    }

    info!(
        app = %app,
        intents = placements.len(),
        "Fetched application placement"
    );
    Ok((url, placements))
}

/// Write every planned policy back, then roll the deployment unit out.
///
/// Stops at the first rejected write; nothing is rolled out in that case.
/// Writing the same policies again is harmless.
pub async fn commit(
    client: &DeploymentUnitClient,
    intents_url: &str,
    placements: &Placements,
) -> Result<()> {
    let mut writes = Vec::new();
    for (intent, records) in placements {
        for record in records {
            let policy = record
                .planned_policy
                .as_ref()
                .ok_or_else(|| RelocationError::NotPlanned {
                    app_intent: record.app_intent_name.clone(),
                })?;

            let url = format!("{}/{}/app-intents/{}", intents_url, intent, record.app_intent_name);
            writes.push((url, record.app_intent(policy)));
        }
    }

    for (url, body) in &writes {
        client.put_app_intent(url, body).await?;
    }

    client.trigger(DigAction::Update).await?;
    info!(intents = placements.len(), "Committed placement and triggered rollout");
    Ok(())
}
