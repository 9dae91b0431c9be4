//! Relocation stages and their execution policies.
//!
//! A policy table is keyed by stage name. The `all-stages` entry applies to
//! every stage; a stage-specific entry then overrides individual fields.
//!
//! ```json
//! {
//!   "all-stages": { "startToCloseSecs": 120 },
//!   "gate": { "startToCloseSecs": 900, "maxAttempts": 3 }
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RelocationError, Result};

/// Key of the table entry applying to every stage.
pub const ALL_STAGES: &str = "all-stages";

/// A step of the relocation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Fetch,
    MergeApply,
    CommitApply,
    Gate,
    MergeDelete,
    CommitDelete,
    Completed,
}

/// Executable stages, in run order.
pub const STEPS: [Stage; 6] = [
    Stage::Fetch,
    Stage::MergeApply,
    Stage::CommitApply,
    Stage::Gate,
    Stage::MergeDelete,
    Stage::CommitDelete,
];

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::MergeApply => "merge-apply",
            Stage::CommitApply => "commit-apply",
            Stage::Gate => "gate",
            Stage::MergeDelete => "merge-delete",
            Stage::CommitDelete => "commit-delete",
            Stage::Completed => "completed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = RelocationError;

    fn from_str(s: &str) -> Result<Self> {
        STEPS
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| RelocationError::Config(format!("unknown stage '{s}'")))
    }
}

/// How one stage is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPolicy {
    /// Limit on a single attempt.
    pub start_to_close: Duration,

    /// Attempts including the first; at least 1.
    pub max_attempts: u32,

    /// Pause between attempts.
    pub retry_interval: Duration,
}

impl Default for StepPolicy {
    fn default() -> Self {
        Self {
            start_to_close: Duration::from_secs(60),
            max_attempts: 1,
            retry_interval: Duration::from_secs(1),
        }
    }
}

impl StepPolicy {
    fn apply(&mut self, patch: &StepPolicyOverride) {
        if let Some(secs) = patch.start_to_close_secs {
            self.start_to_close = Duration::from_secs(secs);
        }
        if let Some(attempts) = patch.max_attempts {
            self.max_attempts = attempts;
        }
        if let Some(ms) = patch.retry_interval_ms {
            self.retry_interval = Duration::from_millis(ms);
        }
    }
}

/// One entry of a policy table as written by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StepPolicyOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_to_close_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_interval_ms: Option<u64>,
}

/// Resolved policy of every stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPolicies {
    policies: HashMap<Stage, StepPolicy>,
}

impl Default for StepPolicies {
    fn default() -> Self {
        Self {
            policies: STEPS
                .into_iter()
                .map(|stage| (stage, StepPolicy::default()))
                .collect(),
        }
    }
}

impl StepPolicies {
    /// Resolve a caller's table once, at run start.
    pub fn resolve(table: &HashMap<String, StepPolicyOverride>) -> Result<Self> {
        let mut base = StepPolicy::default();
        if let Some(all) = table.get(ALL_STAGES) {
            base.apply(all);
        }

        let mut policies: HashMap<Stage, StepPolicy> =
            STEPS.into_iter().map(|stage| (stage, base)).collect();

        for (name, patch) in table {
            if name == ALL_STAGES {
                continue;
            }
            let stage: Stage = name.parse()?;
            if let Some(policy) = policies.get_mut(&stage) {
                policy.apply(patch);
            }
        }

        if let Some((stage, _)) = policies.iter().find(|(_, p)| p.max_attempts == 0) {
            return Err(RelocationError::Config(format!(
                "stage '{stage}' needs at least one attempt"
            )));
        }

        Ok(Self { policies })
    }

    pub fn get(&self, stage: Stage) -> StepPolicy {
        self.policies.get(&stage).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(json: serde_json::Value) -> HashMap<String, StepPolicyOverride> {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_defaults() {
        let policies = StepPolicies::resolve(&HashMap::new()).unwrap();
        for stage in STEPS {
            assert_eq!(policies.get(stage), StepPolicy::default());
        }
        assert_eq!(StepPolicy::default().start_to_close, Duration::from_secs(60));
    }

    #[test]
    fn test_stage_entry_overrides_all_stages() {
        let policies = StepPolicies::resolve(&table(serde_json::json!({
            "all-stages": {"startToCloseSecs": 120, "maxAttempts": 2},
            "gate": {"startToCloseSecs": 900}
        })))
        .unwrap();

        let fetch = policies.get(Stage::Fetch);
        assert_eq!(fetch.start_to_close, Duration::from_secs(120));
        assert_eq!(fetch.max_attempts, 2);

        let gate = policies.get(Stage::Gate);
        assert_eq!(gate.start_to_close, Duration::from_secs(900));
        assert_eq!(gate.max_attempts, 2);
        assert_eq!(gate.retry_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_unknown_stage_is_config_error() {
        let err = StepPolicies::resolve(&table(serde_json::json!({"deploy": {}}))).unwrap_err();
        assert!(matches!(err, RelocationError::Config(msg) if msg.contains("deploy")));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let err = StepPolicies::resolve(&table(serde_json::json!({
            "commit-apply": {"maxAttempts": 0}
        })))
        .unwrap_err();
        assert!(matches!(err, RelocationError::Config(_)));
    }

    #[test]
    fn test_unknown_policy_field_rejected() {
        let parsed: std::result::Result<HashMap<String, StepPolicyOverride>, _> =
            serde_json::from_value(serde_json::json!({"fetch": {"timeout": 3}}));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_stage_names_parse() {
        for stage in STEPS {
            assert_eq!(stage.as_str().parse::<Stage>().unwrap(), stage);
        }
        assert!("completed".parse::<Stage>().is_err());
    }
}
