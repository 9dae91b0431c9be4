//! Selector merge engine.
//!
//! Computes the placement policy written during a relocation:
//!
//! - **Apply pass**: the target selector first, followed by every old entry
//!   that is not already represented by the target. Old placements keep
//!   serving until the new one is observed ready.
//! - **Delete pass**: the target selector only.
//!
//! `allOf` and `anyOf` are processed independently with the same rules.
//!
//! # Invariants
//!
//! - No output array holds two entries with the same provider and the same
//!   non-empty cluster name.
//! - Entries of other providers are kept in their original order, except
//!   for repeats of a provider/cluster pair already kept.
//! - The phase returned is always the toggle of the phase given.

use async_trait::async_trait;
use tracing::debug;

use crate::phase::Phase;
use crate::policy::{ClusterSelector, PlacementPolicy};

/// Answers which clusters a provider label currently selects.
///
/// Implementations fail open: when the cluster list cannot be read they
/// return an empty list, so the label is treated as not covering anything.
#[async_trait]
pub trait MembershipResolver: Send + Sync {
    /// Clusters of `provider` carrying `label`.
    async fn members(&self, provider: &str, label: &str) -> Vec<String>;

    /// Whether `label` under `provider` selects `cluster`.
    async fn covers(&self, provider: &str, label: &str, cluster: &str) -> bool {
        self.members(provider, label)
            .await
            .iter()
            .any(|member| member == cluster)
    }
}

/// Why an old entry was left out of the merged policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Names a cluster already present for the same provider.
    Duplicate,

    /// Its label already selects the target cluster.
    CoveredByLabel,
}

/// Merge `primary` with `target` for one pass.
///
/// Returns the policy to commit and the phase for the next pass.
pub async fn reconcile<R>(
    phase: Phase,
    primary: &PlacementPolicy,
    target: &ClusterSelector,
    resolver: &R,
) -> (PlacementPolicy, Phase)
where
    R: MembershipResolver + ?Sized,
{
    let policy = match phase {
        Phase::Apply => PlacementPolicy {
            all_of: merge_selectors(&primary.all_of, target, resolver).await,
            any_of: merge_selectors(&primary.any_of, target, resolver).await,
        },
        Phase::Delete => PlacementPolicy::seeded(target),
    };

    (policy, phase.toggled())
}

async fn merge_selectors<R>(
    primary: &[ClusterSelector],
    target: &ClusterSelector,
    resolver: &R,
) -> Vec<ClusterSelector>
where
    R: MembershipResolver + ?Sized,
{
    let mut merged = Vec::with_capacity(primary.len() + 1);
    merged.push(target.clone());

    for entry in primary {
        match skip_reason(entry, &merged, target, resolver).await {
            None => merged.push(entry.clone()),
            Some(reason) => {
                debug!(
                    provider = %entry.provider,
                    cluster = entry.cluster_name().unwrap_or_default(),
                    label = entry.cluster_label().unwrap_or_default(),
                    reason = ?reason,
                    "Dropping old placement entry"
                );
            }
        }
    }

    merged
}

async fn skip_reason<R>(
    entry: &ClusterSelector,
    merged: &[ClusterSelector],
    target: &ClusterSelector,
    resolver: &R,
) -> Option<SkipReason>
where
    R: MembershipResolver + ?Sized,
{
    if merged.iter().any(|kept| kept.names_same_cluster(entry)) {
        return Some(SkipReason::Duplicate);
    }

    if entry.provider != target.provider {
        return None;
    }

    // A label can only be checked against a concrete target cluster.
    if let (Some(label), Some(cluster)) = (entry.cluster_label(), target.cluster_name()) {
        if resolver.covers(&entry.provider, label, cluster).await {
            return Some(SkipReason::CoveredByLabel);
        }
    }

    None
}
