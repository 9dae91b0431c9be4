//! Property tests for the selector merge engine.

use std::future::Future;

use async_trait::async_trait;
use proptest::prelude::*;
use relo_placement::{reconcile, ClusterSelector, MembershipResolver, Phase, PlacementPolicy};

/// `edge` on `p1` selects c1 and c2; every other label selects nothing.
struct FixedLabels;

#[async_trait]
impl MembershipResolver for FixedLabels {
    async fn members(&self, provider: &str, label: &str) -> Vec<String> {
        match (provider, label) {
            ("p1", "edge") => vec!["c1".to_string(), "c2".to_string()],
            _ => vec![],
        }
    }
}

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

fn selector() -> impl Strategy<Value = ClusterSelector> {
    (
        prop::sample::select(vec!["p1", "p2", "p3"]),
        prop::option::of(prop::sample::select(vec!["c1", "c2", "c3", "c4"])),
        prop::option::of(prop::sample::select(vec!["edge", "core"])),
    )
        .prop_map(|(provider, cluster, label)| ClusterSelector {
            provider: provider.to_string(),
            cluster: cluster.map(str::to_string),
            label: label.map(str::to_string),
            ..ClusterSelector::default()
        })
}

fn policy() -> impl Strategy<Value = PlacementPolicy> {
    (
        prop::collection::vec(selector(), 0..8),
        prop::collection::vec(selector(), 0..8),
    )
        .prop_map(|(all_of, any_of)| PlacementPolicy { all_of, any_of })
}

fn target() -> impl Strategy<Value = ClusterSelector> {
    prop::sample::select(vec!["c1", "c2", "c3", "c4"])
        .prop_map(|cluster| ClusterSelector::by_name("p1", cluster))
}

fn has_duplicate_cluster(entries: &[ClusterSelector]) -> bool {
    entries.iter().enumerate().any(|(i, a)| {
        entries[i + 1..]
            .iter()
            .any(|b| a.names_same_cluster(b))
    })
}

/// `entries` without repeats of an earlier provider/cluster pair.
fn first_occurrences(entries: &[ClusterSelector]) -> Vec<ClusterSelector> {
    let mut kept: Vec<ClusterSelector> = Vec::with_capacity(entries.len());
    for entry in entries {
        if !kept.iter().any(|k| k.names_same_cluster(entry)) {
            kept.push(entry.clone());
        }
    }
    kept
}

proptest! {
    #[test]
    fn test_apply_output_has_no_duplicate_clusters(primary in policy(), target in target()) {
        let (merged, _) = block_on(reconcile(Phase::Apply, &primary, &target, &FixedLabels));
        prop_assert!(!has_duplicate_cluster(&merged.all_of));
        prop_assert!(!has_duplicate_cluster(&merged.any_of));
    }

    #[test]
    fn test_apply_starts_with_target(primary in policy(), target in target()) {
        let (merged, next) = block_on(reconcile(Phase::Apply, &primary, &target, &FixedLabels));
        prop_assert_eq!(&merged.all_of[0], &target);
        prop_assert_eq!(&merged.any_of[0], &target);
        prop_assert_eq!(next, Phase::Delete);
    }

    #[test]
    fn test_apply_skips_entries_naming_target(primary in policy(), target in target()) {
        let (merged, _) = block_on(reconcile(Phase::Apply, &primary, &target, &FixedLabels));
        let naming_target = merged
            .all_of
            .iter()
            .filter(|e| e.names_same_cluster(&target))
            .count();
        prop_assert_eq!(naming_target, 1);
    }

    #[test]
    fn test_apply_keeps_other_providers_in_order(primary in policy(), target in target()) {
        let (merged, _) = block_on(reconcile(Phase::Apply, &primary, &target, &FixedLabels));
        let foreign = |entries: &[ClusterSelector]| -> Vec<ClusterSelector> {
            entries
                .iter()
                .filter(|e| e.provider != target.provider)
                .cloned()
                .collect()
        };
        prop_assert_eq!(
            foreign(&merged.all_of[1..]),
            foreign(&first_occurrences(&primary.all_of))
        );
        prop_assert_eq!(
            foreign(&merged.any_of[1..]),
            foreign(&first_occurrences(&primary.any_of))
        );
    }

    #[test]
    fn test_apply_then_delete_leaves_only_target(primary in policy(), target in target()) {
        let (applied, next) = block_on(reconcile(Phase::Apply, &primary, &target, &FixedLabels));
        let (deleted, last) = block_on(reconcile(next, &applied, &target, &FixedLabels));
        prop_assert_eq!(deleted, PlacementPolicy::seeded(&target));
        prop_assert_eq!(last, Phase::Apply);
    }
}

#[test]
fn test_uncovered_same_provider_entries_are_each_kept() {
    let primary = PlacementPolicy {
        all_of: vec![
            ClusterSelector::by_name("p1", "c3"),
            ClusterSelector::by_name("p1", "c4"),
            ClusterSelector::by_label("p1", "core"),
        ],
        any_of: vec![],
    };
    let target = ClusterSelector::by_name("p1", "c2");

    let (merged, _) = block_on(reconcile(Phase::Apply, &primary, &target, &FixedLabels));

    assert_eq!(merged.all_of.len(), 1 + primary.all_of.len());
}
