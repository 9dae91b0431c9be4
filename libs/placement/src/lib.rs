//! # relo-placement
//!
//! Placement policy model and the selector merge engine used to move one
//! application between clusters of a deployment unit without downtime.
//!
//! ## Concepts
//!
//! - **Selector**: one candidate placement, a provider plus a cluster name or
//!   a cluster label.
//! - **Policy**: the `allOf` / `anyOf` selector arrays of one app intent.
//! - **Phase**: whether the next merge pass keeps old selectors (apply) or
//!   strips them (delete).
//! - **Anchor**: the structured identifier of a deployment unit.
//!
//! ## Invariants
//!
//! - Merging is deterministic given the same inputs and resolver answers
//! - Merged arrays never name the same provider/cluster pair twice
//! - Phases strictly alternate apply → delete → apply

mod anchor;
mod error;
mod merge;
mod phase;
mod policy;

pub use anchor::DigAnchor;
pub use error::{AnchorError, PhaseError};
pub use merge::{reconcile, MembershipResolver, SkipReason};
pub use phase::Phase;
pub use policy::{
    AppIntent, AppIntentSpec, AppPlacementRecord, ClusterSelector, GenericPlacementIntent,
    Metadata, PlacementPolicy,
};
