//! Per-element engagement tracking for the SignalTap collector.
//!
//! [`EngagementTracker`] instruments the nodes chosen by the content selector, runs the
//! visible/hidden lifecycle and hover/click/selection accounting for each of them, and queues
//! [`SignalSnapshot`]s whenever engagement accumulates. State lives in a side-table
//! ([`Registry`]) keyed by synthetic handles, never on host nodes.

pub mod dwell;
pub mod fingerprint;
pub mod interaction;
pub mod record;
pub mod registry;
pub mod tracker;
pub mod visibility;
pub mod watcher;

pub use dwell::{DwellTier, DwellTiers};
pub use fingerprint::{fingerprint, fnv1a_32};
pub use interaction::InteractionTracker;
pub use record::{BoostEntry, ContentKind, SignalRecord, SignalSnapshot, VisibleBuckets};
pub use registry::{Registry, TrackedElement};
pub use tracker::{EngagementTracker, TrackerConfig};
pub use visibility::{VisibilityChange, VisibilityTracker};
pub use watcher::{Mutation, MutationWatcher};
