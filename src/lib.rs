//! liveset — live-updating sorted, sectioned result sets with minimal
//! diff emission.
//!
//! The pipeline: an external store pushes create/update/delete/reset signals
//! and snapshot loads; a [`LiveSet`] folds them into a sorted
//! ([`order::OrderedSet`]) and optionally sectioned ([`section::Sectioner`])
//! collection; each [`LiveSet::pump`] tick diffs the new sectioned
//! [`Snapshot`] against the previous one and hands observers a minimal,
//! ordered [`EditScript`] a list UI can apply verbatim.
//!
//! [`resolver::AssociationResolver`] covers the adjacent concern of
//! batch-resolving per-object association values that live out-of-band,
//! including values for related entities that do not exist yet (creation
//! watches).
//!
//! Key types:
//! - [`Entity`] / [`EntityId`] / [`SortValue`] — the raw-record model.
//! - [`LiveSetBuilder`] / [`LiveSet`] — configuration and controller.
//! - [`EditScript`] / [`ChangeOp`] — what observers receive.
//! - [`SignalHub`] / [`ChangeSignals`] — the signal source seam.
//! - [`AssociationResolver`] — the fault resolver.

pub mod controller;
pub mod diff;
pub mod events;
pub mod model;
pub mod order;
pub mod resolver;
pub mod router;
pub mod section;
pub mod snapshot;

pub use controller::{LiveSet, LiveSetBuilder, ObserverId, ResetBehavior};
pub use diff::{ChangeOp, EditScript, MovePolicy, diff};
pub use events::{ChangeSignals, LoadCompletion, RecordEvent, Remote, SignalHub, Subscription};
pub use model::{Entity, EntityId, IdError, SortValue};
pub use order::{ComparatorChain, OrderedSet, SortDirection, SortRule};
pub use resolver::{AssocState, AssociationResolver, BatchCompletion, CreationImpact};
pub use section::{SectionId, Sectioner};
pub use snapshot::{RowPath, RowSnapshot, SectionSnapshot, Snapshot};
