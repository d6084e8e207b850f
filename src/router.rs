//! Change-event router — folds external mutation signals into the set.
//!
//! The router owns the inclusion predicate and the per-event mutation rules:
//! creations are admitted through the predicate, updates replace payloads
//! wholesale (and can evict an entity the new payload excludes), deletions
//! remove. It never emits anything itself; callers inspect the returned
//! [`RouteOutcome`] to decide whether a diff cycle is warranted.

use std::fmt;

use crate::events::RecordEvent;
use crate::model::Entity;
use crate::order::OrderedSet;

/// An inclusion predicate: a pure function deciding set membership.
pub type IncludeFn = Box<dyn Fn(&Entity) -> bool>;

/// What an event did to the collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The collection changed; a diff cycle is warranted.
    Mutated,
    /// The event did not apply (filtered out, unknown id, or a reset the
    /// caller handles itself).
    Ignored,
}

/// Applies normalized mutation signals to an [`OrderedSet`].
#[derive(Default)]
pub struct EventRouter {
    include: Option<IncludeFn>,
}

impl EventRouter {
    /// A router admitting every entity.
    #[must_use]
    pub const fn unfiltered() -> Self {
        Self { include: None }
    }

    /// A router admitting only entities matching `include`.
    #[must_use]
    pub fn filtered(include: impl Fn(&Entity) -> bool + 'static) -> Self {
        Self {
            include: Some(Box::new(include)),
        }
    }

    /// Whether `entity` belongs in the managed set.
    #[must_use]
    pub fn admits(&self, entity: &Entity) -> bool {
        self.include.as_ref().is_none_or(|include| include(entity))
    }

    /// Fold one mutation signal into `set`.
    ///
    /// `Reset` is not a set mutation and always comes back [`RouteOutcome::Ignored`];
    /// the owning controller handles resets before delegating here.
    pub fn apply(&self, set: &mut OrderedSet, event: &RecordEvent) -> RouteOutcome {
        match event {
            RecordEvent::Created { id, payload } => {
                let entity = Entity::new(id.clone(), payload.clone());
                if !self.admits(&entity) {
                    tracing::trace!(%id, "created entity filtered out");
                    return RouteOutcome::Ignored;
                }
                set.insert(entity);
                RouteOutcome::Mutated
            }
            RecordEvent::Updated { id, payload } => {
                if !set.contains(id) {
                    // Updates do not resurrect: an entity outside the set
                    // (never admitted, or deleted) stays outside.
                    tracing::trace!(%id, "update for unmanaged entity dropped");
                    return RouteOutcome::Ignored;
                }
                let candidate = Entity::new(id.clone(), payload.clone());
                if self.admits(&candidate) {
                    set.update(id, candidate.payload);
                } else {
                    tracing::debug!(%id, "updated entity no longer matches filter, evicting");
                    set.remove(id);
                }
                RouteOutcome::Mutated
            }
            RecordEvent::Deleted { id } => {
                if set.remove(id).is_some() {
                    RouteOutcome::Mutated
                } else {
                    tracing::trace!(%id, "delete for unmanaged entity dropped");
                    RouteOutcome::Ignored
                }
            }
            RecordEvent::Reset => RouteOutcome::Ignored,
        }
    }
}

impl fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRouter")
            .field("filtered", &self.include.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::all, clippy::pedantic, clippy::nursery)]
mod tests {
    use super::*;
    use crate::model::{EntityId, SortValue};
    use crate::order::{ComparatorChain, SortDirection, SortRule};
    use serde_json::json;

    fn id(s: &str) -> EntityId {
        s.parse().unwrap()
    }

    fn set() -> OrderedSet {
        OrderedSet::new(ComparatorChain::new(vec![SortRule::by_field(
            "tag",
            SortDirection::Ascending,
        )]))
    }

    fn done_filter() -> EventRouter {
        EventRouter::filtered(|e| e.sort_field("done") == SortValue::Bool(false))
    }

    #[test]
    fn created_inserts_in_order() {
        let router = EventRouter::unfiltered();
        let mut s = set();
        router.apply(&mut s, &RecordEvent::Created { id: id("b"), payload: json!({"id": "b", "tag": 2}) });
        let outcome = router.apply(
            &mut s,
            &RecordEvent::Created { id: id("a"), payload: json!({"id": "a", "tag": 1}) },
        );
        assert_eq!(outcome, RouteOutcome::Mutated);
        assert_eq!(s.ids(), vec![id("a"), id("b")]);
    }

    #[test]
    fn created_outside_filter_is_ignored() {
        let router = done_filter();
        let mut s = set();
        let outcome = router.apply(
            &mut s,
            &RecordEvent::Created {
                id: id("a"),
                payload: json!({"id": "a", "tag": 1, "done": true}),
            },
        );
        assert_eq!(outcome, RouteOutcome::Ignored);
        assert!(s.is_empty());
    }

    #[test]
    fn updated_replaces_payload_and_repositions() {
        let router = EventRouter::unfiltered();
        let mut s = set();
        s.insert(Entity::from_json(json!({"id": "a", "tag": 1})).unwrap());
        s.insert(Entity::from_json(json!({"id": "b", "tag": 2})).unwrap());

        router.apply(
            &mut s,
            &RecordEvent::Updated { id: id("a"), payload: json!({"id": "a", "tag": 3}) },
        );
        assert_eq!(s.ids(), vec![id("b"), id("a")]);
    }

    #[test]
    fn updated_unknown_id_is_dropped() {
        let router = EventRouter::unfiltered();
        let mut s = set();
        let outcome = router.apply(
            &mut s,
            &RecordEvent::Updated { id: id("ghost"), payload: json!({"id": "ghost", "tag": 1}) },
        );
        assert_eq!(outcome, RouteOutcome::Ignored);
        assert!(s.is_empty());
    }

    #[test]
    fn update_that_leaves_filter_evicts() {
        let router = done_filter();
        let mut s = set();
        s.insert(Entity::from_json(json!({"id": "a", "tag": 1, "done": false})).unwrap());

        let outcome = router.apply(
            &mut s,
            &RecordEvent::Updated {
                id: id("a"),
                payload: json!({"id": "a", "tag": 1, "done": true}),
            },
        );
        assert_eq!(outcome, RouteOutcome::Mutated);
        assert!(s.is_empty());
    }

    #[test]
    fn deleted_removes_known_ignores_unknown() {
        let router = EventRouter::unfiltered();
        let mut s = set();
        s.insert(Entity::from_json(json!({"id": "a", "tag": 1})).unwrap());

        assert_eq!(
            router.apply(&mut s, &RecordEvent::Deleted { id: id("a") }),
            RouteOutcome::Mutated
        );
        assert_eq!(
            router.apply(&mut s, &RecordEvent::Deleted { id: id("a") }),
            RouteOutcome::Ignored
        );
    }

    #[test]
    fn reset_is_not_a_router_concern() {
        let router = EventRouter::unfiltered();
        let mut s = set();
        s.insert(Entity::from_json(json!({"id": "a", "tag": 1})).unwrap());
        assert_eq!(
            router.apply(&mut s, &RecordEvent::Reset),
            RouteOutcome::Ignored
        );
        assert_eq!(s.len(), 1, "reset leaves the set to the controller");
    }
}
