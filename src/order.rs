//! Ordering engine — comparator chains and the sorted entity collection.
//!
//! A [`ComparatorChain`] is an ordered list of [`SortRule`]s. The first rule
//! that distinguishes two entities decides their relative order; if every
//! rule ties, the entities are considered equal and keep their insertion
//! order (ties are stable). An empty chain means physical order is insertion
//! order.
//!
//! [`OrderedSet`] maintains the strictly ordered, id-deduplicated collection
//! on top of the chain: binary-search insertion, removal by id, and
//! repositioning after in-place payload mutation.

use std::cmp::Ordering;
use std::fmt;

use crate::model::{Entity, EntityId, SortValue};

/// A key extractor: a pure function from an entity to a comparable value.
pub type KeyFn = Box<dyn Fn(&Entity) -> SortValue>;

// ---------------------------------------------------------------------------
// SortDirection
// ---------------------------------------------------------------------------

/// Direction of a sort rule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest key first.
    #[default]
    Ascending,
    /// Largest key first.
    Descending,
}

impl SortDirection {
    /// Apply this direction to an ascending comparison result.
    #[must_use]
    pub const fn apply(self, ord: Ordering) -> Ordering {
        match self {
            Self::Ascending => ord,
            Self::Descending => ord.reverse(),
        }
    }
}

// ---------------------------------------------------------------------------
// SortRule
// ---------------------------------------------------------------------------

/// One entry of a comparator chain: a key extractor plus a direction.
///
/// Extractors are supplied as explicit closures at construction time; there
/// is no string-keyed runtime lookup on the hot path. [`SortRule::by_field`]
/// is the common convenience for top-level payload fields.
pub struct SortRule {
    key: KeyFn,
    direction: SortDirection,
}

impl SortRule {
    /// Create a rule from an arbitrary key extractor.
    #[must_use]
    pub fn new(key: impl Fn(&Entity) -> SortValue + 'static, direction: SortDirection) -> Self {
        Self {
            key: Box::new(key),
            direction,
        }
    }

    /// Create a rule sorting by a top-level payload field.
    #[must_use]
    pub fn by_field(name: impl Into<String>, direction: SortDirection) -> Self {
        let name = name.into();
        Self::new(move |e| e.sort_field(&name), direction)
    }

    /// Evaluate this rule for a pair of entities.
    fn compare(&self, a: &Entity, b: &Entity) -> Ordering {
        let ka = (self.key)(a);
        let kb = (self.key)(b);
        // A comparator producing different keys for the same entity across
        // evaluations would silently corrupt the ordering invariant. That is
        // a caller-configuration bug and must be fatal, not tolerated.
        #[cfg(debug_assertions)]
        {
            assert!(
                ka == (self.key)(a) && kb == (self.key)(b),
                "sort key extractor is not pure: repeated evaluation disagreed"
            );
        }
        self.direction.apply(ka.cmp(&kb))
    }
}

impl fmt::Debug for SortRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortRule")
            .field("direction", &self.direction)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ComparatorChain
// ---------------------------------------------------------------------------

/// An ordered list of sort rules forming one total preorder over entities.
#[derive(Debug, Default)]
pub struct ComparatorChain {
    rules: Vec<SortRule>,
}

impl ComparatorChain {
    /// Build a chain from rules, first rule most significant.
    #[must_use]
    pub fn new(rules: Vec<SortRule>) -> Self {
        Self { rules }
    }

    /// The empty chain: every pair ties, physical order is insertion order.
    #[must_use]
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Whether the chain has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Compare two entities under the chain.
    ///
    /// Pure and side-effect-free. `Ordering::Equal` means "tied under every
    /// rule"; tied entities are kept in insertion order by [`OrderedSet`].
    #[must_use]
    pub fn compare(&self, a: &Entity, b: &Entity) -> Ordering {
        for rule in &self.rules {
            let ord = rule.compare(a, b);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

// ---------------------------------------------------------------------------
// OrderedSet
// ---------------------------------------------------------------------------

/// The sorted, deduplicated entity collection.
///
/// Invariant: entities are in non-descending chain order, at most one live
/// entity per id, and tied entities appear in insertion order.
pub struct OrderedSet {
    chain: ComparatorChain,
    entities: Vec<Entity>,
}

impl OrderedSet {
    /// Create an empty set ordered by `chain`.
    #[must_use]
    pub const fn new(chain: ComparatorChain) -> Self {
        Self {
            chain,
            entities: Vec::new(),
        }
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// The full ordered sequence.
    #[must_use]
    pub fn all(&self) -> &[Entity] {
        &self.entities
    }

    /// The ordered ids of all live entities.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.iter().map(|e| e.id.clone()).collect()
    }

    /// Position of `id` in the ordered sequence.
    #[must_use]
    pub fn position_of(&self, id: &EntityId) -> Option<usize> {
        self.entities.iter().position(|e| &e.id == id)
    }

    /// Borrow the entity with `id`.
    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.position_of(id).map(|i| &self.entities[i])
    }

    /// Whether a live entity with `id` is present.
    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.position_of(id).is_some()
    }

    /// Insert an entity at its sorted position.
    ///
    /// If an entity with the same id already exists this is a replace of the
    /// payload followed by a reposition, never a duplicate insert. Returns
    /// the final position.
    pub fn insert(&mut self, entity: Entity) -> usize {
        if let Some(pos) = self.position_of(&entity.id) {
            let id = entity.id;
            self.entities[pos].payload = entity.payload;
            self.entities[pos].deleted = false;
            return self.reposition(&id).map_or(pos, |(_, to)| to);
        }
        let at = self.insertion_point(&entity);
        self.entities.insert(at, entity);
        at
    }

    /// Remove the entity with `id`, returning it marked deleted.
    pub fn remove(&mut self, id: &EntityId) -> Option<Entity> {
        let pos = self.position_of(id)?;
        let mut entity = self.entities.remove(pos);
        entity.deleted = true;
        Some(entity)
    }

    /// Replace the payload of `id` in place and reposition.
    ///
    /// Returns the `(old, new)` positions, or `None` when no live entity has
    /// this id (the update is then the caller's to drop).
    pub fn update(&mut self, id: &EntityId, payload: serde_json::Value) -> Option<(usize, usize)> {
        let pos = self.position_of(id)?;
        self.entities[pos].payload = payload;
        self.reposition(id)
    }

    /// Re-derive the sorted position of `id` after a payload mutation.
    ///
    /// A no-op (old == new) when the entity is already correctly placed; the
    /// check compares against both neighbors, so entities whose new key still
    /// ties with the old neighborhood never churn among their ties.
    pub fn reposition(&mut self, id: &EntityId) -> Option<(usize, usize)> {
        let from = self.position_of(id)?;
        if self.in_place(from) {
            return Some((from, from));
        }
        let entity = self.entities.remove(from);
        let to = self.insertion_point(&entity);
        self.entities.insert(to, entity);
        Some((from, to))
    }

    /// Remove all entities.
    pub fn clear(&mut self) {
        self.entities.clear();
    }

    /// First index whose entity orders strictly after `entity`.
    ///
    /// Inserting there places new arrivals after any existing ties, keeping
    /// tie order stable across passes.
    fn insertion_point(&self, entity: &Entity) -> usize {
        let chain = &self.chain;
        self.entities
            .partition_point(|existing| chain.compare(existing, entity) != Ordering::Greater)
    }

    /// Whether the entity at `at` is correctly ordered relative to both
    /// neighbors.
    fn in_place(&self, at: usize) -> bool {
        let before_ok = at == 0
            || self
                .chain
                .compare(&self.entities[at - 1], &self.entities[at])
                != Ordering::Greater;
        let after_ok = at + 1 >= self.entities.len()
            || self
                .chain
                .compare(&self.entities[at], &self.entities[at + 1])
                != Ordering::Greater;
        before_ok && after_ok
    }
}

impl fmt::Debug for OrderedSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedSet")
            .field("len", &self.entities.len())
            .field("chain_rules", &self.chain.rules.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
