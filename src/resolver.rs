//! Association fault resolver — batched out-of-band value resolution with
//! creation watches.
//!
//! Entities frequently reference related values that are not stored on the
//! payload: a computed aggregate, a record in another store, a value that may
//! not exist yet at all. The [`AssociationResolver`] caches such values per
//! dependency key ([`SortValue`]), batches the fetch calls, and marshals the
//! replies back to the owning context through its own completion channel.
//!
//! A fetch that reports "no value exists" does not fail the entry: when the
//! resolver watches creations, the entry parks in
//! [`AssocState::AwaitingCreation`] until a matching creation signal arrives,
//! at which point a caller-supplied materializer produces the value exactly
//! once and all one-shot observers fire. Collection-valued associations
//! instead supply a classifier that decides whether a creation invalidates a
//! cached value.
//!
//! Like the controller, a resolver belongs to one owning context; replies
//! are applied on [`AssociationResolver::pump`].

use std::collections::HashMap;
use std::fmt;
use std::sync::mpsc::{Receiver, Sender, channel};

use serde_json::Value;

use crate::model::{Entity, EntityId, SortValue};

/// The batched fetch call: dependency keys in, one completion out.
pub type FetchFn<V> = Box<dyn Fn(&[SortValue], BatchCompletion<V>)>;

/// Builds a resolved value from a creation signal.
pub type MaterializeFn<V> = Box<dyn Fn(&EntityId, &Value) -> Option<V>>;

/// Decides what a creation signal means for a cached collection value.
pub type ClassifyFn<V> = Box<dyn Fn(&SortValue, &V, &EntityId, &Value) -> CreationImpact>;

/// A one-shot observer fired when a watched value materializes.
pub type WatchObserver<V> = Box<dyn FnOnce(&V)>;

// ---------------------------------------------------------------------------
// AssocState / CreationImpact
// ---------------------------------------------------------------------------

/// Lifecycle state of a cached association entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssocState<V> {
    /// A fetch is outstanding.
    Pending,
    /// The value is known.
    Resolved(V),
    /// The fetch reported no value; waiting for a matching creation.
    AwaitingCreation,
}

impl<V> AssocState<V> {
    /// Whether the value is known.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// What a creation signal means for a cached collection value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreationImpact {
    /// The cached value already accounts for the created object.
    Same,
    /// The cached value is stale and must be re-fetched.
    Invalid,
    /// The creation does not concern this entry.
    Unrelated,
}

// ---------------------------------------------------------------------------
// BatchCompletion
// ---------------------------------------------------------------------------

struct Reply<V> {
    request: u64,
    results: Vec<(SortValue, Option<V>)>,
}

/// Completion handle passed to the fetch closure.
///
/// `Send` when `V` is; the fetch may resolve it from any thread. Each result
/// is `(dependency, value)` where `None` means no value exists for that
/// dependency.
pub struct BatchCompletion<V> {
    request: u64,
    tx: Sender<Reply<V>>,
}

impl<V> BatchCompletion<V> {
    /// Deliver the fetched results. Dropped silently when the resolver is
    /// gone.
    pub fn deliver(self, results: Vec<(SortValue, Option<V>)>) {
        if self
            .tx
            .send(Reply {
                request: self.request,
                results,
            })
            .is_err()
        {
            tracing::trace!("resolver gone, dropping batch completion");
        }
    }
}

impl<V> fmt::Debug for BatchCompletion<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchCompletion")
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// AssociationResolver
// ---------------------------------------------------------------------------

struct Entry<V> {
    state: AssocState<V>,
    /// Id of the newest fetch concerning this entry. Replies tagged with an
    /// older id are superseded and dropped.
    request: u64,
    observers: Vec<WatchObserver<V>>,
}

impl<V> Entry<V> {
    fn fresh(request: u64) -> Self {
        Self {
            state: AssocState::Pending,
            request,
            observers: Vec::new(),
        }
    }
}

/// Caches and batch-resolves association values keyed by dependency.
pub struct AssociationResolver<V> {
    fetch: FetchFn<V>,
    materialize: Option<MaterializeFn<V>>,
    classify: Option<ClassifyFn<V>>,
    watch_creations: bool,
    prefer_existing: bool,
    cache: HashMap<SortValue, Entry<V>>,
    next_request: u64,
    tx: Sender<Reply<V>>,
    rx: Receiver<Reply<V>>,
}

impl<V> AssociationResolver<V> {
    /// Create a resolver around a batched fetch closure.
    #[must_use]
    pub fn new(fetch: impl Fn(&[SortValue], BatchCompletion<V>) + 'static) -> Self {
        let (tx, rx) = channel();
        Self {
            fetch: Box::new(fetch),
            materialize: None,
            classify: None,
            watch_creations: false,
            prefer_existing: false,
            cache: HashMap::new(),
            next_request: 0,
            tx,
            rx,
        }
    }

    /// Watch creations, materializing single-valued associations whose
    /// dependency matches the created id.
    #[must_use]
    pub fn with_materializer(
        mut self,
        materialize: impl Fn(&EntityId, &Value) -> Option<V> + 'static,
    ) -> Self {
        self.materialize = Some(Box::new(materialize));
        self.watch_creations = true;
        self
    }

    /// Watch creations, classifying their impact on cached collection
    /// values.
    #[must_use]
    pub fn with_classifier(
        mut self,
        classify: impl Fn(&SortValue, &V, &EntityId, &Value) -> CreationImpact + 'static,
    ) -> Self {
        self.classify = Some(Box::new(classify));
        self.watch_creations = true;
        self
    }

    /// Keep an already-resolved value when a matching creation fires.
    #[must_use]
    pub const fn prefer_existing_on_create(mut self) -> Self {
        self.prefer_existing = true;
        self
    }

    /// Current state of `dep`, if cached.
    #[must_use]
    pub fn state(&self, dep: &SortValue) -> Option<&AssocState<V>> {
        self.cache.get(dep).map(|e| &e.state)
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Resolve a single dependency.
    ///
    /// Issues a fetch when the dependency is unknown; returns the current
    /// cached state. `None` only for the null dependency, which is never
    /// resolved.
    pub fn resolve(&mut self, dep: SortValue) -> Option<&AssocState<V>> {
        self.batch_resolve(std::slice::from_ref(&dep));
        self.cache.get(&dep).map(|e| &e.state)
    }

    /// Resolve many dependencies with one fetch call.
    ///
    /// Already-fetched and null dependencies are skipped; the rest are
    /// deduplicated and fetched together. A bare creation watch (an entry
    /// created by [`AssociationResolver::observe`] before any resolve) has
    /// never been fetched and is fetched here, so a value that already
    /// exists in the store resolves without waiting for a creation. No-op
    /// when nothing is left.
    pub fn batch_resolve(&mut self, deps: &[SortValue]) {
        let mut wanted: Vec<SortValue> = Vec::new();
        for dep in deps {
            if dep.is_null() || wanted.contains(dep) {
                continue;
            }
            // Request 0 marks an entry no fetch was ever issued for.
            if self.cache.get(dep).is_some_and(|e| e.request != 0) {
                continue;
            }
            wanted.push(dep.clone());
        }
        if wanted.is_empty() {
            return;
        }
        self.issue_fetch(wanted);
    }

    /// Resolve the dependencies of a batch of entities.
    ///
    /// Returns the currently-known state per entity id. Entities whose
    /// dependency is null are absent from the mapping; freshly fetched
    /// dependencies appear as [`AssocState::Pending`] until a later
    /// [`AssociationResolver::pump`] applies the reply.
    pub fn batch_resolve_entities(
        &mut self,
        entities: &[Entity],
        dep: impl Fn(&Entity) -> SortValue,
    ) -> HashMap<EntityId, &AssocState<V>> {
        let wanted: Vec<(EntityId, SortValue)> = entities
            .iter()
            .map(|e| (e.id.clone(), dep(e)))
            .collect();
        let deps: Vec<SortValue> = wanted.iter().map(|(_, d)| d.clone()).collect();
        self.batch_resolve(&deps);

        let mut states = HashMap::with_capacity(wanted.len());
        for (id, dep) in wanted {
            if let Some(entry) = self.cache.get(&dep) {
                states.insert(id, &entry.state);
            }
        }
        states
    }

    /// Apply queued fetch replies. One cooperative tick; never blocks.
    pub fn pump(&mut self) {
        let replies: Vec<Reply<V>> = self.rx.try_iter().collect();
        for reply in replies {
            for (dep, result) in reply.results {
                let Some(entry) = self.cache.get_mut(&dep) else {
                    tracing::trace!(%dep, "reply for evicted dependency dropped");
                    continue;
                };
                if entry.request != reply.request {
                    tracing::trace!(%dep, "superseded reply dropped");
                    continue;
                }
                match result {
                    Some(value) => {
                        for observer in entry.observers.drain(..) {
                            observer(&value);
                        }
                        entry.state = AssocState::Resolved(value);
                    }
                    None if self.watch_creations => {
                        tracing::debug!(%dep, "no value yet, awaiting creation");
                        entry.state = AssocState::AwaitingCreation;
                    }
                    None => {
                        tracing::debug!(%dep, "no value and no watch, evicting");
                        self.cache.remove(&dep);
                    }
                }
            }
        }
    }

    /// Feed a creation signal through the watch machinery.
    ///
    /// Single-valued associations whose dependency equals the created id
    /// transition `AwaitingCreation → Resolved` exactly once through the
    /// materializer, firing all registered one-shot observers. Cached
    /// collection values are run through the classifier; `Invalid` entries
    /// are re-fetched.
    pub fn note_created(&mut self, id: &EntityId, payload: &Value) {
        if !self.watch_creations {
            return;
        }

        let dep = SortValue::from(id);
        if let (Some(materialize), Some(entry)) =
            (self.materialize.as_ref(), self.cache.get_mut(&dep))
        {
            match &entry.state {
                AssocState::AwaitingCreation => {
                    if let Some(value) = materialize(id, payload) {
                        tracing::debug!(%dep, "watched creation materialized");
                        for observer in entry.observers.drain(..) {
                            observer(&value);
                        }
                        entry.state = AssocState::Resolved(value);
                    }
                }
                AssocState::Resolved(_) if self.prefer_existing => {
                    tracing::trace!(%dep, "creation ignored, keeping existing value");
                }
                AssocState::Resolved(_) => {
                    if let Some(value) = materialize(id, payload) {
                        entry.state = AssocState::Resolved(value);
                    }
                }
                AssocState::Pending => {}
            }
        }

        let Some(classify) = self.classify.as_ref() else {
            return;
        };
        let mut invalid: Vec<SortValue> = Vec::new();
        for (dep, entry) in &self.cache {
            if let AssocState::Resolved(value) = &entry.state {
                match classify(dep, value, id, payload) {
                    CreationImpact::Invalid => invalid.push(dep.clone()),
                    CreationImpact::Same | CreationImpact::Unrelated => {}
                }
            }
        }
        if !invalid.is_empty() {
            tracing::debug!(count = invalid.len(), "creation invalidated cached values");
            self.issue_fetch(invalid);
        }
    }

    /// Register a one-shot observer for `dep`.
    ///
    /// Fires immediately when the value is already resolved. Otherwise the
    /// observer parks on the entry (creating a bare creation-watch entry if
    /// none exists); observers on the same dependency coalesce onto one
    /// watch. A bare watch issues no fetch of its own, but a later resolve
    /// for the same dependency fetches it normally.
    pub fn observe(&mut self, dep: SortValue, observer: impl FnOnce(&V) + 'static) {
        if let Some(entry) = self.cache.get_mut(&dep) {
            if let AssocState::Resolved(value) = &entry.state {
                observer(value);
            } else {
                entry.observers.push(Box::new(observer));
            }
            return;
        }
        self.cache.insert(
            dep,
            Entry {
                state: AssocState::AwaitingCreation,
                request: 0,
                observers: vec![Box::new(observer)],
            },
        );
    }

    /// Drop the cached value of `dep` and fetch it again.
    ///
    /// Parked observers survive and fire when the refreshed value arrives.
    /// Unknown dependencies are ignored.
    pub fn invalidate(&mut self, dep: &SortValue) {
        if self.cache.contains_key(dep) {
            self.issue_fetch(vec![dep.clone()]);
        }
    }

    /// Evict `dep` entirely, dropping its watch and observers.
    ///
    /// The release point for a removed entity's dependency.
    pub fn release(&mut self, dep: &SortValue) {
        if let Some(entry) = self.cache.remove(dep) {
            if !entry.observers.is_empty() {
                tracing::trace!(
                    %dep,
                    observers = entry.observers.len(),
                    "released dependency with parked observers"
                );
            }
        }
    }

    /// Mark every dep in `deps` pending under a fresh request id and issue
    /// one fetch for the lot.
    fn issue_fetch(&mut self, deps: Vec<SortValue>) {
        self.next_request += 1;
        let request = self.next_request;
        for dep in &deps {
            let entry = self
                .cache
                .entry(dep.clone())
                .or_insert_with(|| Entry::fresh(request));
            entry.state = AssocState::Pending;
            entry.request = request;
        }
        (self.fetch)(
            &deps,
            BatchCompletion {
                request,
                tx: self.tx.clone(),
            },
        );
    }
}

impl<V> fmt::Debug for AssociationResolver<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssociationResolver")
            .field("entries", &self.cache.len())
            .field("watch_creations", &self.watch_creations)
            .field("prefer_existing", &self.prefer_existing)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
