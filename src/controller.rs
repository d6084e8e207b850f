//! The live result-set controller.
//!
//! [`LiveSet`] wires the engines together: it subscribes to a
//! [`ChangeSignals`] source, drains its [`Inbox`] on each [`LiveSet::pump`]
//! tick, folds events through the [`EventRouter`] into the [`OrderedSet`],
//! rebuilds the sectioned snapshot, and publishes the diff against the
//! previous snapshot to registered observers.
//!
//! A `LiveSet` belongs to one owning context. All engine state is
//! single-threaded; cross-thread callers talk to it only through the
//! [`Remote`] handle, and everything they push takes effect on the next
//! tick.
//!
//! Key types:
//! - [`LiveSetBuilder`] — typed configuration with defaults.
//! - [`LiveSet`] — the controller.
//! - [`ResetBehavior`] — what a store reset does beyond clearing.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::diff::{EditScript, MovePolicy, diff};
use crate::events::{
    ChangeSignals, Inbox, InboxEvent, LoadCompletion, LoadKind, RecordEvent, Remote, Subscription,
};
use crate::model::{Entity, EntityId, SortValue};
use crate::order::{ComparatorChain, OrderedSet, SortDirection, SortRule};
use crate::router::{EventRouter, RouteOutcome};
use crate::section::Sectioner;
use crate::snapshot::Snapshot;

/// A full-snapshot data source. Invoked on [`LiveSet::fetch`]; delivers via
/// the completion from any thread.
pub type DataSourceFn = Box<dyn Fn(LoadCompletion)>;

/// A pagination source: receives the current ordered ids plus a completion.
pub type PaginateFn = Box<dyn Fn(&[EntityId], LoadCompletion)>;

/// An edit-script observer.
pub type ObserverFn = Box<dyn Fn(&EditScript)>;

/// Hook receiving every raw creation signal, before inclusion filtering.
pub type CreationListener = Box<dyn FnMut(&EntityId, &Value)>;

// ---------------------------------------------------------------------------
// ResetBehavior / ObserverId
// ---------------------------------------------------------------------------

/// What a store-reset signal does beyond clearing the set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResetBehavior {
    /// Clear and emit the full-delete script; the caller refetches.
    #[default]
    ClearOnly,
    /// Clear, emit, then immediately invoke the data source again.
    Refetch,
}

/// Token identifying a registered observer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

// ---------------------------------------------------------------------------
// LiveSetBuilder
// ---------------------------------------------------------------------------

/// Typed configuration for a [`LiveSet`].
///
/// Defaults: no sort rules (insertion order), no sectioning, no inclusion
/// filter, debounced emission, [`MovePolicy::CarryPayload`],
/// [`ResetBehavior::ClearOnly`].
#[derive(Default)]
pub struct LiveSetBuilder {
    rules: Vec<SortRule>,
    sectioner: Option<Sectioner>,
    router: Option<EventRouter>,
    data_source: Option<DataSourceFn>,
    paginate: Option<PaginateFn>,
    immediate: bool,
    move_policy: MovePolicy,
    reset_behavior: ResetBehavior,
}

impl LiveSetBuilder {
    /// Start from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sort rule. First rule added is most significant.
    #[must_use]
    pub fn sort_by(mut self, rule: SortRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Section by an arbitrary key extractor.
    #[must_use]
    pub fn section_by(
        mut self,
        key: impl Fn(&Entity) -> SortValue + 'static,
        direction: SortDirection,
    ) -> Self {
        self.sectioner = Some(Sectioner::new(key, direction));
        self
    }

    /// Section by a top-level payload field.
    #[must_use]
    pub fn section_by_field(mut self, name: impl Into<String>, direction: SortDirection) -> Self {
        self.sectioner = Some(Sectioner::by_field(name, direction));
        self
    }

    /// Admit only entities matching `include`.
    #[must_use]
    pub fn include(mut self, include: impl Fn(&Entity) -> bool + 'static) -> Self {
        self.router = Some(EventRouter::filtered(include));
        self
    }

    /// Emit one script per drained event instead of one net script per tick.
    #[must_use]
    pub const fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    /// How moved rows carry payload changes.
    #[must_use]
    pub const fn move_policy(mut self, policy: MovePolicy) -> Self {
        self.move_policy = policy;
        self
    }

    /// What a store reset does beyond clearing.
    #[must_use]
    pub const fn reset_behavior(mut self, behavior: ResetBehavior) -> Self {
        self.reset_behavior = behavior;
        self
    }

    /// Install the full-snapshot data source.
    #[must_use]
    pub fn data_source(mut self, source: impl Fn(LoadCompletion) + 'static) -> Self {
        self.data_source = Some(Box::new(source));
        self
    }

    /// Install the pagination source.
    #[must_use]
    pub fn paginate_with(mut self, source: impl Fn(&[EntityId], LoadCompletion) + 'static) -> Self {
        self.paginate = Some(Box::new(source));
        self
    }

    /// Finish construction.
    #[must_use]
    pub fn build(self) -> LiveSet {
        LiveSet {
            ordered: OrderedSet::new(ComparatorChain::new(self.rules)),
            sectioner: self.sectioner.unwrap_or_else(Sectioner::none),
            router: self.router.unwrap_or_default(),
            inbox: Inbox::new(),
            last: Snapshot::empty(),
            observers: HashMap::new(),
            next_observer: 0,
            subscriptions: Vec::new(),
            creation_listener: None,
            data_source: self.data_source,
            paginate: self.paginate,
            pages_exhausted: false,
            immediate: self.immediate,
            move_policy: self.move_policy,
            reset_behavior: self.reset_behavior,
        }
    }
}

impl fmt::Debug for LiveSetBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveSetBuilder")
            .field("rules", &self.rules.len())
            .field("sectioned", &self.sectioner.is_some())
            .field("immediate", &self.immediate)
            .field("move_policy", &self.move_policy)
            .field("reset_behavior", &self.reset_behavior)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// LiveSet
// ---------------------------------------------------------------------------

/// The live-updating sorted, sectioned result set.
pub struct LiveSet {
    ordered: OrderedSet,
    sectioner: Sectioner,
    router: EventRouter,
    inbox: Inbox,
    last: Snapshot,
    observers: HashMap<u64, ObserverFn>,
    next_observer: u64,
    subscriptions: Vec<Subscription>,
    creation_listener: Option<CreationListener>,
    data_source: Option<DataSourceFn>,
    paginate: Option<PaginateFn>,
    pages_exhausted: bool,
    immediate: bool,
    move_policy: MovePolicy,
    reset_behavior: ResetBehavior,
}

impl LiveSet {
    /// A `Send` handle for marshaling events from other threads.
    #[must_use]
    pub fn remote(&self) -> Remote {
        self.inbox.remote()
    }

    /// Subscribe to all four signal categories of `signals`.
    ///
    /// Attaching again replaces the previous source: the old subscriptions
    /// are dropped (unsubscribing them) before the new ones register, so
    /// events are never applied twice. Dropping the set unsubscribes.
    pub fn attach(&mut self, signals: &dyn ChangeSignals) {
        self.subscriptions.clear();
        let push = |remote: Remote| {
            move |event: &RecordEvent| remote.push(InboxEvent::Record(event.clone()))
        };
        self.subscriptions
            .push(signals.on_created(Box::new(push(self.remote()))));
        self.subscriptions
            .push(signals.on_updated(Box::new(push(self.remote()))));
        self.subscriptions
            .push(signals.on_deleted(Box::new(push(self.remote()))));
        self.subscriptions
            .push(signals.on_reset(Box::new(push(self.remote()))));
    }

    /// Ask the data source for a full snapshot.
    ///
    /// The delivered batch merges on the next tick. Resets pagination
    /// exhaustion.
    pub fn fetch(&mut self) {
        self.pages_exhausted = false;
        match &self.data_source {
            Some(source) => source(LoadCompletion::new(self.remote(), LoadKind::Full)),
            None => tracing::debug!("fetch requested without a data source"),
        }
    }

    /// Ask the pagination source for the next page.
    ///
    /// A previously empty page marks the source exhausted; further calls are
    /// no-ops until the next [`LiveSet::fetch`].
    pub fn load_next_page(&mut self) {
        if self.pages_exhausted {
            tracing::trace!("pagination exhausted, ignoring page request");
            return;
        }
        match &self.paginate {
            Some(source) => {
                let ids = self.ordered.ids();
                source(&ids, LoadCompletion::new(self.remote(), LoadKind::Page));
            }
            None => tracing::debug!("page requested without a pagination source"),
        }
    }

    /// Merge a batch of entities and emit the resulting script.
    ///
    /// This is the insert primitive: full loads and pages both funnel here.
    /// Same-id entities replace, new entities insert at their sorted
    /// position, filtered entities are dropped.
    pub fn insert_entities(&mut self, batch: Vec<Entity>) -> EditScript {
        self.merge_batch(batch);
        self.emit_cycle()
    }

    /// Register an edit-script observer.
    pub fn observe(&mut self, observer: impl Fn(&EditScript) + 'static) -> ObserverId {
        self.next_observer += 1;
        self.observers.insert(self.next_observer, Box::new(observer));
        ObserverId(self.next_observer)
    }

    /// Remove a registered observer.
    pub fn unobserve(&mut self, id: ObserverId) {
        self.observers.remove(&id.0);
    }

    /// Install the creation hook.
    ///
    /// The hook sees every raw creation signal drained by [`LiveSet::pump`],
    /// before inclusion filtering. This is where an association resolver's
    /// creation watch plugs in.
    pub fn set_creation_listener(&mut self, listener: impl FnMut(&EntityId, &Value) + 'static) {
        self.creation_listener = Some(Box::new(listener));
    }

    /// One cooperative scheduling tick.
    ///
    /// Drains the inbox and applies every queued event. In the default
    /// debounced mode the whole drain produces one net script; in immediate
    /// mode each mutating event produces its own. A reset flushes pending
    /// mutations first so its full-delete script stands alone, then clears
    /// and, under [`ResetBehavior::Refetch`], re-invokes the data source.
    /// Deletes are never deferred past the tick that drained them.
    ///
    /// Returns the non-empty scripts emitted this tick, in emission order.
    /// Observers see each of them as it is produced.
    pub fn pump(&mut self) -> Vec<EditScript> {
        let events = self.inbox.drain();
        let mut scripts = Vec::new();
        let mut dirty = false;

        let flush = |this: &mut Self, scripts: &mut Vec<EditScript>, dirty: &mut bool| {
            if *dirty {
                scripts.push(this.emit_cycle());
                *dirty = false;
            }
        };

        for event in events {
            match event {
                InboxEvent::Record(RecordEvent::Reset) => {
                    flush(self, &mut scripts, &mut dirty);
                    scripts.push(self.apply_reset());
                }
                InboxEvent::Record(record) => {
                    if let RecordEvent::Created { id, payload } = &record {
                        if let Some(listener) = &mut self.creation_listener {
                            listener(id, payload);
                        }
                    }
                    if self.router.apply(&mut self.ordered, &record) == RouteOutcome::Mutated {
                        if self.immediate {
                            scripts.push(self.emit_cycle());
                        } else {
                            dirty = true;
                        }
                    }
                }
                InboxEvent::Loaded(batch) => {
                    tracing::debug!(count = batch.len(), "merging full load");
                    self.merge_batch(batch);
                    if self.immediate {
                        scripts.push(self.emit_cycle());
                    } else {
                        dirty = true;
                    }
                }
                InboxEvent::Page(batch) => {
                    if batch.is_empty() {
                        tracing::debug!("empty page, marking pagination exhausted");
                        self.pages_exhausted = true;
                    } else {
                        self.merge_batch(batch);
                        if self.immediate {
                            scripts.push(self.emit_cycle());
                        } else {
                            dirty = true;
                        }
                    }
                }
            }
        }
        flush(self, &mut scripts, &mut dirty);

        scripts.retain(|s| !s.is_empty());
        scripts
    }

    /// The current sectioned snapshot of the engine state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.sectioner.build(self.ordered.all())
    }

    /// Number of live rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Whether the set holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    fn merge_batch(&mut self, batch: Vec<Entity>) {
        for entity in batch {
            if entity.deleted || !self.router.admits(&entity) {
                tracing::trace!(id = %entity.id, "batch entity filtered out");
                continue;
            }
            self.ordered.insert(entity);
        }
    }

    fn apply_reset(&mut self) -> EditScript {
        tracing::debug!(rows = self.ordered.len(), "store reset, clearing");
        self.ordered.clear();
        let script = self.emit_cycle();
        if self.reset_behavior == ResetBehavior::Refetch {
            self.fetch();
        }
        script
    }

    /// Rebuild the sectioned snapshot, diff against the previous one, and
    /// publish to observers when anything changed.
    fn emit_cycle(&mut self) -> EditScript {
        let next = self.sectioner.build(self.ordered.all());
        let script = diff(&self.last, &next, self.move_policy);
        if !script.is_empty() {
            for observer in self.observers.values() {
                observer(&script);
            }
        }
        self.last = next;
        script
    }
}

impl fmt::Debug for LiveSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveSet")
            .field("rows", &self.ordered.len())
            .field("sections", &self.last.section_count())
            .field("observers", &self.observers.len())
            .field("immediate", &self.immediate)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
