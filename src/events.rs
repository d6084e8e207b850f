//! External change signals and the owning-context handoff queue.
//!
//! The change-event router learns about external mutations through the
//! [`ChangeSignals`] trait: four callback registrations (created, updated,
//! deleted, reset), each returning a [`Subscription`] token that unsubscribes
//! on [`Subscription::invalidate`] or drop. Signal sources are explicit,
//! dependency-injected collaborators, never an ambient bus.
//!
//! [`SignalHub`] is the in-process reference implementation; adapters for
//! real stores implement `ChangeSignals` the same way.
//!
//! [`Inbox`]/[`Remote`] form the single synchronization boundary of a
//! controller: sources and completions may fire on arbitrary threads, push
//! onto the `Remote`, and the owning context drains the `Inbox` on its next
//! tick. Nothing else in the crate locks.

use std::collections::HashMap;
use std::fmt;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use crate::model::{Entity, EntityId};

// ---------------------------------------------------------------------------
// RecordEvent
// ---------------------------------------------------------------------------

/// A normalized external mutation signal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordEvent {
    /// An object was created in the external store.
    Created {
        /// Stable identity of the new object.
        id: EntityId,
        /// Raw payload of the new object.
        payload: Value,
    },
    /// An object's payload was replaced.
    Updated {
        /// Stable identity of the mutated object.
        id: EntityId,
        /// The replacement payload.
        payload: Value,
    },
    /// An object was deleted.
    Deleted {
        /// Stable identity of the removed object.
        id: EntityId,
    },
    /// The external store was cleared wholesale.
    Reset,
}

/// A registered signal handler.
pub type SignalHandler = Box<dyn Fn(&RecordEvent) + Send>;

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// An unsubscribe token returned by signal registrations.
///
/// The registration stays active until `invalidate` is called or the token
/// is dropped. Lifetime is explicit ownership: there is no weak-reference
/// self-invalidation.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap a cancellation closure.
    #[must_use]
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Unsubscribe. Safe to call more than once.
    pub fn invalidate(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Whether the registration is still active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.invalidate();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ChangeSignals
// ---------------------------------------------------------------------------

/// Registration surface of an external creation/update/deletion/reset source.
pub trait ChangeSignals {
    /// Register for object-created signals.
    fn on_created(&self, handler: SignalHandler) -> Subscription;
    /// Register for object-updated signals.
    fn on_updated(&self, handler: SignalHandler) -> Subscription;
    /// Register for object-deleted signals.
    fn on_deleted(&self, handler: SignalHandler) -> Subscription;
    /// Register for store-reset signals.
    fn on_reset(&self, handler: SignalHandler) -> Subscription;
}

// ---------------------------------------------------------------------------
// SignalHub
// ---------------------------------------------------------------------------

#[derive(Default)]
struct HubInner {
    next: u64,
    created: HashMap<u64, SignalHandler>,
    updated: HashMap<u64, SignalHandler>,
    deleted: HashMap<u64, SignalHandler>,
    reset: HashMap<u64, SignalHandler>,
}

/// Thread-safe in-process implementation of [`ChangeSignals`].
///
/// Emissions may originate on any thread. Handlers run on the emitting
/// thread while the handler table is locked, so they must not call back into
/// the hub; the intended handler body is a [`Remote::push`].
#[derive(Clone, Default)]
pub struct SignalHub {
    inner: Arc<Mutex<HubInner>>,
}

impl SignalHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(
        &self,
        pick: impl Fn(&mut HubInner) -> &mut HashMap<u64, SignalHandler> + Send + 'static,
        handler: SignalHandler,
    ) -> Subscription {
        let mut inner = self.lock();
        inner.next += 1;
        let token = inner.next;
        pick(&mut inner).insert(token, handler);
        drop(inner);

        let hub = self.inner.clone();
        Subscription::new(move || {
            let mut inner = hub.lock().unwrap_or_else(PoisonError::into_inner);
            pick(&mut inner).remove(&token);
        })
    }

    fn dispatch(
        &self,
        pick: impl Fn(&HubInner) -> &HashMap<u64, SignalHandler>,
        event: &RecordEvent,
    ) {
        let inner = self.lock();
        for handler in pick(&inner).values() {
            handler(event);
        }
    }

    /// Emit an object-created signal.
    pub fn emit_created(&self, id: EntityId, payload: Value) {
        self.dispatch(|i| &i.created, &RecordEvent::Created { id, payload });
    }

    /// Emit an object-updated signal.
    pub fn emit_updated(&self, id: EntityId, payload: Value) {
        self.dispatch(|i| &i.updated, &RecordEvent::Updated { id, payload });
    }

    /// Emit an object-deleted signal.
    pub fn emit_deleted(&self, id: EntityId) {
        self.dispatch(|i| &i.deleted, &RecordEvent::Deleted { id });
    }

    /// Emit a store-reset signal.
    pub fn emit_reset(&self) {
        self.dispatch(|i| &i.reset, &RecordEvent::Reset);
    }
}

impl ChangeSignals for SignalHub {
    fn on_created(&self, handler: SignalHandler) -> Subscription {
        self.register(|i| &mut i.created, handler)
    }

    fn on_updated(&self, handler: SignalHandler) -> Subscription {
        self.register(|i| &mut i.updated, handler)
    }

    fn on_deleted(&self, handler: SignalHandler) -> Subscription {
        self.register(|i| &mut i.deleted, handler)
    }

    fn on_reset(&self, handler: SignalHandler) -> Subscription {
        self.register(|i| &mut i.reset, handler)
    }
}

impl fmt::Debug for SignalHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("SignalHub")
            .field("created", &inner.created.len())
            .field("updated", &inner.updated.len())
            .field("deleted", &inner.deleted.len())
            .field("reset", &inner.reset.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Inbox / Remote
// ---------------------------------------------------------------------------

/// An event marshaled onto the owning context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboxEvent {
    /// A normalized external mutation signal.
    Record(RecordEvent),
    /// A full snapshot delivered by the data source.
    Loaded(Vec<Entity>),
    /// An additional page delivered by the pagination source. Empty means
    /// the source is exhausted.
    Page(Vec<Entity>),
}

/// The owning context's end of the handoff queue.
pub struct Inbox {
    tx: Sender<InboxEvent>,
    rx: Receiver<InboxEvent>,
}

impl Inbox {
    /// Create a new queue.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self { tx, rx }
    }

    /// A cloneable, `Send` producer handle.
    #[must_use]
    pub fn remote(&self) -> Remote {
        Remote {
            tx: self.tx.clone(),
        }
    }

    /// Drain everything queued so far. Never blocks.
    #[must_use]
    pub fn drain(&self) -> Vec<InboxEvent> {
        self.rx.try_iter().collect()
    }
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Inbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inbox").finish_non_exhaustive()
    }
}

/// Producer handle for marshaling events onto the owning context.
#[derive(Clone)]
pub struct Remote {
    tx: Sender<InboxEvent>,
}

impl Remote {
    /// Enqueue an event. Dropped silently when the owning side is gone.
    pub fn push(&self, event: InboxEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("inbox closed, dropping marshaled event");
        }
    }
}

impl fmt::Debug for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Remote").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// LoadCompletion
// ---------------------------------------------------------------------------

/// Which merge pipeline a delivered batch of entities feeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LoadKind {
    Full,
    Page,
}

/// Completion handle passed to data-source and pagination closures.
///
/// `Send`, single-shot: the source may resolve it from any thread; the batch
/// is merged on the owning context's next tick.
#[derive(Debug)]
pub struct LoadCompletion {
    remote: Remote,
    kind: LoadKind,
}

impl LoadCompletion {
    pub(crate) const fn new(remote: Remote, kind: LoadKind) -> Self {
        Self { remote, kind }
    }

    /// Deliver the fetched entities.
    pub fn deliver(self, entities: Vec<Entity>) {
        let event = match self.kind {
            LoadKind::Full => InboxEvent::Loaded(entities),
            LoadKind::Page => InboxEvent::Page(entities),
        };
        self.remote.push(event);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
