#![forbid(unsafe_code)]

//! The state container.
//!
//! [`Store<S>`] owns a single state value behind an `Rc`, a set of
//! zero-argument notification closures, and nothing else. Writes come in
//! two shapes — a partial value ([`Store::set`] with a [`Patch`]) or an
//! updater function ([`Store::set_with`]) — and both produce the complete
//! next state; handing back the current `Rc` makes the write a no-op.
//! Every adopted write synchronously notifies a snapshot of the listener
//! set before the write call returns.
//!
//! # Invariants
//!
//! 1. The state is always a complete value of `S`; partial updates merge
//!    into a full replacement before adoption.
//! 2. Listener removal is exact: a [`Subscription`] removes only the
//!    listener it was issued for, and doing so twice is a no-op.
//! 3. [`Store::destroy`] clears the audience but not the state; the
//!    container keeps serving reads and writes afterwards.
//! 4. Two stores share nothing — all state is per-instance, never
//!    module-level.
//!
//! # Failure Modes
//!
//! - Selector failure at attach time ([`Store::make_subscriber`]):
//!   propagated to the caller; nothing is registered.
//! - Selector failure during notification: confined to that subscriber
//!   (see [`Subscriber`]).
//! - State read before the creator closure returns: contract violation,
//!   panics (the container is not yet in a valid state).

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::error::SelectError;
use crate::subscriber::{Equality, Selector, SliceUpdate, Subscriber};
use crate::{equality, select};

/// A partial write merged over the current state.
///
/// Implementors produce the complete next state from the current one;
/// fields the patch does not carry are retained from `state`. For the
/// updater-closure form of a write, use [`Store::set_with`].
///
/// Returning a clone of the input `Rc` leaves the state untouched and
/// the write becomes a no-op: no listener is notified.
pub trait Patch<S> {
    /// Merge this patch over `state`, producing the full next state.
    fn merge(self, state: &Rc<S>) -> Rc<S>;
}

struct RegisteredListener {
    id: u64,
    notify: Rc<dyn Fn()>,
}

type ListenerSet = RefCell<Vec<RegisteredListener>>;

struct StoreInner<S> {
    /// `None` only while the creator closure is still running.
    state: RefCell<Option<Rc<S>>>,
    listeners: Rc<ListenerSet>,
    next_listener_id: Cell<u64>,
}

/// Capability to remove one listener from a store.
///
/// Removal happens on drop or via [`Subscription::cancel`]; either way it
/// is exact (only the listener this subscription was issued for) and
/// idempotent (a second removal, or removal after [`Store::destroy`],
/// is a no-op).
pub struct Subscription {
    listeners: Weak<ListenerSet>,
    id: u64,
}

impl Subscription {
    /// Remove the listener now instead of at drop time.
    pub fn cancel(self) {
        // Drop does the work.
    }

    fn remove(&self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.borrow_mut().retain(|entry| entry.id != self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Shared handle to a state container.
///
/// Cloning the handle shares the same container; independent containers
/// are created by independent calls to [`Store::new`] or
/// [`Store::with_initial`].
pub struct Store<S> {
    inner: Rc<StoreInner<S>>,
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: 'static> Store<S> {
    /// Create a container whose initial state is produced by `creator`.
    ///
    /// The creator receives the store handle — the handle carries the
    /// read, write, and subscribe surface — and must return the complete
    /// initial state synchronously. The handle may be cloned and stashed
    /// for later writes, but the state must not be *read* until the
    /// creator has returned (see [`Store::get`]).
    pub fn new(creator: impl FnOnce(&Store<S>) -> S) -> Self {
        let store = Self {
            inner: Rc::new(StoreInner {
                state: RefCell::new(None),
                listeners: Rc::new(RefCell::new(Vec::new())),
                next_listener_id: Cell::new(0),
            }),
        };
        let initial = creator(&store);
        *store.inner.state.borrow_mut() = Some(Rc::new(initial));
        store
    }

    /// Create a container from a ready-made initial state.
    pub fn with_initial(state: S) -> Self {
        Self::new(move |_| state)
    }

    /// Current state. No side effects.
    ///
    /// # Panics
    ///
    /// Panics when called before the creator closure passed to
    /// [`Store::new`] has returned — the container holds no state yet.
    #[must_use]
    pub fn get(&self) -> Rc<S> {
        self.inner
            .state
            .borrow()
            .clone()
            .expect("state read before the creator returned")
    }

    /// Borrow-style read: apply `f` to the current state.
    pub fn with<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.get())
    }

    /// Apply a partial-value write.
    ///
    /// The patch merges over the current state into a complete next
    /// state. If that state is pointer-identical to the current one the
    /// write is a no-op; otherwise the store adopts it and synchronously
    /// notifies every currently registered listener. Listeners registered
    /// or removed by listener code during the pass take effect for the
    /// *next* pass — the current pass iterates a snapshot.
    pub fn set(&self, patch: impl Patch<S>) {
        let current = self.get();
        let next = patch.merge(&current);
        self.adopt(&current, next);
    }

    /// Apply an updater-function write.
    ///
    /// Same adoption and notification semantics as [`Store::set`]; the
    /// closure computes the complete next state from the current one,
    /// and returning `Rc::clone` of its argument makes the write a
    /// no-op.
    pub fn set_with(&self, f: impl FnOnce(&Rc<S>) -> Rc<S>) {
        let current = self.get();
        let next = f(&current);
        self.adopt(&current, next);
    }

    /// Clone-mutate-adopt convenience write.
    ///
    /// Always adopts a fresh state value, so listeners are always
    /// notified; per-subscriber equality checks still gate callbacks.
    pub fn update(&self, f: impl FnOnce(&mut S))
    where
        S: Clone,
    {
        self.set_with(move |state| {
            let mut next = S::clone(state);
            f(&mut next);
            Rc::new(next)
        });
    }

    fn adopt(&self, current: &Rc<S>, next: Rc<S>) {
        if Rc::ptr_eq(current, &next) {
            trace!("write produced identical state, skipping notification");
            return;
        }
        *self.inner.state.borrow_mut() = Some(next);
        self.notify_all();
    }

    /// Low-level subscription primitive.
    ///
    /// `listener` is invoked, with no arguments, after every adopted
    /// write. Most consumers want the selector-aware [`Store::subscribe`]
    /// or [`Store::watch`] instead.
    pub fn subscribe_raw(&self, listener: impl Fn() + 'static) -> Subscription {
        let id = self.inner.next_listener_id.get();
        self.inner.next_listener_id.set(id + 1);
        self.inner.listeners.borrow_mut().push(RegisteredListener {
            id,
            notify: Rc::new(listener),
        });
        trace!(id, "listener registered");
        Subscription {
            listeners: Rc::downgrade(&self.inner.listeners),
            id,
        }
    }

    /// Build a subscriber without attaching it.
    ///
    /// Pure factory: the cached slice is eagerly computed from the
    /// current state, and a failing selector propagates to the caller.
    pub fn make_subscriber<T: Clone + 'static>(
        &self,
        listener: impl Fn(SliceUpdate<T>) + 'static,
        selector: Selector<S, T>,
        equality: Equality<T>,
    ) -> Result<Rc<Subscriber<S, T>>, SelectError> {
        Subscriber::new(&self.get(), Rc::new(listener), selector, equality)
    }

    /// Attach a subscriber built by [`Store::make_subscriber`].
    ///
    /// The returned [`Subscription`] removes exactly this attachment.
    pub fn listen<T: Clone + 'static>(&self, subscriber: &Rc<Subscriber<S, T>>) -> Subscription {
        let weak = Rc::downgrade(&self.inner);
        let subscriber = Rc::clone(subscriber);
        self.subscribe_raw(move || {
            if let Some(inner) = weak.upgrade() {
                let state = inner.state.borrow().clone();
                if let Some(state) = state {
                    subscriber.evaluate(&state);
                }
            }
        })
    }

    /// Selector-aware subscription: `listen(make_subscriber(..)?)`.
    pub fn subscribe<T: Clone + 'static>(
        &self,
        listener: impl Fn(SliceUpdate<T>) + 'static,
        selector: Selector<S, T>,
        equality: Equality<T>,
    ) -> Result<Subscription, SelectError> {
        let subscriber = self.make_subscriber(listener, selector, equality)?;
        Ok(self.listen(&subscriber))
    }

    /// Subscribe to the whole state with pointer equality.
    ///
    /// The default configuration resolved explicitly: whole-state
    /// selector, `Rc::ptr_eq` as the equality check. Cannot fail.
    pub fn watch(&self, listener: impl Fn(SliceUpdate<Rc<S>>) + 'static) -> Subscription {
        self.subscribe(listener, select::whole(), equality::by_ptr())
            .expect("whole-state selector is infallible")
    }

    /// Remove every listener.
    ///
    /// Outstanding [`Subscription`]s become no-ops. The container stays
    /// live: reads, writes, and new subscriptions keep working.
    pub fn destroy(&self) {
        let removed = self.inner.listeners.borrow().len();
        self.inner.listeners.borrow_mut().clear();
        trace!(removed, "store destroyed, audience cleared");
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    fn notify_all(&self) {
        // Snapshot so listener code may subscribe/unsubscribe mid-pass.
        let snapshot: Vec<Rc<dyn Fn()>> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|entry| Rc::clone(&entry.notify))
            .collect();
        trace!(listeners = snapshot.len(), "notifying listeners");
        for notify in snapshot {
            notify();
        }
    }
}

impl<S: std::fmt::Debug + 'static> std::fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.inner.state.borrow())
            .field("listeners", &self.listener_count())
            .finish()
    }
}
