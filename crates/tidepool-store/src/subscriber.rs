#![forbid(unsafe_code)]

//! Per-attachment subscriber records.
//!
//! A [`Subscriber`] pairs a selector with an equality check and caches the
//! last slice the selector produced. The store re-runs the selector on
//! every adopted write; the subscriber decides — under its own equality
//! definition — whether the consumer's callback fires. Each subscriber is
//! an independent fault domain: a failing selector marks only that
//! subscriber as errored and delivers [`SliceUpdate::Failed`] to its own
//! callback.
//!
//! # Invariants
//!
//! 1. `current_slice` only ever holds a value the selector returned
//!    successfully; failures never overwrite it.
//! 2. `errored` is set on failure and cleared on the next successful
//!    evaluation (or by a committed render pass, see `tidepool-bind`).
//! 3. Recovery from the errored state delivers the recomputed slice
//!    unconditionally — the cached slice is stale, so the equality gate
//!    is skipped.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::trace;

use crate::error::SelectError;
use crate::store::Subscription;

/// Pure function from the full state to a derived slice.
///
/// Receives the state behind its `Rc` so whole-state selectors can clone
/// the handle without cloning the value. `Rc` identity of the selector
/// itself is meaningful: the binding layer re-evaluates when a consumer
/// swaps in a different selector between renders.
pub type Selector<S, T> = Rc<dyn Fn(&Rc<S>) -> Result<T, SelectError>>;

/// Pure predicate deciding whether two slices should count as unchanged.
pub type Equality<T> = Rc<dyn Fn(&T, &T) -> bool>;

/// Callback receiving slice updates for one subscriber.
pub type SliceListener<T> = Rc<dyn Fn(SliceUpdate<T>)>;

/// Payload delivered to a subscriber's callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SliceUpdate<T> {
    /// The slice changed under the subscriber's equality check.
    Changed(T),
    /// The selector failed; the previously cached slice is untouched.
    Failed(SelectError),
}

impl<T> SliceUpdate<T> {
    /// The new slice, if this update carries one.
    pub fn changed(self) -> Option<T> {
        match self {
            Self::Changed(slice) => Some(slice),
            Self::Failed(_) => None,
        }
    }

    /// Whether this update reports a failed evaluation.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// One consumer's attachment to a [`Store`](crate::Store).
///
/// Created by [`Store::make_subscriber`](crate::Store::make_subscriber)
/// with `current_slice` eagerly computed from the state at creation time.
/// The store's notification closure holds the subscriber through an `Rc`;
/// the consumer (typically a `tidepool-bind` binding) owns the other
/// handle and is the only party that swaps the selector/equality pair or
/// releases the subscription.
pub struct Subscriber<S: 'static, T: 'static> {
    selector: RefCell<Selector<S, T>>,
    equality: RefCell<Equality<T>>,
    current_slice: RefCell<T>,
    errored: Cell<bool>,
    listener: SliceListener<T>,
    subscription: RefCell<Option<Subscription>>,
}

impl<S: 'static, T: Clone + 'static> Subscriber<S, T> {
    pub(crate) fn new(
        state: &Rc<S>,
        listener: SliceListener<T>,
        selector: Selector<S, T>,
        equality: Equality<T>,
    ) -> Result<Rc<Self>, SelectError> {
        let current_slice = (selector)(state)?;
        Ok(Rc::new(Self {
            selector: RefCell::new(selector),
            equality: RefCell::new(equality),
            current_slice: RefCell::new(current_slice),
            errored: Cell::new(false),
            listener,
            subscription: RefCell::new(None),
        }))
    }

    /// Clone of the last successfully computed slice.
    #[must_use]
    pub fn slice(&self) -> T {
        self.current_slice.borrow().clone()
    }

    /// Whether the last evaluation failed.
    #[must_use]
    pub fn errored(&self) -> bool {
        self.errored.get()
    }

    /// Whether `selector` and `equality` are the exact (`Rc`-identical)
    /// pair currently installed on this subscriber.
    #[must_use]
    pub fn uses(&self, selector: &Selector<S, T>, equality: &Equality<T>) -> bool {
        Rc::ptr_eq(&self.selector.borrow(), selector)
            && Rc::ptr_eq(&self.equality.borrow(), equality)
    }

    /// Install the configuration an accepted render pass evaluated with.
    ///
    /// Adopts `fresh` as the cached slice when the render found a change,
    /// installs the selector/equality pair used by that render, and clears
    /// the errored flag. This is the commit half of the two-phase render
    /// protocol; render passes themselves never call it.
    pub fn adopt(&self, fresh: Option<T>, selector: Selector<S, T>, equality: Equality<T>) {
        if let Some(slice) = fresh {
            *self.current_slice.borrow_mut() = slice;
        }
        *self.selector.borrow_mut() = selector;
        *self.equality.borrow_mut() = equality;
        self.errored.set(false);
    }

    /// Stash the subscription that keeps this subscriber attached.
    pub fn hold_subscription(&self, subscription: Subscription) {
        *self.subscription.borrow_mut() = Some(subscription);
    }

    /// Cancel the stashed subscription, if any. Idempotent.
    pub fn release(&self) {
        if let Some(subscription) = self.subscription.borrow_mut().take() {
            subscription.cancel();
        }
    }

    /// Re-evaluate against `state` and deliver to the callback if the
    /// slice changed. Runs synchronously inside the store's notification
    /// pass; failures stay inside this subscriber.
    pub(crate) fn evaluate(&self, state: &Rc<S>) {
        let selector = Rc::clone(&*self.selector.borrow());
        match selector(state) {
            Ok(new_slice) => {
                let changed = self.errored.get() || {
                    let equality = Rc::clone(&*self.equality.borrow());
                    let current = self.current_slice.borrow();
                    !equality(&current, &new_slice)
                };
                if changed {
                    *self.current_slice.borrow_mut() = new_slice.clone();
                    self.errored.set(false);
                    (self.listener)(SliceUpdate::Changed(new_slice));
                }
            }
            Err(err) => {
                trace!(error = %err, "selector failed during notification");
                self.errored.set(true);
                (self.listener)(SliceUpdate::Failed(err));
            }
        }
    }
}

impl<S: 'static, T: std::fmt::Debug + 'static> std::fmt::Debug for Subscriber<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("current_slice", &self.current_slice.borrow())
            .field("errored", &self.errored.get())
            .field("attached", &self.subscription.borrow().is_some())
            .finish()
    }
}
