#![forbid(unsafe_code)]

//! The per-consumer binding and its two-phase render protocol.

use std::rc::Rc;

use tracing::trace;

use tidepool_store::{Equality, SelectError, Selector, SliceUpdate, Store, Subscriber};

/// A mounted consumer's attachment to a [`Store`].
///
/// Construct with [`Binding::mount`] once per consumer instance. The
/// `trigger` callback is the host's "schedule a re-render" hook: the
/// store invokes it whenever this consumer's slice changes (or its
/// selector fails) outside the render cycle. From then on the host
/// drives [`Binding::render`] and [`Binding::commit`]; dropping the
/// binding is the teardown.
pub struct Binding<S: 'static, T: Clone + 'static> {
    store: Store<S>,
    subscriber: Rc<Subscriber<S, T>>,
}

impl<S: 'static, T: Clone + 'static> Binding<S, T> {
    /// Attach a consumer to `store`.
    ///
    /// Builds the subscriber with `trigger` as its callback, eagerly
    /// computing the initial slice (a failing selector propagates and
    /// nothing is attached), then subscribes it and stores the
    /// subscription on the subscriber itself.
    pub fn mount(
        store: &Store<S>,
        trigger: impl Fn(SliceUpdate<T>) + 'static,
        selector: Selector<S, T>,
        equality: Equality<T>,
    ) -> Result<Self, SelectError> {
        let subscriber = store.make_subscriber(trigger, selector, equality)?;
        let subscription = store.listen(&subscriber);
        subscriber.hold_subscription(subscription);
        trace!("binding mounted");
        Ok(Self {
            store: store.clone(),
            subscriber,
        })
    }

    /// Run one render pass. Pure: repeatable, discardable.
    ///
    /// The selector is re-run against the current state only when
    /// `selector` or `equality` is a different `Rc` than the committed
    /// pair, or when the subscriber is in the errored state. The
    /// returned pass holds the slice for this render; pass it to
    /// [`Binding::commit`] if the host accepts the render, or drop it
    /// to discard.
    ///
    /// A failing selector is returned to the caller so the host can
    /// surface it; the subscriber is left untouched (the errored flag
    /// is only raised by the store's own notification path).
    pub fn render(
        &self,
        selector: &Selector<S, T>,
        equality: &Equality<T>,
    ) -> Result<RenderPass<S, T>, SelectError> {
        let fresh = if self.subscriber.uses(selector, equality) && !self.subscriber.errored() {
            None
        } else {
            let candidate = selector(&self.store.get())?;
            let current = self.subscriber.slice();
            (!equality(&current, &candidate)).then_some(candidate)
        };
        let slice = match &fresh {
            Some(candidate) => candidate.clone(),
            None => self.subscriber.slice(),
        };
        Ok(RenderPass {
            slice,
            fresh,
            selector: Rc::clone(selector),
            equality: Rc::clone(equality),
        })
    }

    /// Commit an accepted render. The only mutation point.
    ///
    /// Adopts the freshly computed slice (if the render found one),
    /// installs the selector/equality pair that render used, and clears
    /// the errored flag.
    pub fn commit(&self, pass: RenderPass<S, T>) {
        trace!(changed = pass.fresh.is_some(), "committing render pass");
        self.subscriber
            .adopt(pass.fresh, pass.selector, pass.equality);
    }

    /// The last committed slice.
    #[must_use]
    pub fn committed_slice(&self) -> T {
        self.subscriber.slice()
    }

    /// Whether the subscriber's last evaluation failed.
    #[must_use]
    pub fn errored(&self) -> bool {
        self.subscriber.errored()
    }

    /// Tear down now instead of at drop time.
    pub fn unmount(self) {
        // Drop does the work.
    }
}

impl<S: 'static, T: Clone + 'static> Drop for Binding<S, T> {
    fn drop(&mut self) {
        trace!("binding torn down");
        self.subscriber.release();
    }
}

impl<S: 'static, T: Clone + std::fmt::Debug + 'static> std::fmt::Debug for Binding<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("committed_slice", &self.committed_slice())
            .field("errored", &self.errored())
            .finish()
    }
}

/// The output of one render pass.
///
/// Owns the slice for that render plus the configuration the commit step
/// installs. Dropping a `RenderPass` discards the render; no shared state
/// was touched while producing it.
pub struct RenderPass<S: 'static, T: 'static> {
    slice: T,
    fresh: Option<T>,
    selector: Selector<S, T>,
    equality: Equality<T>,
}

impl<S: 'static, T: 'static> RenderPass<S, T> {
    /// The slice to render with.
    #[must_use]
    pub fn slice(&self) -> &T {
        &self.slice
    }

    /// Whether this render recomputed a slice that differs from the
    /// committed one.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.fresh.is_some()
    }
}

impl<S: 'static, T: std::fmt::Debug + 'static> std::fmt::Debug for RenderPass<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPass")
            .field("slice", &self.slice)
            .field("changed", &self.changed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use tidepool_store::{equality, select};

    #[derive(Clone, Debug, PartialEq)]
    struct AppState {
        count: i32,
        label: &'static str,
    }

    fn mounted(
        store: &Store<AppState>,
        selector: &Selector<AppState, i32>,
        eq: &Equality<i32>,
    ) -> (Binding<AppState, i32>, Rc<Cell<u32>>) {
        let triggers = Rc::new(Cell::new(0));
        let probe = Rc::clone(&triggers);
        let binding = Binding::mount(
            store,
            move |_update: SliceUpdate<i32>| probe.set(probe.get() + 1),
            Rc::clone(selector),
            Rc::clone(eq),
        )
        .unwrap();
        (binding, triggers)
    }

    #[test]
    fn stable_configuration_skips_re_evaluation() {
        let store = Store::with_initial(AppState {
            count: 3,
            label: "a",
        });
        let calls = Rc::new(Cell::new(0u32));
        let probe = Rc::clone(&calls);
        let selector: Selector<AppState, i32> = select::map(move |s: &AppState| {
            probe.set(probe.get() + 1);
            s.count
        });
        let eq: Equality<i32> = equality::by_eq();
        let (binding, _triggers) = mounted(&store, &selector, &eq);
        assert_eq!(calls.get(), 1, "eager evaluation at mount");

        let pass = binding.render(&selector, &eq).unwrap();
        assert_eq!(*pass.slice(), 3);
        assert!(!pass.changed());
        assert_eq!(calls.get(), 1, "same Rc pair, no re-evaluation");
        binding.commit(pass);
    }

    #[test]
    fn swapped_selector_recomputes_and_commit_adopts() {
        let store = Store::with_initial(AppState {
            count: 3,
            label: "a",
        });
        let selector: Selector<AppState, i32> = select::map(|s: &AppState| s.count);
        let eq: Equality<i32> = equality::by_eq();
        let (binding, _triggers) = mounted(&store, &selector, &eq);

        let doubled: Selector<AppState, i32> = select::map(|s: &AppState| s.count * 2);
        let pass = binding.render(&doubled, &eq).unwrap();
        assert_eq!(*pass.slice(), 6);
        assert!(pass.changed());
        binding.commit(pass);
        assert_eq!(binding.committed_slice(), 6);

        // Committed configuration is now the new pair.
        let pass = binding.render(&doubled, &eq).unwrap();
        assert!(!pass.changed());
    }

    #[test]
    fn discarded_render_leaves_shared_state_untouched() {
        let store = Store::with_initial(AppState {
            count: 3,
            label: "a",
        });
        let selector: Selector<AppState, i32> = select::map(|s: &AppState| s.count);
        let eq: Equality<i32> = equality::by_eq();
        let (binding, _triggers) = mounted(&store, &selector, &eq);

        let doubled: Selector<AppState, i32> = select::map(|s: &AppState| s.count * 2);
        let speculative = binding.render(&doubled, &eq).unwrap();
        assert_eq!(*speculative.slice(), 6);
        drop(speculative);

        assert_eq!(binding.committed_slice(), 3, "discard mutated nothing");
        // The retry recomputes because nothing was committed.
        let retry = binding.render(&doubled, &eq).unwrap();
        assert!(retry.changed());
        assert_eq!(*retry.slice(), 6);
    }

    #[test]
    fn store_write_triggers_and_updates_committed_slice() {
        let store = Store::with_initial(AppState {
            count: 0,
            label: "a",
        });
        let selector: Selector<AppState, i32> = select::map(|s: &AppState| s.count);
        let eq: Equality<i32> = equality::by_eq();
        let (binding, triggers) = mounted(&store, &selector, &eq);

        store.update(|s| s.count = 9);
        assert_eq!(triggers.get(), 1, "host asked to re-render");
        // The subscriber already synced during notification, so a render
        // with the stable configuration sees the fresh slice without
        // re-evaluating.
        let pass = binding.render(&selector, &eq).unwrap();
        assert_eq!(*pass.slice(), 9);
        assert!(!pass.changed());
        binding.commit(pass);

        // A write the equality check filters out does not trigger.
        store.update(|s| s.label = "b");
        assert_eq!(triggers.get(), 1);
    }

    #[test]
    fn teardown_cancels_the_subscription_exactly_once() {
        let store = Store::with_initial(AppState {
            count: 0,
            label: "a",
        });
        let selector: Selector<AppState, i32> = select::map(|s: &AppState| s.count);
        let eq: Equality<i32> = equality::by_eq();
        let (binding, triggers) = mounted(&store, &selector, &eq);
        assert_eq!(store.listener_count(), 1);

        binding.unmount();
        assert_eq!(store.listener_count(), 0);

        store.update(|s| s.count = 1);
        assert_eq!(triggers.get(), 0, "no trigger after teardown");
    }

    #[test]
    fn render_surfaces_selector_failure_without_mutation() {
        let store = Store::with_initial(AppState {
            count: 1,
            label: "a",
        });
        let selector: Selector<AppState, i32> = select::map(|s: &AppState| s.count);
        let eq: Equality<i32> = equality::by_eq();
        let (binding, _triggers) = mounted(&store, &selector, &eq);

        let failing: Selector<AppState, i32> =
            select::try_map(|_: &AppState| Err(SelectError::new("broken projection")));
        let err = binding.render(&failing, &eq).unwrap_err();
        assert_eq!(err.message(), "broken projection");
        assert!(!binding.errored(), "render never mutates the subscriber");
        assert_eq!(binding.committed_slice(), 1);
    }

    #[test]
    fn errored_flag_forces_re_evaluation_on_next_render() {
        let store = Store::with_initial(AppState {
            count: 1,
            label: "ok",
        });
        let seen = Rc::new(RefCell::new(Vec::new()));
        let probe = Rc::clone(&seen);
        let selector: Selector<AppState, i32> = select::try_map(|s: &AppState| {
            if s.label == "boom" {
                Err(SelectError::new("label exploded"))
            } else {
                Ok(s.count)
            }
        });
        let eq: Equality<i32> = equality::by_eq();
        let binding = Binding::mount(
            &store,
            move |update: SliceUpdate<i32>| probe.borrow_mut().push(update),
            Rc::clone(&selector),
            Rc::clone(&eq),
        )
        .unwrap();

        store.update(|s| s.label = "boom");
        assert!(binding.errored());
        assert!(seen.borrow()[0].is_failed());

        // Host re-renders with the unchanged configuration: the errored
        // flag forces a recompute instead of trusting the stale cache,
        // so the failure stays visible while the state is still broken.
        let err = binding.render(&selector, &eq).unwrap_err();
        assert_eq!(err.message(), "label exploded");

        // A healing write recovers through the notification path.
        store.update(|s| {
            s.label = "ok";
            s.count = 2;
        });
        assert_eq!(*seen.borrow().last().unwrap(), SliceUpdate::Changed(2));
        let pass = binding.render(&selector, &eq).unwrap();
        assert_eq!(*pass.slice(), 2);
        binding.commit(pass);
        assert!(!binding.errored());
    }
}
