#![forbid(unsafe_code)]

//! Consumer-facing synchronization layer for Tidepool stores.
//!
//! A [`Binding`] gives a re-render-driven consumer a tear-resistant way
//! to read a derived slice of store state. The host framework's contract
//! is three-phase:
//!
//! 1. a *render* phase that must be pure and may run any number of times
//!    before one run is accepted,
//! 2. exactly one *commit* per accepted render, where side effects are
//!    permitted,
//! 3. a *teardown* invoked exactly once when the consumer goes away.
//!
//! [`Binding::render`] returns a [`RenderPass`] value holding the slice
//! for that render plus everything the commit step needs; dropping the
//! pass discards the render without touching shared state, so a
//! speculative render that the host throws away can never corrupt the
//! subscriber.
//!
//! # Invariants
//!
//! 1. `render` never mutates the subscriber; all shared-state writes
//!    happen in `commit`.
//! 2. A render re-evaluates the selector only when the selector identity,
//!    the equality-check identity, or the subscriber's errored flag
//!    differs from the last committed configuration.
//! 3. The slice a render returns is never older than the committed slice
//!    at the start of that render.
//! 4. Exactly one underlying store subscription exists per mounted
//!    binding; dropping the binding cancels it.

pub mod binding;

pub use binding::{Binding, RenderPass};
