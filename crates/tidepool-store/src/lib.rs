#![forbid(unsafe_code)]

//! External state container for Tidepool.
//!
//! This crate provides the mutable half of the Tidepool stack:
//!
//! - [`Store`]: a shared, single-threaded state container. Writes replace
//!   the state wholesale (never mutate in place) and synchronously notify
//!   every registered listener.
//! - [`Subscriber`]: a per-attachment record pairing a selector with an
//!   equality check, caching the last slice it produced and tracking
//!   whether the last evaluation failed.
//! - [`Subscription`]: RAII guard that removes its listener on drop.
//! - [`SliceUpdate`]: the tagged payload delivered to subscriber
//!   callbacks — either a changed slice or the error that prevented one.
//!
//! # Architecture
//!
//! `Store<S>` uses `Rc<RefCell<..>>` for single-threaded shared ownership.
//! State lives behind an `Rc<S>`, so pointer identity is the top-level
//! dirty check: a write that hands back the same `Rc` is a no-op.
//! Notification iterates a snapshot of the listener set, so listeners may
//! subscribe or unsubscribe mid-pass without corrupting the iteration.
//!
//! # Invariants
//!
//! 1. Notification for a write completes before [`Store::set`] returns.
//! 2. A write producing a pointer-identical state notifies nobody.
//! 3. A subscriber's callback fires only when its equality check reports
//!    the slice changed (or when recovering from a failed evaluation).
//! 4. One subscriber's failing selector never prevents delivery to other
//!    subscribers and never disturbs the listener set.
//! 5. Dropping (or cancelling) a [`Subscription`] is exact and idempotent;
//!    [`Store::destroy`] turns all outstanding subscriptions into no-ops
//!    while leaving the container usable.

pub mod equality;
pub mod error;
pub mod select;
pub mod store;
pub mod subscriber;

pub use error::SelectError;
pub use store::{Patch, Store, Subscription};
pub use subscriber::{Equality, Selector, SliceListener, SliceUpdate, Subscriber};
