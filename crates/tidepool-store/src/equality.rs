#![forbid(unsafe_code)]

//! Equality-check constructors.
//!
//! An equality check decides whether two slices count as unchanged; a
//! subscriber's callback fires only when its check reports inequality.
//! Like selectors, checks are `Rc<dyn Fn>` values compared by identity
//! in the binding layer.

use std::rc::Rc;

use crate::subscriber::Equality;

/// Pointer identity on `Rc` slices.
///
/// This is the default for whole-state subscriptions: every adopted
/// write is a fresh `Rc`, so every adopted write fires.
#[must_use]
pub fn by_ptr<T: 'static>() -> Equality<Rc<T>> {
    Rc::new(|a: &Rc<T>, b: &Rc<T>| Rc::ptr_eq(a, b))
}

/// Value equality via `PartialEq`.
#[must_use]
pub fn by_eq<T: PartialEq + 'static>() -> Equality<T> {
    Rc::new(|a: &T, b: &T| a == b)
}
