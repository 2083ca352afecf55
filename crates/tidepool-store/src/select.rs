#![forbid(unsafe_code)]

//! Selector constructors.
//!
//! Selectors are `Rc<dyn Fn>` values on purpose: the binding layer
//! compares them by `Rc` identity between renders, so a consumer that
//! wants to avoid re-evaluation keeps and reuses the same selector value.

use std::rc::Rc;

use crate::error::SelectError;
use crate::subscriber::Selector;

/// The identity selector: the whole state, as a cheap `Rc` clone.
///
/// This is the default when no selector is given.
#[must_use]
pub fn whole<S: 'static>() -> Selector<S, Rc<S>> {
    Rc::new(|state: &Rc<S>| Ok(Rc::clone(state)))
}

/// Selector from an infallible projection of the state.
#[must_use]
pub fn map<S: 'static, T: 'static>(f: impl Fn(&S) -> T + 'static) -> Selector<S, T> {
    Rc::new(move |state: &Rc<S>| Ok(f(state)))
}

/// Selector from a fallible projection of the state.
#[must_use]
pub fn try_map<S: 'static, T: 'static>(
    f: impl Fn(&S) -> Result<T, SelectError> + 'static,
) -> Selector<S, T> {
    Rc::new(move |state: &Rc<S>| f(state))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_clones_the_handle() {
        let state = Rc::new(5u32);
        let selector = whole::<u32>();
        let slice = selector(&state).unwrap();
        assert!(Rc::ptr_eq(&state, &slice));
    }

    #[test]
    fn map_projects_fields() {
        let state = Rc::new((1u8, "tide"));
        let selector = map(|s: &(u8, &str)| s.1);
        assert_eq!(selector(&state).unwrap(), "tide");
    }

    #[test]
    fn try_map_propagates_failure() {
        let state = Rc::new(0u32);
        let selector = try_map(|_: &u32| Err::<u32, _>(SelectError::new("nope")));
        assert!(selector(&state).is_err());
    }
}
