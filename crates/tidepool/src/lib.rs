#![forbid(unsafe_code)]

//! Tidepool public facade crate.
//!
//! Re-exports the state container (`tidepool-store`) and the render
//! binding layer (`tidepool-bind`) under one roof.

pub use tidepool_bind::{Binding, RenderPass};
pub use tidepool_store::{
    Equality, Patch, SelectError, Selector, SliceListener, SliceUpdate, Store, Subscriber,
    Subscription, equality, select,
};

pub mod prelude {
    pub use tidepool_bind::{Binding, RenderPass};
    pub use tidepool_store::equality;
    pub use tidepool_store::select;
    pub use tidepool_store::{Patch, SelectError, SliceUpdate, Store, Subscription};
}
