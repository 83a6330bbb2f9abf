//! Actor+Relay primitives: UI callbacks send events through a [`Relay`],
//! one [`Actor`] task per domain owns the state those events change.

pub mod actor;
pub mod relay;

pub use actor::Actor;
pub use relay::{Relay, relay};
