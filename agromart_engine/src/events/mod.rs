//! Order and payment events.
//!
//! The public APIs publish an event after each committed change. Subscribers register async hooks in [`EventHooks`];
//! [`EventHandlers`] turns the hooks into channel-backed handlers, and the APIs are given the matching
//! [`EventProducers`].
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers, HookFuture};
