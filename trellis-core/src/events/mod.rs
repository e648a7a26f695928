//! Event Handlers
//!
//! Handlers are the server-side targets of client events. Each one has a
//! stable string id, and the client refers to it only by that id.
//!
//! # Handler shapes
//!
//! - **Sync**: called directly on the connection task, or on the background
//!   worker pool when marked with [`Handler::background`].
//! - **Async**: the returned future is awaited by the connection task.
//! - **Streaming**: every item the stream yields is pushed to the client as
//!   soon as it is produced, in yield order.
//!
//! # Calling conventions
//!
//! A handler either receives named arguments picked out of the event payload
//! ([`CallingConvention::GenericPayload`]) or the raw value the client sent
//! ([`CallingConvention::RawValue`]). The convention is derived from the
//! handler's name once, when it is registered, and stored with it.
//!
//! # Registry
//!
//! [`HandlerRegistry`] maps ids to handlers for the whole process. It is an
//! explicit service passed to the render pipeline and the connection
//! manager. Registering an id that already exists replaces the old entry,
//! which is what lets pages re-register their handlers on every render.

mod args;
mod handler;
mod pool;
mod registry;

pub use args::{Args, Payload};
pub use handler::{
    CallingConvention, Handler, HandlerKind, HandlerResult, Invocation, Reply, SETTER_PREFIX,
};
pub use pool::BackgroundPool;
pub use registry::{HandlerRegistry, InvokeContext, Outcome, RegisteredHandler, ReplySink};
