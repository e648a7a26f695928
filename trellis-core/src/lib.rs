//! Trellis Core
//!
//! This crate provides the runtime for the Trellis server-rendered UI
//! framework. Pages are built on the server as component trees, rendered to
//! HTML and kept live over a socket: browser events call server handlers,
//! handlers mutate per-connection state, and the server answers with
//! re-rendered content or client actions.
//!
//! It implements:
//!
//! - A component tree with event bindings and deterministic HTML rendering
//! - A handler registry with sync, async, background and streaming handlers
//! - Declarative state types with auto-generated setters and session restore
//! - A connection manager that serializes dispatch per connection
//! - The JSON/MessagePack wire protocol and a model of the client reconciler
//! - A page router and render pipeline served over axum
//!
//! # Architecture
//!
//! - `tree`: `Node`, children, bindings, rendering
//! - `events`: handlers, argument binding, registry, background pool
//! - `state`: state schemas, stores, sessions
//! - `protocol`: client/server messages, actions, frame codec
//! - `reconcile`: client-side apply model over an abstract DOM
//! - `connection`: live connections, dispatch, broadcast
//! - `page`: routing, render pipeline, document shell, browser runtime
//! - `server`: HTTP and socket endpoints
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_core::prelude::*;
//!
//! let counter = StateSchema::new("Counter")
//!     .field("count", 0)
//!     .method("increment", |state, _| {
//!         let n = state.get_as::<i64>("count")?;
//!         state.set("count", n + 1)?;
//!         Ok(Reply::None)
//!     })
//!     .build();
//!
//! let increment = counter.handler("increment")?;
//! let page_state = counter.clone();
//!
//! App::new()
//!     .state(&counter)
//!     .page("/", move |ctx| {
//!         let count = ctx.state().read(&page_state, "count").unwrap_or_default();
//!         Ok(Node::new("div")
//!             .child(Node::with("p", count.to_string()))
//!             .child(Node::with("button", "+").on_click(increment.clone())))
//!     })
//!     .build()
//!     .run()
//!     .await?;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod logging;
pub mod page;
pub mod protocol;
pub mod reconcile;
pub mod server;
pub mod state;
pub mod tree;

#[cfg(feature = "python")]
mod python;

pub use config::Config;
pub use error::{BoxError, TrellisError};
pub use server::{App, Server};

/// The types most applications need.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{BoxError, HandlerError, TrellisError};
    pub use crate::events::{Args, Handler, HandlerResult, Invocation, Reply};
    pub use crate::page::PageContext;
    pub use crate::protocol::{Action, ToastVariant};
    pub use crate::server::{App, Server};
    pub use crate::state::{State, StateSchema, StateScope};
    pub use crate::tree::{Child, Node};
}
