//! Connection Manager
//!
//! Every open socket becomes a [`Connection`]: an id, the session's state, the
//! page path the client is on and the sending half of an outbound queue. A
//! single writer task drains that queue into the socket, so messages reach
//! the client in the order they were queued.
//!
//! # Ordering
//!
//! [`ConnectionManager::serve`] reads one inbound frame, dispatches it and
//! only then reads the next. The handler for the second message of a
//! connection never starts before the first handler's response is queued.
//! Different connections are served by different tasks and never wait for
//! each other.
//!
//! # Responses
//!
//! The [`Dispatcher`] turns a handler's result into at most one message:
//!
//! - an action or JSON reply is sent as is;
//! - no reply re-renders the connection's current page and sends it as
//!   `navigate_content`, unless the handler only wrote unchanged values;
//! - a streaming handler's items are sent as they are yielded;
//! - an unknown handler or a failing one sends nothing.
//!
//! Sending on a closed connection is a no-op.

mod dispatch;
mod id;
mod link;
mod manager;

pub use dispatch::Dispatcher;
pub use id::ConnectionId;
pub use link::Connection;
pub use manager::ConnectionManager;
