//! State Store
//!
//! Reactive state is declared as a [`StateSchema`]: a named set of fields with
//! default values, read-only computed fields and handler methods. A
//! [`StateStore`] holds one live [`State`] per schema, created lazily the
//! first time a handler or page touches it.
//!
//! Schema handlers are registered as `<State>.<method>`, so `Counter` gets
//! `Counter.increment` and one `Counter.set_<field>` setter per field.
//!
//! # Mutation
//!
//! [`State::set`] compares the new value with the current one and only
//! records a change when they differ. The dispatcher uses those records to
//! decide whether a handler that returned nothing should refresh the page.
//!
//! # Scope
//!
//! Each connection owns its own store by default. With
//! [`StateScope::Shared`] every connection gets a handle to the same store.
//! Mutation through a handle is guarded by a mutex, but the per-connection
//! ordering guarantee no longer holds: two connections may interleave their
//! handlers against the same fields.
//!
//! # Sessions
//!
//! A [`SessionStore`] keeps snapshots of a session's state so a new
//! connection can pick up where the page render left off. Only successful
//! page renders save a snapshot. A connection takes its snapshot out of the
//! store when it opens and saves it back when it closes. The in-memory store
//! expires unclaimed snapshots and caps how many it holds.

mod schema;
mod session;
mod store;

pub use schema::{FieldDef, FieldKind, StateSchema};
pub use session::{
    new_session_id, MemorySessionStore, SessionStore, DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TTL,
};
pub use store::{Activity, State, StateHandle, StateScope, StateSnapshot, StateStore};
