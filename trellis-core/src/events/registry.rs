//! Handler registry and invocation.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::{FutureExt, StreamExt};
use tracing::{debug, trace};

use super::args::{Args, Payload};
use super::handler::{CallingConvention, Handler, HandlerKind, Invocation, Reply};
use super::pool::BackgroundPool;
use crate::connection::ConnectionId;
use crate::error::{panic_message, HandlerError};
use crate::state::StateHandle;
use crate::tree::Node;

/// A handler together with the convention computed when it was registered.
#[derive(Debug, Clone)]
pub struct RegisteredHandler {
    pub handler: Arc<Handler>,
    pub convention: CallingConvention,
}

/// Receives replies produced while a handler is still running.
///
/// Streaming handlers deliver through this as they yield.
pub trait ReplySink: Send + Sync {
    fn deliver(&self, reply: Reply);
}

/// Per-invocation context supplied by the caller.
#[derive(Debug, Clone)]
pub struct InvokeContext {
    pub state: StateHandle,
    pub connection: Option<ConnectionId>,
    pub path: Option<String>,
}

impl InvokeContext {
    pub fn new(state: StateHandle) -> Self {
        Self {
            state,
            connection: None,
            path: None,
        }
    }

    pub fn with_connection(mut self, connection: ConnectionId, path: Option<String>) -> Self {
        self.connection = Some(connection);
        self.path = path;
        self
    }
}

/// How an invocation finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A sync or async handler returned this reply.
    Completed(Reply),

    /// A streaming handler ran to completion after delivering this many
    /// replies through the sink.
    Streamed { delivered: usize },
}

/// Process-wide map of handler ids to handlers.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, RegisteredHandler>,
    pool: BackgroundPool,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a background pool of the given size.
    pub fn with_background_workers(workers: usize) -> Self {
        Self {
            handlers: DashMap::new(),
            pool: BackgroundPool::new(workers),
        }
    }

    /// Register a handler under its id, replacing any previous entry.
    ///
    /// Returns the id.
    pub fn register(&self, handler: impl Into<Arc<Handler>>) -> String {
        let handler = handler.into();
        let id = handler.id().to_string();
        let convention = handler.calling_convention();
        trace!(handler = %id, ?convention, "registering handler");
        self.handlers.insert(
            id.clone(),
            RegisteredHandler {
                handler,
                convention,
            },
        );
        id
    }

    /// Register every handler bound anywhere in `tree`.
    pub fn register_tree(&self, tree: &Node) -> usize {
        let handlers = tree.bound_handlers();
        let count = handlers.len();
        for handler in handlers {
            self.register(handler);
        }
        count
    }

    pub fn resolve(&self, id: &str) -> Option<RegisteredHandler> {
        self.handlers.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.handlers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn clear(&self) {
        self.handlers.clear();
    }

    /// Registered ids in no particular order.
    pub fn ids(&self) -> Vec<String> {
        self.handlers.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn pool(&self) -> &BackgroundPool {
        &self.pool
    }

    /// Resolve `id`, bind `payload` and run the handler.
    ///
    /// Panics inside the handler are caught and returned as
    /// [`HandlerError::Panicked`]. A streaming handler delivers each
    /// non-empty item through `sink` as soon as it is yielded; if it fails
    /// part way the items already delivered stay delivered.
    pub async fn invoke(
        &self,
        id: &str,
        payload: &Payload,
        ctx: InvokeContext,
        sink: &dyn ReplySink,
    ) -> Result<Outcome, HandlerError> {
        let entry = self
            .resolve(id)
            .ok_or_else(|| HandlerError::NotFound(id.to_string()))?;
        let RegisteredHandler {
            handler,
            convention,
        } = entry;

        let args = Args::bind(handler.param_names(), convention, payload);
        let mut invocation = Invocation::new(id, args, ctx.state);
        if let Some(connection) = ctx.connection {
            invocation = invocation.with_connection(connection, ctx.path);
        }

        debug!(handler = %id, background = handler.is_background(), "invoking handler");

        match handler.kind().clone() {
            HandlerKind::Sync(f) if handler.is_background() => {
                let reply = self.pool.run(move || f(invocation)).await??;
                Ok(Outcome::Completed(reply))
            }
            HandlerKind::Sync(f) => {
                let reply = panic::catch_unwind(AssertUnwindSafe(|| f(invocation)))
                    .map_err(|payload| HandlerError::Panicked(panic_message(payload)))??;
                Ok(Outcome::Completed(reply))
            }
            HandlerKind::Async(f) => {
                let future = panic::catch_unwind(AssertUnwindSafe(|| f(invocation)))
                    .map_err(|payload| HandlerError::Panicked(panic_message(payload)))?;
                let reply = AssertUnwindSafe(future)
                    .catch_unwind()
                    .await
                    .map_err(|payload| HandlerError::Panicked(panic_message(payload)))??;
                Ok(Outcome::Completed(reply))
            }
            HandlerKind::Stream(f) => {
                let stream = panic::catch_unwind(AssertUnwindSafe(|| f(invocation)))
                    .map_err(|payload| HandlerError::Panicked(panic_message(payload)))?;
                let mut stream = AssertUnwindSafe(stream).catch_unwind();
                let mut delivered = 0;
                while let Some(item) = stream.next().await {
                    let reply = item
                        .map_err(|payload| HandlerError::Panicked(panic_message(payload)))??;
                    if reply.is_none() {
                        continue;
                    }
                    sink.deliver(reply);
                    delivered += 1;
                }
                Ok(Outcome::Streamed { delivered })
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
