//! Handler definitions.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::{FutureExt, Stream, StreamExt};
use serde_json::Value;
use smallvec::SmallVec;

use super::args::Args;
use crate::connection::ConnectionId;
use crate::error::HandlerError;
use crate::protocol::Action;
use crate::state::StateHandle;

/// Name prefix that marks a setter-style handler.
pub const SETTER_PREFIX: &str = "set_";

/// Result of running a handler.
pub type HandlerResult = Result<Reply, HandlerError>;

type SyncFn = Arc<dyn Fn(Invocation) -> HandlerResult + Send + Sync>;
type AsyncFn = Arc<dyn Fn(Invocation) -> BoxFuture<'static, HandlerResult> + Send + Sync>;
type StreamFn = Arc<dyn Fn(Invocation) -> BoxStream<'static, HandlerResult> + Send + Sync>;

/// How a handler receives its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallingConvention {
    /// Named arguments picked out of the payload.
    GenericPayload,

    /// The raw client value as the only argument.
    RawValue,
}

impl CallingConvention {
    /// Derive the convention from a handler name.
    ///
    /// Qualified names such as `AuthState.set_username` are judged by their
    /// last segment.
    pub fn infer(name: &str) -> Self {
        let method = name.rsplit('.').next().unwrap_or(name);
        if method.starts_with(SETTER_PREFIX) {
            CallingConvention::RawValue
        } else {
            CallingConvention::GenericPayload
        }
    }
}

/// What a handler hands back to the dispatcher.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Reply {
    /// Nothing explicit. The dispatcher may auto-refresh the page.
    #[default]
    None,

    /// A client instruction.
    Action(Action),

    /// A JSON object forwarded to the client.
    Json(Value),
}

impl Reply {
    pub fn is_none(&self) -> bool {
        matches!(self, Reply::None)
    }
}

impl From<Action> for Reply {
    fn from(action: Action) -> Self {
        Reply::Action(action)
    }
}

/// The callable behind a handler.
#[derive(Clone)]
pub enum HandlerKind {
    Sync(SyncFn),
    Async(AsyncFn),
    Stream(StreamFn),
}

impl HandlerKind {
    fn label(&self) -> &'static str {
        match self {
            HandlerKind::Sync(_) => "sync",
            HandlerKind::Async(_) => "async",
            HandlerKind::Stream(_) => "stream",
        }
    }
}

/// Everything a handler gets when it runs.
pub struct Invocation {
    handler: String,
    args: Args,
    state: StateHandle,
    connection: Option<ConnectionId>,
    path: Option<String>,
}

impl Invocation {
    pub fn new(handler: impl Into<String>, args: Args, state: StateHandle) -> Self {
        Self {
            handler: handler.into(),
            args,
            state,
            connection: None,
            path: None,
        }
    }

    /// Attach the originating connection and its current path.
    pub fn with_connection(mut self, connection: ConnectionId, path: Option<String>) -> Self {
        self.connection = Some(connection);
        self.path = path;
        self
    }

    pub fn handler_id(&self) -> &str {
        &self.handler
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    /// The state store of the originating session.
    pub fn state(&self) -> &StateHandle {
        &self.state
    }

    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

/// A named, invocable handler.
#[derive(Clone)]
pub struct Handler {
    id: String,
    kind: HandlerKind,
    params: SmallVec<[String; 4]>,
    background: bool,
    owner: Option<String>,
    convention: Option<CallingConvention>,
}

impl Handler {
    /// Create a synchronous handler.
    pub fn new<F>(id: impl Into<String>, f: F) -> Self
    where
        F: Fn(Invocation) -> HandlerResult + Send + Sync + 'static,
    {
        Self::from_kind(id, HandlerKind::Sync(Arc::new(f)))
    }

    /// Create a handler whose future is awaited by the connection task.
    pub fn new_async<F, Fut>(id: impl Into<String>, f: F) -> Self
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::from_kind(id, HandlerKind::Async(Arc::new(move |inv| f(inv).boxed())))
    }

    /// Create a handler that streams partial updates.
    pub fn streaming<F, S>(id: impl Into<String>, f: F) -> Self
    where
        F: Fn(Invocation) -> S + Send + Sync + 'static,
        S: Stream<Item = HandlerResult> + Send + 'static,
    {
        Self::from_kind(id, HandlerKind::Stream(Arc::new(move |inv| f(inv).boxed())))
    }

    fn from_kind(id: impl Into<String>, kind: HandlerKind) -> Self {
        Self {
            id: id.into(),
            kind,
            params: SmallVec::new(),
            background: false,
            owner: None,
            convention: None,
        }
    }

    /// Declare the parameter names bound from the payload.
    pub fn params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = names.into_iter().map(Into::into).collect();
        self
    }

    /// Run on the background worker pool. Only affects sync handlers.
    pub fn background(mut self) -> Self {
        self.background = true;
        self
    }

    /// Record the state type this handler belongs to.
    pub fn owned_by(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Override the name-derived calling convention.
    pub fn with_convention(mut self, convention: CallingConvention) -> Self {
        self.convention = Some(convention);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &HandlerKind {
        &self.kind
    }

    pub fn param_names(&self) -> &[String] {
        &self.params
    }

    pub fn is_background(&self) -> bool {
        self.background
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// The explicit convention if one was set, otherwise the one implied by
    /// the handler's name.
    pub fn calling_convention(&self) -> CallingConvention {
        self.convention
            .unwrap_or_else(|| CallingConvention::infer(&self.id))
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("id", &self.id)
            .field("kind", &self.kind.label())
            .field("params", &self.params)
            .field("background", &self.background)
            .field("owner", &self.owner)
            .finish()
    }
}
