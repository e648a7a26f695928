//! Live connection table.

use std::sync::Arc;

use dashmap::DashMap;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::dispatch::Dispatcher;
use super::id::ConnectionId;
use super::link::Connection;
use crate::error::TransportError;
use crate::protocol::{Frame, Outgoing, WireFormat};
use crate::state::{SessionStore, StateHandle, StateScope, StateStore};

/// Tracks open connections and the state each one is bound to.
pub struct ConnectionManager {
    live: DashMap<ConnectionId, Arc<Connection>>,
    dispatcher: Dispatcher,
    scope: StateScope,
    shared: StateHandle,
    sessions: Option<Arc<dyn SessionStore>>,
}

impl ConnectionManager {
    pub fn new(dispatcher: Dispatcher, scope: StateScope) -> Self {
        Self {
            live: DashMap::new(),
            dispatcher,
            scope,
            shared: StateHandle::default(),
            sessions: None,
        }
    }

    /// Persist per-session state in `store` between a page load and the
    /// socket that follows it.
    pub fn with_sessions(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(store);
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn scope(&self) -> StateScope {
        self.scope
    }

    /// The state a request or connection for `session` should use.
    ///
    /// Shared scope always returns the process-wide store. Otherwise a saved
    /// snapshot for `session` is taken out of the session store and restored
    /// into a fresh store. [`disconnect`](Self::disconnect) saves it back.
    pub fn state_for(&self, session: Option<&str>) -> StateHandle {
        if self.scope == StateScope::Shared {
            return self.shared.clone();
        }
        let saved = session
            .zip(self.sessions.as_ref())
            .and_then(|(id, store)| store.take(id));
        match saved {
            Some(snapshot) => StateHandle::new(StateStore::restored(snapshot)),
            None => StateHandle::default(),
        }
    }

    /// Save `state` under `session`, if sessions are persisted.
    pub fn save_session(&self, session: &str, state: &StateHandle) {
        if self.scope == StateScope::Shared {
            return;
        }
        if let Some(store) = &self.sessions {
            store.save(session, state.snapshot());
        }
    }

    /// Register a new connection.
    ///
    /// The returned receiver must be drained by a writer task.
    pub fn connect(
        &self,
        session: Option<String>,
        format: WireFormat,
    ) -> (Arc<Connection>, mpsc::UnboundedReceiver<Outgoing>) {
        let state = self.state_for(session.as_deref());
        let (conn, rx) = Connection::open(session, format, state);
        let conn = Arc::new(conn);
        self.live.insert(conn.id(), Arc::clone(&conn));
        info!(
            connection = %conn.id(),
            session = conn.session().unwrap_or("-"),
            ?format,
            live = self.live.len(),
            "connection opened"
        );
        (conn, rx)
    }

    /// Close and forget a connection, saving its session state.
    pub fn disconnect(&self, id: ConnectionId) {
        let Some((_, conn)) = self.live.remove(&id) else {
            return;
        };
        conn.close();
        if let Some(session) = conn.session() {
            self.save_session(session, conn.state());
        }
        info!(connection = %id, live = self.live.len(), "connection closed");
    }

    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.live.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.live.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Queue `message` on every open connection. Returns how many accepted it.
    pub fn broadcast(&self, message: impl Into<Outgoing>) -> usize {
        let message = message.into();
        self.live
            .iter()
            .filter(|entry| entry.value().send(message.clone()).is_ok())
            .count()
    }

    /// Read frames from `inbound` until it ends, dispatching each in turn.
    ///
    /// Undecodable frames are logged and skipped. A transport error ends the
    /// loop. The connection is disconnected on return.
    pub async fn serve<S>(&self, conn: Arc<Connection>, mut inbound: S)
    where
        S: Stream<Item = Result<Frame, TransportError>> + Unpin,
    {
        while let Some(frame) = inbound.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(err) => {
                    debug!(connection = %conn.id(), error = %err, "inbound stream failed");
                    break;
                }
            };
            let message = match conn.format().decode(&frame) {
                Ok(message) => message,
                Err(err) => {
                    warn!(connection = %conn.id(), error = %err, bytes = frame.len(), "dropping malformed frame");
                    continue;
                }
            };
            self.dispatcher.dispatch(&conn, message).await;
            if conn.is_closed() {
                break;
            }
        }
        self.disconnect(conn.id());
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{HandlerRegistry, Reply};
    use crate::page::{DocumentShell, PageContext, PageRouter, RenderPipeline};
    use crate::protocol::{ClientMessage, ServerMessage};
    use crate::state::{MemorySessionStore, StateSchema};
    use crate::tree::Node;
    use futures_util::stream;
    use serde_json::json;

    fn schema() -> Arc<StateSchema> {
        StateSchema::new("Counter")
            .field("count", 0)
            .method("increment", |state, _| {
                let n = state.get_as::<i64>("count")?;
                state.set("count", n + 1)?;
                Ok(Reply::None)
            })
            .build()
    }

    fn manager(scope: StateScope) -> (ConnectionManager, Arc<StateSchema>) {
        let schema = schema();
        let registry = Arc::new(HandlerRegistry::new());
        for handler in schema.handlers() {
            registry.register(handler);
        }
        let page_schema = schema.clone();
        let mut router = PageRouter::new();
        router.page("/", move |ctx: &PageContext| {
            let count = ctx.state().read(&page_schema, "count").unwrap_or_default();
            Ok(Node::with("p", count.to_string()))
        });
        let pipeline = Arc::new(RenderPipeline::new(router, registry, DocumentShell::default()));
        (ConnectionManager::new(Dispatcher::new(pipeline), scope), schema)
    }

    fn text(msg: &ClientMessage) -> Result<Frame, TransportError> {
        Ok(Frame::Text(serde_json::to_string(msg).unwrap()))
    }

    #[tokio::test]
    async fn serve_dispatches_in_order_and_disconnects() {
        let (manager, _) = manager(StateScope::PerConnection);
        let (conn, mut rx) = manager.connect(None, WireFormat::Json);
        assert_eq!(manager.len(), 1);

        let increment = ClientMessage::event("Counter.increment", json!({})).at("/");
        let frames = vec![
            text(&increment),
            Ok(Frame::Text("{not json".into())),
            text(&increment),
        ];
        manager.serve(Arc::clone(&conn), stream::iter(frames)).await;

        let contents: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|msg| match msg {
                Outgoing::Message(ServerMessage::NavigateContent { content, .. }) => content,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(contents, vec![r#"<p class="" >1</p>"#, r#"<p class="" >2</p>"#]);
        assert!(manager.is_empty());
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn transport_error_ends_serve() {
        let (manager, _) = manager(StateScope::PerConnection);
        let (conn, mut rx) = manager.connect(None, WireFormat::Json);
        let increment = ClientMessage::event("Counter.increment", json!({})).at("/");
        let frames = vec![
            Err(TransportError::Socket("reset".into())),
            text(&increment),
        ];
        manager.serve(conn, stream::iter(frames)).await;
        assert!(rx.try_recv().is_err());
        assert!(manager.is_empty());
    }

    #[test]
    fn per_connection_state_is_isolated() {
        let (manager, schema) = manager(StateScope::PerConnection);
        let (a, _rx_a) = manager.connect(None, WireFormat::Json);
        let (b, _rx_b) = manager.connect(None, WireFormat::Json);

        a.state().with_instance(&schema, |s| s.set("count", 5)).unwrap();
        assert_eq!(b.state().read(&schema, "count"), Some(json!(0)));
        assert!(!a.state().ptr_eq(b.state()));
    }

    #[test]
    fn shared_scope_uses_one_store() {
        let (manager, schema) = manager(StateScope::Shared);
        let (a, _rx_a) = manager.connect(None, WireFormat::Json);
        let (b, _rx_b) = manager.connect(None, WireFormat::Json);

        a.state().with_instance(&schema, |s| s.set("count", 5)).unwrap();
        assert_eq!(b.state().read(&schema, "count"), Some(json!(5)));
    }

    #[test]
    fn session_state_survives_reconnect() {
        let (manager, schema) = manager(StateScope::PerConnection);
        let manager = manager.with_sessions(Arc::new(MemorySessionStore::new()));

        let (first, _rx) = manager.connect(Some("sess-1".into()), WireFormat::Json);
        first.state().with_instance(&schema, |s| s.set("count", 9)).unwrap();
        manager.disconnect(first.id());

        let (second, _rx) = manager.connect(Some("sess-1".into()), WireFormat::Json);
        assert_eq!(second.state().read(&schema, "count"), Some(json!(9)));

        let (other, _rx) = manager.connect(Some("sess-2".into()), WireFormat::Json);
        assert_eq!(other.state().read(&schema, "count"), Some(json!(0)));
    }

    #[test]
    fn connection_claims_its_session_until_disconnect() {
        let (manager, schema) = manager(StateScope::PerConnection);
        let store = Arc::new(MemorySessionStore::new());
        let manager = manager.with_sessions(store.clone());

        let page_state = manager.state_for(None);
        page_state.with_instance(&schema, |s| s.set("count", 3)).unwrap();
        manager.save_session("sess-1", &page_state);
        assert_eq!(store.len(), 1);

        let (conn, _rx) = manager.connect(Some("sess-1".into()), WireFormat::Json);
        assert_eq!(conn.state().read(&schema, "count"), Some(json!(3)));
        assert!(store.is_empty());

        manager.disconnect(conn.id());
        assert_eq!(store.len(), 1);
        assert_eq!(store.load("sess-1").unwrap()["Counter"]["count"], json!(3));
    }

    #[test]
    fn broadcast_skips_closed_connections() {
        let (manager, _) = manager(StateScope::PerConnection);
        let (_a, mut rx_a) = manager.connect(None, WireFormat::Json);
        let (b, rx_b) = manager.connect(None, WireFormat::Json);
        drop(rx_b);

        assert_eq!(manager.broadcast(ServerMessage::Refresh), 1);
        assert_eq!(rx_a.try_recv().unwrap(), Outgoing::Message(ServerMessage::Refresh));
        assert!(b.is_closed());
        assert!(manager.get(b.id()).is_some());
    }
}
