//! A single live connection.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::debug;

use super::id::ConnectionId;
use crate::error::TransportError;
use crate::events::{Reply, ReplySink};
use crate::protocol::{Outgoing, WireFormat};
use crate::state::StateHandle;

/// One open socket and the session state behind it.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    session: Option<String>,
    format: WireFormat,
    state: StateHandle,
    path: RwLock<Option<String>>,
    outbound: mpsc::UnboundedSender<Outgoing>,
    closed: AtomicBool,
    sent: AtomicU64,
}

impl Connection {
    /// Create a connection and the receiving end of its outbound queue.
    pub fn open(
        session: Option<String>,
        format: WireFormat,
        state: StateHandle,
    ) -> (Self, mpsc::UnboundedReceiver<Outgoing>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let conn = Self {
            id: ConnectionId::new(),
            session,
            format,
            state,
            path: RwLock::new(None),
            outbound,
            closed: AtomicBool::new(false),
            sent: AtomicU64::new(0),
        };
        (conn, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    pub fn state(&self) -> &StateHandle {
        &self.state
    }

    /// The page path the client last reported.
    pub fn current_path(&self) -> Option<String> {
        self.path.read().clone()
    }

    pub fn set_path(&self, path: impl Into<String>) {
        *self.path.write() = Some(path.into());
    }

    /// Queue a message for the writer task.
    pub fn send(&self, message: impl Into<Outgoing>) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.outbound.send(message.into()).map_err(|_| {
            self.closed.store(true, Ordering::Release);
            TransportError::Closed
        })?;
        self.sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Number of messages queued so far.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.outbound.is_closed()
    }

    /// Refuse further sends.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl ReplySink for Connection {
    fn deliver(&self, reply: Reply) {
        let Some(message) = Outgoing::from_reply(reply) else {
            return;
        };
        if let Err(err) = self.send(message) {
            debug!(connection = %self.id, error = %err, "dropping reply for closed connection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Action, ServerMessage};

    #[test]
    fn send_queues_in_order() {
        let (conn, mut rx) = Connection::open(None, WireFormat::Json, StateHandle::default());
        conn.send(ServerMessage::Refresh).unwrap();
        conn.deliver(Action::alert("two").into());
        conn.deliver(Reply::None);

        assert_eq!(rx.try_recv().unwrap(), Outgoing::Message(ServerMessage::Refresh));
        assert_eq!(
            rx.try_recv().unwrap(),
            Outgoing::Message(ServerMessage::Alert { message: "two".into() })
        );
        assert!(rx.try_recv().is_err());
        assert_eq!(conn.sent(), 2);
    }

    #[test]
    fn closed_connection_rejects_sends() {
        let (conn, rx) = Connection::open(None, WireFormat::Json, StateHandle::default());
        conn.close();
        assert_eq!(conn.send(ServerMessage::Refresh), Err(TransportError::Closed));
        drop(rx);
        conn.deliver(Action::refresh().into());
        assert_eq!(conn.sent(), 0);
    }

    #[test]
    fn dropped_receiver_marks_closed() {
        let (conn, rx) = Connection::open(Some("s".into()), WireFormat::Json, StateHandle::default());
        drop(rx);
        assert!(conn.is_closed());
        assert_eq!(conn.send(ServerMessage::Refresh), Err(TransportError::Closed));
        assert_eq!(conn.session(), Some("s"));
    }

    #[test]
    fn path_tracking() {
        let (conn, _rx) = Connection::open(None, WireFormat::Json, StateHandle::default());
        assert_eq!(conn.current_path(), None);
        conn.set_path("/cart");
        assert_eq!(conn.current_path().as_deref(), Some("/cart"));
    }
}
