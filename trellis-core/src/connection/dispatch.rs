//! Inbound message dispatch.

use std::sync::Arc;

use tracing::{debug, error, trace, warn};

use super::link::Connection;
use crate::error::{HandlerError, RenderError};
use crate::events::{HandlerRegistry, InvokeContext, Outcome, Payload, Reply};
use crate::page::RenderPipeline;
use crate::protocol::{ClientMessage, Outgoing, ServerMessage};

/// Routes decoded client messages to handlers and pages.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    pipeline: Arc<RenderPipeline>,
}

impl Dispatcher {
    pub fn new(pipeline: Arc<RenderPipeline>) -> Self {
        Self {
            registry: Arc::clone(pipeline.registry()),
            pipeline,
        }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn pipeline(&self) -> &Arc<RenderPipeline> {
        &self.pipeline
    }

    /// Handle one message from `conn`.
    ///
    /// Returns once every message the handler produced has been queued.
    pub async fn dispatch(&self, conn: &Connection, message: ClientMessage) {
        trace!(connection = %conn.id(), kind = message.kind(), "dispatching");
        match message {
            ClientMessage::Event {
                handler,
                data,
                value,
                path,
            } => {
                self.run_handler(conn, &handler, Payload { data, value }, path)
                    .await
            }
            ClientMessage::FormSubmit {
                handler,
                form_id,
                data,
                path,
            } => {
                debug!(connection = %conn.id(), %handler, form = ?form_id, "form submitted");
                self.run_handler(conn, &handler, Payload::new(data), path)
                    .await
            }
            ClientMessage::Navigate { path } => self.navigate(conn, path),
        }
    }

    async fn run_handler(
        &self,
        conn: &Connection,
        handler: &str,
        payload: Payload,
        path: Option<String>,
    ) {
        if let Some(path) = path {
            conn.set_path(path);
        }
        // Discard writes made outside this invocation.
        conn.state().take_activity();

        let ctx = InvokeContext::new(conn.state().clone())
            .with_connection(conn.id(), conn.current_path());

        match self.registry.invoke(handler, &payload, ctx, conn).await {
            Ok(Outcome::Completed(Reply::None)) => self.refresh(conn, handler),
            Ok(Outcome::Completed(reply)) => match Outgoing::from_reply(reply) {
                Some(message) => self.send(conn, message),
                None => debug!(%handler, "handler reply has no wire form"),
            },
            Ok(Outcome::Streamed { delivered }) => {
                debug!(%handler, delivered, "stream finished");
            }
            Err(HandlerError::NotFound(id)) => {
                warn!(connection = %conn.id(), handler = %id, "event for unknown handler");
            }
            Err(err) => {
                error!(connection = %conn.id(), %handler, error = %err, "handler failed");
            }
        }
    }

    /// Re-render the connection's page after a handler that returned nothing.
    fn refresh(&self, conn: &Connection, handler: &str) {
        let activity = conn.state().take_activity();
        if activity.only_noops() {
            trace!(%handler, "only unchanged values written, skipping refresh");
            return;
        }
        let Some(path) = conn.current_path() else {
            return;
        };
        if !self.pipeline.has_page(&path) {
            return;
        }
        match self.pipeline.render_fragment(&path, conn.state()) {
            Ok(content) => self.send(conn, ServerMessage::NavigateContent { path, content }),
            Err(err) => error!(%path, error = %err, "refresh render failed"),
        }
    }

    fn navigate(&self, conn: &Connection, path: String) {
        conn.set_path(path.clone());
        match self.pipeline.render_fragment(&path, conn.state()) {
            Ok(content) => self.send(conn, ServerMessage::NavigateContent { path, content }),
            Err(RenderError::NotFound(path)) => {
                warn!(connection = %conn.id(), %path, "navigate to unknown page");
            }
            Err(err) => error!(%path, error = %err, "navigate render failed"),
        }
    }

    fn send(&self, conn: &Connection, message: impl Into<Outgoing>) {
        if let Err(err) = conn.send(message) {
            debug!(connection = %conn.id(), error = %err, "dropping message");
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
