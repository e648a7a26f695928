//! Client Reconciler
//!
//! The browser runtime (`page/client.js`) applies server messages to the live
//! DOM. [`Reconciler`] is the same algorithm over a [`Dom`] trait so it can be
//! driven from Rust: by tests, by headless clients, or by anything that wants
//! to replay a message log.
//!
//! # Phases
//!
//! ```text
//!   Idle ──send──▶ AwaitingResponse ──apply──▶ Idle
//!     │                   │
//!     └──────close────────┴──────▶ Closed
//! ```
//!
//! A `navigate` command is the one message that keeps the reconciler waiting:
//! it updates history and immediately asks the server for the new path's
//! content.
//!
//! # Patch rules
//!
//! | message            | effect                                           |
//! |--------------------|--------------------------------------------------|
//! | `update`           | replace one element (by id) with new HTML        |
//! | `navigate_content` | replace the root's content, push history, mount  |
//! | `navigate`         | push history, request content for the new path   |
//! | `toast`, `alert`   | side-channel notice, content untouched           |
//! | `refresh`          | full reload                                      |

mod dom;

pub use dom::{find_element, mount_handlers, Dom, MemoryDom, Notice};

use serde_json::Value;
use tracing::trace;

use crate::error::ReconcileError;
use crate::protocol::{ClientMessage, ServerMessage};

/// Where the reconciler is in its request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    AwaitingResponse,
    Closed,
}

/// What applying a message did.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// The element was replaced.
    Patched { id: String },

    /// No element with that id exists; nothing changed.
    Missing { id: String },

    /// The root was replaced. `mount` holds the handlers to fire, in
    /// document order.
    Replaced { path: String, mount: Vec<ClientMessage> },

    /// History was updated; `request` must be sent to fetch the content.
    Navigating { request: ClientMessage },

    Notified,

    Reloaded,
}

/// Applies server messages to a [`Dom`].
#[derive(Debug)]
pub struct Reconciler<D> {
    dom: D,
    phase: Phase,
}

impl<D: Dom> Reconciler<D> {
    pub fn new(dom: D) -> Self {
        Self {
            dom,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn into_dom(self) -> D {
        self.dom
    }

    /// Prepare an outbound message.
    ///
    /// Events without a path are stamped with the current page path, the
    /// same way the browser runtime sends `location.pathname`.
    pub fn send(&mut self, message: ClientMessage) -> Result<ClientMessage, ReconcileError> {
        self.ensure_open()?;
        let message = match message {
            ClientMessage::Event { path: None, .. } | ClientMessage::FormSubmit { path: None, .. } => {
                let path = self.dom.current_path().to_string();
                message.at(path)
            }
            other => other,
        };
        self.phase = Phase::AwaitingResponse;
        Ok(message)
    }

    /// Apply one server message.
    pub fn apply(&mut self, message: &ServerMessage) -> Result<Applied, ReconcileError> {
        self.ensure_open()?;
        trace!(?message, "applying server message");

        let applied = match message {
            ServerMessage::Update { id, content } => {
                if self.dom.replace_element(id, content) {
                    Applied::Patched { id: id.clone() }
                } else {
                    Applied::Missing { id: id.clone() }
                }
            }
            ServerMessage::NavigateContent { path, content } => {
                self.dom.replace_root(content);
                if self.dom.current_path() != path.as_str() {
                    self.dom.push_history(path);
                }
                let mount = mount_handlers(content)
                    .into_iter()
                    .map(|handler| ClientMessage::event(handler, Value::Null).at(path.clone()))
                    .collect();
                Applied::Replaced {
                    path: path.clone(),
                    mount,
                }
            }
            ServerMessage::Navigate { path, url } => {
                let target = path.as_ref().or(url.as_ref()).cloned().unwrap_or_default();
                self.dom.push_history(&target);
                self.phase = Phase::AwaitingResponse;
                return Ok(Applied::Navigating {
                    request: ClientMessage::navigate(target),
                });
            }
            ServerMessage::Toast {
                message,
                variant,
                duration,
            } => {
                self.dom.notify(Notice::Toast {
                    message: message.clone(),
                    variant: *variant,
                    duration: *duration,
                });
                Applied::Notified
            }
            ServerMessage::Alert { message } => {
                self.dom.notify(Notice::Alert(message.clone()));
                Applied::Notified
            }
            ServerMessage::Refresh => {
                self.dom.reload();
                Applied::Reloaded
            }
        };

        self.phase = Phase::Idle;
        Ok(applied)
    }

    /// The socket closed. No further transitions are possible.
    pub fn close(&mut self) {
        self.phase = Phase::Closed;
    }

    fn ensure_open(&self) -> Result<(), ReconcileError> {
        match self.phase {
            Phase::Closed => Err(ReconcileError::Closed),
            _ => Ok(()),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
