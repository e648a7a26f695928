//! Message shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::Reply;
use crate::tree::Node;

/// Default toast lifetime in milliseconds.
pub const DEFAULT_TOAST_MS: u64 = 3000;

/// A frame sent by the browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Event {
        handler: String,
        #[serde(default)]
        data: Value,
        /// Raw control value, sent by setter bindings.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    FormSubmit {
        handler: String,
        #[serde(rename = "formId", default, skip_serializing_if = "Option::is_none")]
        form_id: Option<String>,
        #[serde(default)]
        data: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    Navigate {
        path: String,
    },
}

impl ClientMessage {
    /// Build an `event` frame.
    pub fn event(handler: impl Into<String>, data: Value) -> Self {
        ClientMessage::Event {
            handler: handler.into(),
            data,
            value: None,
            path: None,
        }
    }

    pub fn navigate(path: impl Into<String>) -> Self {
        ClientMessage::Navigate { path: path.into() }
    }

    /// Set the page path the frame was sent from.
    pub fn at(mut self, at: impl Into<String>) -> Self {
        match &mut self {
            ClientMessage::Event { path, .. } | ClientMessage::FormSubmit { path, .. } => {
                *path = Some(at.into());
            }
            ClientMessage::Navigate { path } => *path = at.into(),
        }
        self
    }

    /// The frame's `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Event { .. } => "event",
            ClientMessage::FormSubmit { .. } => "form_submit",
            ClientMessage::Navigate { .. } => "navigate",
        }
    }
}

/// Toast styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastVariant {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

/// A frame sent to the browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Replace one element's outer HTML.
    Update { id: String, content: String },

    /// Replace the mounted root's content and record `path` in history.
    NavigateContent { path: String, content: String },

    /// Client-side redirect.
    Navigate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },

    Toast {
        message: String,
        #[serde(default)]
        variant: ToastVariant,
        #[serde(default = "default_toast_ms")]
        duration: u64,
    },

    Alert { message: String },

    /// Full page reload.
    Refresh,
}

fn default_toast_ms() -> u64 {
    DEFAULT_TOAST_MS
}

/// An instruction a handler returns to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Redirect { url: String },
    Alert { message: String },
    Toast {
        message: String,
        variant: ToastVariant,
        duration: u64,
    },
    Refresh,
    Update { id: String, content: String },
}

impl Action {
    pub fn redirect(url: impl Into<String>) -> Self {
        Action::Redirect { url: url.into() }
    }

    pub fn alert(message: impl Into<String>) -> Self {
        Action::Alert {
            message: message.into(),
        }
    }

    /// An info toast shown for the default duration.
    pub fn toast(message: impl Into<String>) -> Self {
        Self::toast_with(message, ToastVariant::Info, DEFAULT_TOAST_MS)
    }

    pub fn toast_with(message: impl Into<String>, variant: ToastVariant, duration: u64) -> Self {
        Action::Toast {
            message: message.into(),
            variant,
            duration,
        }
    }

    pub fn refresh() -> Self {
        Action::Refresh
    }

    /// Replace the element `id` with a freshly rendered node.
    pub fn update(id: impl Into<String>, node: &Node) -> Self {
        Action::Update {
            id: id.into(),
            content: node.render(),
        }
    }

    pub fn into_message(self) -> ServerMessage {
        match self {
            Action::Redirect { url } => ServerMessage::Navigate {
                path: None,
                url: Some(url),
            },
            Action::Alert { message } => ServerMessage::Alert { message },
            Action::Toast {
                message,
                variant,
                duration,
            } => ServerMessage::Toast {
                message,
                variant,
                duration,
            },
            Action::Refresh => ServerMessage::Refresh,
            Action::Update { id, content } => ServerMessage::Update { id, content },
        }
    }
}

impl From<Action> for ServerMessage {
    fn from(action: Action) -> Self {
        action.into_message()
    }
}

/// Anything the connection writer can put on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outgoing {
    Message(ServerMessage),

    /// A handler-supplied object forwarded as is.
    Json(Value),
}

impl Outgoing {
    /// Turn a handler reply into a frame.
    ///
    /// `Reply::None` yields nothing. A JSON object of the form
    /// `{"type": "navigate", "url": u}` becomes a `navigate` message with
    /// `path = u`. Other objects pass through unchanged; non-object JSON is
    /// dropped.
    pub fn from_reply(reply: Reply) -> Option<Self> {
        match reply {
            Reply::None => None,
            Reply::Action(action) => Some(Outgoing::Message(action.into_message())),
            Reply::Json(Value::Object(map)) => {
                let redirect = if map.get("type").and_then(Value::as_str) == Some("navigate") {
                    map.get("url").and_then(Value::as_str).map(str::to_string)
                } else {
                    None
                };
                match redirect {
                    Some(url) => Some(Outgoing::Message(ServerMessage::Navigate {
                        path: Some(url),
                        url: None,
                    })),
                    None => Some(Outgoing::Json(Value::Object(map))),
                }
            }
            Reply::Json(_) => None,
        }
    }

    /// The `type` tag, when there is one.
    pub fn kind(&self) -> Option<&str> {
        match self {
            Outgoing::Message(message) => Some(match message {
                ServerMessage::Update { .. } => "update",
                ServerMessage::NavigateContent { .. } => "navigate_content",
                ServerMessage::Navigate { .. } => "navigate",
                ServerMessage::Toast { .. } => "toast",
                ServerMessage::Alert { .. } => "alert",
                ServerMessage::Refresh => "refresh",
            }),
            Outgoing::Json(value) => value.get("type").and_then(Value::as_str),
        }
    }
}

impl From<ServerMessage> for Outgoing {
    fn from(message: ServerMessage) -> Self {
        Outgoing::Message(message)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_event_with_optional_fields() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "event",
            "handler": "set_username",
            "data": null,
            "value": "ada",
            "path": "/login"
        }))
        .unwrap();

        assert_eq!(
            msg,
            ClientMessage::Event {
                handler: "set_username".into(),
                data: Value::Null,
                value: Some(json!("ada")),
                path: Some("/login".into()),
            }
        );

        let bare: ClientMessage =
            serde_json::from_str(r#"{"type":"event","handler":"ping"}"#).unwrap();
        assert_eq!(bare, ClientMessage::event("ping", Value::Null));
    }

    #[test]
    fn parses_form_submit_form_id() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"form_submit","handler":"login","formId":"auth","data":{"user":"a"},"path":"/"}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::FormSubmit { form_id, data, .. } => {
                assert_eq!(form_id.as_deref(), Some("auth"));
                assert_eq!(data, json!({"user": "a"}));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_type() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"dance"}"#).is_err());
    }

    #[test]
    fn server_messages_serialize_with_type_tag() {
        let update = serde_json::to_value(ServerMessage::Update {
            id: "count".into(),
            content: "<b>1</b>".into(),
        })
        .unwrap();
        assert_eq!(update, json!({"type": "update", "id": "count", "content": "<b>1</b>"}));

        let refresh = serde_json::to_value(ServerMessage::Refresh).unwrap();
        assert_eq!(refresh, json!({"type": "refresh"}));
    }

    #[test]
    fn actions_map_to_messages() {
        assert_eq!(
            serde_json::to_value(Action::redirect("/home").into_message()).unwrap(),
            json!({"type": "navigate", "url": "/home"})
        );
        assert_eq!(
            serde_json::to_value(Action::toast("saved").into_message()).unwrap(),
            json!({"type": "toast", "message": "saved", "variant": "info", "duration": 3000})
        );
        assert_eq!(
            serde_json::to_value(
                Action::toast_with("bad", ToastVariant::Error, 500).into_message()
            )
            .unwrap(),
            json!({"type": "toast", "message": "bad", "variant": "error", "duration": 500})
        );

        let node = Node::with("span", "2").id("count");
        assert_eq!(
            Action::update("count", &node).into_message(),
            ServerMessage::Update {
                id: "count".into(),
                content: node.render(),
            }
        );
    }

    #[test]
    fn json_navigate_is_normalised() {
        let out = Outgoing::from_reply(Reply::Json(json!({"type": "navigate", "url": "/next"})));
        assert_eq!(
            out,
            Some(Outgoing::Message(ServerMessage::Navigate {
                path: Some("/next".into()),
                url: None,
            }))
        );
    }

    #[test]
    fn other_json_is_forwarded_or_dropped() {
        let custom = json!({"type": "confetti", "count": 3});
        assert_eq!(
            Outgoing::from_reply(Reply::Json(custom.clone())),
            Some(Outgoing::Json(custom))
        );
        assert_eq!(Outgoing::from_reply(Reply::Json(json!("text"))), None);
        assert_eq!(Outgoing::from_reply(Reply::None), None);
    }

    #[test]
    fn outgoing_kind() {
        let out: Outgoing = ServerMessage::Alert { message: "hi".into() }.into();
        assert_eq!(out.kind(), Some("alert"));
        assert_eq!(Outgoing::Json(json!({"type": "x"})).kind(), Some("x"));
        assert_eq!(Outgoing::Json(json!({})).kind(), None);
    }
}
