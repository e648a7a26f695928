//! Event bindings.
//!
//! Binding a handler to a node writes the client-side call into an attribute
//! and remembers the handler so the render pipeline can register it.
//!
//! | binding                | attribute             | client call                              |
//! |------------------------|-----------------------|------------------------------------------|
//! | generic                | `on{event}`           | `Trellis.sendEvent('id', null)`          |
//! | raw value (setters)    | `on{event}`           | `Trellis.sendEvent('id', null, this.value)` |
//! | form                   | `on{event}`           | `Trellis.submitForm('form', 'id')`       |
//! | submit                 | `data-trellis-submit` | form data sent as `form_submit`          |
//! | mount                  | `data-trellis-mount`  | fired after each full content replace    |

use std::sync::Arc;

use super::node::Node;
use super::render::escape_html;
use crate::events::{CallingConvention, Handler};

/// Attribute read by the client to route `<form>` submissions.
pub const SUBMIT_ATTR: &str = "data-trellis-submit";

/// Attribute scanned by the client after a full content replace.
pub const MOUNT_ATTR: &str = "data-trellis-mount";

/// A handler attached to a node.
#[derive(Debug, Clone)]
pub struct EventBinding {
    handler: Arc<Handler>,
}

impl EventBinding {
    pub fn handler(&self) -> &Arc<Handler> {
        &self.handler
    }

    pub fn handler_id(&self) -> &str {
        self.handler.id()
    }
}

impl Node {
    /// Bind a handler to a browser event.
    ///
    /// Setter-style handlers receive the element's current value instead of
    /// a payload.
    pub fn on(self, event: &str, handler: impl Into<Arc<Handler>>) -> Self {
        let handler = handler.into();
        let script = match handler.calling_convention() {
            CallingConvention::RawValue => {
                format!("Trellis.sendEvent('{}', null, this.value)", script_literal(handler.id()))
            }
            CallingConvention::GenericPayload => {
                format!("Trellis.sendEvent('{}', null)", script_literal(handler.id()))
            }
        };
        self.bind_with(event, format!("on{event}"), script, handler)
    }

    /// Bind a handler that receives the values of the form `form_id`.
    pub fn on_form(self, event: &str, handler: impl Into<Arc<Handler>>, form_id: &str) -> Self {
        let handler = handler.into();
        let script = format!(
            "Trellis.submitForm('{}', '{}')",
            script_literal(form_id),
            script_literal(handler.id())
        );
        self.bind_with(event, format!("on{event}"), script, handler)
    }

    pub fn on_click(self, handler: impl Into<Arc<Handler>>) -> Self {
        self.on("click", handler)
    }

    pub fn on_change(self, handler: impl Into<Arc<Handler>>) -> Self {
        self.on("change", handler)
    }

    /// Fires on every keystroke.
    pub fn on_input(self, handler: impl Into<Arc<Handler>>) -> Self {
        self.on("input", handler)
    }

    /// Route submissions of this form to `handler`.
    pub fn on_submit(self, handler: impl Into<Arc<Handler>>) -> Self {
        let handler = handler.into();
        let id = escape_html(handler.id());
        self.bind_with("submit", SUBMIT_ATTR.to_string(), id, handler)
    }

    /// Fire `handler` once this element is mounted by a content replace.
    pub fn on_mount(self, handler: impl Into<Arc<Handler>>) -> Self {
        let handler = handler.into();
        let id = escape_html(handler.id());
        self.bind_with("mount", MOUNT_ATTR.to_string(), id, handler)
    }

    /// Attach literal client-side script to an event. Nothing is registered.
    pub fn on_script(self, event: &str, script: impl Into<String>) -> Self {
        self.attr(format!("on{event}"), script)
    }

    fn bind_with(
        mut self,
        event: &str,
        attribute: String,
        value: String,
        handler: Arc<Handler>,
    ) -> Self {
        self.set_attr(attribute, value);
        self.bind(event.to_string(), EventBinding { handler });
        self
    }
}

/// Quote `text` for a single-quoted script string inside a double-quoted
/// attribute value.
fn script_literal(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            c => quoted.push(c),
        }
    }
    escape_html(&quoted)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Reply;

    fn noop(id: &str) -> Handler {
        Handler::new(id, |_| Ok(Reply::None))
    }

    #[test]
    fn click_binding_writes_send_event() {
        let node = Node::new("button").on_click(noop("save"));

        assert_eq!(node.get_attr("onclick"), Some("Trellis.sendEvent('save', null)"));
        assert_eq!(node.bindings()["click"].handler_id(), "save");
    }

    #[test]
    fn setter_binding_sends_value() {
        let node = Node::new("input").on_input(noop("set_username"));
        assert_eq!(
            node.get_attr("oninput"),
            Some("Trellis.sendEvent('set_username', null, this.value)")
        );
    }

    #[test]
    fn submit_and_mount_use_data_attributes() {
        let node = Node::new("form")
            .on_submit(noop("login"))
            .on_mount(noop("load"));

        assert_eq!(node.get_attr(SUBMIT_ATTR), Some("login"));
        assert_eq!(node.get_attr(MOUNT_ATTR), Some("load"));
        assert_eq!(node.bindings().len(), 2);
    }

    #[test]
    fn form_binding_names_form() {
        let node = Node::new("button").on_form("click", noop("save"), "profile");
        assert_eq!(
            node.get_attr("onclick"),
            Some("Trellis.submitForm('profile', 'save')")
        );
    }

    #[test]
    fn quotes_in_ids_cannot_break_out() {
        let node = Node::new("button").on_form("click", noop(r#"it's "x""#), "a'b");
        assert_eq!(
            node.get_attr("onclick"),
            Some(r#"Trellis.submitForm('a\&#x27;b', 'it\&#x27;s &quot;x&quot;')"#)
        );
        assert_eq!(
            node.render(),
            r#"<button class="" onclick="Trellis.submitForm('a\&#x27;b', 'it\&#x27;s &quot;x&quot;')"></button>"#
        );

        let form = Node::new("form").on_submit(noop(r#"a"b"#));
        assert_eq!(form.get_attr(SUBMIT_ATTR), Some("a&quot;b"));
        assert_eq!(script_literal(r"back\slash"), r"back\\slash");
    }

    #[test]
    fn bound_handlers_are_collected_depth_first() {
        let tree = Node::new("div")
            .on_mount(noop("outer"))
            .child(Node::new("button").on_click(noop("inner")))
            .child(vec![Node::new("a").on_click(noop("nested"))]);

        let ids: Vec<_> = tree
            .bound_handlers()
            .iter()
            .map(|h| h.id().to_string())
            .collect();
        assert_eq!(ids, vec!["outer", "inner", "nested"]);
    }

    #[test]
    fn script_binding_registers_nothing() {
        let node = Node::new("button").on_script("click", "history.back()");
        assert_eq!(node.get_attr("onclick"), Some("history.back()"));
        assert!(node.bound_handlers().is_empty());
    }
}
