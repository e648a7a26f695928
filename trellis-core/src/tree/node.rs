//! Node Implementation
//!
//! A node is a tag plus an ordered class set, an ordered attribute map, the
//! event bindings attached to it and an ordered list of children.
//!
//! Class and attribute names are never validated. Anything the caller passes
//! is emitted verbatim at render time.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use super::binding::EventBinding;
use crate::events::Handler;

/// Tags that render as self-closing and never carry children.
pub const VOID_TAGS: [&str; 14] = [
    "img", "input", "br", "hr", "meta", "link", "source", "area", "base", "col", "embed",
    "param", "track", "wbr",
];

/// Check whether `tag` is one of the [`VOID_TAGS`].
pub fn is_void_tag(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

/// A child of a [`Node`].
#[derive(Debug, Clone)]
pub enum Child {
    /// A nested element.
    Element(Node),

    /// Text content. Escaped at render time.
    Text(String),

    /// Markup emitted exactly as given. Nothing is escaped, so callers are
    /// responsible for the content.
    Raw(String),

    /// A sequence rendered by concatenation.
    Fragment(Vec<Child>),
}

impl Child {
    /// Create a raw HTML child.
    pub fn raw(html: impl Into<String>) -> Self {
        Child::Raw(html.into())
    }

    /// Create a text child.
    pub fn text(text: impl Into<String>) -> Self {
        Child::Text(text.into())
    }
}

impl From<Node> for Child {
    fn from(node: Node) -> Self {
        Child::Element(node)
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Text(text.to_string())
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Text(text)
    }
}

impl From<&String> for Child {
    fn from(text: &String) -> Self {
        Child::Text(text.clone())
    }
}

impl<T> From<Vec<T>> for Child
where
    T: Into<Child>,
{
    fn from(items: Vec<T>) -> Self {
        Child::Fragment(items.into_iter().map(Into::into).collect())
    }
}

// Scalars are coerced to their display form, matching the permissive
// contract of the builder API.
macro_rules! child_from_display {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Child {
                fn from(value: $ty) -> Self {
                    Child::Text(value.to_string())
                }
            }
        )*
    };
}

child_from_display!(i32, i64, u32, u64, usize, f32, f64, bool, char);

/// A single element of the server-side component tree.
#[derive(Debug, Clone)]
pub struct Node {
    tag: String,
    classes: IndexSet<String>,
    attributes: IndexMap<String, String>,
    bindings: IndexMap<String, EventBinding>,
    children: Vec<Child>,
}

impl Node {
    /// Create an empty node with the given tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            classes: IndexSet::new(),
            attributes: IndexMap::new(),
            bindings: IndexMap::new(),
            children: Vec::new(),
        }
    }

    /// Create a node with initial content.
    ///
    /// A fragment passed as content is flattened exactly one level: its items
    /// become direct children, and fragments nested inside it stay fragments.
    pub fn with(tag: impl Into<String>, content: impl Into<Child>) -> Self {
        let mut node = Self::new(tag);
        match content.into() {
            Child::Fragment(items) => {
                for item in items {
                    match item {
                        Child::Fragment(inner) => {
                            for child in inner {
                                node.push(child);
                            }
                        }
                        other => node.push(other),
                    }
                }
            }
            single => node.push(single),
        }
        node
    }

    /// Get the tag name.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Check whether this node renders self-closing.
    pub fn is_void(&self) -> bool {
        is_void_tag(&self.tag)
    }

    /// Add a class. Empty strings are skipped and duplicates keep their
    /// first position.
    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.add_class(class);
        self
    }

    /// Add several classes in order.
    pub fn classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for class in classes {
            self.add_class(class);
        }
        self
    }

    /// Set the `id` attribute.
    pub fn id(self, id: impl Into<String>) -> Self {
        self.attr("id", id)
    }

    /// Set an attribute, replacing any previous value under the same name.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Set an `aria-*` attribute.
    pub fn aria(self, name: &str, value: impl Into<String>) -> Self {
        self.attr(format!("aria-{name}"), value)
    }

    /// Append a child.
    pub fn child(mut self, child: impl Into<Child>) -> Self {
        self.push(child);
        self
    }

    /// Append several children in order.
    pub fn children<I, C>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Child>,
    {
        for child in children {
            self.push(child);
        }
        self
    }

    /// Append a raw HTML child.
    pub fn raw(self, html: impl Into<String>) -> Self {
        self.child(Child::raw(html))
    }

    /// Append a child in place.
    ///
    /// Void nodes never hold children, so anything pushed onto one is
    /// dropped.
    pub fn push(&mut self, child: impl Into<Child>) {
        if self.is_void() {
            tracing::trace!(tag = %self.tag, "dropping child appended to void element");
            return;
        }
        self.children.push(child.into());
    }

    /// Add a class in place.
    pub fn add_class(&mut self, class: impl Into<String>) {
        let class = class.into();
        if !class.is_empty() {
            self.classes.insert(class);
        }
    }

    /// Set an attribute in place.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub(crate) fn bind(&mut self, event: String, binding: EventBinding) {
        self.bindings.insert(event, binding);
    }

    /// Get the classes in insertion order.
    pub fn class_list(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(String::as_str)
    }

    /// Get an attribute value.
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Get all attributes in insertion order.
    pub fn attributes(&self) -> &IndexMap<String, String> {
        &self.attributes
    }

    /// Get the event bindings, keyed by event name.
    pub fn bindings(&self) -> &IndexMap<String, EventBinding> {
        &self.bindings
    }

    /// Get the direct children.
    pub fn child_nodes(&self) -> &[Child] {
        &self.children
    }

    /// Collect every handler bound anywhere in this subtree, depth-first.
    pub fn bound_handlers(&self) -> Vec<Arc<Handler>> {
        let mut out = Vec::new();
        self.collect_handlers(&mut out);
        out
    }

    fn collect_handlers(&self, out: &mut Vec<Arc<Handler>>) {
        out.extend(self.bindings.values().map(|b| Arc::clone(b.handler())));
        for child in &self.children {
            collect_child_handlers(child, out);
        }
    }
}

fn collect_child_handlers(child: &Child, out: &mut Vec<Arc<Handler>>) {
    match child {
        Child::Element(node) => node.collect_handlers(out),
        Child::Fragment(items) => {
            for item in items {
                collect_child_handlers(item, out);
            }
        }
        Child::Text(_) | Child::Raw(_) => {}
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
