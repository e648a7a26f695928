//! Component Tree
//!
//! Pages are described as a tree of [`Node`]s built on the server and
//! serialized straight to HTML. The tree is not retained after a render pass;
//! a re-render simply builds a fresh one.
//!
//! # Building
//!
//! Builder methods take the node by value and hand the same node back, so
//! configuration reads as one chain:
//!
//! ```rust,ignore
//! let card = Node::new("div")
//!     .class("flex")
//!     .attr("data-role", "card")
//!     .child(Node::with("span", "hi"));
//!
//! assert_eq!(card.render(), r#"<div class="flex" data-role="card"><span class="" >hi</span></div>"#);
//! ```
//!
//! Because builders move the node, a child added to a parent is owned by that
//! parent and there is no second name left to mutate it through. `clone()`
//! produces an independent copy. The Python `Node` type keeps references to
//! its children instead, so there two names for one node alias each other and
//! a change made after `add` shows up in the parent's render.
//!
//! # Children
//!
//! A child is an element, escaped text, raw HTML or a fragment. Strings
//! convert to [`Child::Text`]; use [`Child::raw`] to opt out of escaping.
//!
//! # Events
//!
//! Event bindings attach a registered handler to a DOM event. The bound
//! handlers are collected by the render pipeline and registered before the
//! page is served.

mod binding;
mod node;
mod render;

pub use binding::{EventBinding, MOUNT_ATTR, SUBMIT_ATTR};
pub use node::{is_void_tag, Child, Node, VOID_TAGS};
pub use render::escape_html;
