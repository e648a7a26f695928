//! Page Router and Render Pipeline
//!
//! A page is a factory that builds a [`Node`](crate::tree::Node) tree for a
//! path. The [`RenderPipeline`] resolves the factory, runs it, registers the
//! handlers bound in the tree and serializes it, either as a bare fragment
//! for socket updates or wrapped in the full document for HTTP.
//!
//! # Routes
//!
//! - Static routes match the path exactly.
//! - Dynamic routes contain `{name}` or `:name` segments. They are tried in
//!   registration order after the static routes, and the captured segments
//!   are available through [`PageContext::param`].
//!
//! # Failures
//!
//! A factory error or panic never escapes the pipeline. HTTP requests get an
//! error document with status 500, socket refreshes log and send nothing.

mod document;
mod pipeline;
mod router;

pub use document::{DocumentShell, ROOT_ID, TOAST_CONTAINER_ID};
pub use pipeline::{RenderPipeline, RenderedPage};
pub use router::{PageContext, PageFactory, PageRouter, RouteMatch};
