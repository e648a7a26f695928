//! Render pipeline.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, warn};

use super::document::DocumentShell;
use super::router::{normalize_path, PageContext, PageRouter};
use crate::error::{panic_message, RenderError};
use crate::events::HandlerRegistry;
use crate::state::StateHandle;
use crate::tree::escape_html;

/// An HTTP-ready page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub status: u16,
    pub html: String,
}

/// Resolves, runs and serializes page factories.
#[derive(Debug)]
pub struct RenderPipeline {
    router: PageRouter,
    registry: Arc<HandlerRegistry>,
    shell: DocumentShell,
}

impl RenderPipeline {
    pub fn new(router: PageRouter, registry: Arc<HandlerRegistry>, shell: DocumentShell) -> Self {
        Self {
            router,
            registry,
            shell,
        }
    }

    pub fn router(&self) -> &PageRouter {
        &self.router
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn shell(&self) -> &DocumentShell {
        &self.shell
    }

    /// Whether some page handles `path`.
    pub fn has_page(&self, path: &str) -> bool {
        self.router.contains(path)
    }

    /// Run the factory for `path` and return its HTML without the document
    /// shell.
    ///
    /// Handlers bound in the tree are registered before the HTML is
    /// returned, so the client can never reference an id the registry has
    /// not seen.
    pub fn render_fragment(&self, path: &str, state: &StateHandle) -> Result<String, RenderError> {
        let found = self
            .router
            .resolve(path)
            .ok_or_else(|| RenderError::NotFound(normalize_path(path)))?;

        let ctx = PageContext::new(found.path.clone(), state.clone()).with_params(found.params);
        let factory = found.factory;
        let tree = panic::catch_unwind(AssertUnwindSafe(|| factory(&ctx)))
            .map_err(|payload| RenderError::Panicked {
                path: found.path.clone(),
                message: panic_message(payload),
            })?
            .map_err(|source| RenderError::Factory {
                path: found.path.clone(),
                source,
            })?;

        let registered = self.registry.register_tree(&tree);
        debug!(path = %found.path, handlers = registered, "rendered page");
        Ok(tree.render())
    }

    /// Render `path` as a full document.
    ///
    /// Never fails: a missing page yields a 404 document and a failing
    /// factory a 500 document carrying the error detail.
    pub fn render_document(
        &self,
        path: &str,
        state: &StateHandle,
        session: Option<&str>,
    ) -> RenderedPage {
        match self.render_fragment(path, state) {
            Ok(content) => RenderedPage {
                status: 200,
                html: self.shell.wrap(&content, session),
            },
            Err(err) => {
                let status = err.status();
                let body = match &err {
                    RenderError::NotFound(path) => {
                        warn!(%path, "page not found");
                        format!(
                            "<h1>404</h1><p>Page not found: {}</p>",
                            escape_html(path)
                        )
                    }
                    other => {
                        error!(error = %other, "page render failed");
                        format!("<h1>Error</h1><pre>{}</pre>", escape_html(&other.to_string()))
                    }
                };
                RenderedPage {
                    status,
                    html: self.shell.wrap(&body, session),
                }
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
