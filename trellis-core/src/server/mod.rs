//! HTTP and Socket Server
//!
//! Binds the render pipeline and the connection manager to an axum router:
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `GET <socket_path>` | socket upgrade, `?session=<id>&format=json\|msgpack` |
//! | `GET /robots.txt` | crawler policy |
//! | `GET /sitemap.xml` | static page paths |
//! | any other `GET` | full page document, 404 document if no page matches |
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_core::prelude::*;
//!
//! let counter = StateSchema::new("Counter")
//!     .field("count", 0)
//!     .method("increment", |state, _| {
//!         let n = state.get_as::<i64>("count")?;
//!         state.set("count", n + 1)?;
//!         Ok(Reply::None)
//!     })
//!     .build();
//!
//! let page_state = counter.clone();
//! App::new()
//!     .state(&counter)
//!     .page("/", move |ctx| {
//!         let count = ctx.state().read(&page_state, "count").unwrap_or_default();
//!         Ok(Node::with("p", count.to_string()))
//!     })
//!     .build()
//!     .run()
//!     .await?;
//! ```

mod routes;
mod socket;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Config;
use crate::connection::{ConnectionManager, Dispatcher};
use crate::error::{BoxError, TrellisError};
use crate::events::{Handler, HandlerRegistry};
use crate::page::{DocumentShell, PageContext, PageRouter, RenderPipeline};
use crate::state::{MemorySessionStore, SessionStore, StateSchema};
use crate::tree::Node;

/// Collects pages, handlers and state types before the server starts.
pub struct App {
    config: Config,
    router: PageRouter,
    handlers: Vec<Handler>,
    sessions: Option<Arc<dyn SessionStore>>,
}

impl App {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            router: PageRouter::new(),
            handlers: Vec::new(),
            sessions: None,
        }
    }

    /// Register a page factory for `pattern`.
    pub fn page<F>(mut self, pattern: &str, factory: F) -> Self
    where
        F: Fn(&PageContext) -> Result<Node, BoxError> + Send + Sync + 'static,
    {
        self.router.page(pattern, factory);
        self
    }

    /// Register a handler up front instead of on first render.
    pub fn handler(mut self, handler: Handler) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Register every method and setter of `schema`.
    pub fn state(mut self, schema: &Arc<StateSchema>) -> Self {
        self.handlers.extend(schema.handlers());
        self
    }

    /// Use `store` for session snapshots instead of the in-memory default.
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(store);
        self
    }

    pub fn build(self) -> Server {
        let registry = Arc::new(HandlerRegistry::with_background_workers(
            self.config.server.background_workers,
        ));
        for handler in self.handlers {
            registry.register(handler);
        }

        let shell = DocumentShell::new(
            self.config.document.clone(),
            self.config.server.socket_path.clone(),
        );
        let pipeline = Arc::new(RenderPipeline::new(self.router, registry, shell));
        let mut manager = ConnectionManager::new(Dispatcher::new(pipeline), self.config.state.scope);
        if self.config.state.persist_sessions {
            let limits = &self.config.state;
            let store = self.sessions.unwrap_or_else(|| {
                Arc::new(MemorySessionStore::with_limits(
                    Duration::from_secs(limits.session_ttl_secs),
                    limits.max_sessions,
                ))
            });
            manager = manager.with_sessions(store);
        }

        Server {
            shared: Arc::new(Shared {
                manager,
                config: self.config,
            }),
        }
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct Shared {
    pub(crate) manager: ConnectionManager,
    pub(crate) config: Config,
}

/// A built application, ready to listen.
#[derive(Clone)]
pub struct Server {
    shared: Arc<Shared>,
}

impl Server {
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.shared.manager
    }

    /// The axum router serving pages and the socket endpoint.
    pub fn router(&self) -> Router {
        Router::new()
            .route(&self.shared.config.server.socket_path, get(socket::upgrade))
            .route("/robots.txt", get(routes::robots))
            .route("/sitemap.xml", get(routes::sitemap))
            .fallback(routes::page)
            .with_state(Arc::clone(&self.shared))
    }

    /// Bind the configured address and serve until Ctrl-C.
    pub async fn run(self) -> Result<(), TrellisError> {
        let addr = self.shared.config.server.resolve_addr().await?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), TrellisError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        info!(
            %addr,
            socket = %self.shared.config.server.socket_path,
            pages = self.shared.manager.dispatcher().pipeline().router().len(),
            "trellis listening"
        );
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => {
            error!(error = %err, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
