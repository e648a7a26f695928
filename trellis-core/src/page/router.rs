//! Path to factory routing.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::BoxError;
use crate::state::StateHandle;
use crate::tree::Node;

/// Builds the tree for one page.
pub type PageFactory = Arc<dyn Fn(&PageContext) -> Result<Node, BoxError> + Send + Sync>;

/// What a factory sees when it runs.
#[derive(Debug, Clone)]
pub struct PageContext {
    path: String,
    params: IndexMap<String, String>,
    state: StateHandle,
}

impl PageContext {
    pub fn new(path: impl Into<String>, state: StateHandle) -> Self {
        Self {
            path: path.into(),
            params: IndexMap::new(),
            state,
        }
    }

    pub fn with_params(mut self, params: IndexMap<String, String>) -> Self {
        self.params = params;
        self
    }

    /// The normalised request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// A captured dynamic segment.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &IndexMap<String, String> {
        &self.params
    }

    /// State of the session being rendered.
    pub fn state(&self) -> &StateHandle {
        &self.state
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

struct DynamicRoute {
    pattern: String,
    segments: Vec<Segment>,
    factory: PageFactory,
}

/// A resolved route.
#[derive(Clone)]
pub struct RouteMatch {
    pub pattern: String,
    pub path: String,
    pub params: IndexMap<String, String>,
    pub factory: PageFactory,
}

impl fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch")
            .field("pattern", &self.pattern)
            .field("path", &self.path)
            .field("params", &self.params)
            .finish()
    }
}

/// Maps paths to page factories.
#[derive(Default)]
pub struct PageRouter {
    exact: IndexMap<String, PageFactory>,
    dynamic: Vec<DynamicRoute>,
}

impl PageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page. Registering a pattern again replaces its factory.
    pub fn page<F>(&mut self, pattern: &str, factory: F) -> &mut Self
    where
        F: Fn(&PageContext) -> Result<Node, BoxError> + Send + Sync + 'static,
    {
        self.insert(pattern, Arc::new(factory))
    }

    pub fn insert(&mut self, pattern: &str, factory: PageFactory) -> &mut Self {
        let pattern = normalize_path(pattern);
        let segments = parse_pattern(&pattern);
        if segments.iter().any(|s| matches!(s, Segment::Param(_))) {
            match self.dynamic.iter_mut().find(|r| r.pattern == pattern) {
                Some(route) => route.factory = factory,
                None => self.dynamic.push(DynamicRoute {
                    pattern,
                    segments,
                    factory,
                }),
            }
        } else {
            self.exact.insert(pattern, factory);
        }
        self
    }

    /// Find the factory for a request path. Query strings, fragments and a
    /// trailing slash are ignored.
    pub fn resolve(&self, path: &str) -> Option<RouteMatch> {
        let path = normalize_path(path);
        if let Some(factory) = self.exact.get(&path) {
            return Some(RouteMatch {
                pattern: path.clone(),
                path,
                params: IndexMap::new(),
                factory: Arc::clone(factory),
            });
        }

        let parts: Vec<&str> = split(&path).collect();
        self.dynamic.iter().find_map(|route| {
            let params = match_segments(&route.segments, &parts)?;
            Some(RouteMatch {
                pattern: route.pattern.clone(),
                path: path.clone(),
                params,
                factory: Arc::clone(&route.factory),
            })
        })
    }

    pub fn contains(&self, path: &str) -> bool {
        self.resolve(path).is_some()
    }

    /// Static routes in registration order.
    pub fn static_paths(&self) -> impl Iterator<Item = &str> {
        self.exact.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.dynamic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for PageRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageRouter")
            .field("exact", &self.exact.keys().collect::<Vec<_>>())
            .field(
                "dynamic",
                &self.dynamic.iter().map(|r| &r.pattern).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Strip query and fragment, force a leading slash and drop a trailing one.
pub(crate) fn normalize_path(raw: &str) -> String {
    let end = raw.find(|c: char| c == '?' || c == '#').unwrap_or(raw.len());
    let trimmed = raw[..end].trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn parse_pattern(pattern: &str) -> Vec<Segment> {
    split(pattern)
        .map(|part| {
            if let Some(name) = part.strip_prefix(':') {
                Segment::Param(name.to_string())
            } else if let Some(name) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Segment::Param(name.to_string())
            } else {
                Segment::Literal(part.to_string())
            }
        })
        .collect()
}

fn match_segments(segments: &[Segment], parts: &[&str]) -> Option<IndexMap<String, String>> {
    if segments.len() != parts.len() {
        return None;
    }
    let mut params = IndexMap::new();
    for (segment, part) in segments.iter().zip(parts) {
        match segment {
            Segment::Literal(literal) if literal == part => {}
            Segment::Literal(_) => return None,
            Segment::Param(name) => {
                params.insert(name.clone(), (*part).to_string());
            }
        }
    }
    Some(params)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn label(text: &'static str) -> impl Fn(&PageContext) -> Result<Node, BoxError> {
        move |_| Ok(Node::with("p", text))
    }

    fn render(router: &PageRouter, path: &str) -> Option<String> {
        let found = router.resolve(path)?;
        let ctx = PageContext::new(found.path, StateHandle::default()).with_params(found.params);
        Some((found.factory)(&ctx).ok()?.render())
    }

    #[test]
    fn normalizes_paths() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/about/"), "/about");
        assert_eq!(normalize_path("about?tab=2"), "/about");
        assert_eq!(normalize_path("/docs#intro"), "/docs");
    }

    #[test]
    fn static_routes_match_exactly() {
        let mut router = PageRouter::new();
        router.page("/", label("home")).page("/about", label("about"));

        assert_eq!(render(&router, "/about/").as_deref(), Some(r#"<p class="" >about</p>"#));
        assert_eq!(render(&router, "/?x=1").as_deref(), Some(r#"<p class="" >home</p>"#));
        assert!(router.resolve("/about/team").is_none());
        assert_eq!(router.static_paths().collect::<Vec<_>>(), vec!["/", "/about"]);
    }

    #[test]
    fn dynamic_routes_capture_params() {
        let mut router = PageRouter::new();
        router.page("/users/{id}", |ctx: &PageContext| {
            Ok(Node::with("p", ctx.param("id").unwrap_or("?").to_string()))
        });
        router.page("/posts/:slug/comments", |ctx: &PageContext| {
            Ok(Node::with("p", ctx.param("slug").unwrap_or("?").to_string()))
        });

        let found = router.resolve("/users/42").unwrap();
        assert_eq!(found.pattern, "/users/{id}");
        assert_eq!(found.params.get("id").map(String::as_str), Some("42"));
        assert_eq!(
            render(&router, "/posts/hello/comments").as_deref(),
            Some(r#"<p class="" >hello</p>"#)
        );
        assert!(router.resolve("/posts/hello").is_none());
        assert_eq!(router.static_paths().count(), 0);
    }

    #[test]
    fn static_wins_over_dynamic() {
        let mut router = PageRouter::new();
        router.page("/users/{id}", label("dynamic"));
        router.page("/users/me", label("static"));

        assert_eq!(render(&router, "/users/me").as_deref(), Some(r#"<p class="" >static</p>"#));
        assert_eq!(render(&router, "/users/7").as_deref(), Some(r#"<p class="" >dynamic</p>"#));
    }

    #[test]
    fn reregistering_replaces() {
        let mut router = PageRouter::new();
        router.page("/", label("old")).page("/", label("new"));
        router.page("/u/:id", label("old")).page("/u/:id", label("new"));

        assert_eq!(router.len(), 2);
        assert_eq!(render(&router, "/").as_deref(), Some(r#"<p class="" >new</p>"#));
        assert_eq!(render(&router, "/u/1").as_deref(), Some(r#"<p class="" >new</p>"#));
    }
}
