//! Plain HTTP routes.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use tracing::debug;

use super::Shared;
use crate::state::new_session_id;
use crate::tree::escape_html;

const ROBOTS: &str = "User-agent: *\nAllow: /\nSitemap: /sitemap.xml\n";

/// Render the page for the request path as a full document.
///
/// Each page load starts a new session whose state the socket connection
/// picks up through `?session=`. Only pages that rendered successfully save
/// their session.
pub(super) async fn page(State(shared): State<Arc<Shared>>, uri: Uri) -> Response {
    let manager = &shared.manager;
    let session = new_session_id();
    let state = manager.state_for(None);

    let page = manager
        .dispatcher()
        .pipeline()
        .render_document(uri.path(), &state, Some(&session));
    if page.status == 200 {
        manager.save_session(&session, &state);
    }
    debug!(path = uri.path(), status = page.status, %session, "served page");

    let status = StatusCode::from_u16(page.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Html(page.html)).into_response()
}

pub(super) async fn robots() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], ROBOTS)
}

/// List every static page path. Dynamic routes are left out.
pub(super) async fn sitemap(State(shared): State<Arc<Shared>>, headers: HeaderMap) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    let router = shared.manager.dispatcher().pipeline().router();

    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#,
    );
    for path in router.static_paths() {
        xml.push_str("<url><loc>http://");
        xml.push_str(&escape_html(host));
        xml.push_str(&escape_html(path));
        xml.push_str("</loc></url>");
    }
    xml.push_str("</urlset>");

    ([(header::CONTENT_TYPE, "application/xml")], xml).into_response()
}
