//! Full HTML document shell.

use serde_json::json;

use crate::config::DocumentConfig;
use crate::tree::escape_html;

/// Id of the element whose content is replaced on navigation and refresh.
pub const ROOT_ID: &str = "trellis-root";

/// Id of the element toasts are appended to.
pub const TOAST_CONTAINER_ID: &str = "trellis-toast-container";

const CLIENT_JS: &str = include_str!("client.js");

const BASE_CSS: &str = "\
.trellis-toast-container{position:fixed;top:20px;right:20px;z-index:9999;display:flex;flex-direction:column;gap:10px}\
.trellis-toast{padding:16px 24px;border-radius:8px;box-shadow:0 4px 12px rgba(0,0,0,.15);min-width:300px;color:#fff}\
.trellis-toast.info{background:#3b82f6}\
.trellis-toast.success{background:#22c55e}\
.trellis-toast.warning{background:#f59e0b}\
.trellis-toast.error{background:#ef4444}";

/// Wraps rendered page content in `<html>` and wires the socket bootstrap.
#[derive(Debug, Clone)]
pub struct DocumentShell {
    config: DocumentConfig,
    socket_path: String,
}

impl DocumentShell {
    pub fn new(config: DocumentConfig, socket_path: impl Into<String>) -> Self {
        Self {
            config,
            socket_path: socket_path.into(),
        }
    }

    pub fn socket_path(&self) -> &str {
        &self.socket_path
    }

    /// Produce the full document for `content`.
    pub fn wrap(&self, content: &str, session: Option<&str>) -> String {
        let boot = json!({
            "socket": self.socket_path,
            "session": session,
        })
        .to_string()
        .replace("</", "<\\/");

        format!(
            "<!DOCTYPE html><html lang=\"{lang}\"><head>\
<meta charset=\"UTF-8\">\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\
<title>{title}</title>\
<style>{css}</style>{head}</head><body>\
<div id=\"{toast}\" class=\"trellis-toast-container\"></div>\
<div id=\"{root}\">{content}</div>\
<script>window.__TRELLIS__ = {boot};</script>\
<script>{client}</script>\
</body></html>",
            lang = escape_html(&self.config.lang),
            title = escape_html(&self.config.title),
            css = BASE_CSS,
            head = self.config.head,
            toast = TOAST_CONTAINER_ID,
            root = ROOT_ID,
            content = content,
            boot = boot,
            client = CLIENT_JS,
        )
    }
}

impl Default for DocumentShell {
    fn default() -> Self {
        Self::new(DocumentConfig::default(), "/ws")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_content_in_root() {
        let html = DocumentShell::default().wrap("<p>hi</p>", None);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(r#"<div id="trellis-root"><p>hi</p></div>"#));
        assert!(html.contains(r#"<div id="trellis-toast-container""#));
        assert!(html.contains("<title>Trellis App</title>"));
        assert!(html.contains("window.Trellis = Trellis"));
    }

    #[test]
    fn bootstrap_carries_socket_and_session() {
        let shell = DocumentShell::new(DocumentConfig::default(), "/live");
        let html = shell.wrap("", Some("abc-123"));
        assert!(html.contains(r#""session":"abc-123""#));
        assert!(html.contains(r#""socket":"/live""#));
    }

    #[test]
    fn title_is_escaped_and_head_is_verbatim() {
        let shell = DocumentShell::new(
            DocumentConfig {
                title: "A <b> & C".into(),
                lang: "fr".into(),
                head: r#"<link rel="icon" href="/f.png">"#.into(),
            },
            "/ws",
        );
        let html = shell.wrap("", None);
        assert!(html.contains("<title>A &lt;b&gt; &amp; C</title>"));
        assert!(html.contains(r#"<html lang="fr">"#));
        assert!(html.contains(r#"<link rel="icon" href="/f.png"></head>"#));
    }
}
