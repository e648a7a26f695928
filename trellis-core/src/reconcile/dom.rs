//! DOM abstraction and an in-memory implementation.

use std::ops::Range;

use crate::protocol::ToastVariant;
use crate::tree::{is_void_tag, MOUNT_ATTR};

/// A side-channel notification.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Toast {
        message: String,
        variant: ToastVariant,
        duration: u64,
    },
    Alert(String),
}

/// The operations the reconciler needs from a document.
pub trait Dom {
    /// Replace the element with `id` by `html`. Returns false when no such
    /// element exists.
    fn replace_element(&mut self, id: &str, html: &str) -> bool;

    /// Replace the mounted root's inner content.
    fn replace_root(&mut self, html: &str);

    fn push_history(&mut self, path: &str);

    fn current_path(&self) -> &str;

    fn notify(&mut self, notice: Notice);

    fn reload(&mut self);
}

/// A document held as an HTML string.
#[derive(Debug, Clone, Default)]
pub struct MemoryDom {
    root: String,
    history: Vec<String>,
    notices: Vec<Notice>,
    reloads: usize,
}

impl MemoryDom {
    pub fn new(path: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            history: vec![path.into()],
            notices: Vec::new(),
            reloads: 0,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn reloads(&self) -> usize {
        self.reloads
    }
}

impl Dom for MemoryDom {
    fn replace_element(&mut self, id: &str, html: &str) -> bool {
        match find_element(&self.root, id) {
            Some(span) => {
                self.root.replace_range(span, html);
                true
            }
            None => false,
        }
    }

    fn replace_root(&mut self, html: &str) {
        self.root = html.to_string();
    }

    fn push_history(&mut self, path: &str) {
        self.history.push(path.to_string());
    }

    fn current_path(&self) -> &str {
        self.history.last().map_or("/", String::as_str)
    }

    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    fn reload(&mut self) {
        self.reloads += 1;
    }
}

/// Byte range of the element carrying `id="{id}"`, outer HTML included.
///
/// Nested elements with the same tag name are balanced. Attribute values
/// containing `>` are not supported.
pub fn find_element(html: &str, id: &str) -> Option<Range<usize>> {
    let needle = format!("id=\"{id}\"");
    let mut search = 0;
    let attr_at = loop {
        let at = search + html[search..].find(&needle)?;
        let boundary = html[..at]
            .chars()
            .next_back()
            .map_or(false, char::is_whitespace);
        if boundary {
            break at;
        }
        search = at + needle.len();
    };

    let start = html[..attr_at].rfind('<')?;
    let name_len = html[start + 1..].find(|c: char| c.is_whitespace() || c == '>' || c == '/')?;
    let tag = &html[start + 1..start + 1 + name_len];
    let open_end = attr_at + html[attr_at..].find('>')? + 1;

    if is_void_tag(tag) || html[..open_end].ends_with("/>") {
        return Some(start..open_end);
    }

    let open_pat = format!("<{tag}");
    let close_pat = format!("</{tag}>");
    let mut depth = 1usize;
    let mut cursor = open_end;
    while depth > 0 {
        let close = cursor + html[cursor..].find(&close_pat)?;
        match find_open(html, cursor..close, &open_pat) {
            Some(open) => {
                depth += 1;
                cursor = open + open_pat.len();
            }
            None => {
                depth -= 1;
                cursor = close + close_pat.len();
            }
        }
    }
    Some(start..cursor)
}

fn find_open(html: &str, within: Range<usize>, open_pat: &str) -> Option<usize> {
    let mut from = within.start;
    while from < within.end {
        let at = from + html[from..within.end].find(open_pat)?;
        let next = html[at + open_pat.len()..].chars().next();
        if matches!(next, Some(c) if c.is_whitespace() || c == '>' || c == '/') {
            return Some(at);
        }
        from = at + open_pat.len();
    }
    None
}

/// Handler ids named by mount attributes, in document order.
pub fn mount_handlers(html: &str) -> Vec<String> {
    let needle = format!("{MOUNT_ATTR}=\"");
    let mut handlers = Vec::new();
    let mut rest = html;
    while let Some(at) = rest.find(&needle) {
        rest = &rest[at + needle.len()..];
        let Some(end) = rest.find('"') else {
            break;
        };
        handlers.push(rest[..end].to_string());
        rest = &rest[end..];
    }
    handlers
}
