//! HTML serialization.
//!
//! Output layout is fixed so re-renders are byte-identical:
//!
//! - element: `<tag class="a b" k="v" k2="v2">children</tag>`
//! - void element: `<tag class="a b" k="v" />`
//!
//! The class attribute is always present, even when empty, and a single space
//! always follows it. Attribute values are written verbatim.

use std::fmt;

use super::node::{Child, Node};

/// Escape text for use as HTML element content.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    push_escaped(&mut out, text);
    out
}

fn push_escaped(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
}

impl Node {
    /// Serialize this subtree to HTML.
    ///
    /// Rendering only reads the tree, so calling it repeatedly yields the
    /// same string.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(128);
        self.render_into(&mut out);
        out
    }

    /// Serialize this subtree, appending to `out`.
    pub fn render_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(self.tag());
        out.push_str(" class=\"");
        for (i, class) in self.class_list().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(class);
        }
        out.push_str("\" ");

        for (i, (name, value)) in self.attributes().iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(value);
            out.push('"');
        }

        if self.is_void() {
            out.push_str(" />");
            return;
        }

        out.push('>');
        for child in self.child_nodes() {
            child.render_into(out);
        }
        out.push_str("</");
        out.push_str(self.tag());
        out.push('>');
    }
}

impl Child {
    /// Serialize this child, appending to `out`.
    pub fn render_into(&self, out: &mut String) {
        match self {
            Child::Element(node) => node.render_into(out),
            Child::Text(text) => push_escaped(out, text),
            Child::Raw(html) => out.push_str(html),
            Child::Fragment(items) => {
                for item in items {
                    item.render_into(out);
                }
            }
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_nested_tree() {
        let tree = Node::new("div")
            .class("flex")
            .child(Node::new("span").child("hi"));

        assert_eq!(
            tree.render(),
            r#"<div class="flex" ><span class="" >hi</span></div>"#
        );
    }

    #[test]
    fn render_is_repeatable() {
        let tree = Node::new("ul")
            .classes(["list", "gap-2"])
            .attr("role", "list")
            .children((0..3).map(|i| Node::with("li", i)));

        let first = tree.render();
        let second = tree.render();
        assert_eq!(first, second);
        assert_eq!(
            first,
            r#"<ul class="list gap-2" role="list"><li class="" >0</li><li class="" >1</li><li class="" >2</li></ul>"#
        );
    }

    #[test]
    fn void_tags_self_close() {
        let img = Node::new("img").attr("src", "a.png").attr("alt", "A");
        assert_eq!(img.render(), r#"<img class="" src="a.png" alt="A" />"#);

        let br = Node::new("br");
        assert_eq!(br.render(), r#"<br class=""  />"#);
    }

    #[test]
    fn text_is_escaped_raw_is_not() {
        let node = Node::new("p")
            .child("<b>&</b>")
            .raw("<i>ok</i>");
        assert_eq!(
            node.render(),
            r#"<p class="" >&lt;b&gt;&amp;&lt;/b&gt;<i>ok</i></p>"#
        );
    }

    #[test]
    fn fragments_concatenate() {
        let node = Node::new("div").child(vec![Child::from("a"), Child::from(vec!["b", "c"])]);
        assert_eq!(node.render(), r#"<div class="" >abc</div>"#);
    }

    #[test]
    fn display_matches_render() {
        let node = Node::new("em").child("x");
        assert_eq!(node.to_string(), node.render());
    }

    #[test]
    fn escape_html_handles_quotes() {
        assert_eq!(escape_html(r#"a "b" 'c'"#), "a &quot;b&quot; &#x27;c&#x27;");
    }
}
