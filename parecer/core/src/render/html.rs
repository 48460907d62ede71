//! HTML renderer
//!
//! Maps parsed blocks to the display markup used by the transcript export.
//! All text is escaped; markup only ever comes from node kinds.

use super::markdown::{Block, Inline};

/// Render blocks as HTML
#[must_use]
pub fn to_html(blocks: &[Block]) -> String {
    let mut out = String::new();

    for block in blocks {
        match block {
            Block::Heading { level, inlines } => {
                out.push_str(&format!("<h{level}>"));
                push_inlines(&mut out, inlines);
                out.push_str(&format!("</h{level}>"));
            }
            Block::ListItem(inlines) => {
                out.push_str("<ul><li>");
                push_inlines(&mut out, inlines);
                out.push_str("</li></ul>");
            }
            Block::Paragraph(inlines) => push_inlines(&mut out, inlines),
            Block::LineBreak => out.push_str("<br>"),
        }
    }

    out
}

fn push_inlines(out: &mut String, inlines: &[Inline]) {
    for inline in inlines {
        match inline {
            Inline::Text(text) => push_escaped(out, text),
            Inline::Strong(children) => {
                out.push_str("<strong>");
                push_inlines(out, children);
                out.push_str("</strong>");
            }
            Inline::Emphasis(text) => {
                out.push_str("<em>");
                push_escaped(out, text);
                out.push_str("</em>");
            }
        }
    }
}

/// Escape text for HTML element content and attribute values
pub fn push_escaped(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::markdown::parse;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_heading_list_and_breaks() {
        let html = to_html(&parse("### 2. Relatório\n* **Autoria:** indícios\nfim"));
        assert_eq!(
            html,
            "<h3>2. Relatório</h3><br><ul><li><strong>Autoria:</strong> indícios</li></ul><br>fim"
        );
    }

    #[test]
    fn test_emphasis_and_escaping() {
        let html = to_html(&parse("_art. 107_ <script> & \"x\""));
        assert_eq!(
            html,
            "<em>art. 107</em> &lt;script&gt; &amp; &quot;x&quot;"
        );
    }

    #[test]
    fn test_partial_buffer_renders() {
        assert_eq!(to_html(&parse("**Concl")), "**Concl");
    }
}
