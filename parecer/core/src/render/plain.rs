//! Plain-text renderer
//!
//! What a reader would select and copy from the rendered turn: the text of
//! every node with the markup markers removed.

use super::markdown::{Block, Inline};

/// Render blocks as marker-free text
#[must_use]
pub fn to_plain_text(blocks: &[Block]) -> String {
    let mut out = String::new();

    for block in blocks {
        match block {
            Block::Heading { inlines, .. }
            | Block::ListItem(inlines)
            | Block::Paragraph(inlines) => push_inlines(&mut out, inlines),
            Block::LineBreak => out.push('\n'),
        }
    }

    out
}

fn push_inlines(out: &mut String, inlines: &[Inline]) {
    for inline in inlines {
        match inline {
            Inline::Text(text) | Inline::Emphasis(text) => out.push_str(text),
            Inline::Strong(children) => push_inlines(out, children),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::markdown::parse;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_markers_removed() {
        let plain = to_plain_text(&parse(
            "### 4. Conclusão\n**Conclusão:** _Promoção de Arquivamento_\n* prazo",
        ));
        assert_eq!(
            plain,
            "4. Conclusão\nConclusão: Promoção de Arquivamento\nprazo"
        );
    }

    #[test]
    fn test_unclosed_marker_kept() {
        assert_eq!(to_plain_text(&parse("a ** b")), "a ** b");
    }
}
