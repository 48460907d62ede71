//! Markdown subset parser
//!
//! Recognises exactly what the model is asked to produce:
//!
//! | Source | Node |
//! |--------|------|
//! | `# ` … `#### ` at line start | [`Block::Heading`] |
//! | `* ` or `- ` at line start | [`Block::ListItem`] |
//! | `**x**`, `__x__` | [`Inline::Strong`] (may contain emphasis) |
//! | `*x*`, `_x_` | [`Inline::Emphasis`] |
//! | newline | [`Block::LineBreak`] |
//!
//! Line-level structure is decided before inline spans, so a list marker is
//! never mistaken for emphasis. A delimiter without a closing partner stays
//! literal text, which keeps a half-streamed buffer renderable.

/// Inline span
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inline {
    /// Plain text
    Text(String),
    /// Strong emphasis
    Strong(Vec<Inline>),
    /// Emphasis
    Emphasis(String),
}

/// Line-level node
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Block {
    /// `#`-prefixed heading, level 1 to 4
    Heading {
        /// Number of `#`
        level: u8,
        /// Heading content
        inlines: Vec<Inline>,
    },
    /// One bullet line
    ListItem(Vec<Inline>),
    /// Any other non-empty line
    Paragraph(Vec<Inline>),
    /// Source line boundary
    LineBreak,
}

/// Parse text into blocks
#[must_use]
pub fn parse(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();

    for (index, line) in text.split('\n').enumerate() {
        if index > 0 {
            blocks.push(Block::LineBreak);
        }
        if let Some(block) = parse_line(line) {
            blocks.push(block);
        }
    }

    blocks
}

fn parse_line(line: &str) -> Option<Block> {
    if line.is_empty() {
        return None;
    }

    if let Some((level, content)) = heading(line) {
        return Some(Block::Heading {
            level,
            inlines: parse_inlines(content, true),
        });
    }

    if let Some(content) = line.strip_prefix("* ").or_else(|| line.strip_prefix("- ")) {
        return Some(Block::ListItem(parse_inlines(content, true)));
    }

    Some(Block::Paragraph(parse_inlines(line, true)))
}

fn heading(line: &str) -> Option<(u8, &str)> {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    if !(1..=4).contains(&hashes) {
        return None;
    }
    let content = line[hashes..].strip_prefix(' ')?;
    u8::try_from(hashes).ok().map(|level| (level, content))
}

fn parse_inlines(text: &str, allow_strong: bool) -> Vec<Inline> {
    let mut inlines = Vec::new();
    let mut literal = String::new();
    let mut rest = text;

    while !rest.is_empty() {
        let span = if allow_strong { strong_span(rest) } else { None }.or_else(|| emphasis_span(rest));

        if let Some((inline, consumed)) = span {
            if !literal.is_empty() {
                inlines.push(Inline::Text(std::mem::take(&mut literal)));
            }
            inlines.push(inline);
            rest = &rest[consumed..];
            continue;
        }

        let mut chars = rest.chars();
        if let Some(ch) = chars.next() {
            literal.push(ch);
        }
        rest = chars.as_str();
    }

    if !literal.is_empty() {
        inlines.push(Inline::Text(literal));
    }
    inlines
}

/// `**x**` or `__x__` at the start of `text`, with bytes consumed
fn strong_span(text: &str) -> Option<(Inline, usize)> {
    let delimiter = ["**", "__"].into_iter().find(|d| text.starts_with(d))?;
    let body = &text[2..];
    let end = body.find(delimiter).filter(|end| *end > 0)?;
    Some((Inline::Strong(parse_inlines(&body[..end], false)), end + 4))
}

/// `*x*` or `_x_` at the start of `text`, with bytes consumed
fn emphasis_span(text: &str) -> Option<(Inline, usize)> {
    let delimiter = text.chars().next().filter(|c| matches!(c, '*' | '_'))?;
    let body = &text[1..];
    let end = body.find(delimiter).filter(|end| *end > 0)?;
    Some((Inline::Emphasis(body[..end].to_string()), end + 2))
}
