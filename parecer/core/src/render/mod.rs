//! Render Adapter
//!
//! Turns assembled model text into display output as an explicit two-stage
//! pipeline:
//!
//! ```text
//! text ──markdown::parse──▶ [Block] ──┬──html::to_html──────▶ markup
//!                                     └──plain::to_plain_text─▶ copy text
//! ```
//!
//! Parsing is pure and cheap enough to redo on the whole buffer after every
//! fragment.

pub mod html;
pub mod markdown;
pub mod plain;

pub use html::to_html;
pub use markdown::{parse, Block, Inline};
pub use plain::to_plain_text;

/// Parse and render text as HTML
#[must_use]
pub fn render_html(text: &str) -> String {
    to_html(&parse(text))
}

/// Parse and render text as marker-free plain text
#[must_use]
pub fn render_plain(text: &str) -> String {
    to_plain_text(&parse(text))
}
