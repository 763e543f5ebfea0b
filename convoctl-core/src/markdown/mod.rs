//! Markdown block engine for the transcript dialect.
//!
//! This is deliberately not CommonMark: it understands the constructs chat
//! exports actually contain, plus the `:::thought` / `<thought>` reasoning
//! syntax. Rendering never fails; unterminated blocks run to the end of the
//! input and every opened element is closed.

mod blocks;
pub mod inline;

pub use inline::render_inline;

/// Summary text of the reasoning disclosure.
pub const REASONING_SUMMARY: &str = "Thought process";

/// Render dialect markdown to an HTML fragment.
///
/// When `reasoning_enabled` is false, reasoning blocks are dropped entirely.
pub fn render(markdown: &str, reasoning_enabled: bool) -> String {
    let normalized = markdown.replace("\r\n", "\n");
    blocks::BlockRenderer::new(&normalized, reasoning_enabled, 0).render()
}

/// Wrap already-rendered HTML in the closed-by-default reasoning disclosure.
pub fn reasoning_widget(body_html: &str) -> String {
    format!(
        "<details class=\"reasoning\"><summary>{REASONING_SUMMARY}</summary>\n<div class=\"reasoning-body\">\n{body_html}</div>\n</details>\n"
    )
}
