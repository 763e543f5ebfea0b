//! Inline spans: code, images, links, badges, emphasis.
//!
//! Code spans, images, links and badges are rendered first and parked behind
//! placeholder tokens built from private-use characters. The remaining text
//! is escaped, emphasis is applied, and the placeholders are restored.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::sanitize::{escape_attr, escape_text, sanitize_url, strip_reserved};

const OPEN: char = '\u{E000}';
const CLOSE: char = '\u{E001}';

static IMAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"!\[([^\]]*)\]\(\s*([^)\s]*)(?:\s+"[^"]*")?\s*\)"#).expect("image regex")
});

static LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\[([^\[\]]+)\]\(\s*([^)\s]*)(?:\s+"[^"]*")?\s*\)"#).expect("link regex")
});

static BADGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\[\]\n]+)\]\]").expect("badge regex"));

static BOLD_STAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*(\S(?:.*?\S)?)\*\*").expect("bold regex"));
static BOLD_UNDERSCORE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b__(\S(?:.*?\S)?)__\b").expect("bold underscore regex"));
static ITALIC_STAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*([^*\s](?:[^*]*?[^*\s])?)\*").expect("italic regex"));
static ITALIC_UNDERSCORE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b_([^_\s](?:[^_]*?[^_\s])?)_\b").expect("italic underscore regex"));
static STRIKE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"~~(\S(?:.*?\S)?)~~").expect("strike regex"));

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new("\u{E000}([0-9]+)\u{E001}").expect("placeholder regex"));

#[derive(Default)]
struct Slots {
    html: Vec<String>,
}

impl Slots {
    fn park(&mut self, html: String) -> String {
        let token = format!("{OPEN}{}{CLOSE}", self.html.len());
        self.html.push(html);
        token
    }

    fn restore(&self, text: &str) -> String {
        let mut out = text.to_string();
        // Link labels may hold code placeholders, so restore until stable.
        for _ in 0..4 {
            if !out.contains(OPEN) {
                break;
            }
            out = PLACEHOLDER_RE
                .replace_all(&out, |caps: &Captures| {
                    caps[1]
                        .parse::<usize>()
                        .ok()
                        .and_then(|idx| self.html.get(idx))
                        .cloned()
                        .unwrap_or_default()
                })
                .into_owned();
        }
        out
    }
}

/// Render one run of inline markdown to HTML.
pub fn render_inline(text: &str) -> String {
    let text = strip_reserved(text);
    let mut slots = Slots::default();

    let text = park_code_spans(&text, &mut slots);

    let text = IMAGE_RE
        .replace_all(&text, |caps: &Captures| {
            let alt = &caps[1];
            let url = sanitize_url(&caps[2]);
            let html = if url.is_empty() {
                escape_text(alt)
            } else {
                format!(
                    r#"<img src="{}" alt="{}" loading="lazy">"#,
                    escape_attr(&url),
                    escape_attr(alt)
                )
            };
            slots.park(html)
        })
        .into_owned();

    let text = BADGE_RE
        .replace_all(&text, |caps: &Captures| {
            slots.park(format!(
                r#"<span class="badge">{}</span>"#,
                escape_text(caps[1].trim())
            ))
        })
        .into_owned();

    let text = LINK_RE
        .replace_all(&text, |caps: &Captures| {
            let label = emphasis(&escape_text(&caps[1]));
            let url = sanitize_url(&caps[2]);
            let html = if url.is_empty() {
                label
            } else {
                format!(
                    r#"<a href="{}" target="_blank" rel="noopener noreferrer">{}</a>"#,
                    escape_attr(&url),
                    label
                )
            };
            slots.park(html)
        })
        .into_owned();

    let escaped = emphasis(&escape_text(&text));
    slots.restore(&escaped)
}

fn emphasis(escaped: &str) -> String {
    let out = BOLD_STAR_RE.replace_all(escaped, "<strong>$1</strong>");
    let out = BOLD_UNDERSCORE_RE.replace_all(&out, "<strong>$1</strong>");
    let out = ITALIC_STAR_RE.replace_all(&out, "<em>$1</em>");
    let out = ITALIC_UNDERSCORE_RE.replace_all(&out, "<em>$1</em>");
    STRIKE_RE.replace_all(&out, "<del>$1</del>").into_owned()
}

/// Replace backtick code spans with placeholders. Unmatched runs stay literal.
fn park_code_spans(text: &str, slots: &mut Slots) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    let mut copied = 0;

    while i < bytes.len() {
        if bytes[i] != b'`' {
            i += 1;
            continue;
        }
        let run = count_run(bytes, i);
        match find_closing_run(bytes, i + run, run) {
            Some(close) => {
                out.push_str(&text[copied..i]);
                let inner = &text[i + run..close];
                let inner = if inner.len() > 1 && inner.starts_with(' ') && inner.ends_with(' ') {
                    &inner[1..inner.len() - 1]
                } else {
                    inner
                };
                let token = slots.park(format!("<code>{}</code>", escape_text(inner)));
                out.push_str(&token);
                i = close + run;
                copied = i;
            }
            None => i += run,
        }
    }
    out.push_str(&text[copied..]);
    out
}

fn count_run(bytes: &[u8], start: usize) -> usize {
    bytes[start..].iter().take_while(|&&b| b == b'`').count()
}

fn find_closing_run(bytes: &[u8], from: usize, len: usize) -> Option<usize> {
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b'`' {
            let run = count_run(bytes, i);
            if run == len {
                return Some(i);
            }
            i += run;
        } else {
            i += 1;
        }
    }
    None
}
