use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

static THOUGHT_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(?:thought|thinking)>(.*?)</(?:thought|thinking)>").expect("thought tag regex")
});

static FENCE_OPEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}(`{3,}|~{3,})\s*([^\s`]*)").expect("fence regex"));

/// A fenced code region found by [`scan_fences`], as byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FenceSpan {
    pub span: Range<usize>,
    pub body: Range<usize>,
    pub language: String,
    pub closed: bool,
}

impl FenceSpan {
    pub fn is_thought(&self) -> bool {
        is_thought_language(&self.language)
    }
}

pub(crate) fn is_thought_language(lang: &str) -> bool {
    lang.eq_ignore_ascii_case("thought") || lang.eq_ignore_ascii_case("thinking")
}

/// True when `line` closes a fence opened with `marker` repeated `len` times.
pub(crate) fn closes_fence(line: &str, marker: char, len: usize) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= len && trimmed.chars().all(|c| c == marker)
}

/// Parse a fence opener into (marker char, marker length, info string).
pub(crate) fn fence_open(line: &str) -> Option<(char, usize, String)> {
    let caps = FENCE_OPEN_RE.captures(line)?;
    let marker = caps.get(1)?.as_str();
    let first = marker.chars().next()?;
    let lang = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
    Some((first, marker.len(), lang.to_string()))
}

/// Locate every fenced code block in `text`. Unterminated fences run to the end.
pub(crate) fn scan_fences(text: &str) -> Vec<FenceSpan> {
    let mut spans = Vec::new();
    let mut open: Option<(char, usize, String, usize, usize)> = None;
    let mut offset = 0usize;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        match &open {
            None => {
                if let Some((marker, len, lang)) = fence_open(line) {
                    open = Some((marker, len, lang, line_start, offset));
                }
            }
            Some((marker, len, _, _, _)) => {
                if closes_fence(line, *marker, *len) {
                    if let Some((_, _, lang, start, body_start)) = open.take() {
                        spans.push(FenceSpan {
                            span: start..offset,
                            body: body_start..line_start,
                            language: lang,
                            closed: true,
                        });
                    }
                }
            }
        }
    }

    if let Some((_, _, lang, start, body_start)) = open {
        spans.push(FenceSpan {
            span: start..text.len(),
            body: body_start.min(text.len())..text.len(),
            language: lang,
            closed: false,
        });
    }

    spans
}

/// Pull the first closed reasoning block out of `text`.
///
/// Recognizes `<thought>…</thought>` (or `<thinking>`) anywhere outside code
/// fences, and a fenced block whose info string is `thought`/`thinking`.
/// Only the earliest block is taken; the surrounding text is kept verbatim.
pub fn split_reasoning(text: &str) -> (String, Option<String>) {
    let fences = scan_fences(text);

    let fence_hit = fences
        .iter()
        .find(|f| f.closed && f.is_thought())
        .map(|f| (f.span.clone(), f.body.clone()));

    let tag_hit = THOUGHT_TAG_RE.captures_iter(text).find_map(|caps| {
        let whole = caps.get(0)?;
        let inner = caps.get(1)?;
        let inside_code = fences
            .iter()
            .any(|f| f.span.start <= whole.start() && whole.start() < f.span.end);
        (!inside_code).then(|| (whole.range(), inner.range()))
    });

    let hit = match (fence_hit, tag_hit) {
        (Some(f), Some(t)) => Some(if f.0.start < t.0.start { f } else { t }),
        (Some(f), None) => Some(f),
        (None, Some(t)) => Some(t),
        (None, None) => None,
    };

    match hit {
        Some((span, inner)) => {
            let reasoning = text[inner].trim().to_string();
            let mut content = String::with_capacity(text.len());
            content.push_str(&text[..span.start]);
            content.push_str(&text[span.end..]);
            let reasoning = (!reasoning.is_empty()).then_some(reasoning);
            (content, reasoning)
        }
        None => (text.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_thought_tag() {
        let (content, reasoning) = split_reasoning("Hello <thought>reasoning</thought> world");
        assert_eq!(content, "Hello  world");
        assert_eq!(reasoning.as_deref(), Some("reasoning"));
    }

    #[test]
    fn test_thought_fence() {
        let text = "```thought\nstep one\nstep two\n```\nAnswer";
        let (content, reasoning) = split_reasoning(text);
        assert_eq!(content, "Answer");
        assert_eq!(reasoning.as_deref(), Some("step one\nstep two"));
    }

    #[test]
    fn test_only_first_block_extracted() {
        let (content, reasoning) =
            split_reasoning("<thought>a</thought>x<thought>b</thought>");
        assert_eq!(reasoning.as_deref(), Some("a"));
        assert_eq!(content, "x<thought>b</thought>");
    }

    #[test]
    fn test_tag_inside_code_is_ignored() {
        let text = "```html\n<thought>not me</thought>\n```\n";
        let (content, reasoning) = split_reasoning(text);
        assert_eq!(content, text);
        assert!(reasoning.is_none());
    }

    #[test]
    fn test_unterminated_tag_left_alone() {
        let (content, reasoning) = split_reasoning("a <thought> never closed");
        assert_eq!(content, "a <thought> never closed");
        assert!(reasoning.is_none());
    }

    #[test]
    fn test_scan_fences_unterminated() {
        let spans = scan_fences("text\n```rust\nfn x() {}\n");
        assert_eq!(spans.len(), 1);
        assert!(!spans[0].closed);
        assert_eq!(spans[0].language, "rust");
    }
}
