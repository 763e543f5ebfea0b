use once_cell::sync::Lazy;
use regex::Regex;

use super::inline::render_inline;
use super::reasoning_widget;
use crate::extract::reasoning::{closes_fence, fence_open, is_thought_language};
use crate::sanitize::{escape_text, validate_language};

/// Nesting limit for quotes and collapsibles rendered recursively.
const MAX_DEPTH: usize = 16;

static COLLAPSIBLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*:::\s*(thought|thinking|details|collapse)\b[ \t]*(.*?)\s*$")
        .expect("collapsible regex")
});

static ANY_COLLAPSIBLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*:::\s*\S").expect("collapsible opener regex"));

static THOUGHT_OPEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*<(thought|thinking)>").expect("thought open regex"));

static THOUGHT_CLOSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</(?:thought|thinking)>").expect("thought close regex"));

static HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^ {0,3}(#{1,6})[ \t]+(.*?)(?:[ \t]+#+)?[ \t]*$").expect("heading regex")
});

static LIST_ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([ \t]*)([-*+]|[0-9]{1,9}[.)])[ \t]+(.*)$").expect("list regex"));

static TABLE_SEPARATOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\|?\s*:?-+:?\s*(?:\|\s*:?-+:?\s*)*\|?\s*$").expect("table separator regex")
});

static QUOTE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^ {0,3}>").expect("quote regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    None,
    Left,
    Center,
    Right,
}

impl Align {
    fn style(self) -> &'static str {
        match self {
            Align::None => "",
            Align::Left => r#" style="text-align:left""#,
            Align::Center => r#" style="text-align:center""#,
            Align::Right => r#" style="text-align:right""#,
        }
    }
}

struct ListItem<'a> {
    indent: usize,
    ordered: bool,
    start: u64,
    text: &'a str,
}

struct ListFrame {
    ordered: bool,
    indent: usize,
}

/// Forward-only line cursor plus the open-list stack.
pub(crate) struct BlockRenderer<'a> {
    lines: Vec<&'a str>,
    pos: usize,
    out: String,
    lists: Vec<ListFrame>,
    reasoning_enabled: bool,
    depth: usize,
}

impl<'a> BlockRenderer<'a> {
    pub(crate) fn new(text: &'a str, reasoning_enabled: bool, depth: usize) -> Self {
        Self {
            lines: text.lines().collect(),
            pos: 0,
            out: String::with_capacity(text.len() + text.len() / 2),
            lists: Vec::new(),
            reasoning_enabled,
            depth,
        }
    }

    pub(crate) fn render(mut self) -> String {
        while self.pos < self.lines.len() {
            let line = self.lines[self.pos];

            if line.trim().is_empty() {
                if !self.lists.is_empty() && !self.list_continues_after_blank() {
                    self.close_lists();
                }
                self.pos += 1;
                continue;
            }

            if !self.lists.is_empty() {
                if let Some(item) = parse_list_item(line) {
                    if !is_rule(line) {
                        self.list_item(item);
                        self.pos += 1;
                        continue;
                    }
                }
                if indent_of(line) > 0 && fence_open(line).is_some() {
                    self.fence(indent_of(line));
                    continue;
                }
                if !starts_block(line) && !self.table_starts() {
                    // Lazy continuation of the open item.
                    self.out.push_str("<br>");
                    self.out.push_str(&render_inline(line.trim()));
                    self.pos += 1;
                    continue;
                }
                self.close_lists();
            }

            if let Some(caps) = COLLAPSIBLE_RE.captures(line) {
                let kind = caps[1].to_ascii_lowercase();
                let title = caps[2].to_string();
                self.collapsible(&kind, &title);
            } else if THOUGHT_OPEN_RE.is_match(line) {
                self.thought_tag();
            } else if fence_open(line).is_some() {
                self.fence(0);
            } else if self.table_starts() {
                self.table();
            } else if is_rule(line) {
                self.out.push_str("<hr>\n");
                self.pos += 1;
            } else if let Some(caps) = HEADING_RE.captures(line) {
                let level = caps[1].len();
                self.out.push_str(&format!(
                    "<h{level}>{}</h{level}>\n",
                    render_inline(&caps[2])
                ));
                self.pos += 1;
            } else if QUOTE_RE.is_match(line) {
                self.blockquote();
            } else if let Some(item) = parse_list_item(line) {
                self.list_item(item);
                self.pos += 1;
            } else {
                self.paragraph();
            }
        }

        self.close_lists();
        self.out
    }

    fn nested(&self, text: &str) -> String {
        if self.depth >= MAX_DEPTH {
            return format!("<p>{}</p>\n", escape_text(text));
        }
        BlockRenderer::new(text, self.reasoning_enabled, self.depth + 1).render()
    }

    fn push_reasoning(&mut self, body: &str) {
        if !self.reasoning_enabled {
            return;
        }
        let html = self.nested(body);
        self.out.push_str(&reasoning_widget(&html));
    }

    fn list_continues_after_blank(&self) -> bool {
        self.lines[self.pos..]
            .iter()
            .find(|l| !l.trim().is_empty())
            .is_some_and(|next| parse_list_item(next).is_some() || indent_of(next) > 0)
    }

    fn list_item(&mut self, item: ListItem<'_>) {
        while let Some(top) = self.lists.last() {
            if top.indent > item.indent || (top.indent == item.indent && top.ordered != item.ordered) {
                self.close_top_list();
            } else {
                break;
            }
        }

        let continues = self.lists.last().is_some_and(|top| top.indent == item.indent);
        if continues {
            self.out.push_str("</li>\n<li>");
        } else {
            if !item.ordered {
                self.out.push_str("<ul>\n<li>");
            } else if item.start == 1 {
                self.out.push_str("<ol>\n<li>");
            } else {
                self.out.push_str(&format!("<ol start=\"{}\">\n<li>", item.start));
            }
            self.lists.push(ListFrame {
                ordered: item.ordered,
                indent: item.indent,
            });
        }
        self.out.push_str(&render_inline(item.text));
    }

    fn close_top_list(&mut self) {
        if let Some(frame) = self.lists.pop() {
            self.out
                .push_str(if frame.ordered { "</li>\n</ol>\n" } else { "</li>\n</ul>\n" });
        }
    }

    fn close_lists(&mut self) {
        while !self.lists.is_empty() {
            self.close_top_list();
        }
    }

    /// `:::kind [title]` … `:::`, with nested openers counted.
    fn collapsible(&mut self, kind: &str, title: &str) {
        self.pos += 1;
        let start = self.pos;
        let mut depth = 1usize;
        while self.pos < self.lines.len() {
            let line = self.lines[self.pos];
            if line.trim() == ":::" {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            } else if ANY_COLLAPSIBLE_RE.is_match(line) {
                depth += 1;
            }
            self.pos += 1;
        }
        let body = self.lines[start..self.pos.min(self.lines.len())].join("\n");
        // Step past the closing `:::` when there is one.
        self.pos = (self.pos + 1).min(self.lines.len());

        match kind {
            "thought" | "thinking" => self.push_reasoning(&body),
            _ => {
                let summary = if title.is_empty() { "Details" } else { title };
                let inner = self.nested(&body);
                self.out.push_str(&format!(
                    "<details class=\"collapsible\"><summary>{}</summary>\n<div class=\"collapsible-body\">\n{}</div>\n</details>\n",
                    escape_text(summary),
                    inner
                ));
            }
        }
    }

    /// `<thought>` … `</thought>` spanning one or more lines.
    fn thought_tag(&mut self) {
        let first = self.lines[self.pos];
        let opener_end = THOUGHT_OPEN_RE.find(first).map_or(0, |m| m.end());
        let mut body = Vec::new();
        let mut remainder = None;
        let mut current = &first[opener_end..];

        loop {
            if let Some(close) = THOUGHT_CLOSE_RE.find(current) {
                body.push(&current[..close.start()]);
                let rest = current[close.end()..].trim();
                if !rest.is_empty() {
                    remainder = Some(rest);
                }
                self.pos += 1;
                break;
            }
            body.push(current);
            self.pos += 1;
            match self.lines.get(self.pos) {
                Some(next) => current = *next,
                None => break,
            }
        }

        let body = body.join("\n");
        self.push_reasoning(body.trim());
        if let Some(rest) = remainder {
            self.out.push_str(&format!("<p>{}</p>\n", render_inline(rest)));
        }
    }

    fn fence(&mut self, indent: usize) {
        let Some((marker, len, lang)) = fence_open(strip_indent(self.lines[self.pos], indent)) else {
            self.pos += 1;
            return;
        };
        self.pos += 1;
        let mut body: Vec<&str> = Vec::new();
        while self.pos < self.lines.len() {
            let line = self.lines[self.pos];
            self.pos += 1;
            if closes_fence(line, marker, len) {
                break;
            }
            body.push(strip_indent(line, indent));
        }
        let body = body.join("\n");

        if is_thought_language(&lang) {
            self.push_reasoning(&body);
            return;
        }
        self.out.push_str(&format!(
            "<pre><code class=\"language-{}\">{}</code></pre>\n",
            validate_language(&lang),
            escape_text(&body)
        ));
    }

    fn table_starts(&self) -> bool {
        let line = self.lines[self.pos];
        line.contains('|')
            && self
                .lines
                .get(self.pos + 1)
                .is_some_and(|next| is_table_separator(next))
    }

    fn table(&mut self) {
        let header = split_row(self.lines[self.pos]);
        let aligns: Vec<Align> = split_row(self.lines[self.pos + 1])
            .iter()
            .map(|cell| parse_align(cell))
            .collect();
        self.pos += 2;

        let columns = header.len();
        let align_at = |idx: usize| aligns.get(idx).copied().unwrap_or(Align::None);

        let mut html = String::from("<table>\n<thead>\n<tr>");
        for (idx, cell) in header.iter().enumerate() {
            html.push_str(&format!("<th{}>{}</th>", align_at(idx).style(), render_inline(cell)));
        }
        html.push_str("</tr>\n</thead>\n<tbody>\n");

        while self.pos < self.lines.len() {
            let line = self.lines[self.pos];
            if line.trim().is_empty() || !line.contains('|') {
                break;
            }
            let cells = split_row(line);
            html.push_str("<tr>");
            for idx in 0..columns {
                let cell = cells.get(idx).map(String::as_str).unwrap_or("");
                html.push_str(&format!("<td{}>{}</td>", align_at(idx).style(), render_inline(cell)));
            }
            html.push_str("</tr>\n");
            self.pos += 1;
        }

        html.push_str("</tbody>\n</table>\n");
        self.out.push_str(&html);
    }

    fn blockquote(&mut self) {
        let mut body = Vec::new();
        while self.pos < self.lines.len() && QUOTE_RE.is_match(self.lines[self.pos]) {
            body.push(strip_quote(self.lines[self.pos]));
            self.pos += 1;
        }
        let body = body.join("\n");
        let trimmed = body.trim_start();

        if let Some(rest) = strip_prefix_ignore_case(trimmed, "thinking:") {
            self.push_reasoning(rest.trim());
            return;
        }
        let inner = self.nested(&body);
        self.out.push_str(&format!("<blockquote>\n{inner}</blockquote>\n"));
    }

    fn paragraph(&mut self) {
        let mut lines = vec![self.lines[self.pos].trim()];
        self.pos += 1;
        while self.pos < self.lines.len() {
            let line = self.lines[self.pos];
            if line.trim().is_empty() || starts_block(line) || parse_list_item(line).is_some() {
                break;
            }
            if line.contains('|')
                && self
                    .lines
                    .get(self.pos + 1)
                    .is_some_and(|n| is_table_separator(n))
            {
                break;
            }
            lines.push(line.trim());
            self.pos += 1;
        }
        let rendered: Vec<String> = lines.iter().map(|l| render_inline(l)).collect();
        self.out.push_str(&format!("<p>{}</p>\n", rendered.join("<br>\n")));
    }
}

fn indent_of(line: &str) -> usize {
    line.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

fn strip_indent(line: &str, indent: usize) -> &str {
    let mut removed = 0;
    let mut offset = 0;
    for (idx, ch) in line.char_indices() {
        if removed >= indent || !(ch == ' ' || ch == '\t') {
            offset = idx;
            break;
        }
        removed += if ch == '\t' { 4 } else { 1 };
        offset = idx + ch.len_utf8();
    }
    &line[offset..]
}

fn strip_quote(line: &str) -> &str {
    let trimmed = line.trim_start();
    let rest = trimmed.strip_prefix('>').unwrap_or(trimmed);
    rest.strip_prefix(' ').unwrap_or(rest)
}

fn strip_prefix_ignore_case<'s>(text: &'s str, prefix: &str) -> Option<&'s str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &text[prefix.len()..])
}

fn parse_list_item(line: &str) -> Option<ListItem<'_>> {
    let caps = LIST_ITEM_RE.captures(line)?;
    let indent = indent_of(caps.get(1)?.as_str());
    let marker = caps.get(2)?.as_str();
    let text = caps.get(3)?.as_str();
    let ordered = marker.as_bytes().first().is_some_and(u8::is_ascii_digit);
    let start = if ordered {
        marker[..marker.len() - 1].parse().unwrap_or(1)
    } else {
        1
    };
    Some(ListItem {
        indent,
        ordered,
        start,
        text,
    })
}

fn is_rule(line: &str) -> bool {
    let compact: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() >= 3
        && indent_of(line) < 4
        && matches!(compact[0], '-' | '*' | '_')
        && compact.iter().all(|c| *c == compact[0])
}

/// Lines that open a block other than a paragraph or list item.
fn starts_block(line: &str) -> bool {
    COLLAPSIBLE_RE.is_match(line)
        || THOUGHT_OPEN_RE.is_match(line)
        || fence_open(line).is_some()
        || is_rule(line)
        || HEADING_RE.is_match(line)
        || QUOTE_RE.is_match(line)
}

fn is_table_separator(line: &str) -> bool {
    line.contains('|') && line.contains('-') && TABLE_SEPARATOR_RE.is_match(line)
}

fn split_row(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let trimmed = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let trimmed = if trimmed.ends_with('|') && !trimmed.ends_with("\\|") {
        &trimmed[..trimmed.len() - 1]
    } else {
        trimmed
    };

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = trimmed.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(ch),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

fn parse_align(cell: &str) -> Align {
    let cell = cell.trim();
    match (cell.starts_with(':'), cell.ends_with(':')) {
        (true, true) => Align::Center,
        (false, true) => Align::Right,
        (true, false) => Align::Left,
        (false, false) => Align::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_row_handles_escaped_pipes() {
        assert_eq!(split_row("| a | b\\|c |"), vec!["a", "b|c"]);
        assert_eq!(split_row("a|b"), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_align() {
        assert_eq!(parse_align(":---"), Align::Left);
        assert_eq!(parse_align("---:"), Align::Right);
        assert_eq!(parse_align(":--:"), Align::Center);
        assert_eq!(parse_align("---"), Align::None);
    }

    #[test]
    fn test_is_rule() {
        assert!(is_rule("---"));
        assert!(is_rule(" * * *"));
        assert!(!is_rule("--"));
        assert!(!is_rule("-- x"));
    }

    #[test]
    fn test_list_item_parsing() {
        let item = parse_list_item("  3. third").unwrap();
        assert_eq!(item.indent, 2);
        assert!(item.ordered);
        assert_eq!(item.start, 3);
        assert_eq!(item.text, "third");
        assert!(parse_list_item("**bold** text").is_none());
    }
}
