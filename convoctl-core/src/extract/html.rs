/*!
 * HTML snapshot extraction.
 *
 * A flat tokenizer feeds a balanced-element scanner. Turn containers are
 * recognized by per-platform markers, and each container's inner HTML is
 * rewritten into the markdown dialect by [`MarkdownWriter`].
 */

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use super::Platform;
use crate::conversation::{Conversation, Message, MessageRole, Metadata};
use crate::error::{ConvoError, Result};

static STRIP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>|<noscript\b[^>]*>.*?</noscript\s*>|<template\b[^>]*>.*?</template\s*>",
    )
    .expect("strip regex")
});

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)<!--.*?-->|<![^>]*>|<(/?)([A-Za-z][A-Za-z0-9:_-]*)((?:[^>"']|"[^"]*"|'[^']*')*)>"#,
    )
    .expect("token regex")
});

static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
        .expect("attribute regex")
});

static ENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[A-Za-z][A-Za-z0-9]{1,31});")
        .expect("entity regex")
});

static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

static BLANK_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("blank run regex"));

static TITLE_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*(?:[-|–—]\s*)?(?:chatgpt|claude|google ai studio|google gemini|gemini)\s*$")
        .expect("title suffix regex")
});

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const SKIPPED_ELEMENTS: &[&str] = &["button", "svg", "mat-icon", "head", "select", "textarea"];

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    Close {
        name: String,
    },
    Text(String),
}

impl Token {
    fn attr(&self, key: &str) -> Option<&str> {
        match self {
            Token::Open { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    fn is_open(&self, tag: &str) -> bool {
        matches!(self, Token::Open { name, .. } if name == tag)
    }

    fn open_name(&self) -> Option<&str> {
        match self {
            Token::Open { name, .. } => Some(name),
            _ => None,
        }
    }

    fn has_class(&self, needle: &str) -> bool {
        self.attr("class").is_some_and(|c| c.contains(needle))
    }
}

fn tokenize(html: &str) -> Vec<Token> {
    let cleaned = STRIP_RE.replace_all(html, "");
    let mut tokens = Vec::new();
    let mut last = 0usize;

    for caps in TOKEN_RE.captures_iter(&cleaned) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > last {
            tokens.push(Token::Text(cleaned[last..whole.start()].to_string()));
        }
        last = whole.end();

        // Comments and doctypes carry no tag name.
        let Some(name) = caps.get(2) else { continue };
        let name = name.as_str().to_ascii_lowercase();
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        if closing {
            tokens.push(Token::Close { name });
            continue;
        }

        let rest = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
        let self_closing = rest.trim_end().ends_with('/') || VOID_ELEMENTS.contains(&name.as_str());
        tokens.push(Token::Open {
            attrs: parse_attrs(rest),
            name,
            self_closing,
        });
    }

    if last < cleaned.len() {
        tokens.push(Token::Text(cleaned[last..].to_string()));
    }
    tokens
}

fn parse_attrs(raw: &str) -> Vec<(String, String)> {
    ATTR_RE
        .captures_iter(raw)
        .filter_map(|caps| {
            let key = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| decode_entities(m.as_str()))
                .unwrap_or_default();
            Some((key, value))
        })
        .collect()
}

/// Locate the end of the element opened at `open`.
///
/// Returns `(inner_end, outer_end)`: the element's children are
/// `open + 1..inner_end`, and scanning resumes at `outer_end`. An
/// unterminated element runs to the end of the token stream.
fn element_end(tokens: &[Token], open: usize) -> (usize, usize) {
    let (name, self_closing) = match tokens.get(open) {
        Some(Token::Open {
            name, self_closing, ..
        }) => (name, *self_closing),
        _ => return (open + 1, open + 1),
    };
    if self_closing {
        return (open + 1, open + 1);
    }

    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match token {
            Token::Open {
                name: n,
                self_closing: false,
                ..
            } if n == name => depth += 1,
            Token::Close { name: n } if n == name => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return (i, i + 1);
                }
            }
            _ => {}
        }
    }
    (tokens.len(), tokens.len())
}

pub fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    ENTITY_RE
        .replace_all(input, |caps: &regex::Captures| {
            let body = &caps[1];
            let decoded = if let Some(num) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                u32::from_str_radix(num, 16).ok().and_then(char::from_u32)
            } else if let Some(num) = body.strip_prefix('#') {
                num.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(body)
            };
            match decoded {
                Some(ch) => ch.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    let ch = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "ndash" => '–',
        "mdash" => '—',
        "hellip" => '…',
        "lsquo" => '‘',
        "rsquo" => '’',
        "ldquo" => '“',
        "rdquo" => '”',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "times" => '×',
        "middot" => '·',
        "bull" => '•',
        "rarr" => '→',
        "larr" => '←',
        _ => return None,
    };
    Some(ch)
}

/// Guess the platform from container markers present in `raw`.
pub fn detect_platform(raw: &str) -> Option<Platform> {
    if raw.contains("data-message-author-role") {
        Some(Platform::ChatGpt)
    } else if raw.contains("font-claude-") || raw.contains("data-testid=\"user-message\"") {
        Some(Platform::Claude)
    } else if raw.contains("<user-query") || raw.contains("<model-response") {
        Some(Platform::Gemini)
    } else if raw.contains("<ms-chat-turn") {
        Some(Platform::AiStudio)
    } else {
        None
    }
}

enum TurnKind {
    Role(MessageRole),
    /// A container whose role has to be inferred from its contents.
    Ambiguous,
}

fn classify(tokens: &[Token], index: usize, platform: Platform) -> Option<TurnKind> {
    let token = &tokens[index];
    let candidates: &[Platform] = match platform {
        Platform::Generic => &[
            Platform::ChatGpt,
            Platform::Claude,
            Platform::Gemini,
            Platform::AiStudio,
        ],
        Platform::ChatGpt => &[Platform::ChatGpt],
        Platform::Claude => &[Platform::Claude],
        Platform::Gemini => &[Platform::Gemini],
        Platform::AiStudio => &[Platform::AiStudio],
    };

    candidates.iter().find_map(|p| match p {
        Platform::ChatGpt => token
            .attr("data-message-author-role")
            .and_then(|role| match role {
                "user" => Some(TurnKind::Role(MessageRole::Prompt)),
                "assistant" => Some(TurnKind::Role(MessageRole::Response)),
                _ => None,
            }),
        Platform::Claude => {
            if token.attr("data-testid") == Some("user-message") {
                Some(TurnKind::Role(MessageRole::Prompt))
            } else if token.has_class("font-claude-response") || token.has_class("font-claude-message") {
                Some(TurnKind::Role(MessageRole::Response))
            } else {
                None
            }
        }
        Platform::Gemini => match token.open_name() {
            Some("user-query") => Some(TurnKind::Role(MessageRole::Prompt)),
            Some("model-response") => Some(TurnKind::Role(MessageRole::Response)),
            _ => None,
        },
        Platform::AiStudio => {
            if !token.is_open("ms-chat-turn") {
                return None;
            }
            let role = token.attr("data-turn-role").or_else(|| {
                let (inner_end, _) = element_end(tokens, index);
                tokens[index + 1..inner_end]
                    .iter()
                    .find_map(|t| t.attr("data-turn-role"))
            });
            Some(match role.map(str::to_ascii_lowercase).as_deref() {
                Some("user") => TurnKind::Role(MessageRole::Prompt),
                Some("model") => TurnKind::Role(MessageRole::Response),
                _ => TurnKind::Ambiguous,
            })
        }
        Platform::Generic => None,
    })
}

fn is_reasoning_wrapper(token: &Token, platform: Platform) -> bool {
    let Some(name) = token.open_name() else {
        return false;
    };
    let claude = || {
        name == "thinking"
            || token.has_class("thinking")
            || token.attr("data-testid").is_some_and(|t| t.contains("thinking"))
    };
    match platform {
        Platform::ChatGpt => false,
        Platform::Claude => claude(),
        Platform::Gemini => name == "model-thoughts",
        Platform::AiStudio => name == "ms-thought-chunk",
        Platform::Generic => name == "model-thoughts" || name == "ms-thought-chunk" || claude(),
    }
}

/// Split a turn's children into (content tokens, reasoning wrapper bodies).
fn partition_reasoning(children: &[Token], platform: Platform) -> (Vec<Token>, Vec<Vec<Token>>) {
    let mut content = Vec::with_capacity(children.len());
    let mut wrappers = Vec::new();
    let mut i = 0;
    while i < children.len() {
        if is_reasoning_wrapper(&children[i], platform) {
            let (inner_end, outer_end) = element_end(children, i);
            wrappers.push(children[i + 1..inner_end].to_vec());
            i = outer_end;
            continue;
        }
        content.push(children[i].clone());
        i += 1;
    }
    (content, wrappers)
}

fn read_title(tokens: &[Token]) -> Option<String> {
    let start = tokens.iter().position(|t| t.is_open("title"))?;
    let (inner_end, _) = element_end(tokens, start);
    let text: String = tokens[start + 1..inner_end]
        .iter()
        .filter_map(|t| match t {
            Token::Text(s) => Some(decode_entities(s)),
            _ => None,
        })
        .collect();
    let collapsed = WS_RE.replace_all(text.trim(), " ");
    let stripped = TITLE_SUFFIX_RE.replace(&collapsed, "");
    let title = stripped.trim();
    (!title.is_empty()).then(|| title.to_string())
}

fn read_source_url(tokens: &[Token]) -> Option<String> {
    tokens.iter().find_map(|t| {
        if t.is_open("link") && t.attr("rel") == Some("canonical") {
            t.attr("href").map(str::to_string)
        } else if t.is_open("meta") && t.attr("property") == Some("og:url") {
            t.attr("content").map(str::to_string)
        } else {
            None
        }
    })
}

pub fn parse(raw: &str, platform: Platform) -> Result<Conversation> {
    let tokens = tokenize(raw);
    let mut metadata = Metadata::default();
    if let Some(title) = read_title(&tokens) {
        metadata.title = title;
    }
    metadata.source_url = read_source_url(&tokens);

    let mut messages = Vec::new();
    let mut found_marker = false;
    let mut last_role: Option<MessageRole> = None;
    let mut i = 0;

    while i < tokens.len() {
        if !matches!(tokens[i], Token::Open { .. }) {
            i += 1;
            continue;
        }
        let Some(kind) = classify(&tokens, i, platform) else {
            i += 1;
            continue;
        };
        found_marker = true;
        let (inner_end, outer_end) = element_end(&tokens, i);

        let children = &tokens[i + 1..inner_end];
        let (content_tokens, wrappers) = partition_reasoning(children, platform);
        let role = match kind {
            TurnKind::Role(role) => role,
            TurnKind::Ambiguous if !wrappers.is_empty() => MessageRole::Response,
            TurnKind::Ambiguous => match last_role {
                Some(MessageRole::Prompt) => MessageRole::Response,
                _ => MessageRole::Prompt,
            },
        };

        if role == MessageRole::Response && metadata.has_default_model() {
            if let Some(slug) = tokens[i].attr("data-message-model-slug").filter(|s| !s.is_empty()) {
                metadata.model = slug.to_string();
            }
        }

        let message = match role {
            MessageRole::Response => {
                let reasoning = wrappers
                    .iter()
                    .map(|w| to_markdown(w))
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                Message::response(to_markdown(&content_tokens)).with_reasoning(reasoning)
            }
            // Prompt containers are converted whole.
            MessageRole::Prompt => Message::prompt(to_markdown(children)),
        };

        if message.content.is_empty() && message.reasoning.is_none() {
            debug!(role = role.as_str(), "skipping empty html turn");
        } else {
            last_role = Some(role);
            messages.push(message);
        }
        i = outer_end;
    }

    if !found_marker {
        return Err(ConvoError::parse(
            "html",
            format!("no chat turn containers found for platform '{platform}'"),
        ));
    }
    if messages.is_empty() {
        warn!(platform = %platform, "html capture had turn containers but no content");
    }

    debug!(platform = %platform, messages = messages.len(), title = %metadata.title, "parsed html capture");
    Ok(Conversation::new(metadata, messages))
}

/// Convert a run of HTML into the markdown dialect.
pub fn html_to_markdown(html: &str) -> String {
    to_markdown(&tokenize(html))
}

fn to_markdown(tokens: &[Token]) -> String {
    let mut writer = MarkdownWriter::default();
    writer.run(tokens);
    writer.finish()
}

struct ListFrame {
    ordered: bool,
    next: u64,
}

struct PreBlock {
    language: String,
    buf: String,
    saw_code: bool,
    in_code: bool,
}

impl PreBlock {
    fn accepting(&self) -> bool {
        !self.saw_code || self.in_code
    }
}

#[derive(Default)]
struct TableState {
    rows: Vec<Vec<String>>,
    row: Option<Vec<String>>,
    cell: Option<String>,
}

#[derive(Default)]
struct MarkdownWriter {
    out: String,
    lists: Vec<ListFrame>,
    quote: usize,
    pre: Option<PreBlock>,
    code: Option<String>,
    links: Vec<Option<String>>,
    table: Option<TableState>,
    li_fresh: bool,
}

impl MarkdownWriter {
    fn run(&mut self, tokens: &[Token]) {
        let mut i = 0;
        while i < tokens.len() {
            match &tokens[i] {
                Token::Text(text) => self.text(text),
                Token::Open { name, .. } => {
                    let token = &tokens[i];
                    if SKIPPED_ELEMENTS.contains(&name.as_str()) || token.has_class("sr-only") {
                        i = element_end(tokens, i).1;
                        continue;
                    }
                    if self.pre.is_none() && token.has_class("whitespace-pre-wrap") {
                        let (inner_end, outer_end) = element_end(tokens, i);
                        self.preformatted_text(&tokens[i + 1..inner_end]);
                        i = outer_end;
                        continue;
                    }
                    self.open(token);
                }
                Token::Close { name } => self.close(name),
            }
            i += 1;
        }
    }

    fn finish(mut self) -> String {
        if let Some(pre) = self.pre.take() {
            self.emit_fence(pre);
        }
        if let Some(code) = self.code.take() {
            self.raw(&code);
        }
        let trimmed: Vec<&str> = self.out.lines().map(str::trim_end).collect();
        let joined = trimmed.join("\n");
        BLANK_RUN_RE.replace_all(&joined, "\n\n").trim().to_string()
    }

    fn at_line_start(&self) -> bool {
        self.out.is_empty() || self.out.ends_with('\n')
    }

    fn quote_prefix(&self) -> String {
        "> ".repeat(self.quote)
    }

    fn line_prefix(&self) -> String {
        let mut prefix = self.quote_prefix();
        prefix.push_str(&"  ".repeat(self.lists.len()));
        prefix
    }

    fn raw(&mut self, s: &str) {
        if let Some(code) = self.code.as_mut() {
            code.push_str(s);
            return;
        }
        if let Some(pre) = self.pre.as_mut() {
            if pre.accepting() {
                pre.buf.push_str(s);
            }
            return;
        }
        if let Some(cell) = self.table.as_mut().and_then(|t| t.cell.as_mut()) {
            cell.push_str(s);
            return;
        }
        if s.is_empty() {
            return;
        }
        if self.at_line_start() {
            let prefix = self.line_prefix();
            self.out.push_str(&prefix);
        }
        self.out.push_str(s);
        self.li_fresh = false;
    }

    /// Inline formatting marker; dropped inside code.
    fn mark(&mut self, s: &str) {
        if self.pre.is_none() && self.code.is_none() {
            self.raw(s);
        }
    }

    fn at_word_boundary(&self) -> bool {
        if let Some(cell) = self.table.as_ref().and_then(|t| t.cell.as_ref()) {
            return cell.is_empty() || cell.ends_with(' ');
        }
        self.at_line_start() || self.out.ends_with(' ')
    }

    fn text(&mut self, raw_text: &str) {
        let decoded = decode_entities(raw_text);
        if self.pre.is_some() || self.code.is_some() {
            self.raw(&decoded);
            return;
        }
        let collapsed = WS_RE.replace_all(&decoded, " ");
        let text = if self.at_word_boundary() {
            collapsed.trim_start()
        } else {
            &collapsed
        };
        if !text.is_empty() {
            self.raw(text);
        }
    }

    fn preformatted_text(&mut self, tokens: &[Token]) {
        let text: String = tokens
            .iter()
            .filter_map(|t| match t {
                Token::Text(s) => Some(decode_entities(s)),
                Token::Open { name, .. } if name == "br" => Some("\n".to_string()),
                _ => None,
            })
            .collect();
        self.blank_line();
        for line in text.trim().lines() {
            if line.trim().is_empty() {
                self.blank_line();
            } else {
                self.newline();
                self.raw(line.trim_end());
            }
        }
        self.blank_line();
    }

    fn newline(&mut self) {
        if let Some(pre) = self.pre.as_mut() {
            if pre.accepting() {
                pre.buf.push('\n');
            }
            return;
        }
        if let Some(cell) = self.table.as_mut().and_then(|t| t.cell.as_mut()) {
            if !cell.is_empty() && !cell.ends_with(' ') {
                cell.push(' ');
            }
            return;
        }
        if !self.at_line_start() {
            let trimmed = self.out.trim_end_matches(' ').len();
            self.out.truncate(trimmed);
            self.out.push('\n');
        }
    }

    fn blank_line(&mut self) {
        if self.pre.is_some() || self.table.as_ref().is_some_and(|t| t.cell.is_some()) {
            self.newline();
            return;
        }
        self.newline();
        if self.out.is_empty() || self.out.ends_with("\n\n") || !self.lists.is_empty() {
            return;
        }
        if self.quote > 0 {
            let marker = ">".repeat(self.quote);
            if self.out.trim_end().ends_with(&marker) {
                return;
            }
            self.out.push_str(&marker);
        }
        self.out.push('\n');
    }

    /// Remove a trailing `>`-only line left by a block closing inside a quote.
    fn drop_trailing_quote_marker(&mut self) {
        let body = self.out.trim_end_matches('\n');
        let line_start = body.rfind('\n').map_or(0, |pos| pos + 1);
        let last = &body[line_start..];
        if !last.is_empty() && last.chars().all(|c| c == '>' || c == ' ') {
            self.out.truncate(line_start);
        }
    }

    fn emit_lines<'a>(&mut self, lines: impl IntoIterator<Item = &'a str>) {
        self.newline();
        let prefix = self.line_prefix();
        for line in lines {
            self.out.push_str(&prefix);
            self.out.push_str(line);
            self.out.push('\n');
        }
        self.li_fresh = false;
    }

    fn emit_fence(&mut self, pre: PreBlock) {
        let body = pre.buf.trim_matches('\n');
        let fence = "`".repeat(longest_run(body, '`').max(2) + 1);
        let opener = format!("{fence}{}", pre.language);
        let lines = std::iter::once(opener.as_str())
            .chain(body.lines())
            .chain(std::iter::once(fence.as_str()));
        let owned: Vec<String> = lines.map(str::to_string).collect();
        self.emit_lines(owned.iter().map(String::as_str));
        self.blank_line();
    }

    fn open(&mut self, token: &Token) {
        let Token::Open { name, .. } = token else {
            return;
        };

        if let Some(pre) = self.pre.as_mut() {
            match name.as_str() {
                "code" => {
                    if !pre.saw_code {
                        pre.buf.clear();
                        pre.saw_code = true;
                    }
                    pre.in_code = true;
                    if pre.language.is_empty() {
                        pre.language = language_from_class(token.attr("class"));
                    }
                }
                "br" => self.newline(),
                _ => {}
            }
            return;
        }

        match name.as_str() {
            "p" | "div" | "section" | "article" | "header" | "footer" | "main" => {
                if self.lists.is_empty() {
                    if name == "p" {
                        self.blank_line();
                    } else {
                        self.newline();
                    }
                } else if !self.li_fresh {
                    self.newline();
                }
            }
            "br" => self.newline(),
            "hr" => {
                self.blank_line();
                self.raw("---");
                self.blank_line();
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<usize>().unwrap_or(1);
                self.blank_line();
                self.raw(&format!("{} ", "#".repeat(level)));
            }
            "strong" | "b" => self.mark("**"),
            "em" | "i" => self.mark("*"),
            "del" | "s" | "strike" => self.mark("~~"),
            "code" => self.code = Some(String::new()),
            "pre" => {
                self.blank_line();
                self.pre = Some(PreBlock {
                    language: language_from_class(token.attr("class")),
                    buf: String::new(),
                    saw_code: false,
                    in_code: false,
                });
            }
            "a" => {
                let href = token
                    .attr("href")
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(|h| h.replace(' ', "%20").replace(')', "%29"));
                if href.is_some() {
                    self.mark("[");
                }
                self.links.push(href);
            }
            "img" => {
                let alt = token.attr("alt").unwrap_or_default().replace(['[', ']'], "");
                match token.attr("src").map(str::trim).filter(|s| !s.is_empty()) {
                    Some(src) => {
                        let src = src.replace(' ', "%20").replace(')', "%29");
                        self.raw(&format!("![{alt}]({src})"));
                    }
                    None => self.text(&alt),
                }
            }
            "blockquote" => {
                self.blank_line();
                self.quote += 1;
            }
            "ul" | "ol" => {
                if self.lists.is_empty() {
                    self.blank_line();
                } else {
                    self.newline();
                }
                let start = token
                    .attr("start")
                    .and_then(|s| s.trim().parse::<u64>().ok())
                    .unwrap_or(1);
                self.lists.push(ListFrame {
                    ordered: name == "ol",
                    next: start,
                });
            }
            "li" => {
                self.newline();
                let depth = self.lists.len().max(1);
                let marker = match self.lists.last_mut() {
                    Some(frame) if frame.ordered => {
                        let marker = format!("{}. ", frame.next);
                        frame.next += 1;
                        marker
                    }
                    _ => "- ".to_string(),
                };
                let prefix = format!("{}{}", self.quote_prefix(), "  ".repeat(depth - 1));
                self.out.push_str(&prefix);
                self.out.push_str(&marker);
                self.li_fresh = true;
            }
            "table" => {
                if self.table.is_none() {
                    self.blank_line();
                    self.table = Some(TableState::default());
                }
            }
            "tr" => {
                if let Some(table) = self.table.as_mut() {
                    table.row = Some(Vec::new());
                }
            }
            "td" | "th" => {
                if let Some(table) = self.table.as_mut() {
                    table.cell = Some(String::new());
                }
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &str) {
        if let Some(pre) = self.pre.as_mut() {
            match name {
                "code" => pre.in_code = false,
                "pre" => {
                    if let Some(pre) = self.pre.take() {
                        self.emit_fence(pre);
                    }
                }
                _ => {}
            }
            return;
        }

        match name {
            "p" => {
                if self.lists.is_empty() {
                    self.blank_line();
                }
            }
            "div" | "section" | "article" | "header" | "footer" | "main" => {
                if self.lists.is_empty() {
                    self.newline();
                }
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => self.blank_line(),
            "strong" | "b" => self.mark("**"),
            "em" | "i" => self.mark("*"),
            "del" | "s" | "strike" => self.mark("~~"),
            "code" => {
                if let Some(code) = self.code.take() {
                    let code = code.replace('\n', " ");
                    let ticks = "`".repeat(longest_run(&code, '`') + 1);
                    let pad = if code.starts_with('`') || code.ends_with('`') { " " } else { "" };
                    self.raw(&format!("{ticks}{pad}{code}{pad}{ticks}"));
                }
            }
            "a" => {
                if let Some(Some(href)) = self.links.pop() {
                    self.mark(&format!("]({href})"));
                }
            }
            "blockquote" => {
                self.newline();
                self.drop_trailing_quote_marker();
                self.quote = self.quote.saturating_sub(1);
                self.blank_line();
            }
            "ul" | "ol" => {
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank_line();
                } else {
                    self.newline();
                }
            }
            "td" | "th" => {
                if let Some(table) = self.table.as_mut() {
                    if let Some(cell) = table.cell.take() {
                        let cell = cell.trim().replace('|', "\\|");
                        table.row.get_or_insert_with(Vec::new).push(cell);
                    }
                }
            }
            "tr" => {
                if let Some(table) = self.table.as_mut() {
                    if let Some(row) = table.row.take() {
                        if !row.is_empty() {
                            table.rows.push(row);
                        }
                    }
                }
            }
            "table" => {
                if let Some(table) = self.table.take() {
                    self.emit_table(table);
                }
            }
            _ => {}
        }
    }

    fn emit_table(&mut self, table: TableState) {
        let columns = table.rows.iter().map(Vec::len).max().unwrap_or(0);
        if columns == 0 {
            return;
        }
        let render_row = |row: &[String]| {
            let mut cells: Vec<&str> = row.iter().map(String::as_str).collect();
            cells.resize(columns, "");
            format!("| {} |", cells.join(" | "))
        };

        let mut lines = Vec::with_capacity(table.rows.len() + 1);
        for (idx, row) in table.rows.iter().enumerate() {
            lines.push(render_row(row));
            if idx == 0 {
                lines.push(format!("|{}", " --- |".repeat(columns)));
            }
        }
        self.emit_lines(lines.iter().map(String::as_str));
        self.blank_line();
    }
}

fn language_from_class(class: Option<&str>) -> String {
    class
        .into_iter()
        .flat_map(str::split_whitespace)
        .find_map(|c| c.strip_prefix("language-").or_else(|| c.strip_prefix("lang-")))
        .unwrap_or_default()
        .to_string()
}

fn longest_run(text: &str, ch: char) -> usize {
    let mut best = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == ch {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_chatgpt_capture() {
        let raw = r#"<html><head><title>Borrowing - ChatGPT</title><script>var x = "<div data-message-author-role='user'>";</script></head>
<body>
<div data-message-author-role="user"><div class="whitespace-pre-wrap">Why &amp; how?
second line</div></div>
<div data-message-author-role="assistant" data-message-model-slug="gpt-4o">
  <div class="markdown"><p>Because <strong>ownership</strong>.</p>
  <pre><div>rust<button>Copy code</button></div><code class="language-rust">let x = &amp;y;
</code></pre></div>
</div>
</body></html>"#;
        let conv = parse(raw, Platform::ChatGpt).unwrap();
        assert_eq!(conv.metadata.title, "Borrowing");
        assert_eq!(conv.metadata.model, "gpt-4o");
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.messages[0], Message::prompt("Why & how?\nsecond line"));
        assert_eq!(
            conv.messages[1].content,
            "Because **ownership**.\n\n```rust\nlet x = &y;\n```"
        );
    }

    #[test]
    fn test_claude_thinking_wrapper() {
        let raw = r#"<div data-testid="user-message"><p>Hi</p></div>
<div class="font-claude-response"><div class="thinking-block"><p>pondering</p></div><p>Hello</p></div>"#;
        let conv = parse(raw, Platform::Claude).unwrap();
        assert_eq!(conv.messages[1].content, "Hello");
        assert_eq!(conv.messages[1].reasoning.as_deref(), Some("pondering"));
    }

    #[test]
    fn test_gemini_and_generic_detection() {
        let raw = "<user-query><p>Q</p></user-query><model-response><model-thoughts><p>T</p></model-thoughts><message-content><p>A</p></message-content></model-response>";
        assert_eq!(detect_platform(raw), Some(Platform::Gemini));
        let conv = parse(raw, Platform::Generic).unwrap();
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.messages[1].reasoning.as_deref(), Some("T"));
        assert!(conv.metadata.has_default_title());
    }

    #[test]
    fn test_aistudio_ambiguous_turn_uses_reasoning_heuristic() {
        let raw = "<ms-chat-turn><p>Question</p></ms-chat-turn><ms-chat-turn><ms-thought-chunk>mull</ms-thought-chunk><p>Answer</p></ms-chat-turn>";
        let conv = parse(raw, Platform::AiStudio).unwrap();
        assert_eq!(conv.messages[0].role, MessageRole::Prompt);
        assert_eq!(conv.messages[1].role, MessageRole::Response);
        assert_eq!(conv.messages[1].reasoning.as_deref(), Some("mull"));
    }

    #[test]
    fn test_no_markers_is_parse_error() {
        let err = parse("<html><body><p>nothing here</p></body></html>", Platform::Generic)
            .unwrap_err();
        assert!(matches!(err, ConvoError::Parse { .. }));
    }

    #[test]
    fn test_html_to_markdown_blocks() {
        let md = html_to_markdown(
            "<h2>Title</h2><ul><li>one<ul><li>nested</li></ul></li><li>two</li></ul><ol start=\"3\"><li>three</li></ol><blockquote><p>quoted</p></blockquote><p>see <a href=\"https://x.y\">link</a> and <code>a|b</code></p>",
        );
        assert_eq!(
            md,
            "## Title\n\n- one\n  - nested\n- two\n\n3. three\n\n> quoted\n\nsee [link](https://x.y) and `a|b`"
        );
    }

    #[test]
    fn test_html_table_to_pipe_table() {
        let md = html_to_markdown(
            "<table><thead><tr><th>A</th><th>B</th></tr></thead><tbody><tr><td>1</td><td>x|y</td></tr></tbody></table>",
        );
        assert_eq!(md, "| A | B |\n| --- | --- |\n| 1 | x\\|y |");
    }

    #[test]
    fn test_entities_decoded() {
        assert_eq!(decode_entities("&lt;b&gt; &#39;q&#x27; &bogus;"), "<b> 'q' &bogus;");
    }
}
