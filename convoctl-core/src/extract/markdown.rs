/*!
 * Markdown transcript dialect.
 *
 * Turns are introduced by headings such as `## Prompt:` / `## Response:`
 * (or `User:` / `Assistant:`), or the exporter form `## Prompt - You`.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::reasoning::{closes_fence, fence_open, split_reasoning};
use super::parse_timestamp;
use crate::conversation::{Conversation, Message, MessageRole, Metadata};
use crate::error::{ConvoError, Result};
use crate::tags::TagSet;

static TURN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^ {0,3}#{1,3}[ \t]+(prompt|response|user|assistant)[ \t]*(?:(:)[ \t]*(.*?)|[-–—][ \t]*(.*?))?[ \t]*$",
    )
    .expect("turn marker regex")
});

static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[ \t]+(.+?)[ \t#]*$").expect("title regex"));

static META_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\*\*(model|date|created|tags|source|author):\*\*[ \t]*(.*?)[ \t]*$")
        .expect("metadata regex")
});

static FOOTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\n[ \t]*-{3,}[ \t]*\n+[ \t]*\*Exported (?:with|by) convoctl[^\n]*\*[ \t]*\s*\z")
        .expect("footer regex")
});

struct Turn {
    role: MessageRole,
    lines: Vec<String>,
}

pub fn parse(raw: &str) -> Result<Conversation> {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    let body = FOOTER_RE.replace(&normalized, "\n");

    let mut metadata = Metadata::default();
    let mut turns: Vec<Turn> = Vec::new();
    let mut fence: Option<(char, usize)> = None;
    let mut saw_title = false;

    for line in body.lines() {
        if let Some((marker, len)) = fence {
            if closes_fence(line, marker, len) {
                fence = None;
            }
            push_line(&mut turns, line);
            continue;
        }

        if let Some((marker, len, _)) = fence_open(line) {
            fence = Some((marker, len));
            push_line(&mut turns, line);
            continue;
        }

        if let Some(caps) = TURN_RE.captures(line) {
            let role = caps
                .get(1)
                .and_then(|m| MessageRole::parse(m.as_str()))
                .unwrap_or(MessageRole::Prompt);
            let mut lines = Vec::new();
            // `## Prompt: inline text` starts the body on the marker line.
            if caps.get(2).is_some() {
                if let Some(rest) = caps.get(3).filter(|m| !m.as_str().is_empty()) {
                    lines.push(rest.as_str().to_string());
                }
            }
            turns.push(Turn { role, lines });
            continue;
        }

        if turns.is_empty() {
            read_preamble_line(line, &mut metadata, &mut saw_title);
        } else {
            push_line(&mut turns, line);
        }
    }

    if turns.is_empty() {
        return Err(ConvoError::parse(
            "markdown",
            "no turn markers found (expected headings like '## Prompt:' and '## Response:')",
        ));
    }

    let mut messages = Vec::with_capacity(turns.len());
    for (idx, turn) in turns.into_iter().enumerate() {
        let text = trim_trailing_rules(&turn.lines.join("\n"));
        let message = match turn.role {
            MessageRole::Response => {
                let (content, reasoning) = split_reasoning(&text);
                let mut message = Message::response(content.trim());
                message.reasoning = reasoning;
                message
            }
            MessageRole::Prompt => Message::prompt(text.trim()),
        };
        if message.content.is_empty() && message.reasoning.is_none() {
            debug!(turn = idx, "skipping empty markdown turn");
            continue;
        }
        messages.push(message);
    }

    debug!(messages = messages.len(), title = %metadata.title, "parsed markdown transcript");
    Ok(Conversation::new(metadata, messages))
}

fn push_line(turns: &mut [Turn], line: &str) {
    if let Some(turn) = turns.last_mut() {
        turn.lines.push(line.to_string());
    }
}

fn read_preamble_line(line: &str, metadata: &mut Metadata, saw_title: &mut bool) {
    if !*saw_title {
        if let Some(caps) = TITLE_RE.captures(line) {
            if let Some(title) = caps.get(1) {
                let title = title.as_str().trim();
                if !title.is_empty() {
                    metadata.title = title.to_string();
                    *saw_title = true;
                }
            }
            return;
        }
    }

    let Some(caps) = META_RE.captures(line.trim()) else {
        return;
    };
    let key = caps.get(1).map(|m| m.as_str().to_ascii_lowercase()).unwrap_or_default();
    let value = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
    if value.is_empty() {
        return;
    }

    match key.as_str() {
        "model" => metadata.model = value.to_string(),
        "date" | "created" => metadata.created_at = parse_timestamp(value),
        "tags" => metadata.tags.extend(&TagSet::from_list(value)),
        "source" => metadata.source_url = Some(value.to_string()),
        "author" => metadata.author = Some(value.to_string()),
        _ => {}
    }
}

/// Drop `---` separator lines trailing a turn body.
fn trim_trailing_rules(text: &str) -> String {
    let mut lines: Vec<&str> = text.lines().collect();
    while let Some(last) = lines.last() {
        let trimmed = last.trim();
        if trimmed.is_empty() || (trimmed.len() >= 3 && trimmed.chars().all(|c| c == '-')) {
            lines.pop();
        } else {
            break;
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_basic_dialect_with_inline_thought() {
        let conv = parse("## Prompt:\nHi\n## Response:\nHello <thought>reasoning</thought> world")
            .unwrap();
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.messages[0], Message::prompt("Hi"));
        assert_eq!(conv.messages[1].role, MessageRole::Response);
        assert_eq!(conv.messages[1].content, "Hello  world");
        assert_eq!(conv.messages[1].reasoning.as_deref(), Some("reasoning"));
        assert!(conv.metadata.has_default_title());
        assert!(conv.metadata.has_default_model());
    }

    #[test]
    fn test_missing_markers_is_parse_error() {
        let err = parse("just some notes\nwith no turns").unwrap_err();
        assert!(matches!(err, ConvoError::Parse { .. }));
    }

    #[test]
    fn test_markers_with_empty_bodies_is_empty_conversation() {
        let conv = parse("## Prompt:\n\n## Response:\n   \n").unwrap();
        assert!(conv.messages.is_empty());
    }

    #[test]
    fn test_preamble_metadata_and_export_headings() {
        let raw = "# Borrow checker\n\n**Model:** GPT-4o  \n**Date:** 2025-03-01T12:00:00Z  \n**Tags:** rust, #Lifetimes\n**Source:** https://chat.example.com/c/1\n\n## Prompt - You\n\nWhy?\n\n## Response - ChatGPT\n\n```thought\nthink\n```\n\nBecause.\n\n---\n*Exported with convoctl*\n";
        let conv = parse(raw).unwrap();
        assert_eq!(conv.metadata.title, "Borrow checker");
        assert_eq!(conv.metadata.model, "GPT-4o");
        assert!(conv.metadata.created_at.is_some());
        assert_eq!(conv.metadata.tags.to_vec(), vec!["lifetimes", "rust"]);
        assert_eq!(
            conv.metadata.source_url.as_deref(),
            Some("https://chat.example.com/c/1")
        );
        assert_eq!(conv.messages[0].content, "Why?");
        assert_eq!(conv.messages[1].content, "Because.");
        assert_eq!(conv.messages[1].reasoning.as_deref(), Some("think"));
    }

    #[test]
    fn test_markers_inside_code_fences_are_content() {
        let raw = "## User:\nshow me\n## Assistant:\n```md\n## Prompt:\nnot a turn\n```\ndone";
        let conv = parse(raw).unwrap();
        assert_eq!(conv.messages.len(), 2);
        assert!(conv.messages[1].content.contains("## Prompt:"));
    }

    #[test]
    fn test_inline_text_on_marker_line() {
        let conv = parse("## Prompt: what is 2+2?\n## Response: 4").unwrap();
        assert_eq!(conv.messages[0].content, "what is 2+2?");
        assert_eq!(conv.messages[1].content, "4");
    }
}
