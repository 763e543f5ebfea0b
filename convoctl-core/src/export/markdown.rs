use std::io::Write;

use crate::conversation::{Conversation, Message, MessageRole};
use crate::error::Result;
use crate::TOOL_NAME;

use super::ExportOptions;

/// Write `conversation` in the transcript dialect the markdown extractor reads.
pub fn write_markdown<W: Write>(
    conversation: &Conversation,
    options: &ExportOptions<'_>,
    out: &mut W,
) -> Result<()> {
    let metadata = &conversation.metadata;
    let title = metadata.title.split_whitespace().collect::<Vec<_>>().join(" ");
    writeln!(out, "# {title}\n")?;

    writeln!(out, "**Model:** {}  ", metadata.model)?;
    if let Some(created) = metadata.created_at {
        writeln!(out, "**Date:** {}  ", created.to_rfc3339())?;
    }
    if !metadata.tags.is_empty() {
        writeln!(out, "**Tags:** {}  ", metadata.tags.to_vec().join(", "))?;
    }
    if let Some(source) = metadata.source_url.as_ref() {
        writeln!(out, "**Source:** {source}  ")?;
    }
    if let Some(author) = metadata.author.as_ref() {
        writeln!(out, "**Author:** {author}  ")?;
    }
    writeln!(out)?;

    for message in &conversation.messages {
        write_message(message, options, out)?;
    }

    if options.include_footer {
        writeln!(out, "---\n*Exported with {TOOL_NAME}*")?;
    }
    Ok(())
}

pub fn to_markdown(conversation: &Conversation, options: &ExportOptions<'_>) -> Result<String> {
    let mut buf = Vec::new();
    write_markdown(conversation, options, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn write_message<W: Write>(message: &Message, options: &ExportOptions<'_>, out: &mut W) -> Result<()> {
    let label = match message.role {
        MessageRole::Prompt => options.user_label,
        MessageRole::Response => options.ai_label,
    };
    writeln!(out, "## {} - {label}\n", message.role.label())?;

    if let (MessageRole::Response, Some(reasoning)) = (message.role, message.reasoning.as_ref()) {
        write_thought_block(reasoning.trim(), out)?;
    }
    writeln!(out, "{}\n", message.content.trim())?;
    Ok(())
}

/// Emit reasoning as a `thought` fence long enough to contain any backtick
/// run in the body.
fn write_thought_block<W: Write>(reasoning: &str, out: &mut W) -> Result<()> {
    let fence = "`".repeat(longest_backtick_run(reasoning).max(2) + 1);
    writeln!(out, "{fence}thought\n{reasoning}\n{fence}\n")?;
    Ok(())
}

fn longest_backtick_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}
