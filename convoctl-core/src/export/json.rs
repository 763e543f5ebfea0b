use std::io::Write;

use serde::Serialize;

use crate::artifacts::ArtifactTable;
use crate::conversation::{Conversation, Message};
use crate::error::{ConvoError, Result};
use crate::{TOOL_NAME, TOOL_TAGLINE};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a> {
    exported_by: ExportedBy,
    conversation_id: &'a str,
    metadata: EnvelopeMetadata<'a>,
    messages: Vec<EnvelopeMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifacts: Option<&'a ArtifactTable>,
}

#[derive(Debug, Serialize)]
struct ExportedBy {
    tool: &'static str,
    tagline: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeMetadata<'a> {
    title: &'a str,
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    tags: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    author: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_url: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    content: &'a str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    is_edited: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning: Option<&'a str>,
}

impl<'a> From<&'a Message> for EnvelopeMessage<'a> {
    fn from(message: &'a Message) -> Self {
        Self {
            kind: message.role.as_str(),
            content: &message.content,
            is_edited: message.edited,
            reasoning: message.reasoning.as_deref(),
        }
    }
}

impl<'a> Envelope<'a> {
    fn new(conversation: &'a Conversation) -> Self {
        let metadata = &conversation.metadata;
        Self {
            exported_by: ExportedBy {
                tool: TOOL_NAME,
                tagline: TOOL_TAGLINE,
            },
            conversation_id: &conversation.id,
            metadata: EnvelopeMetadata {
                title: &metadata.title,
                model: &metadata.model,
                date: metadata.created_at.map(|d| d.to_rfc3339()),
                tags: metadata.tags.iter().map(String::as_str).collect(),
                author: metadata.author.as_deref(),
                source_url: metadata.source_url.as_deref(),
            },
            messages: conversation.messages.iter().map(EnvelopeMessage::from).collect(),
            artifacts: (!conversation.artifacts.is_empty()).then_some(&conversation.artifacts),
        }
    }
}

/// Write the export envelope, pretty-printed when `pretty` is set, followed
/// by a trailing newline.
pub fn write_json<W: Write>(conversation: &Conversation, pretty: bool, out: &mut W) -> Result<()> {
    let envelope = Envelope::new(conversation);
    let written = if pretty {
        serde_json::to_writer_pretty(&mut *out, &envelope)
    } else {
        serde_json::to_writer(&mut *out, &envelope)
    };
    written.map_err(|err| ConvoError::json("export envelope", err))?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

pub fn to_json(conversation: &Conversation, pretty: bool) -> Result<String> {
    let mut buf = Vec::new();
    write_json(conversation, pretty, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
