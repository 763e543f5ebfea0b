//! JSON import: the export envelope or a bare array of message records.
//!
//! Records are validated one by one so a failure can name its index; any
//! malformed record rejects the whole import.

use serde_json::{Map, Value};
use tracing::debug;

use super::parse_timestamp;
use crate::artifacts::ArtifactTable;
use crate::conversation::{Conversation, Message, MessageRole, Metadata};
use crate::error::{ConvoError, Result};
use crate::tags::TagSet;

pub fn parse(raw: &str) -> Result<Conversation> {
    let root: Value = serde_json::from_str(raw.trim_start_matches('\u{feff}'))
        .map_err(|err| ConvoError::parse("json", err.to_string()))?;

    let (records, envelope) = match &root {
        Value::Array(records) => (records, None),
        Value::Object(obj) => match obj.get("messages") {
            Some(Value::Array(records)) => (records, Some(obj)),
            Some(_) => return Err(ConvoError::parse("json", "'messages' must be an array")),
            None => return Err(ConvoError::parse("json", "missing 'messages' array")),
        },
        _ => {
            return Err(ConvoError::parse(
                "json",
                "expected an export object or an array of messages",
            ))
        }
    };

    let messages = records
        .iter()
        .enumerate()
        .map(|(index, record)| parse_record(index, record))
        .collect::<Result<Vec<_>>>()?;

    let mut conversation = match envelope {
        Some(obj) => {
            let metadata = obj
                .get("metadata")
                .and_then(Value::as_object)
                .map(read_metadata)
                .unwrap_or_default();
            let mut conversation = Conversation::new(metadata, messages);
            if let Some(id) = obj.get("conversationId").and_then(Value::as_str) {
                conversation.id = id.to_string();
            }
            conversation.artifacts = read_artifacts(obj.get("artifacts"), conversation.len())?;
            conversation
        }
        None => Conversation::new(Metadata::default(), messages),
    };
    conversation.metadata.exported_at = None;

    debug!(
        messages = conversation.len(),
        artifacts = conversation.artifacts.len(),
        "parsed json import"
    );
    Ok(conversation)
}

fn parse_record(index: usize, record: &Value) -> Result<Message> {
    let obj = record
        .as_object()
        .ok_or_else(|| ConvoError::invalid_record(index, "record is not an object"))?;

    let role_tag = obj
        .get("type")
        .or_else(|| obj.get("role"))
        .and_then(Value::as_str)
        .ok_or_else(|| ConvoError::invalid_record(index, "missing 'type' role tag"))?;
    let role = MessageRole::parse(role_tag).ok_or_else(|| {
        ConvoError::invalid_record(index, format!("unrecognized role '{role_tag}'"))
    })?;

    let content = obj
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(|| ConvoError::invalid_record(index, "missing string 'content'"))?;
    let reasoning = obj
        .get("reasoning")
        .and_then(Value::as_str)
        .filter(|r| !r.trim().is_empty());
    // A response may consist of reasoning alone.
    if content.trim().is_empty() && reasoning.is_none() {
        return Err(ConvoError::invalid_record(index, "empty content"));
    }

    let mut message = Message::new(role, content);
    message.edited = obj
        .get("isEdited")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if let Some(reasoning) = reasoning {
        message = message.with_reasoning(reasoning);
    }
    Ok(message)
}

fn read_metadata(obj: &Map<String, Value>) -> Metadata {
    let text = |key: &str| {
        obj.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let mut metadata = Metadata::default();
    if let Some(title) = text("title") {
        metadata.title = title;
    }
    if let Some(model) = text("model") {
        metadata.model = model;
    }
    metadata.created_at = text("date").and_then(|d| parse_timestamp(&d));
    metadata.author = text("author");
    metadata.source_url = text("sourceUrl");

    match obj.get("tags") {
        Some(Value::Array(items)) => {
            metadata.tags = items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }
        Some(Value::String(list)) => metadata.tags = TagSet::from_list(list),
        _ => {}
    }
    metadata
}

fn read_artifacts(value: Option<&Value>, message_count: usize) -> Result<ArtifactTable> {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return Ok(ArtifactTable::default());
    };
    let table: ArtifactTable = serde_json::from_value(value.clone())
        .map_err(|err| ConvoError::json("artifacts", err))?;

    for artifact in table.iter() {
        if let Some(index) = artifact.inserted_after {
            if index >= message_count {
                return Err(ConvoError::parse(
                    "json",
                    format!(
                        "artifact '{}' links to message {index}, but only {message_count} message(s) were imported",
                        artifact.filename
                    ),
                ));
            }
        }
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bare_array() {
        let conv = parse(r#"[{"type":"prompt","content":"Hi"},{"role":"assistant","content":"Hello","reasoning":"hmm"}]"#)
            .unwrap();
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.messages[1].role, MessageRole::Response);
        assert_eq!(conv.messages[1].reasoning.as_deref(), Some("hmm"));
        assert!(conv.metadata.has_default_title());
    }

    #[test]
    fn test_envelope_metadata() {
        let raw = r##"{
            "exportedBy": {"tool": "convoctl", "tagline": "x"},
            "metadata": {"title": "Lifetimes", "model": "GPT-4o", "date": "2025-03-01T12:00:00Z",
                         "tags": ["Rust", "#cli"], "sourceUrl": "https://chat.example.com/c/1"},
            "messages": [{"type": "prompt", "content": "Why?", "isEdited": true}]
        }"##;
        let conv = parse(raw).unwrap();
        assert_eq!(conv.metadata.title, "Lifetimes");
        assert_eq!(conv.metadata.model, "GPT-4o");
        assert_eq!(conv.metadata.tags.to_vec(), vec!["cli", "rust"]);
        assert!(conv.messages[0].edited);
    }

    #[test]
    fn test_bad_record_rejects_whole_import() {
        let err = parse(r#"[{"type":"prompt","content":"ok"},{"type":"system","content":"x"}]"#)
            .unwrap_err();
        assert!(matches!(err, ConvoError::InvalidRecord { index: 1, .. }));

        let err = parse(r#"[{"type":"prompt","content":"   "}]"#).unwrap_err();
        assert!(matches!(err, ConvoError::InvalidRecord { index: 0, .. }));

        let err = parse(r#"[{"type":"response","content":"","reasoning":"  "}]"#).unwrap_err();
        assert!(matches!(err, ConvoError::InvalidRecord { index: 0, .. }));
    }

    #[test]
    fn test_reasoning_only_record_accepted() {
        let conv = parse(r#"[{"type":"response","content":"","reasoning":"thinking"}]"#).unwrap();
        assert_eq!(conv.messages[0].content, "");
        assert_eq!(conv.messages[0].reasoning.as_deref(), Some("thinking"));
    }

    #[test]
    fn test_missing_messages_is_parse_error() {
        let err = parse(r#"{"metadata": {}}"#).unwrap_err();
        assert!(matches!(err, ConvoError::Parse { .. }));
        let err = parse("{ not json").unwrap_err();
        assert!(matches!(err, ConvoError::Parse { .. }));
    }

    #[test]
    fn test_empty_messages_is_ok() {
        let conv = parse(r#"{"messages": []}"#).unwrap();
        assert!(conv.is_empty());
    }

    #[test]
    fn test_dangling_artifact_link_rejected() {
        let raw = r#"{"messages":[{"type":"prompt","content":"a"}],
            "artifacts":[{"id":"1","fileName":"a.txt","fileSize":1,"mimeType":"text/plain",
                          "data":"YQ==","uploadedAt":"2025-01-01T00:00:00Z","insertedAfter":4}]}"#;
        assert!(parse(raw).is_err());
    }
}
