//! Append-only reconciliation of a fresh capture against a stored conversation.
//!
//! Matching is by role plus normalized content, position-independent, with
//! multiset semantics: every stored message can absorb at most one incoming
//! duplicate.

use std::collections::HashMap;

use tracing::debug;

use crate::conversation::{Conversation, Message, MessageRole};

/// Outcome of [`merge`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    pub messages: Vec<Message>,
    pub skipped_count: usize,
    pub has_new_content: bool,
}

impl MergeResult {
    pub fn appended_count(&self, existing_len: usize) -> usize {
        self.messages.len().saturating_sub(existing_len)
    }
}

/// Canonical form used for duplicate detection.
///
/// Unifies line endings, maps NBSP to a space, drops zero-width characters,
/// collapses whitespace runs and trims.
pub fn normalize_content(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut pending_space = false;
    for ch in content.chars() {
        match ch {
            '\u{200b}' | '\u{200c}' | '\u{200d}' | '\u{2060}' | '\u{feff}' => {}
            c if c.is_whitespace() => pending_space = true,
            c => {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.push(c);
            }
        }
    }
    out
}

fn key(message: &Message) -> (MessageRole, String) {
    (message.role, normalize_content(&message.content))
}

/// Merge `incoming` into `existing`. Never fails and never reorders.
pub fn merge(existing: &[Message], incoming: &[Message]) -> MergeResult {
    let mut available: HashMap<(MessageRole, String), usize> = HashMap::new();
    for message in existing {
        *available.entry(key(message)).or_insert(0) += 1;
    }

    let mut appended = Vec::new();
    let mut skipped_count = 0;
    for message in incoming {
        match available.get_mut(&key(message)) {
            Some(count) if *count > 0 => {
                *count -= 1;
                skipped_count += 1;
            }
            _ => appended.push(message.clone()),
        }
    }

    let has_new_content = !appended.is_empty();
    let mut messages = Vec::with_capacity(existing.len() + appended.len());
    messages.extend_from_slice(existing);
    messages.extend(appended);

    debug!(
        existing = existing.len(),
        incoming = incoming.len(),
        skipped = skipped_count,
        has_new_content,
        "merged messages"
    );

    MergeResult {
        messages,
        skipped_count,
        has_new_content,
    }
}

/// Merge a whole capture into a stored conversation in place.
///
/// Messages go through [`merge`]. Metadata placeholders are filled from the
/// capture, tags are unioned, and artifacts are unioned by id with the
/// stored copy kept. Incoming artifact links are moved onto the merged
/// position of the message they pointed at.
pub fn merge_conversation(existing: &mut Conversation, incoming: &Conversation) -> MergeResult {
    let result = merge(&existing.messages, &incoming.messages);
    let index_map = map_incoming_indices(&existing.messages, &incoming.messages);

    let meta = &mut existing.metadata;
    if meta.has_default_title() && !incoming.metadata.has_default_title() {
        meta.title = incoming.metadata.title.clone();
    }
    if meta.has_default_model() && !incoming.metadata.has_default_model() {
        meta.model = incoming.metadata.model.clone();
    }
    if meta.created_at.is_none() {
        meta.created_at = incoming.metadata.created_at;
    }
    if meta.source_url.is_none() {
        meta.source_url = incoming.metadata.source_url.clone();
    }
    if meta.author.is_none() {
        meta.author = incoming.metadata.author.clone();
    }
    meta.tags.extend(&incoming.metadata.tags);

    for artifact in incoming.artifacts.iter() {
        let mut artifact = artifact.clone();
        artifact.inserted_after = artifact
            .inserted_after
            .and_then(|idx| index_map.get(idx).copied());
        existing.artifacts.insert_if_absent(artifact);
    }

    existing.messages = result.messages.clone();
    result
}

/// For each incoming message, the index it occupies after merging: either
/// the stored duplicate that absorbed it or its appended slot.
fn map_incoming_indices(existing: &[Message], incoming: &[Message]) -> Vec<usize> {
    let mut slots: HashMap<(MessageRole, String), Vec<usize>> = HashMap::new();
    for (idx, message) in existing.iter().enumerate().rev() {
        slots.entry(key(message)).or_default().push(idx);
    }

    let mut next = existing.len();
    incoming
        .iter()
        .map(|message| match slots.get_mut(&key(message)).and_then(Vec::pop) {
            Some(idx) => idx,
            None => {
                let idx = next;
                next += 1;
                idx
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::Artifact;
    use crate::conversation::Metadata;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn a() -> Message {
        Message::prompt("What is a lifetime?")
    }
    fn b() -> Message {
        Message::response("A region of code where a reference is valid.")
    }
    fn c() -> Message {
        Message::prompt("Show an example")
    }

    #[test]
    fn test_appends_only_new_messages() {
        let result = merge(&[a(), b()], &[a(), b(), c()]);
        assert_eq!(result.messages, vec![a(), b(), c()]);
        assert_eq!(result.skipped_count, 2);
        assert!(result.has_new_content);
        assert_eq!(result.appended_count(2), 1);
    }

    #[test]
    fn test_all_duplicates_leaves_existing_unchanged() {
        let existing = vec![a(), b()];
        let result = merge(&existing, &[b(), a()]);
        assert_eq!(result.messages, existing);
        assert!(!result.has_new_content);
        assert_eq!(result.skipped_count, 2);
    }

    #[test]
    fn test_whitespace_and_capture_artifacts_tolerated() {
        let noisy = Message::response("A  region of code\r\nwhere a\u{a0}reference is valid.\u{200b} ");
        let result = merge(&[a(), b()], &[noisy]);
        assert!(!result.has_new_content);
    }

    #[test]
    fn test_role_participates_in_match() {
        let result = merge(&[a()], &[Message::response("What is a lifetime?")]);
        assert!(result.has_new_content);
        assert_eq!(result.messages.len(), 2);
    }

    #[test]
    fn test_repeated_prompt_is_appended_once_per_extra_copy() {
        let cont = Message::prompt("continue");
        let result = merge(&[cont.clone(), b()], &[cont.clone(), b(), cont.clone()]);
        assert_eq!(result.messages.len(), 3);
        assert_eq!(result.skipped_count, 2);
    }

    #[test]
    fn test_edited_message_recaptured_is_appended() {
        let mut edited = b();
        edited.content = "Edited answer".into();
        edited.edited = true;
        let result = merge(&[a(), edited], &[a(), b()]);
        assert!(result.has_new_content);
        assert_eq!(result.messages[2], b());
    }

    #[test]
    fn test_reasoning_does_not_affect_match() {
        let result = merge(&[b()], &[b().with_reasoning("thinking")]);
        assert!(!result.has_new_content);
        assert!(result.messages[0].reasoning.is_none());
    }

    #[test]
    fn test_merge_conversation_fills_metadata_and_remaps_artifacts() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut stored = Conversation::new(Metadata::default(), vec![a(), b()]);
        stored.metadata.tags.insert("rust").unwrap();

        let mut capture_meta = Metadata::default();
        capture_meta.title = "Lifetimes".into();
        capture_meta.model = "GPT-4o".into();
        capture_meta.tags.insert("cli").unwrap();
        let mut capture = Conversation::new(capture_meta, vec![c(), a(), b()]);
        let linked = Artifact::from_bytes("ex.rs", "text/plain", b"fn main() {}", ts).linked_to(0);
        let linked_id = linked.id.clone();
        capture.artifacts.upsert(linked);

        let result = merge_conversation(&mut stored, &capture);
        assert_eq!(result.skipped_count, 2);
        assert_eq!(stored.messages, vec![a(), b(), c()]);
        assert_eq!(stored.metadata.title, "Lifetimes");
        assert_eq!(stored.metadata.model, "GPT-4o");
        assert_eq!(stored.metadata.tags.to_vec(), vec!["cli", "rust"]);
        assert_eq!(stored.artifacts.get(&linked_id).unwrap().inserted_after, Some(2));
    }
}
