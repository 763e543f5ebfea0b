use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifacts::{Artifact, ArtifactTable};
use crate::error::{ConvoError, Result};
use crate::tags::TagSet;
use crate::validation::Limits;

pub const DEFAULT_TITLE: &str = "Untitled Chat";
pub const DEFAULT_MODEL: &str = "Unknown Model";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    Prompt,
    Response,
}

impl MessageRole {
    /// Parse a role tag as found in exports and dialect markers.
    pub fn parse(value: &str) -> Option<MessageRole> {
        match value.trim().to_ascii_lowercase().as_str() {
            "prompt" | "user" | "human" | "you" => Some(MessageRole::Prompt),
            "response" | "assistant" | "model" | "ai" | "bot" => Some(MessageRole::Response),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::Prompt => "prompt",
            MessageRole::Response => "response",
        }
    }

    /// Capitalized form used in markdown headings.
    pub fn label(&self) -> &'static str {
        match self {
            MessageRole::Prompt => "Prompt",
            MessageRole::Response => "Response",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    /// Vendor reasoning attached to a response; never spliced into `content`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub edited: bool,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            reasoning: None,
            edited: false,
        }
    }

    pub fn prompt(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Prompt, content)
    }

    pub fn response(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Response, content)
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        let reasoning = reasoning.into();
        if !reasoning.trim().is_empty() {
            self.reasoning = Some(reasoning);
        }
        self
    }

    pub fn is_prompt(&self) -> bool {
        self.role == MessageRole::Prompt
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: TagSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Set once the conversation has been written out by an exporter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            created_at: None,
            tags: TagSet::default(),
            source_url: None,
            author: None,
            exported_at: None,
        }
    }
}

impl Metadata {
    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_TITLE
    }

    pub fn has_default_model(&self) -> bool {
        self.model == DEFAULT_MODEL
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub metadata: Metadata,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub artifacts: ArtifactTable,
}

impl Conversation {
    /// The id is derived from the normalized title and the opening message,
    /// so parsing the same capture twice yields equal conversations.
    pub fn new(metadata: Metadata, messages: Vec<Message>) -> Self {
        Self {
            id: derive_id(&metadata.title, messages.first()),
            metadata,
            messages,
            artifacts: ArtifactTable::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn title(&self) -> &str {
        &self.metadata.title
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Replace one message's content as a user edit. Role never changes.
    pub fn edit_message(&mut self, index: usize, content: impl Into<String>) -> Result<()> {
        let len = self.messages.len();
        let message = self.messages.get_mut(index).ok_or_else(|| {
            ConvoError::validation(format!(
                "cannot edit message {index}: conversation has {len} message(s)"
            ))
        })?;
        message.content = content.into();
        message.edited = true;
        Ok(())
    }

    /// Attach or replace an artifact after validating it against `limits`.
    pub fn insert_artifact(&mut self, artifact: Artifact, limits: &Limits) -> Result<()> {
        if let Some(index) = artifact.inserted_after {
            if index >= self.messages.len() {
                return Err(ConvoError::validation(format!(
                    "artifact '{}' links to message {index}, but conversation has {} message(s)",
                    artifact.filename,
                    self.messages.len()
                )));
            }
        }

        let bytes = artifact.decode()?;
        limits.check_artifact_size(&artifact.filename, bytes.len() as u64)?;
        if bytes.len() as u64 != artifact.size {
            return Err(ConvoError::validation(format!(
                "artifact '{}' declares {} bytes but payload holds {}",
                artifact.filename,
                artifact.size,
                bytes.len()
            )));
        }

        let sizes = self
            .artifacts
            .iter()
            .filter(|a| a.id != artifact.id)
            .map(|a| a.size)
            .chain(std::iter::once(artifact.size));
        limits.check_batch(sizes)?;

        self.artifacts.upsert(artifact);
        Ok(())
    }

    pub fn remove_artifact(&mut self, id: &str) -> Option<Artifact> {
        self.artifacts.remove(id)
    }

    pub fn artifacts_for_message(&self, index: usize) -> impl Iterator<Item = &Artifact> {
        self.artifacts.for_message(index)
    }

    pub fn session_artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.session()
    }

    pub fn all_artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter()
    }
}

fn derive_id(title: &str, first: Option<&Message>) -> String {
    let mut name = normalize_title(title);
    if let Some(message) = first {
        name.push('\n');
        name.push_str(message.role.as_str());
        name.push('\n');
        name.push_str(message.content.trim());
    }
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

/// Normalize a title for "same conversation" lookups.
///
/// Lowercases, collapses whitespace, and drops trailing vendor suffixes such
/// as ` - ChatGPT` so captures of one chat from different tabs line up.
pub fn normalize_title(title: &str) -> String {
    let collapsed = title.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut lowered = collapsed.to_lowercase();
    for suffix in [" - chatgpt", " | claude", " - claude", " - gemini", " - google ai studio"] {
        if let Some(stripped) = lowered.strip_suffix(suffix) {
            lowered = stripped.to_string();
        }
    }
    lowered
        .trim_matches(|c: char| c.is_whitespace() || c == '.' || c == ':')
        .to_string()
}

/// Find the stored conversation a capture belongs to: explicit id first,
/// then normalized title. Placeholder titles never match.
pub fn find_conversation<'a>(
    conversations: &'a [Conversation],
    id: Option<&str>,
    title: &str,
) -> Option<&'a Conversation> {
    if let Some(id) = id {
        if let Some(found) = conversations.iter().find(|c| c.id == id) {
            return Some(found);
        }
    }

    let key = normalize_title(title);
    if key.is_empty() || key == normalize_title(DEFAULT_TITLE) {
        return None;
    }
    conversations
        .iter()
        .find(|c| normalize_title(&c.metadata.title) == key)
}
