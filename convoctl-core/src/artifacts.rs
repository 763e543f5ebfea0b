use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConvoError, Result};
use crate::sanitize::sanitize_filename;
use crate::{TOOL_NAME, TOOL_VERSION};

pub const MANIFEST_VERSION: &str = "1.0";

/// A binary attachment. `inserted_after` links it to a message index;
/// without it the artifact belongs to the conversation as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: String,
    #[serde(rename = "fileName")]
    pub filename: String,
    #[serde(rename = "fileSize")]
    pub size: u64,
    pub mime_type: String,
    /// Base64 payload (standard alphabet, no `data:` prefix).
    pub data: String,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inserted_after: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Artifact {
    pub fn from_bytes(
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: &[u8],
        uploaded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            filename: filename.into(),
            size: bytes.len() as u64,
            mime_type: mime_type.into(),
            data: STANDARD.encode(bytes),
            uploaded_at,
            inserted_after: None,
            description: None,
        }
    }

    pub fn linked_to(mut self, message_index: usize) -> Self {
        self.inserted_after = Some(message_index);
        self
    }

    pub fn is_linked(&self) -> bool {
        self.inserted_after.is_some()
    }

    pub fn decode(&self) -> Result<Vec<u8>> {
        STANDARD.decode(self.data.trim()).map_err(|err| {
            ConvoError::validation(format!(
                "artifact '{}' payload is not valid base64: {}",
                self.filename, err
            ))
        })
    }

    /// Relative path used by non-preview HTML builds and the manifest.
    ///
    /// Prefixed with the artifact id so two uploads sharing a filename land in
    /// different files.
    pub fn export_path(&self) -> String {
        let id: String = self
            .id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
            .take(64)
            .collect();
        if id.is_empty() {
            format!("artifacts/{}", self.safe_filename())
        } else {
            format!("artifacts/{id}-{}", self.safe_filename())
        }
    }

    pub fn safe_filename(&self) -> String {
        let name = sanitize_filename(&self.filename);
        if name.is_empty() {
            format!("artifact-{}", self.id)
        } else {
            name
        }
    }
}

/// All artifacts of a conversation, keyed by id, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactTable {
    items: Vec<Artifact>,
}

impl ArtifactTable {
    /// Insert or replace by id. Returns the replaced artifact, if any.
    pub fn upsert(&mut self, artifact: Artifact) -> Option<Artifact> {
        match self.items.iter_mut().find(|a| a.id == artifact.id) {
            Some(slot) => Some(std::mem::replace(slot, artifact)),
            None => {
                self.items.push(artifact);
                None
            }
        }
    }

    /// Insert only when the id is unknown; the stored copy always wins.
    pub fn insert_if_absent(&mut self, artifact: Artifact) -> bool {
        if self.get(&artifact.id).is_some() {
            return false;
        }
        self.items.push(artifact);
        true
    }

    pub fn get(&self, id: &str) -> Option<&Artifact> {
        self.items.iter().find(|a| a.id == id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Artifact> {
        let pos = self.items.iter().position(|a| a.id == id)?;
        Some(self.items.remove(pos))
    }

    pub fn for_message(&self, index: usize) -> impl Iterator<Item = &Artifact> {
        self.items
            .iter()
            .filter(move |a| a.inserted_after == Some(index))
    }

    /// Conversation-level artifacts (not linked to any message).
    pub fn session(&self) -> impl Iterator<Item = &Artifact> {
        self.items.iter().filter(|a| !a.is_linked())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.items.iter().map(|a| a.size).sum()
    }
}

impl FromIterator<Artifact> for ArtifactTable {
    fn from_iter<T: IntoIterator<Item = Artifact>>(iter: T) -> Self {
        let mut table = ArtifactTable::default();
        for artifact in iter {
            table.insert_if_absent(artifact);
        }
        table
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub tool: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub file_name: String,
    pub file_path: String,
    pub file_size: u64,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactManifest {
    pub version: String,
    pub conversation_id: String,
    pub title: String,
    pub exported_at: DateTime<Utc>,
    pub artifacts: Vec<ManifestEntry>,
    pub exported_by: ToolInfo,
}

impl ArtifactManifest {
    pub fn build(
        conversation_id: &str,
        title: &str,
        table: &ArtifactTable,
        exported_at: DateTime<Utc>,
    ) -> Self {
        let artifacts = table
            .iter()
            .map(|a| ManifestEntry {
                file_name: a.safe_filename(),
                file_path: a.export_path(),
                file_size: a.size,
                mime_type: a.mime_type.clone(),
                description: a.description.clone(),
            })
            .collect();

        Self {
            version: MANIFEST_VERSION.to_string(),
            conversation_id: conversation_id.to_string(),
            title: title.to_string(),
            exported_at,
            artifacts,
            exported_by: ToolInfo {
                tool: TOOL_NAME.to_string(),
                version: TOOL_VERSION.to_string(),
            },
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|err| ConvoError::json("artifact manifest", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_upsert_keys_by_id() {
        let mut table = ArtifactTable::default();
        let a = Artifact::from_bytes("a.txt", "text/plain", b"one", ts());
        let mut b = a.clone();
        b.filename = "b.txt".into();

        assert!(table.upsert(a).is_none());
        let replaced = table.upsert(b).unwrap();
        assert_eq!(replaced.filename, "a.txt");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_session_and_message_tiers() {
        let table: ArtifactTable = vec![
            Artifact::from_bytes("s.txt", "text/plain", b"s", ts()),
            Artifact::from_bytes("m.txt", "text/plain", b"m", ts()).linked_to(1),
        ]
        .into_iter()
        .collect();

        assert_eq!(table.session().count(), 1);
        assert_eq!(table.for_message(1).count(), 1);
        assert_eq!(table.for_message(0).count(), 0);
    }

    #[test]
    fn test_decode_round_trip_and_bad_payload() {
        let mut a = Artifact::from_bytes("x.bin", "application/octet-stream", &[0, 1, 2], ts());
        assert_eq!(a.decode().unwrap(), vec![0, 1, 2]);
        a.data = "%%%".into();
        assert!(a.decode().is_err());
    }

    #[test]
    fn test_manifest_uses_safe_paths() {
        let mut a = Artifact::from_bytes("../../etc/passwd", "text/plain", b"x", ts());
        a.description = Some("notes".into());
        let table: ArtifactTable = vec![a].into_iter().collect();
        let manifest = ArtifactManifest::build("conv-1", "Title", &table, ts());

        let path = &manifest.artifacts[0].file_path;
        assert!(path.starts_with("artifacts/"));
        assert!(path.ends_with("-passwd"));
        assert!(!path.contains(".."));
        let json = manifest.to_json().unwrap();
        assert!(json.contains("\"conversationId\": \"conv-1\""));
        assert!(json.contains("\"exportedBy\""));
        assert!(json.contains("\"description\": \"notes\""));
    }

    #[test]
    fn test_same_filename_gets_distinct_paths() {
        let mut first = Artifact::from_bytes("image.png", "image/png", b"one", ts());
        first.id = "a1".into();
        let mut second = Artifact::from_bytes("image.png", "image/png", b"two", ts());
        second.id = "a2".into();
        let table: ArtifactTable = vec![first, second].into_iter().collect();
        let manifest = ArtifactManifest::build("conv-1", "Title", &table, ts());

        let paths: Vec<_> = manifest.artifacts.iter().map(|e| e.file_path.as_str()).collect();
        assert_eq!(paths, vec!["artifacts/a1-image.png", "artifacts/a2-image.png"]);
        assert_eq!(manifest.artifacts[0].file_name, "image.png");
    }

    #[test]
    fn test_export_path_strips_unsafe_id_characters() {
        let mut a = Artifact::from_bytes("notes.txt", "text/plain", b"x", ts());
        a.id = "../x y".into();
        assert_eq!(a.export_path(), "artifacts/xy-notes.txt");
    }
}
