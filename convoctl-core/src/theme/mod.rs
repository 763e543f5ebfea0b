//! Skin registry and HTML document rendering.
//!
//! All skins share one document shell (see `shell`) and differ only in how
//! a message block and its reasoning are wrapped, as described by a
//! [`SkinProfile`].

mod shell;
pub mod skins;

use tracing::{debug, warn};

use crate::conversation::{Conversation, Message, MessageRole, Metadata};
use crate::error::{ConvoError, Result};
use crate::extract::Platform;

pub use skins::{Layout, ReasoningStyle, SkinProfile, BUILTIN_SKINS};

pub const DEFAULT_SKIN: &str = "classic";

/// Per-document switches passed to [`SkinRenderer::generate_document`].
#[derive(Debug, Clone)]
pub struct DocumentOptions<'a> {
    pub title: &'a str,
    pub user_label: &'a str,
    pub ai_label: &'a str,
    pub platform: Platform,
    pub metadata: Option<&'a Metadata>,
    pub include_footer: bool,
    pub is_preview: bool,
    pub reasoning_enabled: bool,
}

impl<'a> DocumentOptions<'a> {
    /// Options for `conversation` with its own title and metadata, default
    /// labels for `platform`, footer on, reasoning on, non-preview.
    pub fn for_conversation(conversation: &'a Conversation, platform: Platform) -> Self {
        Self {
            title: conversation.title(),
            user_label: "You",
            ai_label: platform.ai_label(),
            platform,
            metadata: Some(&conversation.metadata),
            include_footer: true,
            is_preview: false,
            reasoning_enabled: true,
        }
    }
}

/// A registered skin.
pub trait SkinRenderer: Send + Sync {
    fn profile(&self) -> &SkinProfile;

    fn id(&self) -> &str {
        self.profile().id
    }

    /// Render a complete, self-contained HTML document.
    fn generate_document(&self, conversation: &Conversation, options: &DocumentOptions<'_>) -> String;

    /// Render a single message block.
    fn generate_message(
        &self,
        message: &Message,
        index: usize,
        user_label: &str,
        ai_label: &str,
        platform: Platform,
    ) -> String;
}

/// Skin backed by a static [`SkinProfile`] and the shared shell.
#[derive(Debug, Clone, Copy)]
pub struct ProfileSkin {
    profile: SkinProfile,
}

impl ProfileSkin {
    pub const fn new(profile: SkinProfile) -> Self {
        Self { profile }
    }

    fn message_html(
        &self,
        conversation: &Conversation,
        index: usize,
        options: &DocumentOptions<'_>,
    ) -> String {
        let message = &conversation.messages[index];
        let label = match message.role {
            MessageRole::Prompt => options.user_label,
            MessageRole::Response => options.ai_label,
        };
        shell::message_block(shell::MessageParts {
            profile: &self.profile,
            message,
            index,
            label,
            reasoning_enabled: options.reasoning_enabled,
            artifacts: conversation.artifacts_for_message(index).collect(),
            is_preview: options.is_preview,
        })
    }
}

impl SkinRenderer for ProfileSkin {
    fn profile(&self) -> &SkinProfile {
        &self.profile
    }

    fn generate_document(&self, conversation: &Conversation, options: &DocumentOptions<'_>) -> String {
        let messages_html: String = (0..conversation.messages.len())
            .map(|index| self.message_html(conversation, index, options))
            .collect();

        debug!(
            skin = self.profile.id,
            messages = conversation.len(),
            preview = options.is_preview,
            "rendering html document"
        );

        shell::document(shell::ShellParts {
            profile: &self.profile,
            title: options.title,
            platform: options.platform,
            metadata: options.metadata,
            messages_html,
            session_artifacts: conversation.session_artifacts().collect(),
            include_footer: options.include_footer,
            is_preview: options.is_preview,
            has_artifacts: !conversation.artifacts.is_empty(),
        })
    }

    fn generate_message(
        &self,
        message: &Message,
        index: usize,
        user_label: &str,
        ai_label: &str,
        _platform: Platform,
    ) -> String {
        let label = match message.role {
            MessageRole::Prompt => user_label,
            MessageRole::Response => ai_label,
        };
        shell::message_block(shell::MessageParts {
            profile: &self.profile,
            message,
            index,
            label,
            reasoning_enabled: true,
            artifacts: Vec::new(),
            is_preview: false,
        })
    }
}

/// Short description of a registered skin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkinInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub is_default: bool,
}

/// Maps skin ids to renderers. The default skin is always present.
pub struct ThemeRegistry {
    skins: Vec<Box<dyn SkinRenderer>>,
}

impl Default for ThemeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ThemeRegistry {
    pub fn new() -> Self {
        Self {
            skins: BUILTIN_SKINS
                .iter()
                .map(|p| Box::new(ProfileSkin::new(*p)) as Box<dyn SkinRenderer>)
                .collect(),
        }
    }

    /// Add a skin, replacing any existing skin with the same id.
    pub fn register(&mut self, skin: Box<dyn SkinRenderer>) {
        self.skins.retain(|s| s.id() != skin.id());
        self.skins.push(skin);
    }

    pub fn get(&self, id: &str) -> Result<&dyn SkinRenderer> {
        let wanted = id.trim().to_ascii_lowercase();
        self.skins
            .iter()
            .find(|s| s.id() == wanted)
            .map(|s| &**s)
            .ok_or_else(|| ConvoError::UnknownSkin { id: id.to_string() })
    }

    /// Look up `id`, falling back to the default skin with a warning.
    pub fn resolve(&self, id: &str) -> &dyn SkinRenderer {
        match self.get(id) {
            Ok(skin) => skin,
            Err(err) => {
                warn!(error = %err, fallback = DEFAULT_SKIN, "falling back to default skin");
                self.default_skin()
            }
        }
    }

    pub fn default_skin(&self) -> &dyn SkinRenderer {
        self.skins
            .iter()
            .find(|s| s.id() == DEFAULT_SKIN)
            .or_else(|| self.skins.first())
            .map(|s| &**s)
            .unwrap_or(&DEFAULT_RENDERER as &dyn SkinRenderer)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.skins.iter().map(|s| s.id()).collect()
    }

    pub fn list(&self) -> Vec<SkinInfo> {
        self.skins
            .iter()
            .map(|s| {
                let p = s.profile();
                SkinInfo {
                    id: p.id.to_string(),
                    name: p.name.to_string(),
                    description: p.description.to_string(),
                    is_default: p.id == DEFAULT_SKIN,
                }
            })
            .collect()
    }

    /// Resolve `skin` and render a whole document.
    pub fn render_document(
        &self,
        skin: &str,
        conversation: &Conversation,
        options: &DocumentOptions<'_>,
    ) -> String {
        self.resolve(skin).generate_document(conversation, options)
    }
}

static DEFAULT_RENDERER: ProfileSkin = ProfileSkin::new(skins::CLASSIC);
