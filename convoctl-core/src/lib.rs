pub mod artifacts;
pub mod config;
pub mod conversation;
pub mod error;
pub mod export;
pub mod extract;
pub mod markdown;
pub mod merge;
pub mod sanitize;
pub mod tags;
pub mod theme;
pub mod validation;

pub use artifacts::{Artifact, ArtifactManifest, ArtifactTable};
pub use config::{ConvoConfig, RenderConfig};
pub use conversation::{find_conversation, Conversation, Message, MessageRole, Metadata};
pub use error::{ConvoError, Result};
pub use export::{ExportFormat, ExportOptions};
pub use extract::{detect_format, parse_chat, parse_with, Extractor, FormatHint, Platform};
pub use merge::{merge, merge_conversation, MergeResult};
pub use sanitize::{escape_attr, escape_text, sanitize_url};
pub use tags::TagSet;
pub use theme::{DocumentOptions, SkinRenderer, ThemeRegistry, DEFAULT_SKIN};
pub use validation::Limits;

pub const TOOL_NAME: &str = "convoctl";
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const TOOL_TAGLINE: &str = "Chat transcripts, kept as text.";
