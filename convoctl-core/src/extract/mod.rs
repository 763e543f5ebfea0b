//! Format detection and the per-dialect extractors.
//!
//! Every extractor is a pure function from raw text to a [`Conversation`].
//! [`Extractor::select`] is the single place that decides which one runs.

pub mod html;
pub mod json;
pub mod markdown;
pub mod reasoning;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::IgnoredAny;
use tracing::debug;

use crate::conversation::Conversation;
use crate::error::{ConvoError, Result};
use crate::validation::Limits;

pub use reasoning::split_reasoning;

/// Input format hint supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatHint {
    Auto,
    Markdown,
    Json,
    Html,
}

impl FormatHint {
    pub const NAMES: &'static [&'static str] = &["auto", "markdown", "md", "json", "html"];

    pub fn as_str(&self) -> &'static str {
        match self {
            FormatHint::Auto => "auto",
            FormatHint::Markdown => "markdown",
            FormatHint::Json => "json",
            FormatHint::Html => "html",
        }
    }
}

impl FromStr for FormatHint {
    type Err = ConvoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(FormatHint::Auto),
            "markdown" | "md" => Ok(FormatHint::Markdown),
            "json" => Ok(FormatHint::Json),
            "html" | "htm" => Ok(FormatHint::Html),
            _ => Err(ConvoError::unsupported_format(s, Self::NAMES)),
        }
    }
}

impl fmt::Display for FormatHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chat product whose DOM shape an HTML capture follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Platform {
    #[default]
    Generic,
    ChatGpt,
    Claude,
    Gemini,
    AiStudio,
}

impl Platform {
    pub const NAMES: &'static [&'static str] = &["generic", "chatgpt", "claude", "gemini", "aistudio"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Generic => "generic",
            Platform::ChatGpt => "chatgpt",
            Platform::Claude => "claude",
            Platform::Gemini => "gemini",
            Platform::AiStudio => "aistudio",
        }
    }

    /// Default label for the assistant side of the transcript.
    pub fn ai_label(&self) -> &'static str {
        match self {
            Platform::Generic => "AI",
            Platform::ChatGpt => "ChatGPT",
            Platform::Claude => "Claude",
            Platform::Gemini => "Gemini",
            Platform::AiStudio => "AI Studio",
        }
    }
}

impl FromStr for Platform {
    type Err = ConvoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "generic" => Ok(Platform::Generic),
            "chatgpt" | "openai" => Ok(Platform::ChatGpt),
            "claude" => Ok(Platform::Claude),
            "gemini" => Ok(Platform::Gemini),
            "aistudio" | "ai-studio" => Ok(Platform::AiStudio),
            _ => Err(ConvoError::unsupported_format(s, Self::NAMES)),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of extractors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    Markdown,
    Json,
    Html(Platform),
}

impl Extractor {
    /// Pick exactly one extractor for `raw`. `Auto` sniffs the content.
    pub fn select(hint: FormatHint, raw: &str, platform: Platform) -> Extractor {
        let resolved = match hint {
            FormatHint::Auto => detect_format(raw),
            other => other,
        };
        let extractor = match resolved {
            FormatHint::Json => Extractor::Json,
            FormatHint::Html => Extractor::Html(platform),
            FormatHint::Markdown | FormatHint::Auto => Extractor::Markdown,
        };
        debug!(hint = %hint, extractor = extractor.name(), "selected extractor");
        extractor
    }

    pub fn name(&self) -> &'static str {
        match self {
            Extractor::Markdown => "markdown",
            Extractor::Json => "json",
            Extractor::Html(_) => "html",
        }
    }

    pub fn parse(&self, raw: &str) -> Result<Conversation> {
        match self {
            Extractor::Markdown => markdown::parse(raw),
            Extractor::Json => json::parse(raw),
            Extractor::Html(platform) => html::parse(raw, *platform),
        }
    }
}

/// Sniff the dialect of `raw`. Never returns [`FormatHint::Auto`].
pub fn detect_format(raw: &str) -> FormatHint {
    let trimmed = raw.trim_start_matches('\u{feff}').trim_start();

    // Markdown may open with a link or badge, so a bracket alone is not enough.
    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<IgnoredAny>(trimmed).is_ok()
    {
        return FormatHint::Json;
    }

    let head: String = trimmed.chars().take(256).collect::<String>().to_ascii_lowercase();
    let looks_like_markup = head.starts_with("<!doctype")
        || head.starts_with("<html")
        || head.starts_with("<body")
        || head.starts_with("<div")
        || head.starts_with("<main")
        || head.starts_with("<article")
        || head.starts_with("<section");
    if looks_like_markup || html::detect_platform(raw).is_some() {
        return FormatHint::Html;
    }

    FormatHint::Markdown
}

/// Parse with string hints, as the CLI and library callers supply them.
pub fn parse_chat(raw: &str, hint: &str, platform: &str) -> Result<Conversation> {
    let hint: FormatHint = hint.parse()?;
    let platform: Platform = platform.parse()?;
    parse_with(raw, hint, platform, &Limits::default())
}

/// Validate `raw` against `limits`, select an extractor and run it.
pub fn parse_with(
    raw: &str,
    hint: FormatHint,
    platform: Platform,
    limits: &Limits,
) -> Result<Conversation> {
    limits.check_input_size(raw.len())?;
    let extractor = Extractor::select(hint, raw, platform);
    let conversation = extractor.parse(raw)?;
    debug!(
        extractor = extractor.name(),
        messages = conversation.len(),
        "extraction complete"
    );
    Ok(conversation)
}

/// Best-effort timestamp parsing for dialect metadata.
pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
