//! Markdown and JSON exporters.
//!
//! HTML goes through [`crate::theme::ThemeRegistry`]; these two formats are
//! written directly from the conversation model.

pub mod json;
pub mod markdown;

use std::fmt;
use std::str::FromStr;

use crate::error::{ConvoError, Result};

pub use json::{to_json, write_json};
pub use markdown::{to_markdown, write_markdown};

/// Output format of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Html,
    Markdown,
    Json,
}

impl ExportFormat {
    pub const NAMES: &'static [&'static str] = &["html", "md", "markdown", "json"];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Html => "html",
            ExportFormat::Markdown => "markdown",
            ExportFormat::Json => "json",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Html => "html",
            ExportFormat::Markdown => "md",
            ExportFormat::Json => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ConvoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" | "htm" => Ok(ExportFormat::Html),
            "md" | "markdown" => Ok(ExportFormat::Markdown),
            "json" => Ok(ExportFormat::Json),
            _ => Err(ConvoError::unsupported_format(s, Self::NAMES)),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Labels and switches shared by the text exporters.
#[derive(Debug, Clone, Copy)]
pub struct ExportOptions<'a> {
    pub user_label: &'a str,
    pub ai_label: &'a str,
    pub include_footer: bool,
}

impl Default for ExportOptions<'_> {
    fn default() -> Self {
        Self {
            user_label: "You",
            ai_label: "AI",
            include_footer: true,
        }
    }
}
