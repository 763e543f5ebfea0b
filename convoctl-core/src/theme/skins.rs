//! Built-in skin profiles.

/// How a message block is wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Chat bubbles, prompts aligned right.
    Bubbles,
    /// Plain transcript with a heading per turn.
    Transcript,
    /// Monospace prompt/response lines.
    Terminal,
    /// Print-oriented article with speaker labels.
    Paper,
}

impl Layout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::Bubbles => "bubbles",
            Layout::Transcript => "transcript",
            Layout::Terminal => "terminal",
            Layout::Paper => "paper",
        }
    }
}

/// How a response's attached reasoning is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningStyle {
    Disclosure,
    Dimmed,
    Aside,
}

#[derive(Debug, Clone, Copy)]
pub struct SkinProfile {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub layout: Layout,
    pub reasoning: ReasoningStyle,
    pub css: &'static str,
}

pub const CLASSIC: SkinProfile = SkinProfile {
    id: "classic",
    name: "Classic",
    description: "Chat bubbles with collapsible reasoning",
    layout: Layout::Bubbles,
    reasoning: ReasoningStyle::Disclosure,
    css: r#"
body { background: #f4f5f7; }
.messages { display: flex; flex-direction: column; gap: 1rem; }
.bubble { max-width: 80%; padding: .75rem 1rem; border-radius: 14px; background: #fff; box-shadow: 0 1px 2px rgba(0,0,0,.08); }
.message-prompt.bubble { align-self: flex-end; background: #dbeafe; }
.message-response.bubble { align-self: flex-start; }
.message-label { font-size: .75rem; font-weight: 600; color: #6b7280; margin-bottom: .25rem; }
"#,
};

pub const MINIMAL: SkinProfile = SkinProfile {
    id: "minimal",
    name: "Minimal",
    description: "Plain transcript, one heading per turn",
    layout: Layout::Transcript,
    reasoning: ReasoningStyle::Disclosure,
    css: r#"
.message { border-bottom: 1px solid #e5e7eb; padding: 1rem 0; }
.message-label { font-size: 1rem; margin: 0 0 .5rem; color: #374151; }
"#,
};

pub const TERMINAL: SkinProfile = SkinProfile {
    id: "terminal",
    name: "Terminal",
    description: "Monospace console log with dimmed reasoning",
    layout: Layout::Terminal,
    reasoning: ReasoningStyle::Dimmed,
    css: r#"
body { background: #0d1117; color: #c9d1d9; font-family: ui-monospace, SFMono-Regular, Menlo, monospace; }
a { color: #58a6ff; }
.prompt-line { color: #7ee787; font-weight: bold; }
.message-response .prompt-line { color: #d2a8ff; }
.message { margin: 0 0 1.25rem; }
.reasoning-dimmed { opacity: .6; border-left: 2px solid #30363d; padding-left: .75rem; }
pre, code { background: #161b22; }
"#,
};

pub const PAPER: SkinProfile = SkinProfile {
    id: "paper",
    name: "Paper",
    description: "Print-friendly article with reasoning in side notes",
    layout: Layout::Paper,
    reasoning: ReasoningStyle::Aside,
    css: r#"
body { font-family: Georgia, "Times New Roman", serif; background: #fff; color: #111; }
.conversation { max-width: 42rem; }
.speaker { font-variant: small-caps; font-weight: bold; margin-bottom: .25rem; }
.reasoning-aside { border: 1px solid #d1d5db; padding: .5rem .75rem; margin: .5rem 0; font-size: .9rem; }
@media print { details { display: block; } .artifact-download { display: none; } }
"#,
};

/// Every built-in skin, default first.
pub const BUILTIN_SKINS: &[SkinProfile] = &[CLASSIC, MINIMAL, TERMINAL, PAPER];
