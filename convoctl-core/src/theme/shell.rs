//! The document shell shared by every skin.
//!
//! A skin only decides how one message block and its reasoning are wrapped;
//! the head, header, artifact sections, footer and download script live here.

use crate::artifacts::Artifact;
use crate::conversation::{Message, MessageRole, Metadata};
use crate::extract::Platform;
use crate::markdown::{self, REASONING_SUMMARY};
use crate::sanitize::{escape_attr, escape_text, sanitize_url};
use crate::{TOOL_NAME, TOOL_TAGLINE, TOOL_VERSION};

use super::skins::{Layout, ReasoningStyle, SkinProfile};

const BASE_CSS: &str = r#"
* { box-sizing: border-box; }
body { margin: 0; font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif; line-height: 1.55; color: #1f2937; }
.conversation { max-width: 56rem; margin: 0 auto; padding: 2rem 1rem; }
.conversation-header h1 { margin: 0 0 .5rem; }
.metadata { display: grid; grid-template-columns: max-content 1fr; gap: .25rem 1rem; font-size: .875rem; color: #4b5563; }
.metadata dt { font-weight: 600; }
.metadata dd { margin: 0; }
.tag, .badge { display: inline-block; padding: 0 .5rem; border-radius: 999px; background: #e5e7eb; font-size: .75rem; margin-right: .25rem; }
pre { overflow-x: auto; padding: .75rem; border-radius: 6px; background: #f3f4f6; }
code { font-family: ui-monospace, SFMono-Regular, Menlo, monospace; font-size: .9em; }
table { border-collapse: collapse; }
th, td { border: 1px solid #d1d5db; padding: .25rem .5rem; }
blockquote { margin: 0; padding-left: 1rem; border-left: 3px solid #d1d5db; color: #4b5563; }
details.reasoning, details.collapsible { margin: .5rem 0; }
details.reasoning > summary { cursor: pointer; color: #6b7280; font-style: italic; }
.artifacts { margin-top: .5rem; display: flex; flex-wrap: wrap; gap: .5rem; }
.artifact { font-size: .875rem; }
.session-artifacts { margin-top: 2rem; }
.export-footer { margin-top: 3rem; font-size: .75rem; color: #9ca3af; text-align: center; }
"#;

const DOWNLOAD_SCRIPT: &str = r#"<script>
document.addEventListener('click', function (event) {
  var link = event.target.closest('.artifact-download');
  if (!link) { return; }
  event.preventDefault();
  var raw = atob(link.dataset.payload || '');
  var bytes = new Uint8Array(raw.length);
  for (var i = 0; i < raw.length; i++) { bytes[i] = raw.charCodeAt(i); }
  var url = URL.createObjectURL(new Blob([bytes], { type: link.dataset.mime || 'application/octet-stream' }));
  var anchor = document.createElement('a');
  anchor.href = url;
  anchor.download = link.dataset.filename || 'artifact';
  document.body.appendChild(anchor);
  anchor.click();
  anchor.remove();
  setTimeout(function () { URL.revokeObjectURL(url); }, 1000);
});
</script>"#;

/// Everything the shell needs to lay out one document.
pub(crate) struct ShellParts<'a> {
    pub profile: &'a SkinProfile,
    pub title: &'a str,
    pub platform: Platform,
    pub metadata: Option<&'a Metadata>,
    pub messages_html: String,
    pub session_artifacts: Vec<&'a Artifact>,
    pub include_footer: bool,
    pub is_preview: bool,
    pub has_artifacts: bool,
}

pub(crate) fn document(parts: ShellParts<'_>) -> String {
    let title = escape_text(parts.title);
    let mut html = String::with_capacity(parts.messages_html.len() + BASE_CSS.len() + 2048);

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<meta name=\"generator\" content=\"{TOOL_NAME} {TOOL_VERSION}\">\n<title>{title}</title>\n"
    ));
    html.push_str(&format!("<style>{BASE_CSS}{}</style>\n</head>\n", parts.profile.css));
    html.push_str(&format!(
        "<body class=\"skin-{} platform-{}\">\n<main class=\"conversation layout-{}\">\n",
        parts.profile.id,
        parts.platform.as_str(),
        parts.profile.layout.as_str()
    ));

    html.push_str(&format!("<header class=\"conversation-header\">\n<h1>{title}</h1>\n"));
    if let Some(metadata) = parts.metadata {
        html.push_str(&metadata_block(metadata));
    }
    html.push_str("</header>\n<section class=\"messages\">\n");
    html.push_str(&parts.messages_html);
    html.push_str("</section>\n");

    if !parts.session_artifacts.is_empty() {
        html.push_str("<section class=\"session-artifacts\">\n<h2>Attachments</h2>\n");
        html.push_str(&artifact_list(&parts.session_artifacts, parts.is_preview));
        html.push_str("</section>\n");
    }

    if parts.include_footer {
        html.push_str(&format!(
            "<footer class=\"export-footer\"><p>Exported with {TOOL_NAME} {TOOL_VERSION}. {}</p></footer>\n",
            escape_text(TOOL_TAGLINE)
        ));
    }
    html.push_str("</main>\n");

    if parts.is_preview && parts.has_artifacts {
        html.push_str(DOWNLOAD_SCRIPT);
        html.push('\n');
    }
    html.push_str("</body>\n</html>\n");
    html
}

fn metadata_block(metadata: &Metadata) -> String {
    let mut html = String::from("<dl class=\"metadata\">\n");
    html.push_str(&format!("<dt>Model</dt><dd>{}</dd>\n", escape_text(&metadata.model)));
    if let Some(created) = metadata.created_at {
        html.push_str(&format!(
            "<dt>Date</dt><dd><time datetime=\"{}\">{}</time></dd>\n",
            created.to_rfc3339(),
            created.format("%Y-%m-%d %H:%M UTC")
        ));
    }
    if let Some(author) = &metadata.author {
        html.push_str(&format!("<dt>Author</dt><dd>{}</dd>\n", escape_text(author)));
    }
    if !metadata.tags.is_empty() {
        let tags: String = metadata
            .tags
            .iter()
            .map(|t| format!("<span class=\"tag\">{}</span>", escape_text(t)))
            .collect();
        html.push_str(&format!("<dt>Tags</dt><dd>{tags}</dd>\n"));
    }
    if let Some(source) = &metadata.source_url {
        let href = sanitize_url(source);
        let shown = escape_text(source);
        if href.is_empty() {
            html.push_str(&format!("<dt>Source</dt><dd>{shown}</dd>\n"));
        } else {
            html.push_str(&format!(
                "<dt>Source</dt><dd><a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{shown}</a></dd>\n",
                escape_attr(&href)
            ));
        }
    }
    html.push_str("</dl>\n");
    html
}

/// Labels of one message block, already resolved for its role.
pub(crate) struct MessageParts<'a> {
    pub profile: &'a SkinProfile,
    pub message: &'a Message,
    pub index: usize,
    pub label: &'a str,
    pub reasoning_enabled: bool,
    pub artifacts: Vec<&'a Artifact>,
    pub is_preview: bool,
}

pub(crate) fn message_block(parts: MessageParts<'_>) -> String {
    let role = parts.message.role.as_str();
    let label = escape_text(parts.label);
    let body = markdown::render(&parts.message.content, parts.reasoning_enabled);
    let reasoning = match (&parts.message.reasoning, parts.message.role) {
        (Some(text), MessageRole::Response) if parts.reasoning_enabled => {
            reasoning_block(parts.profile.reasoning, text)
        }
        _ => String::new(),
    };
    let artifacts = if parts.artifacts.is_empty() {
        String::new()
    } else {
        artifact_list(&parts.artifacts, parts.is_preview)
    };
    let edited = if parts.message.edited {
        " <span class=\"edited\">(edited)</span>"
    } else {
        ""
    };
    let id = parts.index;

    match parts.profile.layout {
        Layout::Bubbles => format!(
            "<article class=\"message message-{role} bubble\" id=\"message-{id}\" data-role=\"{role}\">\n<div class=\"message-label\">{label}{edited}</div>\n{reasoning}<div class=\"message-body\">\n{body}</div>\n{artifacts}</article>\n"
        ),
        Layout::Transcript => format!(
            "<section class=\"message message-{role}\" id=\"message-{id}\" data-role=\"{role}\">\n<h2 class=\"message-label\">{label}{edited}</h2>\n{reasoning}<div class=\"message-body\">\n{body}</div>\n{artifacts}</section>\n"
        ),
        Layout::Terminal => {
            let sigil = if parts.message.is_prompt() { "$" } else { "&gt;" };
            format!(
                "<div class=\"message message-{role}\" id=\"message-{id}\" data-role=\"{role}\">\n<div class=\"prompt-line\"><span class=\"sigil\">{sigil}</span> <span class=\"message-label\">{label}</span>{edited}</div>\n{reasoning}<div class=\"message-body\">\n{body}</div>\n{artifacts}</div>\n"
            )
        }
        Layout::Paper => format!(
            "<article class=\"message message-{role}\" id=\"message-{id}\" data-role=\"{role}\">\n<p class=\"speaker\">{label}{edited}</p>\n<div class=\"message-body\">\n{body}</div>\n{reasoning}{artifacts}</article>\n"
        ),
    }
}

fn reasoning_block(style: ReasoningStyle, text: &str) -> String {
    let body = markdown::render(text, true);
    match style {
        ReasoningStyle::Disclosure => markdown::reasoning_widget(&body),
        ReasoningStyle::Dimmed => format!(
            "<details class=\"reasoning reasoning-dimmed\"><summary>{REASONING_SUMMARY}</summary>\n<div class=\"reasoning-body\">\n{body}</div>\n</details>\n"
        ),
        ReasoningStyle::Aside => format!(
            "<aside class=\"reasoning-aside\">\n{}</aside>\n",
            markdown::reasoning_widget(&body)
        ),
    }
}

fn artifact_list(artifacts: &[&Artifact], is_preview: bool) -> String {
    let mut html = String::from("<div class=\"artifacts\">\n");
    for artifact in artifacts {
        let name = escape_text(&artifact.safe_filename());
        let size = format_size(artifact.size);
        if is_preview {
            html.push_str(&format!(
                "<a class=\"artifact artifact-download\" href=\"#\" data-artifact-id=\"{}\" data-filename=\"{}\" data-mime=\"{}\" data-payload=\"{}\">{name} <small>({size})</small></a>\n",
                escape_attr(&artifact.id),
                escape_attr(&artifact.safe_filename()),
                escape_attr(&artifact.mime_type),
                escape_attr(artifact.data.trim()),
            ));
        } else {
            let href = sanitize_url(&artifact.export_path());
            html.push_str(&format!(
                "<a class=\"artifact artifact-link\" href=\"{}\" download>{name} <small>({size})</small></a>\n",
                escape_attr(&href)
            ));
        }
    }
    html.push_str("</div>\n");
    html
}

pub(crate) fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KIB {
        format!("{bytes} B")
    } else if b < KIB * KIB {
        format!("{:.1} KB", b / KIB)
    } else {
        format!("{:.1} MB", b / (KIB * KIB))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
