use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use convoctl_core::export::{to_json, to_markdown, ExportOptions};
use convoctl_core::extract::html::detect_platform;
use convoctl_core::{
    detect_format, parse_with, ArtifactManifest, Conversation, ConvoConfig, DocumentOptions,
    ExportFormat, FormatHint, Platform, ThemeRegistry,
};
use tracing::{info, warn};

use super::{read_input, write_output};
use crate::ui;

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Input capture (markdown transcript, JSON export or saved HTML); `-` reads stdin
    #[arg(long = "in", value_name = "PATH")]
    input: PathBuf,

    /// Input format: auto, markdown, json or html
    #[arg(long, default_value = "auto")]
    format: FormatHint,

    /// Chat platform of an HTML capture: generic, chatgpt, claude, gemini or aistudio
    #[arg(long, default_value = "generic")]
    platform: Platform,

    /// Output format: html, md or json
    #[arg(long = "to", value_name = "FORMAT", default_value = "html")]
    to: ExportFormat,

    /// HTML skin id (see `convoctl skins`)
    #[arg(long)]
    skin: Option<String>,

    /// Output file (default: stdout)
    #[arg(long = "out", value_name = "PATH")]
    output: Option<PathBuf>,

    /// Build a preview: artifacts are embedded instead of written beside the output
    #[arg(long)]
    preview: bool,

    /// Omit the attribution footer
    #[arg(long = "no-footer")]
    no_footer: bool,

    /// Drop reasoning blocks from HTML output
    #[arg(long = "no-reasoning")]
    no_reasoning: bool,

    /// Label for the user's turns
    #[arg(long = "user-label", value_name = "LABEL")]
    user_label: Option<String>,

    /// Label for the assistant's turns (default: the platform name)
    #[arg(long = "ai-label", value_name = "LABEL")]
    ai_label: Option<String>,

    /// Write JSON on a single line
    #[arg(long)]
    compact: bool,
}

/// Effective render settings: flag, then config file, then built-in default.
struct Settings {
    skin: String,
    user_label: String,
    ai_label: String,
    platform: Platform,
    include_footer: bool,
    reasoning: bool,
    preview: bool,
}

impl Settings {
    fn resolve(args: &ConvertArgs, config: &ConvoConfig, platform: Platform) -> Self {
        let render = &config.render;
        Self {
            skin: args.skin.clone().unwrap_or_else(|| render.skin.clone()),
            user_label: args
                .user_label
                .clone()
                .unwrap_or_else(|| render.user_label.clone()),
            ai_label: args
                .ai_label
                .clone()
                .or_else(|| render.ai_label.clone())
                .unwrap_or_else(|| platform.ai_label().to_string()),
            platform,
            include_footer: !args.no_footer && render.include_footer,
            reasoning: !args.no_reasoning && render.reasoning,
            preview: args.preview || render.preview,
        }
    }
}

/// A decoded artifact waiting to be written beside an HTML export.
struct PendingArtifact {
    path: PathBuf,
    bytes: Vec<u8>,
}

pub fn run_convert(args: ConvertArgs, config: &ConvoConfig) -> Result<()> {
    let raw = read_input(&args.input)?;
    let platform = effective_platform(&raw, args.format, args.platform);

    let mut conversation = ui::with_spinner(
        format!("Parsing {}", args.input.display()),
        |c: &Conversation| format!("Parsed {} message(s)", c.len()),
        || parse_with(&raw, args.format, platform, &config.limits),
    )
    .with_context(|| format!("failed to parse {}", args.input.display()))?;
    conversation.metadata.exported_at = Some(Utc::now());

    let settings = Settings::resolve(&args, config, platform);
    info!(
        input = %args.input.display(),
        to = %args.to,
        messages = conversation.len(),
        artifacts = conversation.artifacts.len(),
        "converting conversation"
    );

    let rendered = match args.to {
        ExportFormat::Html => render_html(&conversation, &settings),
        ExportFormat::Markdown => to_markdown(
            &conversation,
            &ExportOptions {
                user_label: &settings.user_label,
                ai_label: &settings.ai_label,
                include_footer: settings.include_footer,
            },
        )?,
        ExportFormat::Json => to_json(&conversation, !args.compact)?,
    };

    // Decode everything before the first write so a bad payload leaves no partial output.
    let artifacts = if args.to == ExportFormat::Html && !settings.preview {
        pending_artifacts(&conversation, args.output.as_deref())?
    } else {
        None
    };

    write_output(args.output.as_deref(), &rendered)?;

    if let Some((base, pending)) = artifacts {
        write_artifacts(&conversation, &base, &pending)?;
        ui::note(format!(
            "Wrote {} artifact(s) and manifest.json to {}",
            pending.len(),
            base.display()
        ));
    }
    if let Some(path) = &args.output {
        ui::note(format!("Wrote {} ({})", path.display(), args.to));
    }
    Ok(())
}

/// Platform used for labels: the flag, or what an HTML capture reveals.
fn effective_platform(raw: &str, hint: FormatHint, flag: Platform) -> Platform {
    if flag != Platform::Generic {
        return flag;
    }
    let is_html = match hint {
        FormatHint::Auto => detect_format(raw) == FormatHint::Html,
        other => other == FormatHint::Html,
    };
    if is_html {
        detect_platform(raw).unwrap_or(flag)
    } else {
        flag
    }
}

fn render_html(conversation: &Conversation, settings: &Settings) -> String {
    let options = DocumentOptions {
        title: conversation.title(),
        user_label: &settings.user_label,
        ai_label: &settings.ai_label,
        platform: settings.platform,
        metadata: Some(&conversation.metadata),
        include_footer: settings.include_footer,
        is_preview: settings.preview,
        reasoning_enabled: settings.reasoning,
    };
    ThemeRegistry::new().render_document(&settings.skin, conversation, &options)
}

fn pending_artifacts(
    conversation: &Conversation,
    output: Option<&Path>,
) -> Result<Option<(PathBuf, Vec<PendingArtifact>)>> {
    if conversation.artifacts.is_empty() {
        return Ok(None);
    }
    let Some(output) = output.filter(|p| *p != Path::new("-")) else {
        warn!(
            artifacts = conversation.artifacts.len(),
            "artifacts not written: HTML went to stdout, pass --out to write them"
        );
        return Ok(None);
    };
    let base = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let pending = conversation
        .all_artifacts()
        .map(|artifact| {
            Ok(PendingArtifact {
                path: base.join(artifact.export_path()),
                bytes: artifact.decode()?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Some((base, pending)))
}

fn write_artifacts(conversation: &Conversation, base: &Path, pending: &[PendingArtifact]) -> Result<()> {
    let dir = base.join("artifacts");
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    for artifact in pending {
        fs::write(&artifact.path, &artifact.bytes)
            .with_context(|| format!("failed to write {}", artifact.path.display()))?;
    }

    let manifest = ArtifactManifest::build(
        &conversation.id,
        conversation.title(),
        &conversation.artifacts,
        Utc::now(),
    );
    let path = base.join("manifest.json");
    fs::write(&path, manifest.to_json()?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
