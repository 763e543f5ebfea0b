use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use convoctl_core::export::to_json;
use convoctl_core::{merge_conversation, parse_with, ConvoConfig, FormatHint, Platform};
use tracing::info;

use super::{load_stored, read_input, write_output};

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Stored conversation (a `convert --to json` export)
    #[arg(long, value_name = "PATH")]
    existing: PathBuf,

    /// Fresh capture to fold in; `-` reads stdin
    #[arg(long = "in", value_name = "PATH")]
    input: PathBuf,

    /// Capture format: auto, markdown, json or html
    #[arg(long, default_value = "auto")]
    format: FormatHint,

    /// Chat platform of an HTML capture
    #[arg(long, default_value = "generic")]
    platform: Platform,

    /// Where to write the merged export (default: update --existing in place)
    #[arg(long = "out", value_name = "PATH")]
    output: Option<PathBuf>,

    /// Report what would change without writing anything
    #[arg(long = "dry-run")]
    dry_run: bool,
}

pub fn run_merge(args: MergeArgs, config: &ConvoConfig) -> Result<()> {
    let mut stored = load_stored(&args.existing, &config.limits)?;
    let raw = read_input(&args.input)?;
    let capture = parse_with(&raw, args.format, args.platform, &config.limits)
        .with_context(|| format!("failed to parse {}", args.input.display()))?;

    let existing_len = stored.len();
    let before = stored.clone();
    let result = merge_conversation(&mut stored, &capture);
    let appended = result.appended_count(existing_len);
    info!(
        existing = existing_len,
        incoming = capture.len(),
        appended,
        skipped = result.skipped_count,
        "merged capture"
    );

    println!(
        "appended {appended} message(s), skipped {} duplicate(s)",
        result.skipped_count
    );

    let target = args.output.unwrap_or_else(|| args.existing.clone());
    if args.dry_run {
        return Ok(());
    }
    if stored == before && target == args.existing {
        info!(path = %target.display(), "nothing new, stored export left untouched");
        return Ok(());
    }

    let json = to_json(&stored, true)?;
    write_output(Some(target.as_path()), &json)
}
