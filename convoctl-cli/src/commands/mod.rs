//! Command implementations for the convoctl CLI

pub mod convert;
pub mod manifest;
pub mod merge;
pub mod skins;

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use convoctl_core::{parse_with, Conversation, FormatHint, Limits, Platform};

pub use convert::run_convert;
pub use manifest::run_manifest;
pub use merge::run_merge;
pub use skins::run_skins;

/// Read a whole input file; `-` reads stdin.
pub(crate) fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Write `content` to `path`, or stdout when no path (or `-`) is given.
pub(crate) fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path.filter(|p| *p != Path::new("-")) {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create directory {}", parent.display()))?;
            }
            fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}

/// Load a conversation previously written by `convert --to json`.
pub(crate) fn load_stored(path: &Path, limits: &Limits) -> Result<Conversation> {
    let raw = read_input(path)?;
    parse_with(&raw, FormatHint::Json, Platform::Generic, limits)
        .with_context(|| format!("{} is not a convoctl JSON export", path.display()))
}
