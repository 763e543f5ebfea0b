//! convoctl CLI - chat transcript conversion and merging
//!
//! Entry point for the `convoctl` command-line tool:
//! - `convert`: ingest a markdown, JSON or HTML capture and render HTML/MD/JSON
//! - `merge`: fold a fresh capture into a stored JSON export
//! - `skins`: list the registered HTML skins
//! - `manifest`: print the artifact manifest of a stored export

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use convoctl_core::ConvoConfig;

mod commands;
mod tracing_setup;
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "convoctl",
    author,
    version,
    about = "Convert and merge AI chat transcripts",
    long_about = "Ingest chat captures (markdown transcripts, JSON exports or saved HTML pages), \
                  merge fresh captures into stored conversations without duplicating turns, \
                  and render them to self-contained HTML, Markdown or JSON."
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file (default: $CONVOCTL_CONFIG or ~/.convoctl/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Suppress spinners and summaries on stderr
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest a capture and render it as HTML, Markdown or JSON
    Convert(commands::convert::ConvertArgs),
    /// Merge a fresh capture into a stored JSON export
    Merge(commands::merge::MergeArgs),
    /// List registered HTML skins
    Skins(commands::skins::SkinsArgs),
    /// Print the artifact manifest of a stored JSON export
    Manifest(commands::manifest::ManifestArgs),
}

fn load_config(path: Option<&Path>) -> Result<ConvoConfig> {
    match path {
        Some(path) => ConvoConfig::load_from(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => ConvoConfig::load().context("failed to load config"),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_setup::init(&tracing_setup::TracingConfig {
        debug: cli.debug,
        quiet: cli.quiet,
    })
    .ok();
    ui::init_quiet_mode(cli.quiet);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Convert(args) => commands::run_convert(args, &config)?,
        Commands::Merge(args) => commands::run_merge(args, &config)?,
        Commands::Skins(args) => commands::run_skins(args, &config)?,
        Commands::Manifest(args) => commands::run_manifest(args, &config)?,
    }
    Ok(())
}
