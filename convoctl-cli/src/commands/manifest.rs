use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use convoctl_core::{ArtifactManifest, ConvoConfig};

use super::{load_stored, write_output};

#[derive(Args, Debug)]
pub struct ManifestArgs {
    /// Stored conversation (a `convert --to json` export)
    #[arg(long = "in", value_name = "PATH")]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(long = "out", value_name = "PATH")]
    output: Option<PathBuf>,
}

pub fn run_manifest(args: ManifestArgs, config: &ConvoConfig) -> Result<()> {
    let conversation = load_stored(&args.input, &config.limits)?;
    let manifest = ArtifactManifest::build(
        &conversation.id,
        conversation.title(),
        &conversation.artifacts,
        Utc::now(),
    );
    let mut json = manifest.to_json()?;
    json.push('\n');
    write_output(args.output.as_deref(), &json)
}
