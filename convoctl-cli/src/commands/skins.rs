use anyhow::Result;
use clap::Args;
use convoctl_core::{ConvoConfig, ThemeRegistry};
use serde_json::json;

#[derive(Args, Debug)]
pub struct SkinsArgs {
    /// Print the list as JSON
    #[arg(long)]
    json: bool,
}

pub fn run_skins(args: SkinsArgs, config: &ConvoConfig) -> Result<()> {
    let registry = ThemeRegistry::new();
    let configured = registry.resolve(&config.render.skin).id().to_string();
    let skins = registry.list();

    if args.json {
        let list: Vec<_> = skins
            .iter()
            .map(|s| {
                json!({
                    "id": s.id,
                    "name": s.name,
                    "description": s.description,
                    "default": s.is_default,
                    "selected": s.id == configured,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    for skin in skins {
        let marker = if skin.id == configured { "*" } else { " " };
        let default = if skin.is_default { " (default)" } else { "" };
        println!(
            "{marker} {:<10} {:<10} {}{default}",
            skin.id, skin.name, skin.description
        );
    }
    Ok(())
}
