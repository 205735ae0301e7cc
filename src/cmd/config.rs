//! Configuration view and validation commands: `upscale-pipeline config`.

use anyhow::{Context, Result};
use std::path::PathBuf;

use super::super::{Cli, ConfigCommands};

pub fn cmd_config(cli: &Cli, project_dir: PathBuf, command: Option<ConfigCommands>) -> Result<()> {
    use upscale_pipeline::pipeline_config::{CONFIG_FILE_NAME, PipelineToml};

    let config_dir = project_dir.join(".pipeline");
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join(CONFIG_FILE_NAME));

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Pipeline Configuration");
            println!("======================");
            println!();

            let toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                PipelineToml::load(&config_path)?
            } else {
                println!("No config.toml found at {}", config_path.display());
                println!("Using default configuration:");
                PipelineToml::default()
            };
            println!();
            let rendered =
                toml::to_string_pretty(&toml).context("Failed to render configuration")?;
            println!("{}", rendered);

            if !config_path.exists() {
                println!("Run 'upscale-pipeline config init' to create a config.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let toml = if config_path.exists() {
                PipelineToml::load(&config_path)?
            } else {
                println!("No config.toml found. Checking defaults.");
                PipelineToml::default()
            };
            let warnings = toml.validate()?;

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration is valid, with warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("config.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }

            PipelineToml::default().save(&config_path)?;

            println!("Created config.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [upscale] scale, tile_size, backend, model, device");
            println!("  - [verify] pink_tolerance and [scrub] magenta_tolerance");
            println!("  - [retry] and [batch] per-file failure handling");
            println!("  - [tools] paths to kextract, art2img, ffmpeg, fluidsynth");
            println!();
        }
    }

    Ok(())
}
