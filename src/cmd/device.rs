//! Device detection: `upscale-pipeline device`.

use anyhow::Result;
use std::path::PathBuf;

use super::super::Cli;

pub async fn cmd_device(cli: &Cli, project_dir: PathBuf) -> Result<()> {
    use upscale_pipeline::config::Config;
    use upscale_pipeline::device;

    let config = Config::new(project_dir, cli.config.clone(), cli.verbose)?;
    let preference = config.settings.upscale.device;
    let info = device::detect(preference).await;

    println!();
    println!("Preference: {}", preference);
    println!("Device:     {} ({})", info.name, info.kind);
    println!("Count:      {}", info.count);
    println!("Backend:    {}", config.settings.upscale.backend);
    println!();
    Ok(())
}
