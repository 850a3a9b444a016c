//! boxfab config command - print defaults or check a parameter file.

use std::path::Path;

use anyhow::{Context, Result};
use boxfab_field::FabricationParams;
use colored::Colorize;

use crate::{Cli, OutputFormat, Preset, output};

pub fn run(check: Option<&Path>, toml: bool, preset: Option<Preset>, cli: &Cli) -> Result<()> {
    if let Some(path) = check {
        let params = FabricationParams::from_file(path)
            .with_context(|| format!("Failed to load parameters from {:?}", path))?;
        params.validate()?;
        match cli.format {
            OutputFormat::Json => output::print(&params, cli.format, cli.quiet),
            OutputFormat::Text => {
                output::success(
                    &format!("{} is valid", path.display()),
                    cli.format,
                    cli.quiet,
                );
                if !cli.quiet {
                    println!(
                        "  {}: {}, {}: {}, {}: {}",
                        "Resolution".cyan(),
                        params.resolution,
                        "Kernel".cyan(),
                        params.kernel_distance,
                        "Orientations".cyan(),
                        params.orientations
                    );
                }
            }
        }
        return Ok(());
    }

    let params = match preset {
        Some(Preset::Fast) => FabricationParams::fast(),
        Some(Preset::HighQuality) => FabricationParams::high_quality(),
        None => FabricationParams::default(),
    };
    if cli.quiet {
        return Ok(());
    }
    let text = if toml {
        params.to_toml()?
    } else {
        params.to_json()?
    };
    println!("{text}");
    Ok(())
}
