//! boxfab seed command - initial boxes of one orientation.

use std::path::Path;

use anyhow::{Context, Result, bail};
use boxfab_field::engine::{
    ORIENTATION_COUNT, orientation_rotation, orientation_target, scale_to_resolution, seed_boxes,
};
use boxfab_mesh::Mesh;
use colored::Colorize;
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

#[derive(Serialize)]
struct SeedResult {
    input: String,
    output: String,
    orientation: usize,
    target: String,
    scale: f64,
    faces: usize,
    boxes: usize,
}

pub fn run(
    input: &Path,
    output_path: &Path,
    orientation: usize,
    resolution: u32,
    all_targets: bool,
    cli: &Cli,
) -> Result<()> {
    if orientation >= ORIENTATION_COUNT {
        bail!("orientation must be below {ORIENTATION_COUNT}, got {orientation}");
    }
    let mut mesh =
        Mesh::load(input).with_context(|| format!("Failed to load mesh from {:?}", input))?;

    let rotation = orientation_rotation(orientation);
    let target = orientation_target(orientation);
    let scale = scale_to_resolution(&mut mesh, resolution)?;
    mesh.transform(&rotation);

    let restrict = (!all_targets).then_some(target);
    let boxes = seed_boxes(&mesh, &rotation, restrict)?;
    boxes
        .save(output_path)
        .with_context(|| format!("Failed to save boxes to {:?}", output_path))?;

    let result = SeedResult {
        input: input.display().to_string(),
        output: output_path.display().to_string(),
        orientation,
        target: target.to_string(),
        scale,
        faces: mesh.face_count(),
        boxes: boxes.len(),
    };

    match cli.format {
        OutputFormat::Json => {
            output::print(&result, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                output::success(
                    &format!("Seed boxes saved to {}", output_path.display()),
                    cli.format,
                    cli.quiet,
                );
                println!(
                    "  {}: {} ({})",
                    "Orientation".cyan(),
                    result.orientation,
                    result.target
                );
                println!("  {}: {:.4}", "Scale".cyan(), result.scale);
                println!(
                    "  {}: {} of {} faces",
                    "Boxes".cyan(),
                    result.boxes,
                    result.faces
                );
            }
        }
    }

    Ok(())
}
