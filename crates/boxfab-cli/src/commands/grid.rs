//! boxfab grid command - sample a mesh and prepare a grid for one target.

use std::path::Path;

use anyhow::{Context, Result};
use boxfab_field::{Direction, GridData, ScalarGrid, SdfSampler};
use boxfab_mesh::Mesh;
use colored::Colorize;
use serde::Serialize;

use super::load_params;
use crate::{Cli, OutputFormat, output};

#[derive(Serialize)]
struct GridResult {
    input: String,
    output: String,
    target: String,
    resolution: [usize; 3],
    bounds_min: [i32; 3],
    bounds_max: [i32; 3],
    flipped_faces: usize,
    flipped_nodes: usize,
    projected_faces: usize,
    frozen_nodes: usize,
}

pub fn run(
    input: &Path,
    output_path: &Path,
    target: Direction,
    config: Option<&Path>,
    kernel_distance: Option<f64>,
    padding: i32,
    data: Option<&Path>,
    cli: &Cli,
) -> Result<()> {
    let params = load_params(config)?;
    let kernel_distance = kernel_distance.unwrap_or(params.kernel_distance);
    let mesh =
        Mesh::load(input).with_context(|| format!("Failed to load mesh from {:?}", input))?;

    let data = match data {
        Some(path) => GridData::load(path)
            .with_context(|| format!("Failed to load grid data from {:?}", path))?,
        None => {
            output::info(
                &format!("Sampling {} faces...", mesh.face_count()),
                cli.format,
                cli.quiet,
            );
            SdfSampler::new(padding).sample_mesh(&mesh)?
        }
    };

    let mut grid = ScalarGrid::from_grid_data(data)?;
    let weights = grid.calculate_weights(&mesh, target, &params.weights)?;
    let freeze = grid.freeze_kernel(&mesh, kernel_distance)?;
    grid.save(output_path)
        .with_context(|| format!("Failed to save grid to {:?}", output_path))?;

    let result = GridResult {
        input: input.display().to_string(),
        output: output_path.display().to_string(),
        target: target.to_string(),
        resolution: grid.resolution(),
        bounds_min: grid.bounds_min(),
        bounds_max: grid.bounds_max(),
        flipped_faces: weights.flipped_faces,
        flipped_nodes: weights.flipped_nodes,
        projected_faces: freeze.projected_faces,
        frozen_nodes: freeze.frozen_nodes,
    };

    match cli.format {
        OutputFormat::Json => {
            output::print(&result, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                output::success(
                    &format!("Grid saved to {}", output_path.display()),
                    cli.format,
                    cli.quiet,
                );
                let [nx, ny, nz] = result.resolution;
                println!("  {}: {} x {} x {}", "Nodes".cyan(), nx, ny, nz);
                println!(
                    "  {}: {:?} to {:?}",
                    "Bounds".cyan(),
                    result.bounds_min,
                    result.bounds_max
                );
                println!("  {}: {}", "Target".cyan(), result.target);
                println!(
                    "  {}: {} faces, {} nodes",
                    "Flipped".cyan(),
                    result.flipped_faces,
                    result.flipped_nodes
                );
                println!("  {}: {} nodes", "Frozen".cyan(), result.frozen_nodes);
            }
        }
    }

    Ok(())
}
