//! boxfab minimize command - gradient descent on stored boxes.

use std::path::Path;

use anyhow::{Context, Result};
use boxfab_field::engine::expand_boxes;
use boxfab_field::{BoxList, BoxOutcome, ScalarGrid};
use colored::Colorize;
use serde::Serialize;

use super::{field_for, load_params};
use crate::{Cli, OutputFormat, output};

#[derive(Serialize)]
struct MinimizeResult {
    boxes: String,
    grid: String,
    output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    trajectory_steps: Option<usize>,
    outcomes: Vec<IndexedOutcome>,
}

#[derive(Serialize)]
struct IndexedOutcome {
    index: usize,
    #[serde(flatten)]
    outcome: BoxOutcome,
}

pub fn run(
    boxes_path: &Path,
    grid_path: &Path,
    output_path: &Path,
    config: Option<&Path>,
    index: Option<usize>,
    trajectory_path: Option<&Path>,
    max_iterations: Option<usize>,
    cli: &Cli,
) -> Result<()> {
    let mut boxes = BoxList::load(boxes_path)
        .with_context(|| format!("Failed to load boxes from {:?}", boxes_path))?;
    let grid = ScalarGrid::load(grid_path)
        .with_context(|| format!("Failed to load grid from {:?}", grid_path))?;

    let params = load_params(config)?;
    let mut descent = params.descent.clone();
    if let Some(iterations) = max_iterations {
        descent.max_iterations = iterations;
    }
    descent.validate()?;
    let field = field_for(&grid, &params).with_descent(descent);
    let parallel_threshold = params.parallel_threshold;

    let mut trajectory_steps = None;
    let outcomes: Vec<IndexedOutcome> = match index {
        Some(i) => {
            let b = boxes.get_mut(i)?;
            let mut trajectory = BoxList::new();
            let record = trajectory_path.is_some().then_some(&mut trajectory);
            let report = field.gradient_descent(b, record)?;
            if let Some(path) = trajectory_path {
                trajectory
                    .save(path)
                    .with_context(|| format!("Failed to save trajectory to {:?}", path))?;
                trajectory_steps = Some(trajectory.len());
            }
            vec![IndexedOutcome {
                index: i,
                outcome: BoxOutcome::Optimized(report),
            }]
        }
        None => {
            output::info(
                &format!("Minimizing {} boxes...", boxes.len()),
                cli.format,
                cli.quiet,
            );
            expand_boxes(&field, &mut boxes, parallel_threshold, None)
                .into_iter()
                .enumerate()
                .map(|(index, outcome)| IndexedOutcome { index, outcome })
                .collect()
        }
    };

    boxes
        .save(output_path)
        .with_context(|| format!("Failed to save boxes to {:?}", output_path))?;

    let result = MinimizeResult {
        boxes: boxes_path.display().to_string(),
        grid: grid_path.display().to_string(),
        output: output_path.display().to_string(),
        trajectory_steps,
        outcomes,
    };

    match cli.format {
        OutputFormat::Json => {
            output::print(&result, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                output::success(
                    &format!("Minimized boxes saved to {}", output_path.display()),
                    cli.format,
                    cli.quiet,
                );
                for o in &result.outcomes {
                    match &o.outcome {
                        BoxOutcome::Optimized(r) => println!(
                            "  {} {}: {:.6} → {:.6} in {} iterations ({:?})",
                            "Box".cyan(),
                            o.index,
                            r.initial_energy,
                            r.energy,
                            r.iterations,
                            r.termination
                        ),
                        BoxOutcome::Failed { code, message } => println!(
                            "  {} {}: {} [{}] {}",
                            "Box".cyan(),
                            o.index,
                            "failed".red(),
                            code,
                            message
                        ),
                    }
                }
                if let Some(steps) = result.trajectory_steps {
                    println!("  {}: {} accepted steps", "Trajectory".cyan(), steps);
                }
            }
        }
    }

    Ok(())
}
