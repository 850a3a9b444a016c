//! boxfab energy command - evaluate stored boxes against a prepared grid.

use std::path::Path;

use anyhow::{Context, Result};
use boxfab_field::{BoxList, ScalarGrid};
use colored::Colorize;
use nalgebra::Vector6;
use serde::Serialize;

use super::{field_for, load_params};
use crate::{Cli, OutputFormat, output};

#[derive(Serialize)]
struct BoxEnergy {
    index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    energy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gradient: Option<[f64; 6]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    finite_difference: Option<[f64; 6]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct EnergyResult {
    boxes: String,
    grid: String,
    total_energy: f64,
    evaluated: Vec<BoxEnergy>,
}

fn to_array(v: &Vector6<f64>) -> [f64; 6] {
    std::array::from_fn(|i| v[i])
}

pub fn run(
    boxes_path: &Path,
    grid_path: &Path,
    config: Option<&Path>,
    index: Option<usize>,
    finite_difference: bool,
    cli: &Cli,
) -> Result<()> {
    let params = load_params(config)?;
    let boxes = BoxList::load(boxes_path)
        .with_context(|| format!("Failed to load boxes from {:?}", boxes_path))?;
    let grid = ScalarGrid::load(grid_path)
        .with_context(|| format!("Failed to load grid from {:?}", grid_path))?;
    let field = field_for(&grid, &params);

    let selected: Vec<usize> = match index {
        Some(i) => {
            boxes.get(i)?;
            vec![i]
        }
        None => (0..boxes.len()).collect(),
    };

    let mut evaluated = Vec::with_capacity(selected.len());
    for i in selected {
        let b = boxes.get(i)?;
        let entry = match field.energy_and_gradient(b) {
            Ok((e, g)) => {
                let fd = if finite_difference {
                    Some(to_array(&field.gradient_finite_difference(b)?))
                } else {
                    None
                };
                BoxEnergy {
                    index: i,
                    energy: Some(e),
                    gradient: Some(to_array(&g)),
                    finite_difference: fd,
                    error: None,
                }
            }
            Err(e) => BoxEnergy {
                index: i,
                energy: None,
                gradient: None,
                finite_difference: None,
                error: Some(format!("[{}] {}", e.code(), e)),
            },
        };
        evaluated.push(entry);
    }

    let result = EnergyResult {
        boxes: boxes_path.display().to_string(),
        grid: grid_path.display().to_string(),
        total_energy: evaluated.iter().filter_map(|b| b.energy).sum(),
        evaluated,
    };

    match cli.format {
        OutputFormat::Json => {
            output::print(&result, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                for b in &result.evaluated {
                    match (&b.energy, &b.gradient, &b.error) {
                        (Some(e), Some(g), _) => {
                            println!("{} {}: {:.6}", "Box".cyan(), b.index, e);
                            println!("  {}: {:.6?}", "Gradient".cyan(), g);
                            if let Some(fd) = &b.finite_difference {
                                println!("  {}: {:.6?}", "Finite difference".cyan(), fd);
                            }
                        }
                        (_, _, Some(err)) => {
                            println!("{} {}: {}", "Box".cyan(), b.index, err.red());
                        }
                        _ => {}
                    }
                }
                println!("{}: {:.6}", "Total".cyan().bold(), result.total_energy);
            }
        }
    }

    Ok(())
}
