//! boxfab info command - describe a box list or grid file.

use std::path::Path;

use anyhow::{Context, Result, bail};
use boxfab_field::{BoxList, Direction, GridData, ScalarGrid};
use colored::Colorize;
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum FileInfo {
    Boxes(BoxListInfo),
    GridData(GridInfo),
    GridState(GridInfo),
}

#[derive(Serialize)]
struct BoxListInfo {
    path: String,
    count: usize,
    /// Boxes per target direction, in `+x, -x, +y, -y, +z, -z` order.
    per_target: [usize; 6],
    total_volume: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    boxes: Option<Vec<BoxInfo>>,
}

#[derive(Serialize)]
struct BoxInfo {
    min: [f64; 3],
    max: [f64; 3],
    target: String,
    constraints: usize,
}

#[derive(Serialize)]
struct GridInfo {
    path: String,
    resolution: [usize; 3],
    bounds_min: [i32; 3],
    bounds_max: [i32; 3],
    nodes: usize,
    value_range: [f64; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    has_weights: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frozen_nodes: Option<usize>,
}

fn value_range(values: &[f64]) -> [f64; 2] {
    values
        .iter()
        .fold([f64::INFINITY, f64::NEG_INFINITY], |[lo, hi], &v| {
            [lo.min(v), hi.max(v)]
        })
}

fn describe(path: &Path, bytes: &[u8], detailed: bool) -> Result<FileInfo> {
    let name = path.display().to_string();

    if bytes.starts_with(b"BXGRID") {
        let grid = ScalarGrid::from_bytes(bytes)?;
        return Ok(FileInfo::GridState(GridInfo {
            path: name,
            resolution: grid.resolution(),
            bounds_min: grid.bounds_min(),
            bounds_max: grid.bounds_max(),
            nodes: grid.node_count(),
            value_range: value_range(grid.distances()),
            has_weights: None,
            target: Some(grid.target().to_string()),
            frozen_nodes: Some(grid.frozen_count()),
        }));
    }

    if let Ok(list) = BoxList::from_bytes(bytes) {
        let mut per_target = [0usize; 6];
        for b in list.iter() {
            per_target[b.target().index()] += 1;
        }
        let boxes = detailed.then(|| {
            list.iter()
                .map(|b| BoxInfo {
                    min: b.min().coords.into(),
                    max: b.max().coords.into(),
                    target: b.target().to_string(),
                    constraints: b.constraints().count(),
                })
                .collect()
        });
        return Ok(FileInfo::Boxes(BoxListInfo {
            path: name,
            count: list.len(),
            per_target,
            total_volume: list.iter().map(|b| b.volume()).sum(),
            boxes,
        }));
    }

    match GridData::from_bytes(bytes) {
        Ok(data) => Ok(FileInfo::GridData(GridInfo {
            path: name,
            resolution: data.resolution,
            bounds_min: data.bounds_min,
            bounds_max: data.bounds_max,
            nodes: data.values.len(),
            value_range: value_range(&data.values),
            has_weights: Some(data.weights.is_some()),
            target: None,
            frozen_nodes: None,
        })),
        Err(e) => bail!("{:?} is neither a box list nor a grid file: {}", path, e),
    }
}

pub fn run(input: &Path, detailed: bool, cli: &Cli) -> Result<()> {
    let bytes = std::fs::read(input).with_context(|| format!("Failed to read {:?}", input))?;
    let info = describe(input, &bytes, detailed)?;

    match cli.format {
        OutputFormat::Json => {
            output::print(&info, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                print_text(&info);
            }
        }
    }

    Ok(())
}

fn print_text(info: &FileInfo) {
    match info {
        FileInfo::Boxes(list) => {
            println!("{}", "Box List".bold().underline());
            println!("  {}: {}", "Path".cyan(), list.path);
            println!("  {}: {}", "Boxes".cyan(), list.count);
            for (d, n) in Direction::ALL.iter().zip(list.per_target) {
                if n > 0 {
                    println!("    {}: {}", d, n);
                }
            }
            println!("  {}: {:.3}", "Total volume".cyan(), list.total_volume);
            if let Some(boxes) = &list.boxes {
                for (i, b) in boxes.iter().enumerate() {
                    println!(
                        "  [{}] {:?} to {:?} {} ({} constraints)",
                        i, b.min, b.max, b.target, b.constraints
                    );
                }
            }
        }
        FileInfo::GridData(grid) | FileInfo::GridState(grid) => {
            let title = if matches!(info, FileInfo::GridState(_)) {
                "Prepared Grid"
            } else {
                "Grid Data"
            };
            println!("{}", title.bold().underline());
            println!("  {}: {}", "Path".cyan(), grid.path);
            let [nx, ny, nz] = grid.resolution;
            println!("  {}: {} x {} x {} ({})", "Nodes".cyan(), nx, ny, nz, grid.nodes);
            println!(
                "  {}: {:?} to {:?}",
                "Bounds".cyan(),
                grid.bounds_min,
                grid.bounds_max
            );
            println!(
                "  {}: {:.4} to {:.4}",
                "Values".cyan(),
                grid.value_range[0],
                grid.value_range[1]
            );
            if let Some(w) = grid.has_weights {
                println!("  {}: {}", "Weights".cyan(), if w { "yes" } else { "no" });
            }
            if let Some(t) = &grid.target {
                println!("  {}: {}", "Target".cyan(), t);
            }
            if let Some(f) = grid.frozen_nodes {
                println!("  {}: {}", "Frozen nodes".cyan(), f);
            }
        }
    }
}
