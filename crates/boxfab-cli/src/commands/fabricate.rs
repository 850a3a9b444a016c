//! boxfab fabricate command - full orientation pipeline.

use std::path::Path;

use anyhow::{Context, Result};
use boxfab_field::{
    EngineBuilder, ExternalSampler, FabricationResult, OrientationReport, OrientationStatus,
    SdfSampler,
};
use boxfab_mesh::Mesh;
use colored::Colorize;
use serde::Serialize;
use tracing::debug;

use super::load_params;
use crate::{Cli, OutputFormat, output};

pub struct FabricateArgs<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub config: Option<&'a Path>,
    pub sampler: Option<&'a Path>,
    pub sampler_args: &'a [String],
    pub orientations_dir: Option<&'a Path>,
    pub all_targets: bool,
    pub parallel_orientations: bool,
    pub resolution: Option<u32>,
    pub kernel_distance: Option<f64>,
    pub max_iterations: Option<usize>,
}

#[derive(Serialize)]
struct FabricateResult<'a> {
    input: String,
    output: String,
    sampler: String,
    boxes: usize,
    non_converged: Vec<usize>,
    failed_boxes: Vec<usize>,
    orientations: &'a [OrientationReport],
}

pub fn run(args: FabricateArgs<'_>, cli: &Cli) -> Result<()> {
    let mut params = load_params(args.config)?;
    if let Some(resolution) = args.resolution {
        params.resolution = resolution;
    }
    if let Some(distance) = args.kernel_distance {
        params.kernel_distance = distance;
    }
    if let Some(iterations) = args.max_iterations {
        params.descent.max_iterations = iterations;
    }
    if args.all_targets {
        params.restrict_to_target = false;
    }
    params.parallel_orientations |= args.parallel_orientations;
    debug!(?params, "Resolved fabrication parameters");

    let builder = EngineBuilder::new().params(params);
    let engine = match args.sampler {
        Some(program) => builder
            .sampler(ExternalSampler::new(program).with_args(args.sampler_args.iter().cloned())),
        None => builder.sampler(SdfSampler::default()),
    }
    .build()?;

    let mesh = Mesh::load(args.input)
        .with_context(|| format!("Failed to load mesh from {:?}", args.input))?;

    output::info(
        &format!(
            "Fabricating {} faces over {} orientations ({} sampler)...",
            mesh.face_count(),
            engine.params().orientations,
            engine.sampler().name()
        ),
        cli.format,
        cli.quiet,
    );

    let result = engine.run(&mesh)?;
    result
        .save(args.output)
        .with_context(|| format!("Failed to save boxes to {:?}", args.output))?;
    if let Some(dir) = args.orientations_dir {
        result
            .save_orientations(dir)
            .with_context(|| format!("Failed to save orientation lists to {:?}", dir))?;
    }

    let summary = FabricateResult {
        input: args.input.display().to_string(),
        output: args.output.display().to_string(),
        sampler: engine.sampler().name().to_string(),
        boxes: result.box_count(),
        non_converged: result.non_converged(),
        failed_boxes: result.failed_boxes(),
        orientations: &result.orientations,
    };

    match cli.format {
        OutputFormat::Json => {
            output::print(&summary, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                print_text(&summary, &result, args.output);
            }
        }
    }

    Ok(())
}

fn print_text(summary: &FabricateResult<'_>, result: &FabricationResult, output_path: &Path) {
    output::success(
        &format!("{} boxes saved to {}", summary.boxes, output_path.display()),
        OutputFormat::Text,
        false,
    );
    for report in &result.orientations {
        match &report.status {
            OrientationStatus::Completed => println!(
                "  {} {} ({}): {} seeds, {} frozen nodes, {:.0} ms",
                "Orientation".cyan(),
                report.index,
                report.target,
                report.seeded,
                report.frozen_nodes,
                report.sample_ms + report.build_ms + report.optimize_ms
            ),
            OrientationStatus::Failed { code, message } => println!(
                "  {} {} ({}): {} [{}] {}",
                "Orientation".cyan(),
                report.index,
                report.target,
                "failed".red(),
                code,
                message
            ),
        }
    }
    if !summary.non_converged.is_empty() {
        output::warn(
            &format!(
                "{} boxes hit the iteration cap: {:?}",
                summary.non_converged.len(),
                summary.non_converged
            ),
            false,
        );
    }
    if !summary.failed_boxes.is_empty() {
        output::warn(
            &format!(
                "{} boxes failed to optimize: {:?}",
                summary.failed_boxes.len(),
                summary.failed_boxes
            ),
            false,
        );
    }
}
